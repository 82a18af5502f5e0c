use std::fmt;
use std::str::FromStr;

use crate::error::ChallengeError;

/// Get a bit value on a unsigned number
pub fn get_bit_at(input: u8, n: u8) -> bool {
    if n < 8 {
        input & (1 << n) != 0 // 1 == true, 0 == false
    } else {
        panic!("The bit position must be between 0 and 7 inclusively on a 8 bits number");
    }
}

/// Get a byte from a list of bit (most significant bit first)
pub fn get_byte_from_bits(bits: [bool; 8]) -> u8 {
    let mut result: u8 = 0;
    for i in 0..8 {
        let position = 8 - i - 1 as u8;
        result += u8::pow(2, i as u32) * bits[position as usize] as u8
    }
    result
}

/// The flag once turned into bits.
///
/// Each byte of the text gives 8 bits, most significant first, in source order.
/// Displayed as a string of `0` and `1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitString {
    bits: Vec<bool>,
}

impl BitString {
    pub fn from_text(text: &str) -> BitString {
        let mut bits = Vec::with_capacity(text.len() * 8);
        for byte in text.bytes() {
            for n in (0..8).rev() {
                bits.push(get_bit_at(byte, n));
            }
        }
        BitString { bits }
    }

    pub fn from_bits(bits: Vec<bool>) -> BitString {
        BitString { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Regroup the bits by 8 into bytes. Trailing bits that do not fill a byte are ignored.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits
            .chunks_exact(8)
            .map(|chunk| {
                let mut byte_bits = [false; 8];
                byte_bits.copy_from_slice(chunk);
                get_byte_from_bits(byte_bits)
            })
            .collect()
    }

    /// Decode back to text. Invalid UTF-8 is replaced rather than rejected
    /// because recovered bits may be noisy.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: String = self.bits.iter().map(|b| if *b { '1' } else { '0' }).collect();
        s.fmt(f)
    }
}

impl FromStr for BitString {
    type Err = ChallengeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = s
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(ChallengeError::InvalidParameter(format!(
                    "Unexpected character in bit string: {other}"
                ))),
            })
            .collect::<Result<Vec<bool>, ChallengeError>>()?;
        Ok(BitString { bits })
    }
}
