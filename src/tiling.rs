use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::{DynamicImage, GenericImageView};

use crate::error::{ChallengeError, ChallengeResult};

/// Grid shape written as `RxC`, e.g. `3x4` is 3 rows and 4 columns
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct GridDims {
    pub rows: u32,
    pub cols: u32,
}

impl GridDims {
    pub fn new(rows: u32, cols: u32) -> ChallengeResult<GridDims> {
        if rows == 0 || cols == 0 {
            return Err(ChallengeError::InvalidDimensions(format!(
                "rows and columns must be at least 1, got {rows}x{cols}"
            )));
        }
        Ok(GridDims { rows, cols })
    }

    pub fn cell_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Every (row, col) of the grid, row by row
    pub fn cells(&self) -> Vec<(u32, u32)> {
        (0..self.rows)
            .flat_map(|row| (0..self.cols).map(move |col| (row, col)))
            .collect()
    }
}

impl fmt::Display for GridDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

impl FromStr for GridDims {
    type Err = ChallengeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChallengeError::InvalidDimensions(format!("expected RxC, got \"{s}\""));
        let (rows, cols) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let rows = rows.trim().parse::<u32>().map_err(|_| invalid())?;
        let cols = cols.trim().parse::<u32>().map_err(|_| invalid())?;
        GridDims::new(rows, cols)
    }
}

/// One crop of the hint image together with where it came from
#[derive(Clone)]
pub struct SubImage {
    pub image: DynamicImage,
    pub left: u32,
    pub top: u32,
}

/// The hint image cut into `rows x cols` equal tiles
pub struct SubImageGrid {
    pub dims: GridDims,
    pub tile_width: u32,
    pub tile_height: u32,
    tiles: Vec<Vec<SubImage>>,
}

impl SubImageGrid {
    pub fn get(&self, row: u32, col: u32) -> Option<&SubImage> {
        self.tiles.get(row as usize)?.get(col as usize)
    }

    pub fn rows(&self) -> &[Vec<SubImage>] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.iter().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cut an image into a grid of sub images.
///
/// Tile size is `width / cols` by `height / rows` (integer division). Pixels
/// on the right and bottom edges that do not fill a whole tile belong to no
/// tile.
pub fn divide_image(image: &DynamicImage, dims: GridDims) -> ChallengeResult<SubImageGrid> {
    let (width, height) = image.dimensions();
    let tile_width = width / dims.cols;
    let tile_height = height / dims.rows;
    if tile_width == 0 || tile_height == 0 {
        return Err(ChallengeError::InvalidDimensions(format!(
            "a {dims} grid does not fit in a {width}x{height} image"
        )));
    }

    let tiles = (0..dims.rows)
        .map(|row| {
            (0..dims.cols)
                .map(|col| {
                    let left = col * tile_width;
                    let top = row * tile_height;
                    SubImage {
                        image: image.crop_imm(left, top, tile_width, tile_height),
                        left,
                        top,
                    }
                })
                .collect()
        })
        .collect();

    Ok(SubImageGrid {
        dims,
        tile_width,
        tile_height,
        tiles,
    })
}

/// Open the image at `path` and cut it with `divide_image`
pub fn divide_image_file<P: AsRef<Path>>(path: P, dims: GridDims) -> ChallengeResult<SubImageGrid> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|e| ChallengeError::NotAnImage {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    divide_image(&image, dims)
}
