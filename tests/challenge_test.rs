use bassflag::{
    construct_video_with_hint, create_challenge, divide_image_file, generate_wave,
    insert_tiles_into_frames, plan_placements, prepare_environment, recover_text, BitString,
    ChallengeError, ChallengeSettings, Ffmpeg, GridDims, Workspace,
};
use image::{GenericImageView, Rgb, RgbImage};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn write_frames(dir: &Path, count: usize, width: u32, height: u32) {
    fs::create_dir_all(dir).unwrap();
    for i in 1..=count {
        RgbImage::from_pixel(width, height, Rgb([10, 10, 10]))
            .save(dir.join(format!("output_frames_{:04}.png", i)))
            .unwrap();
    }
}

fn write_hint(path: &Path, width: u32, height: u32) {
    RgbImage::from_fn(width, height, |x, y| Rgb([200, (x % 256) as u8, (y % 256) as u8]))
        .save(path)
        .unwrap();
}

fn unreachable_ffmpeg() -> Ffmpeg {
    Ffmpeg::new("bassflag-test-no-such-ffmpeg", false)
}

#[test]
fn test_ab_flag_bits_and_segments() {
    let bits = BitString::from_text("AB");
    assert_eq!(bits.to_string(), "0100000101000010");

    let sample_rate = 400;
    let bit_duration = 0.5;
    let n = 200;
    let wave = generate_wave("AB", 20.0, -20.0, sample_rate, bit_duration).unwrap();
    assert_eq!(wave.len(), 16 * n);
    for (i, bit) in bits.bits().iter().enumerate() {
        let peak = wave.peak(i * n, (i + 1) * n);
        let target = if *bit { 10.0 } else { 0.1 };
        assert!((peak - target).abs() < 1e-3, "segment {i}: {peak}");
    }
}

#[test]
fn test_hint_400_tiled_4x4() {
    let dir = tempfile::tempdir().unwrap();
    let hint = dir.path().join("hint.png");
    write_hint(&hint, 400, 400);
    let grid = divide_image_file(&hint, "4x4".parse().unwrap()).unwrap();
    assert_eq!(grid.len(), 16);
    let mut origins = HashSet::new();
    for row in grid.rows() {
        for tile in row {
            assert_eq!(tile.image.dimensions(), (100, 100));
            assert_eq!(tile.left % 100, 0);
            assert_eq!(tile.top % 100, 0);
            origins.insert((tile.left, tile.top));
        }
    }
    assert_eq!(origins.len(), 16);
}

#[test]
fn test_schedule_for_3600_frames() {
    let files: Vec<String> = (1..=3600)
        .map(|i| format!("output_frames_{:04}.png", i))
        .collect();
    let mut rng = ChaCha20Rng::seed_from_u64(2024);
    let placements =
        plan_placements(&files, GridDims::new(4, 4).unwrap(), 30, 1800, &mut rng).unwrap();
    assert_eq!(placements.len(), 16);
    assert_eq!(placements.first().unwrap().frame_number, 1800);
    assert_eq!(placements.last().unwrap().frame_number, 2250);
    let cells: HashSet<(u32, u32)> = placements.iter().map(|p| (p.row, p.col)).collect();
    assert_eq!(cells.len(), 16);
}

#[test]
fn test_seeded_watermark_runs_are_identical() {
    let dir = tempfile::tempdir().unwrap();
    let hint = dir.path().join("hint.png");
    write_hint(&hint, 40, 40);
    let first_dir = dir.path().join("first");
    let second_dir = dir.path().join("second");
    write_frames(&first_dir, 12, 40, 40);
    write_frames(&second_dir, 12, 40, 40);
    let dims = GridDims::new(2, 2).unwrap();

    let first = insert_tiles_into_frames(
        &first_dir,
        &hint,
        dims,
        2,
        2,
        &mut ChaCha20Rng::seed_from_u64(8),
        false,
    )
    .unwrap();
    let second = insert_tiles_into_frames(
        &second_dir,
        &hint,
        dims,
        2,
        2,
        &mut ChaCha20Rng::seed_from_u64(8),
        false,
    )
    .unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 4);
    for i in 1..=12 {
        let name = format!("output_frames_{:04}.png", i);
        let a = image::open(first_dir.join(&name)).unwrap().to_rgb8();
        let b = image::open(second_dir.join(&name)).unwrap().to_rgb8();
        assert_eq!(a, b, "{name} differs");
    }
}

fn small_settings() -> ChallengeSettings {
    ChallengeSettings {
        flag: "Hi".to_string(),
        sample_rate: 100,
        bit_duration: 0.25,
        grid: GridDims::new(2, 2).unwrap(),
        frame_interval: 2,
        start_frame: 0,
        plot: false,
        ..ChallengeSettings::default()
    }
}

#[test]
fn test_create_challenge_continues_when_ffmpeg_fails() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path().join("tmp"));
    let hint = dir.path().join("hint.png");
    write_hint(&hint, 16, 16);
    // Frames of an earlier run must not reach the new video
    write_frames(&workspace.frames_dir, 6, 16, 16);

    let placements = create_challenge(
        &unreachable_ffmpeg(),
        &small_settings(),
        &workspace,
        &dir.path().join("missing.mp4"),
        &hint,
        &dir.path().join("challenge.mp4"),
        &mut ChaCha20Rng::seed_from_u64(1),
        false,
    )
    .unwrap();

    assert!(placements.is_empty());
    assert_eq!(fs::read_dir(&workspace.frames_dir).unwrap().count(), 0);
    assert!(workspace.flag_audio_high_volume.is_file());
    assert_eq!(recover_text(&workspace.flag_audio, 0.25).unwrap(), "Hi");
    assert!(!dir.path().join("challenge.mp4").exists());
}

#[test]
fn test_video_with_hint_places_tiles_when_ffmpeg_fails() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path().join("tmp"));
    let hint = dir.path().join("hint.png");
    write_hint(&hint, 16, 16);
    prepare_environment(&workspace).unwrap();
    // Stand in for the frames ffmpeg would have sampled
    write_frames(&workspace.frames_dir, 6, 16, 16);

    let placements = construct_video_with_hint(
        &unreachable_ffmpeg(),
        &small_settings(),
        &workspace,
        &dir.path().join("missing.mp4"),
        &hint,
        2,
        &mut ChaCha20Rng::seed_from_u64(1),
        false,
    )
    .unwrap();

    let frames: Vec<&str> = placements.iter().map(|p| p.frame_file.as_str()).collect();
    assert_eq!(
        frames,
        vec![
            "output_frames_0001.png",
            "output_frames_0003.png",
            "output_frames_0005.png"
        ]
    );
    assert!(!workspace.video_with_hint.exists());
}

#[test]
fn test_create_challenge_stops_on_missing_hint() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path().join("tmp"));
    let settings = ChallengeSettings {
        flag: "Hi".to_string(),
        sample_rate: 100,
        plot: false,
        ..ChallengeSettings::default()
    };
    let result = create_challenge(
        &unreachable_ffmpeg(),
        &settings,
        &workspace,
        &dir.path().join("missing.mp4"),
        &dir.path().join("no_hint.png"),
        &dir.path().join("challenge.mp4"),
        &mut ChaCha20Rng::seed_from_u64(1),
        false,
    );
    assert!(matches!(result, Err(ChallengeError::NotAnImage { .. })));
}
