use std::fs;
use std::path::{Path, PathBuf};

use image::imageops;
use indicatif::ProgressBar;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{ChallengeError, ChallengeResult};
use crate::tiling::{divide_image_file, GridDims, SubImageGrid};

/// Only files with this ending are treated as frames
pub const FRAME_EXTENSION: &str = ".png";

/// One tile pasted onto one frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    /// File name of the frame inside the frame directory
    pub frame_file: String,
    /// Counter value when the frame was picked (0-based)
    pub frame_number: usize,
    pub row: u32,
    pub col: u32,
}

/// Frame file names of a directory in lexicographic order.
///
/// The frame sampler writes zero padded names (`output_frames_0001.png`) so
/// this order is the playback order. Names that are not valid UTF-8 cannot
/// be frames of the sampler and are skipped.
pub fn list_frame_files(frame_dir: &Path) -> ChallengeResult<Vec<String>> {
    let entries = fs::read_dir(frame_dir).map_err(|e| ChallengeError::FrameIOError {
        path: frame_dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ChallengeError::FrameIOError {
            path: frame_dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => warn!("Skipping non UTF-8 file name {:?}", name),
        }
    }
    names.sort();
    Ok(names)
}

/// Decide which frame receives which tile.
///
/// Walks `file_names` (already sorted) and for every frame file checks the
/// counter: a frame is picked when the counter reached `start_frame` and is a
/// multiple of `frame_interval`. A picked frame takes a random cell out of the
/// pool. Once the pool is empty nothing else is placed.
///
/// After each frame file the counter becomes its position in `file_names`
/// plus one. Names without the frame extension still occupy a position.
pub fn plan_placements<R: Rng + ?Sized>(
    file_names: &[String],
    dims: GridDims,
    frame_interval: usize,
    start_frame: usize,
    rng: &mut R,
) -> ChallengeResult<Vec<Placement>> {
    if frame_interval == 0 {
        return Err(ChallengeError::InvalidParameter(
            "frame interval must be at least 1".to_string(),
        ));
    }
    let mut pool = dims.cells();
    let mut placements = Vec::new();
    let mut frame_number: usize = 0;

    for (i, file_name) in file_names.iter().enumerate() {
        if !file_name.ends_with(FRAME_EXTENSION) {
            continue;
        }
        if pool.is_empty() {
            break;
        }
        if frame_number >= start_frame && frame_number % frame_interval == 0 {
            let picked = rng.gen_range(0..pool.len());
            let (row, col) = pool.remove(picked);
            placements.push(Placement {
                frame_file: file_name.clone(),
                frame_number,
                row,
                col,
            });
        }
        frame_number = i + 1;
    }
    Ok(placements)
}

/// Paste a tile of `grid` onto the frame file at the tile's own offset, then overwrite the frame
pub fn apply_placement(
    frame_dir: &Path,
    grid: &SubImageGrid,
    placement: &Placement,
) -> ChallengeResult<PathBuf> {
    let frame_path = frame_dir.join(&placement.frame_file);
    let frame_error = |reason: String| ChallengeError::FrameIOError {
        path: frame_path.clone(),
        reason,
    };
    let tile = grid.get(placement.row, placement.col).ok_or_else(|| {
        ChallengeError::InvalidDimensions(format!(
            "cell ({}, {}) is outside the {} grid",
            placement.row, placement.col, grid.dims
        ))
    })?;

    let mut frame = image::open(&frame_path).map_err(|e| frame_error(e.to_string()))?;
    imageops::replace(
        &mut frame,
        &tile.image.to_rgba8(),
        i64::from(tile.left),
        i64::from(tile.top),
    );
    frame
        .save(&frame_path)
        .map_err(|e| frame_error(e.to_string()))?;
    Ok(frame_path)
}

/// Scatter the tiles of `hint_image` over the frames of `frame_dir`.
///
/// Frames are modified in place. A failure part way leaves the frames
/// handled so far watermarked.
pub fn insert_tiles_into_frames<R: Rng + ?Sized>(
    frame_dir: &Path,
    hint_image: &Path,
    dims: GridDims,
    frame_interval: usize,
    start_frame: usize,
    rng: &mut R,
    show_progress: bool,
) -> ChallengeResult<Vec<Placement>> {
    let files = list_frame_files(frame_dir)?;
    let grid = divide_image_file(hint_image, dims)?;
    debug!(
        "Hint image cut into {} tiles of {}x{}",
        grid.len(),
        grid.tile_width,
        grid.tile_height
    );
    let placements = plan_placements(&files, dims, frame_interval, start_frame, rng)?;

    let pb = ProgressBar::new(placements.len() as u64);
    for placement in &placements {
        apply_placement(frame_dir, &grid, placement)?;
        info!(
            "Sub image ({}, {}) placed onto frame {}.",
            placement.row,
            placement.col,
            placement.frame_number + 1
        );
        if show_progress {
            pb.inc(1);
        }
    }
    if show_progress {
        pb.finish_with_message("done");
    }
    Ok(placements)
}

#[cfg(test)]
mod watermark_tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, Rgba};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use std::collections::HashSet;

    fn frame_names(count: usize) -> Vec<String> {
        (1..=count)
            .map(|i| format!("output_frames_{:04}.png", i))
            .collect()
    }

    #[test]
    fn test_plan_placements_schedule_3600_frames() {
        let files = frame_names(3600);
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let placements =
            plan_placements(&files, GridDims::new(4, 4).unwrap(), 30, 1800, &mut rng).unwrap();

        let numbers: Vec<usize> = placements.iter().map(|p| p.frame_number).collect();
        let expected: Vec<usize> = (0..16).map(|k| 1800 + 30 * k).collect();
        assert_eq!(numbers, expected);
        assert_eq!(placements[0].frame_file, "output_frames_1801.png");
        assert_eq!(placements[15].frame_file, "output_frames_2251.png");
    }

    #[test]
    fn test_plan_placements_never_reuses_a_cell() {
        let files = frame_names(500);
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let dims = GridDims::new(3, 5).unwrap();
        let placements = plan_placements(&files, dims, 1, 0, &mut rng).unwrap();
        assert_eq!(placements.len(), dims.cell_count());
        let cells: HashSet<(u32, u32)> = placements.iter().map(|p| (p.row, p.col)).collect();
        assert_eq!(cells.len(), dims.cell_count());
    }

    #[test]
    fn test_plan_placements_fewer_frames_than_cells() {
        let files = frame_names(10);
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let placements =
            plan_placements(&files, GridDims::new(4, 4).unwrap(), 3, 0, &mut rng).unwrap();
        let numbers: Vec<usize> = placements.iter().map(|p| p.frame_number).collect();
        assert_eq!(numbers, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_plan_placements_same_seed_same_schedule() {
        let files = frame_names(300);
        let dims = GridDims::new(4, 4).unwrap();
        let first =
            plan_placements(&files, dims, 10, 20, &mut ChaCha20Rng::seed_from_u64(99)).unwrap();
        let second =
            plan_placements(&files, dims, 10, 20, &mut ChaCha20Rng::seed_from_u64(99)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_plan_placements_counter_follows_last_matching_file() {
        // Positions: 0 png, 1 txt, 2 png, 3 png
        let files: Vec<String> = ["a_0001.png", "a_0002.txt", "a_0003.png", "a_0004.png"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let placements =
            plan_placements(&files, GridDims::new(2, 2).unwrap(), 1, 0, &mut rng).unwrap();
        // The counter is 0, then 1 (the txt does not update it), then 3
        let numbers: Vec<usize> = placements.iter().map(|p| p.frame_number).collect();
        assert_eq!(numbers, vec![0, 1, 3]);
        assert!(placements.iter().all(|p| p.frame_file.ends_with(".png")));
    }

    #[test]
    fn test_plan_placements_zero_interval() {
        let files = frame_names(3);
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let result = plan_placements(&files, GridDims::new(1, 1).unwrap(), 0, 0, &mut rng);
        assert!(matches!(result, Err(ChallengeError::InvalidParameter(_))));
    }

    #[test]
    fn test_insert_tiles_into_frames_pastes_at_origin() {
        let dir = tempfile::tempdir().unwrap();
        let frame_dir = dir.path().join("frames");
        fs::create_dir(&frame_dir).unwrap();
        for name in frame_names(4) {
            RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]))
                .save(frame_dir.join(name))
                .unwrap();
        }
        fs::write(frame_dir.join("zz_notes.txt"), b"ignored").unwrap();
        let hint = dir.path().join("hint.png");
        RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]))
            .save(&hint)
            .unwrap();

        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let placements = insert_tiles_into_frames(
            &frame_dir,
            &hint,
            GridDims::new(2, 2).unwrap(),
            2,
            0,
            &mut rng,
            false,
        )
        .unwrap();
        assert_eq!(placements.len(), 2);

        for placement in &placements {
            let frame = image::open(frame_dir.join(&placement.frame_file)).unwrap();
            let (left, top) = (placement.col * 4, placement.row * 4);
            assert_eq!(frame.get_pixel(left, top), Rgba([255, 0, 0, 255]));
            assert_eq!(frame.get_pixel(left + 3, top + 3), Rgba([255, 0, 0, 255]));
            let outside = ((left + 4) % 8, top);
            assert_eq!(frame.get_pixel(outside.0, outside.1), Rgba([0, 0, 0, 255]));
        }
        let untouched = image::open(frame_dir.join("output_frames_0002.png")).unwrap();
        assert!(untouched.pixels().all(|(_, _, p)| p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn test_insert_tiles_into_frames_stops_on_corrupt_frame() {
        let dir = tempfile::tempdir().unwrap();
        let frame_dir = dir.path().join("frames");
        fs::create_dir(&frame_dir).unwrap();
        for name in frame_names(4) {
            RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]))
                .save(frame_dir.join(name))
                .unwrap();
        }
        let corrupt = frame_dir.join("output_frames_0003.png");
        fs::write(&corrupt, b"truncated").unwrap();
        let hint = dir.path().join("hint.png");
        RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]))
            .save(&hint)
            .unwrap();

        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let result = insert_tiles_into_frames(
            &frame_dir,
            &hint,
            GridDims::new(2, 2).unwrap(),
            1,
            0,
            &mut rng,
            false,
        );
        match result {
            Err(ChallengeError::FrameIOError { path, .. }) => assert_eq!(path, corrupt),
            other => panic!("expected a frame error, got {:?}", other),
        }
        // Frames handled before the failure keep their tile
        for name in ["output_frames_0001.png", "output_frames_0002.png"] {
            let frame = image::open(frame_dir.join(name)).unwrap();
            assert!(frame.pixels().any(|(_, _, p)| p == Rgba([255, 0, 0, 255])));
        }
        let after = image::open(frame_dir.join("output_frames_0004.png")).unwrap();
        assert!(after.pixels().all(|(_, _, p)| p == Rgba([0, 0, 0, 255])));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_list_frame_files_skips_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("output_frames_0001.png"), b"").unwrap();
        fs::write(dir.path().join(OsStr::from_bytes(b"bad_\xff.png")), b"").unwrap();
        let names = list_frame_files(dir.path()).unwrap();
        assert_eq!(names, vec!["output_frames_0001.png".to_string()]);
    }

    #[test]
    fn test_insert_tiles_into_frames_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let result = insert_tiles_into_frames(
            &dir.path().join("nope"),
            &dir.path().join("hint.png"),
            GridDims::new(2, 2).unwrap(),
            1,
            0,
            &mut rng,
            false,
        );
        assert!(matches!(result, Err(ChallengeError::FrameIOError { .. })));
    }
}
