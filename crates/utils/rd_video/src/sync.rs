use std::path::Path;

use image::RgbImage;

use crate::CameraHandle;

/// Frame rate assumed when the dataset metadata doesn't specify one.
pub const DEFAULT_FPS: f64 = 30.0;

/// The integer frame offset a timestamp (seconds) maps to at the given rate.
///
/// `floor(timestamp * fps)`, with a small tolerance so that timestamps
/// reconstructed by summing a base and a delta (e.g. `5.0 + -0.1`) don't land
/// one frame early due to float error.
#[inline]
pub fn frame_offset(timestamp: f64, fps: f64) -> i64 {
    (timestamp * fps + 1e-6).floor() as i64
}

// ---

/// Maps timestamps to decoded video frames, owning one [`CameraHandle`] per
/// camera path.
///
/// Handles are created lazily on first use of a path and kept for the
/// synchronizer's lifetime. The frame rate is a dataset-wide scalar, read once
/// from metadata at construction.
#[derive(Debug)]
pub struct FrameSync {
    fps: f64,
    handles: ahash::HashMap<std::path::PathBuf, CameraHandle>,
}

impl FrameSync {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            handles: ahash::HashMap::default(),
        }
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Number of camera handles opened so far.
    #[inline]
    pub fn num_handles(&self) -> usize {
        self.handles.len()
    }

    /// Decode the frame covering `timestamp` from the given camera file.
    ///
    /// Returns `None` (never an error) when the handle is unusable, the
    /// timestamp maps to a negative or past-the-end offset, or decoding fails.
    pub fn decode(&mut self, camera_path: &Path, timestamp: f64) -> Option<RgbImage> {
        let offset = frame_offset(timestamp, self.fps);
        if offset < 0 {
            return None;
        }

        let handle = self
            .handles
            .entry(camera_path.to_owned())
            .or_insert_with(|| CameraHandle::open(camera_path));
        handle.decode_at(offset, self.fps)
    }
}

// ---

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{DEFAULT_FPS, FrameSync, frame_offset};

    #[test]
    fn offsets_floor_at_the_dataset_rate() {
        assert_eq!(frame_offset(0.0, 30.0), 0);
        assert_eq!(frame_offset(5.0, 30.0), 150);
        assert_eq!(frame_offset(0.0333, 30.0), 0); // just shy of frame 1
        assert_eq!(frame_offset(1.0 / 30.0, 30.0), 1);
        assert_eq!(frame_offset(-0.5, 30.0), -15);
    }

    #[test]
    fn summed_delta_timestamps_hit_the_intended_frame() {
        // 5.0 - 0.1 is not exactly 4.9 in f64; the offset must still be 147.
        let base: f64 = 5.0;
        let delta: f64 = -0.1;
        assert_eq!(frame_offset(base + delta, DEFAULT_FPS), 147);
        assert_eq!(frame_offset(base, DEFAULT_FPS), 150);
    }

    #[test]
    fn missing_camera_is_a_miss_not_an_error() {
        let mut sync = FrameSync::new(DEFAULT_FPS);
        let missing = Path::new("/no/such/camera.mp4");

        assert!(sync.decode(missing, 0.0).is_none());
        assert!(sync.decode(missing, 1.0).is_none());

        // The handle is created once and reused across decodes.
        assert_eq!(sync.num_handles(), 1);
    }

    #[test]
    fn negative_timestamps_never_reach_the_decoder() {
        let mut sync = FrameSync::new(DEFAULT_FPS);
        assert!(sync.decode(Path::new("/no/such/camera.mp4"), -0.01).is_none());
        // Rejected before any handle is opened.
        assert_eq!(sync.num_handles(), 0);
    }
}
