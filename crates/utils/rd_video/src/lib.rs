//! Timestamp-to-frame video synchronization for episode datasets.
//!
//! Tabular frame data carries timestamps; the matching imagery lives in
//! per-camera video files. [`FrameSync`] owns one decode handle per camera
//! path and turns a timestamp into a single decoded frame, going through the
//! `ffmpeg` CLI (via `ffmpeg-sidecar`) for the actual decoding.
//!
//! Decoding is deliberately infallible at the API level: seeks into video
//! files are best-effort and playback continuity is not guaranteed, so every
//! miss (missing file, out-of-range offset, decoder hiccup) is an `Option`,
//! never an error. Callers fall back to placeholder imagery.

mod handle;
mod sync;

pub use self::handle::CameraHandle;
pub use self::sync::{DEFAULT_FPS, FrameSync, frame_offset};
