use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use image::RgbImage;

// ---

/// Whether an `ffmpeg` binary is reachable. Checked once per process.
fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        let available = ffmpeg_sidecar::command::ffmpeg_is_installed();
        if !available {
            log::warn!("no ffmpeg binary found; video frames will be unavailable");
        }
        available
    })
}

// ---

/// A reusable decode handle for one camera's video file.
///
/// The handle is created once per distinct camera path and kept for the
/// dataset's lifetime, amortizing the open/validation cost across all decodes.
/// Seeking mutates decoder state, so decoding requires `&mut self`: at most
/// one concurrent seek per handle, enforced by the type system.
#[derive(Debug)]
pub struct CameraHandle {
    path: PathBuf,

    /// `false` if the file was missing at open time; decodes short-circuit.
    ok: bool,
}

impl CameraHandle {
    /// Opening never fails: a handle for an unreadable path simply reports
    /// every decode as a miss.
    pub fn open(path: &Path) -> Self {
        let ok = path.is_file();
        if !ok {
            log::debug!("camera file not found: {}", path.display());
        }
        Self {
            path: path.to_owned(),
            ok,
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the underlying file existed when the handle was opened.
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.ok
    }

    /// Seek to the given frame offset and decode exactly one frame.
    ///
    /// Returns `None` on any miss: unusable handle, negative or past-the-end
    /// offset, spawn failure, or an unexpected output format.
    pub fn decode_at(&mut self, frame_offset: i64, fps: f64) -> Option<RgbImage> {
        if !self.ok || frame_offset < 0 || fps <= 0.0 || !ffmpeg_available() {
            return None;
        }

        let seek_secs = frame_offset as f64 / fps;

        // Input-side `-ss` seeks to the nearest keyframe and decodes forward,
        // so the requested frame comes out accurate. One rgb24 frame on stdout.
        let mut ffmpeg = match FfmpegCommand::new()
            .hide_banner()
            .args(["-ss", &format!("{seek_secs:.6}")])
            .input(self.path.to_string_lossy().as_ref())
            .args(["-frames:v", "1"])
            .rawvideo()
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                log::debug!("failed to spawn ffmpeg for {}: {err}", self.path.display());
                return None;
            }
        };

        let mut decoded = None;
        if let Ok(events) = ffmpeg.iter() {
            for event in events {
                match event {
                    FfmpegEvent::OutputFrame(frame) => {
                        if frame.pix_fmt != "rgb24" {
                            log::debug!(
                                "unexpected pixel format {:?} from {}",
                                frame.pix_fmt,
                                self.path.display(),
                            );
                            break;
                        }
                        decoded = RgbImage::from_raw(frame.width, frame.height, frame.data);
                        break;
                    }
                    FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, msg) => {
                        log::debug!("ffmpeg: {msg}");
                    }
                    _ => {}
                }
            }
        }
        let _ = ffmpeg.wait();

        if decoded.is_none() {
            // Not an error: the offset may simply be past the end of the video.
            log::debug!(
                "no frame decoded at offset {frame_offset} from {}",
                self.path.display(),
            );
        }

        decoded
    }
}

// ---
