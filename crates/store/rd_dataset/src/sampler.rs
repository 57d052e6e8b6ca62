use std::collections::BTreeMap;
use std::path::Path;

use image::RgbImage;
use ordered_float::NotNan;

use rd_video::FrameSync;

/// The image modality key recognized in delta-timestamp configurations.
pub const IMAGE_KEY: &str = "observation.image";

/// Per-modality time offsets (seconds, possibly negative) relative to a
/// frame's own timestamp, at which to sample additional images.
pub type DeltaTimestamps = BTreeMap<String, Vec<f64>>;

// ---

/// Samples one image per configured time offset around a base timestamp.
///
/// The result map is sparse by design: offsets whose target timestamp is
/// negative, or whose decode misses, are simply absent. Callers fall back to
/// placeholder imagery rather than assuming completeness.
#[derive(Debug, Clone, Default)]
pub struct DeltaSampler {
    offsets: Vec<f64>,
}

impl DeltaSampler {
    /// Only the [`IMAGE_KEY`] modality is consumed; other keys are accepted
    /// (and ignored) so one configuration can serve several loaders.
    pub fn new(deltas: &DeltaTimestamps) -> Self {
        for key in deltas.keys().filter(|key| *key != IMAGE_KEY) {
            log::debug!("ignoring delta timestamps for unrecognized modality {key:?}");
        }
        Self {
            offsets: deltas.get(IMAGE_KEY).cloned().unwrap_or_default(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Each configured offset paired with its absolute target timestamp.
    ///
    /// Offsets whose target would be negative are dropped here, before any
    /// decoder is involved.
    pub fn targets(&self, base: f64) -> Vec<(f64, f64)> {
        self.offsets
            .iter()
            .map(|&delta| (delta, base + delta))
            .filter(|&(_, target)| target >= 0.0)
            .collect()
    }

    /// One decoded image per reachable offset, keyed by the original offset.
    pub fn sample(
        &self,
        base: f64,
        camera: Option<&Path>,
        sync: &mut FrameSync,
    ) -> BTreeMap<NotNan<f64>, RgbImage> {
        let mut images = BTreeMap::new();
        let Some(camera) = camera else {
            return images;
        };

        for (delta, target) in self.targets(base) {
            let Ok(key) = NotNan::new(delta) else {
                continue;
            };
            if let Some(image) = sync.decode(camera, target) {
                images.insert(key, image);
            }
        }

        images
    }
}

// ---
