use crate::config::HeuristicConfig;
use crate::frame::Frame;
use crate::landmarks::types::{HandDetectionResult, HandLandmark, Handedness};
use tracing::{debug, trace};

/// Offsets of the 21 skeleton points relative to the skin bounding box
/// centre, in half-extents. Wrist, then thumb, index, middle, ring, pinky.
const HAND_TEMPLATE: [(f32, f32); 21] = [
    (0.0, 0.8),
    (-0.3, 0.6),
    (-0.4, 0.4),
    (-0.5, 0.2),
    (-0.6, 0.0),
    (-0.2, 0.6),
    (-0.2, 0.4),
    (-0.2, 0.2),
    (-0.2, 0.0),
    (0.0, 0.6),
    (0.0, 0.4),
    (0.0, 0.2),
    (0.0, -0.1),
    (0.2, 0.6),
    (0.2, 0.4),
    (0.2, 0.2),
    (0.2, 0.0),
    (0.4, 0.6),
    (0.4, 0.4),
    (0.4, 0.2),
    (0.4, 0.1),
];

/// Summary of a skin-colour scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinScan {
    pub skin_pixels: usize,
    pub total_pixels: usize,
    /// Normalized bounding box (min_x, min_y, max_x, max_y)
    pub bounds: Option<(f32, f32, f32, f32)>,
}

impl SkinScan {
    pub fn ratio(&self) -> f32 {
        if self.total_pixels == 0 {
            0.0
        } else {
            self.skin_pixels as f32 / self.total_pixels as f32
        }
    }
}

/// Colour-threshold hand finder used when no learned detector is available
#[derive(Debug, Clone)]
pub struct SkinColorDetector {
    config: HeuristicConfig,
}

impl SkinColorDetector {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeuristicConfig {
        &self.config
    }

    pub fn is_skin(&self, r: u8, g: u8, b: u8) -> bool {
        let c = &self.config;
        let (ri, gi, bi) = (r as i16, g as i16, b as i16);

        r > c.red_min
            && g > c.green_min
            && b > c.blue_min
            && r > g
            && r > b
            && (ri - gi).abs() > c.red_green_delta as i16
            && ri - bi > c.red_blue_delta as i16
    }

    /// Count skin pixels on the resampled frame
    pub fn scan(&self, frame: &Frame) -> SkinScan {
        let side = self.config.sample_size;
        let sample = frame.resized(side, side);

        let mut skin_pixels = 0usize;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        for (x, y, pixel) in sample.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            if self.is_skin(r, g, b) {
                skin_pixels += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        let bounds = (skin_pixels > 0).then(|| {
            let side = side as f32;
            (
                min_x as f32 / side,
                min_y as f32 / side,
                max_x as f32 / side,
                max_y as f32 / side,
            )
        });

        SkinScan {
            skin_pixels,
            total_pixels: (side as usize) * (side as usize),
            bounds,
        }
    }

    /// Returns a templated hand when enough of the frame is skin coloured
    pub fn detect(&self, frame: &Frame) -> Option<HandDetectionResult> {
        if frame.is_empty() {
            return None;
        }

        let scan = self.scan(frame);
        let ratio = scan.ratio();
        trace!(
            "Skin scan of frame {}: {} / {} pixels",
            frame.id,
            scan.skin_pixels,
            scan.total_pixels
        );

        if ratio <= self.config.min_skin_ratio || scan.skin_pixels <= self.config.min_skin_pixels {
            return None;
        }

        let (min_x, min_y, max_x, max_y) = scan.bounds?;
        debug!(
            "Skin heuristic found a hand candidate: {} skin pixels ({:.1}%)",
            scan.skin_pixels,
            ratio * 100.0
        );

        let landmarks = Self::landmarks_from_bounds(min_x, min_y, max_x, max_y);
        let confidence = (ratio * self.config.confidence_scale).min(self.config.max_confidence);

        HandDetectionResult::new(landmarks, Handedness::Right, confidence)
    }

    fn landmarks_from_bounds(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<HandLandmark> {
        let center_x = (min_x + max_x) / 2.0;
        let center_y = (min_y + max_y) / 2.0;
        let width = max_x - min_x;
        let height = max_y - min_y;

        HAND_TEMPLATE
            .iter()
            .map(|(dx, dy)| {
                HandLandmark::new(
                    center_x + dx * width * 0.5,
                    center_y + dy * height * 0.5,
                    0.0,
                )
            })
            .collect()
    }
}
