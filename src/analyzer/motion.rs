use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;
use crate::frame::FrameData;

use image::GrayImage;
use tracing::{debug, info, trace, warn};

/// Result of analyzing one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionReading {
    /// Percentage of changed pixels, `None` when there was nothing to compare against
    pub score: Option<f64>,
    /// Whether the score exceeded the configured sensitivity
    pub motion: bool,
}

impl MotionReading {
    fn baseline() -> Self {
        Self {
            score: None,
            motion: false,
        }
    }
}

/// Percentage of pixels whose absolute intensity difference exceeds `cutoff`.
///
/// Both images must have identical dimensions. The result is exact:
/// `changed * 100 / total`, in `[0, 100]`.
pub fn motion_score(
    previous: &GrayImage,
    current: &GrayImage,
    cutoff: u8,
) -> Result<f64, AnalyzerError> {
    if previous.dimensions() != current.dimensions() {
        return Err(AnalyzerError::DimensionMismatch {
            previous: previous.dimensions(),
            current: current.dimensions(),
        });
    }

    let total = previous.as_raw().len();
    if total == 0 {
        return Ok(0.0);
    }

    let changed = previous
        .as_raw()
        .iter()
        .zip(current.as_raw())
        .filter(|(a, b)| a.abs_diff(**b) > cutoff)
        .count();

    Ok(changed as f64 * 100.0 / total as f64)
}

/// Frame differencing motion detector.
///
/// Keeps the grayscale version of the last analyzed frame and compares each
/// new frame against it.
pub struct MotionDetector {
    config: AnalyzerConfig,
    previous: Option<GrayImage>,
    frames_analyzed: u64,
}

impl MotionDetector {
    pub fn new(config: AnalyzerConfig) -> Self {
        info!(
            "Motion detector initialized: delta threshold {}, sensitivity {:.2}%",
            config.delta_threshold, config.sensitivity_percent
        );
        Self {
            config,
            previous: None,
            frames_analyzed: 0,
        }
    }

    /// Compare `frame` with the previously analyzed one and retain it for the next call.
    ///
    /// The first frame after construction or `reset` never reports motion. A
    /// frame with different dimensions than its predecessor restarts the history.
    pub fn analyze(&mut self, frame: &FrameData) -> Result<MotionReading, AnalyzerError> {
        let current = frame.to_gray_image()?;
        self.frames_analyzed += 1;

        let score = match self.previous.as_ref() {
            None => {
                debug!("Motion baseline established from frame {}", frame.id);
                None
            }
            Some(previous) => {
                match motion_score(previous, &current, self.config.delta_threshold) {
                    Ok(score) => Some(score),
                    Err(AnalyzerError::DimensionMismatch { previous, current }) => {
                        warn!(
                            "Frame size changed from {:?} to {:?}, restarting motion baseline",
                            previous, current
                        );
                        None
                    }
                    Err(e) => return Err(e),
                }
            }
        };
        self.previous = Some(current);

        let Some(score) = score else {
            return Ok(MotionReading::baseline());
        };

        let motion = score > self.config.sensitivity_percent;
        if motion {
            info!(
                "Motion detected in frame {}: {:.2}% of pixels changed",
                frame.id, score
            );
        } else {
            trace!("Frame {} motion score {:.3}%", frame.id, score);
        }

        Ok(MotionReading {
            score: Some(score),
            motion,
        })
    }

    /// Forget the retained frame
    pub fn reset(&mut self) {
        if self.previous.take().is_some() {
            debug!("Motion detector history cleared");
        }
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }

    pub fn frames_analyzed(&self) -> u64 {
        self.frames_analyzed
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}
