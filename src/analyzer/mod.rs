mod motion;

pub use motion::{motion_score, MotionDetector, MotionReading};
