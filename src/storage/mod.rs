mod clock;
mod manager;

pub use clock::{Clock, ManualClock, SystemClock};
#[cfg(test)]
use manager::parse_date_directory;
pub use manager::{ClipPath, PruneResult, StorageManager};
