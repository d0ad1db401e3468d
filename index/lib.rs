#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod partition;
pub mod progress;
pub mod window;

pub use config::{ConfigError, ScanConfig};
pub use partition::{Assignment, PartitionError, PeriodResults, ScanPlan, ScanTask};
pub use progress::{NoopScanProgress, ScanProgressObserver, ScanProgressStage};
pub use window::{
    AbsolutePair, PairCoordinate, WindowError, WindowSpec, invert_index, pack_index,
    parse_flat_index,
};
