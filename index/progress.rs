use std::fmt;

/// Stages reported while a scan plan is evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScanProgressStage {
    Pairs,
    Aggregation,
}

impl ScanProgressStage {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Pairs => "pair evaluation",
            Self::Aggregation => "per-period aggregation",
        }
    }
}

impl fmt::Display for ScanProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer for reporting incremental progress while a scan runs.
///
/// Observers are shared by every rayon worker, so callbacks take `&self` and
/// `on_stage_advance` receives the number of tasks completed since that
/// worker's previous report.
pub trait ScanProgressObserver: Sync {
    fn on_stage_start(&self, stage: ScanProgressStage, total_tasks: u64) {
        let _ = (stage, total_tasks);
    }
    fn on_stage_advance(&self, stage: ScanProgressStage, completed_tasks: u64) {
        let _ = (stage, completed_tasks);
    }
    fn on_stage_finish(&self, stage: ScanProgressStage) {
        let _ = stage;
    }
}

#[derive(Default)]
pub struct NoopScanProgress;

impl ScanProgressObserver for NoopScanProgress {}
