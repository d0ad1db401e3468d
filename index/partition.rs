//! Work distribution over a sliding-window LD scan.
//!
//! A [`ScanPlan`] fixes the window geometry and the length of the scanned
//! sequence, which together determine the total number of flat task indices.
//! Workers are handed contiguous or strided slices of that range and resolve
//! each index on their own; no worker consults any other.

use crate::progress::{ScanProgressObserver, ScanProgressStage};
use crate::window::{AbsolutePair, PairCoordinate, WindowError, WindowSpec};
use itertools::Itertools;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::iter::StepBy;
use std::ops::Range;
use thiserror::Error;

/// Number of tasks a worker processes between progress reports.
const PROGRESS_CHUNK: u64 = 4_096;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Window indexing failed: {0}")]
    Window(#[from] WindowError),

    #[error("Worker {worker} is out of range for a pool of {workers} workers.")]
    InvalidWorker { worker: usize, workers: usize },
}

/// How the flat task range is split across workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assignment {
    /// Worker `w` of `W` receives the `w`-th near-equal contiguous slice.
    #[default]
    Contiguous,
    /// Worker `w` of `W` receives `w, w + W, w + 2W, ...`.
    Strided,
}

/// One resolved unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScanTask {
    pub flat: u64,
    pub coord: PairCoordinate,
    pub pair: AbsolutePair,
}

/// Per-period results of a scan, keyed by period and ordered by flat index.
pub type PeriodResults<T> = BTreeMap<u64, Vec<(ScanTask, T)>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanPlan {
    spec: WindowSpec,
    n_sites: u64,
    periods: u64,
    total: u64,
}

impl ScanPlan {
    /// Plans a scan over positions `0..n_sites`.
    ///
    /// Every period whose first position lies inside the sequence is scheduled
    /// in full; pairs that run past the end are dropped by [`ScanPlan::resolve`].
    pub fn new(spec: WindowSpec, n_sites: u64) -> Result<Self, PartitionError> {
        let periods = n_sites.div_ceil(spec.step());
        let total = periods
            .checked_mul(spec.block_size())
            .ok_or(WindowError::Overflow("total task count"))?;

        info!(
            "Planned LD scan over {n_sites} sites ({spec}): {periods} periods of {} tasks, {total} tasks in total",
            spec.block_size()
        );

        Ok(Self {
            spec,
            n_sites,
            periods,
            total,
        })
    }

    pub fn spec(&self) -> &WindowSpec {
        &self.spec
    }

    pub fn n_sites(&self) -> u64 {
        self.n_sites
    }

    pub fn periods(&self) -> u64 {
        self.periods
    }

    pub fn total_tasks(&self) -> u64 {
        self.total
    }

    /// Resolves a flat index to absolute positions, or `None` when the index
    /// lies outside the plan or its pair reaches past the last site.
    pub fn resolve(&self, flat: u64) -> Option<ScanTask> {
        if flat >= self.total {
            return None;
        }
        let coord = self.spec.invert(flat);
        let pair = coord.absolute(&self.spec).ok()?;
        (pair.right < self.n_sites).then_some(ScanTask { flat, coord, pair })
    }

    /// All in-range tasks in flat order.
    pub fn resolved_tasks(&self) -> impl Iterator<Item = ScanTask> + '_ {
        (0..self.total).filter_map(|flat| self.resolve(flat))
    }

    /// Contiguous slice of the flat range owned by `worker`.
    pub fn worker_range(&self, worker: usize, workers: usize) -> Result<Range<u64>, PartitionError> {
        check_worker(worker, workers)?;

        let (worker, workers) = (worker as u64, workers as u64);
        let base = self.total / workers;
        let extra = self.total % workers;
        let start = worker * base + worker.min(extra);
        let len = base + u64::from(worker < extra);
        Ok(start..start + len)
    }

    /// Flat indices handed to `worker` under `assignment`.
    pub fn worker_tasks(
        &self,
        assignment: Assignment,
        worker: usize,
        workers: usize,
    ) -> Result<StepBy<Range<u64>>, PartitionError> {
        match assignment {
            Assignment::Contiguous => Ok(self.worker_range(worker, workers)?.step_by(1)),
            Assignment::Strided => {
                check_worker(worker, workers)?;
                Ok((worker as u64..self.total).step_by(workers))
            }
        }
    }

    pub fn worker_task_count(
        &self,
        assignment: Assignment,
        worker: usize,
        workers: usize,
    ) -> Result<u64, PartitionError> {
        match assignment {
            Assignment::Contiguous => {
                let range = self.worker_range(worker, workers)?;
                Ok(range.end - range.start)
            }
            Assignment::Strided => {
                check_worker(worker, workers)?;
                let first = worker as u64;
                if first >= self.total {
                    Ok(0)
                } else {
                    Ok((self.total - first - 1) / workers as u64 + 1)
                }
            }
        }
    }

    /// Evaluates `evaluate` on every in-range pair, one rayon task per worker,
    /// and gathers the results by period.
    pub fn run<T, F>(
        &self,
        assignment: Assignment,
        workers: usize,
        observer: &dyn ScanProgressObserver,
        evaluate: F,
    ) -> Result<PeriodResults<T>, PartitionError>
    where
        T: Send,
        F: Fn(&ScanTask) -> T + Sync,
    {
        check_worker(0, workers)?;

        observer.on_stage_start(ScanProgressStage::Pairs, self.total);
        let per_worker = (0..workers)
            .into_par_iter()
            .map(|worker| {
                let tasks = self.worker_tasks(assignment, worker, workers)?;
                let mut results = Vec::new();
                let mut pending = 0u64;
                for flat in tasks {
                    if let Some(task) = self.resolve(flat) {
                        let value = evaluate(&task);
                        results.push((task, value));
                    }
                    pending += 1;
                    if pending == PROGRESS_CHUNK {
                        observer.on_stage_advance(ScanProgressStage::Pairs, pending);
                        pending = 0;
                    }
                }
                if pending > 0 {
                    observer.on_stage_advance(ScanProgressStage::Pairs, pending);
                }
                debug!("Worker {worker} evaluated {} in-range pairs", results.len());
                Ok(results)
            })
            .collect::<Result<Vec<_>, PartitionError>>()?;
        observer.on_stage_finish(ScanProgressStage::Pairs);

        let mut results: Vec<(ScanTask, T)> = per_worker.into_iter().flatten().collect();
        observer.on_stage_start(ScanProgressStage::Aggregation, results.len() as u64);
        results.sort_unstable_by_key(|(task, _)| task.flat);

        let mut by_period = BTreeMap::new();
        let grouped = results.into_iter().chunk_by(|(task, _)| task.coord.period);
        for (period, group) in &grouped {
            let entries: Vec<_> = group.collect();
            observer.on_stage_advance(ScanProgressStage::Aggregation, entries.len() as u64);
            by_period.insert(period, entries);
        }
        observer.on_stage_finish(ScanProgressStage::Aggregation);

        info!(
            "LD scan finished: {} periods produced results across {workers} workers",
            by_period.len()
        );
        Ok(by_period)
    }
}

fn check_worker(worker: usize, workers: usize) -> Result<(), PartitionError> {
    if workers == 0 || worker >= workers {
        return Err(PartitionError::InvalidWorker { worker, workers });
    }
    Ok(())
}
