//! Sample-level progress reporting for the dataset pipelines.
//!
//! ```
//! use meshops::ProjectionOptions;
//!
//! let options = ProjectionOptions::default().with_progress(|progress| {
//!     eprintln!("{}%", progress.percent());
//! });
//! # let _ = options;
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::dataset::SampleId;

/// Progress information passed to callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// Number of samples processed so far.
    pub current: usize,

    /// Total number of samples.
    pub total: usize,

    /// Id of the last processed sample.
    pub sample: SampleId,

    /// Elapsed time since the operation started.
    pub elapsed: Duration,
}

impl Progress {
    /// Progress as a fraction (0.0 to 1.0).
    #[inline]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current as f64) / (self.total as f64)
        }
    }

    /// Progress as a percentage (0 to 100).
    #[inline]
    pub fn percent(&self) -> u32 {
        (self.fraction() * 100.0).round() as u32
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

/// Callback invoked after each processed sample.
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Counts the processed samples of an operation and notifies the logs and the callback.
pub(crate) struct ProgressReporter<'a> {
    operation: &'static str,
    current: usize,
    total: usize,
    verbose: bool,
    callback: Option<&'a ProgressCallback>,
    start: Instant,
}

impl<'a> ProgressReporter<'a> {
    pub(crate) fn new(
        operation: &'static str,
        total: usize,
        verbose: bool,
        callback: Option<&'a ProgressCallback>,
    ) -> Self {
        Self {
            operation,
            current: 0,
            total,
            verbose,
            callback,
            start: Instant::now(),
        }
    }

    /// Records that `sample` has been processed.
    pub(crate) fn advance(&mut self, sample: SampleId) {
        self.current += 1;
        let progress = Progress {
            current: self.current,
            total: self.total,
            sample,
            elapsed: self.start.elapsed(),
        };
        if self.verbose {
            info!(
                operation = self.operation,
                sample,
                elapsed_ms = progress.elapsed.as_millis() as u64,
                "{}/{} samples",
                progress.current,
                progress.total
            );
        }
        if let Some(callback) = self.callback {
            callback(&progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn fraction_of_empty_operation() {
        let progress = Progress {
            current: 0,
            total: 0,
            sample: 0,
            elapsed: Duration::ZERO,
        };

        assert_eq!(progress.fraction(), 0.0);
        assert!(progress.is_complete());
    }

    #[test]
    fn callback_sees_every_sample() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |progress: &Progress| {
            if let Ok(mut seen) = sink.lock() {
                seen.push((progress.sample, progress.percent()));
            }
        });

        let mut reporter = ProgressReporter::new("test", 4, true, Some(&callback));
        for sample in [3, 1, 0, 2] {
            reporter.advance(sample);
        }

        let seen = seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(seen, vec![(3, 25), (1, 50), (0, 75), (2, 100)]);
    }
}
