use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::corpus::TestCase;
use crate::pipeline::PipelineOutcome;

/// Tally of a completed run, derived purely from the outcome set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub matched: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[PipelineOutcome]) -> Self {
        let matched = outcomes.iter().filter(|o| o.is_match()).count();
        Self {
            matched,
            failed: outcomes.len() - matched,
        }
    }

    pub fn total(&self) -> usize {
        self.matched + self.failed
    }

    /// Matched as a percentage of dispatched cases.
    pub fn match_rate(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total() as f64 * 100.0
    }
}

/// Completion counter emitting one progress line per finished case. Lines
/// appear in completion order, not dispatch order; the count is monotonic
/// and the indicator is informational only.
pub struct Progress {
    total: usize,
    completed: AtomicUsize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
        }
    }

    /// Records one completion and emits the progress line. Returns the new
    /// completed count.
    pub fn tick(&self) -> usize {
        let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
        let pct = if self.total == 0 {
            100.0
        } else {
            done as f64 / self.total as f64 * 100.0
        };
        eprintln!("progress: {pct:.2}%\tcompleted/total = {done}/{}", self.total);
        done
    }
}

/// Prints the identity, source, and stage diagnostic for a failed case.
/// Built as a single string so concurrent completions do not interleave.
pub fn print_failure(case: &TestCase, outcome: &PipelineOutcome) {
    let mut out = format!(
        "collection: {}, function: {} with code:\n{}\n",
        case.collection_id, case.function_name, case.collection_code
    );
    match outcome {
        PipelineOutcome::Matched => return,
        PipelineOutcome::CompileFailed(diag) => {
            let _ = write!(out, "failed to compile: {diag}");
        }
        PipelineOutcome::RunFailed(diag) => {
            let _ = write!(out, "failed to run: {diag}");
        }
        PipelineOutcome::Mismatch { expected, actual } => {
            let _ = write!(
                out,
                "failed to match output:\n  expected: {expected}\n  actual: {actual}\n  recorded envelope: {}",
                case.expected
            );
        }
        PipelineOutcome::MalformedExpectation(diag) => {
            let _ = write!(out, "unusable recorded expectation: {diag}");
        }
    }
    eprintln!("{out}");
}

/// Final summary: counts always, even when every case failed.
pub fn print_summary(summary: &RunSummary) {
    println!("successes: {}", summary.matched);
    println!("failures: {}", summary.failed);
    println!(
        "total: {}, successes/total = {:.2}%",
        summary.total(),
        summary.match_rate()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts_and_rate() {
        let outcomes = vec![
            PipelineOutcome::Matched,
            PipelineOutcome::CompileFailed("syntax error".into()),
            PipelineOutcome::Matched,
            PipelineOutcome::Matched,
        ];
        let summary = RunSummary::from_outcomes(&outcomes);
        assert_eq!(summary.matched, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total(), 4);
        assert!((summary.match_rate() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_empty_run() {
        let summary = RunSummary::from_outcomes(&[]);
        assert_eq!(summary.total(), 0);
        assert_eq!(summary.match_rate(), 0.0);
    }

    #[test]
    fn test_progress_count_is_monotonic() {
        let progress = Progress::new(3);
        assert_eq!(progress.tick(), 1);
        assert_eq!(progress.tick(), 2);
        assert_eq!(progress.tick(), 3);
    }
}
