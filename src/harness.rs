use std::path::PathBuf;
use std::time::Duration;

use crate::corpus::{self, CorpusError};
use crate::pipeline::Pipeline;
use crate::report::{self, Progress, RunSummary};
use crate::scheduler;

/// Default corpus location, shared with the `export` subcommand.
pub const DEFAULT_CORPUS_PATH: &str = "function_test.jsonl";

/// Options for a harness run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub corpus_path: PathBuf,
    /// Records drawn from the corpus (without replacement).
    pub sample_size: usize,
    /// Concurrency bound for in-flight pipeline invocations.
    pub concurrency: usize,
    pub compile_bin: PathBuf,
    pub run_bin: PathBuf,
    /// Wall-clock bound per pipeline stage; expiry kills the child.
    pub stage_timeout: Duration,
    /// Fixed sampling seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from(DEFAULT_CORPUS_PATH),
            sample_size: 10_000,
            concurrency: default_concurrency(),
            compile_bin: PathBuf::from("./target/release/compile"),
            run_bin: PathBuf::from("./target/release/miden-run"),
            stage_timeout: Duration::from_secs(60),
            seed: None,
        }
    }
}

/// Count of available processing units on the host.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Loads the corpus sample and replays every dispatched case through the
/// pipeline, reporting failures and progress as cases complete. Load-time
/// errors are fatal; per-case failures only count against the summary.
pub async fn run(config: &RunConfig) -> Result<RunSummary, CorpusError> {
    let cases = corpus::load(&config.corpus_path, config.sample_size, config.seed)?;
    let total = cases.len();

    let run_id = format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S"));
    eprintln!(
        "{run_id}: {total} cases dispatched, concurrency {}",
        config.concurrency
    );

    let pipeline = Pipeline {
        compile_bin: config.compile_bin.clone(),
        run_bin: config.run_bin.clone(),
        stage_timeout: config.stage_timeout,
    };
    let progress = Progress::new(total);

    let pipeline = &pipeline;
    let progress = &progress;
    let outcomes = scheduler::fan_out(cases, config.concurrency, |_, case| async move {
        let outcome = pipeline.execute(&case).await;
        if !outcome.is_match() {
            report::print_failure(&case, &outcome);
        }
        progress.tick();
        outcome
    })
    .await;

    Ok(RunSummary::from_outcomes(&outcomes))
}
