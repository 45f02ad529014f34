use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use replaydiff::cli;
use replaydiff::harness::{self, RunConfig};

#[derive(Parser)]
#[command(
    name = "replaydiff",
    about = "Differential replay harness for the collection function pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a corpus sample through compile + run and diff the results.
    Test {
        /// Corpus file, one recorded invocation per line.
        #[arg(long, default_value = harness::DEFAULT_CORPUS_PATH)]
        corpus: PathBuf,
        /// Number of records to sample from the corpus.
        #[arg(long, default_value_t = 10_000)]
        sample_size: usize,
        /// Maximum concurrent pipeline invocations (default: host parallelism).
        #[arg(long)]
        concurrency: Option<usize>,
        /// Compiler executable.
        #[arg(long, default_value = "./target/release/compile")]
        compile_bin: PathBuf,
        /// Executor executable.
        #[arg(long, default_value = "./target/release/miden-run")]
        run_bin: PathBuf,
        /// Per-stage timeout in seconds.
        #[arg(long, default_value_t = 60)]
        stage_timeout_secs: u64,
        /// Fixed sampling seed for reproducible runs.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Write the corpus file from records streamed on stdin.
    Export {
        /// Corpus file to write.
        #[arg(long, default_value = harness::DEFAULT_CORPUS_PATH)]
        corpus: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Test {
            corpus,
            sample_size,
            concurrency,
            compile_bin,
            run_bin,
            stage_timeout_secs,
            seed,
        } => {
            let config = RunConfig {
                corpus_path: corpus,
                sample_size,
                concurrency: concurrency.unwrap_or_else(harness::default_concurrency),
                compile_bin,
                run_bin,
                stage_timeout: Duration::from_secs(stage_timeout_secs),
                seed,
            };
            cli::cmd_test(config)
        }
        Command::Export { corpus } => cli::cmd_export(&corpus),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
