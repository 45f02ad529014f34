use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::compare;
use crate::corpus::{Auth, TestCase};
use crate::protocol::{self, ABI_MARKER, RESULT_MARKER};

/// The two external pipeline stages and the wall-clock bound on each.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub compile_bin: PathBuf,
    pub run_bin: PathBuf,
    pub stage_timeout: Duration,
}

/// Judgement for one replayed case. Stage failures carry the diagnostic text
/// through the concurrency boundary; nothing here aborts sibling cases.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Matched,
    CompileFailed(String),
    RunFailed(String),
    Mismatch { expected: Value, actual: Value },
    MalformedExpectation(String),
}

impl PipelineOutcome {
    pub fn is_match(&self) -> bool {
        *self == PipelineOutcome::Matched
    }
}

/// Captured streams of a stage that exited successfully.
struct StageOutput {
    stdout: String,
    stderr: String,
}

impl Pipeline {
    /// Drives one case through compile and run, then judges the produced
    /// instance against the recorded one. Every failure mode is folded into
    /// the returned outcome.
    pub async fn execute(&self, case: &TestCase) -> PipelineOutcome {
        let compile_args = vec![
            format!("collection:{}", case.collection_name),
            format!("function:{}", case.function_name),
        ];
        let compiled = match self
            .run_stage(&self.compile_bin, &compile_args, &case.collection_code)
            .await
        {
            Ok(output) => output,
            Err(diag) => return PipelineOutcome::CompileFailed(diag),
        };

        // The ABI descriptor rides the compiler's stderr; without it the
        // compiled program cannot be invoked.
        let abi = match protocol::scan_marker(&compiled.stderr, ABI_MARKER) {
            Ok(abi) => abi.to_string(),
            Err(missing) => return PipelineOutcome::CompileFailed(missing.to_string()),
        };

        let run_args = vec![
            "--abi".to_string(),
            abi,
            "--this-json".to_string(),
            case.instance_json.clone(),
            "--advice-tape-json".to_string(),
            case.args_json.clone(),
            "--ctx".to_string(),
            ctx_json(case.auth.as_ref()),
        ];
        let ran = match self
            .run_stage(&self.run_bin, &run_args, &compiled.stdout)
            .await
        {
            Ok(output) => output,
            Err(diag) => {
                // Include the invocation so the failure can be replayed by hand.
                return PipelineOutcome::RunFailed(format!(
                    "{diag}\ninvocation: {} {}",
                    self.run_bin.display(),
                    run_args.join(" ")
                ));
            }
        };

        let produced = match protocol::scan_marker(&ran.stdout, RESULT_MARKER) {
            Ok(payload) => payload,
            Err(missing) => return PipelineOutcome::RunFailed(missing.to_string()),
        };
        let produced: Value = match serde_json::from_str(produced) {
            Ok(value) => value,
            Err(e) => {
                return PipelineOutcome::RunFailed(format!("unparseable this_json payload: {e}"))
            }
        };

        let expected = match compare::expected_instance(&case.expected) {
            Ok(instance) => instance,
            Err(e) => return PipelineOutcome::MalformedExpectation(e.to_string()),
        };

        let actual = compare::strip_nulls(produced);
        let expected = compare::strip_nulls(expected.clone());
        if actual == expected {
            PipelineOutcome::Matched
        } else {
            PipelineOutcome::Mismatch { expected, actual }
        }
    }

    /// Spawns one stage, feeds `input` on stdin, and captures both streams.
    /// Err carries the stage diagnostic: spawn failure, stderr text on a
    /// nonzero exit, or `timeout` after the child is force-killed.
    async fn run_stage(
        &self,
        bin: &Path,
        args: &[String],
        input: &str,
    ) -> Result<StageOutput, String> {
        let mut child = Command::new(bin)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {e}", bin.display()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| "child stdin not captured".to_string())?;

        // Feed stdin while draining the output pipes: a child that writes
        // before consuming its whole input would otherwise deadlock. Dropping
        // stdin after the write delivers EOF.
        let feed = async move {
            let written = stdin.write_all(input.as_bytes()).await;
            drop(stdin);
            written
        };
        let both = async { tokio::join!(feed, child.wait_with_output()) };

        let (fed, waited) = match timeout(self.stage_timeout, both).await {
            Ok(pair) => pair,
            // Dropping the timed-out future kills the child (kill_on_drop).
            Err(_) => return Err("timeout".to_string()),
        };

        // A child may legitimately exit without reading all of its input.
        if let Err(e) = fed {
            if e.kind() != ErrorKind::BrokenPipe {
                return Err(format!("failed to feed stdin: {e}"));
            }
        }

        let output = waited.map_err(|e| format!("failed to wait for {}: {e}", bin.display()))?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let diag = stderr.trim_end();
            if diag.is_empty() {
                return Err(format!("exit status {}", output.status));
            }
            return Err(diag.to_string());
        }

        Ok(StageOutput { stdout, stderr })
    }
}

/// Caller context for the executor: `{"publicKey": <key-or-null>}`.
pub(crate) fn ctx_json(auth: Option<&Auth>) -> String {
    serde_json::json!({
        "publicKey": auth.and_then(|a| a.public_key.clone()),
    })
    .to_string()
}
