use std::path::Path;

use crate::export;
use crate::harness::{self, RunConfig};
use crate::report;

/// `replaydiff test` — replay a corpus sample through the pipeline and diff
/// the results against the recorded outputs.
#[tokio::main]
pub async fn cmd_test(config: RunConfig) -> Result<(), String> {
    let summary = harness::run(&config).await.map_err(|e| e.to_string())?;
    report::print_summary(&summary);
    Ok(())
}

/// `replaydiff export` — write the corpus file from records streamed on stdin.
pub fn cmd_export(corpus: &Path) -> Result<(), String> {
    let stdin = std::io::stdin();
    let count = export::export_corpus(stdin.lock(), corpus).map_err(|e| e.to_string())?;
    println!("exported {count} records to {}", corpus.display());
    Ok(())
}
