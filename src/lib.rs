pub mod cli;
pub mod compare;
pub mod corpus;
pub mod export;
pub mod harness;
pub mod pipeline;
pub mod protocol;
pub mod report;
pub mod scheduler;

pub use corpus::{CorpusError, TestCase};
pub use harness::RunConfig;
pub use pipeline::PipelineOutcome;
pub use report::RunSummary;
