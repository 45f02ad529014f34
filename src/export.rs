use std::fs::File;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::corpus;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot read record stream: {0}")]
    Read(std::io::Error),

    #[error("record {line_no} is not a valid corpus record: {msg}")]
    Decode { line_no: usize, msg: String },

    #[error("cannot write corpus {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Streams line-delimited records into the corpus file, validating that each
/// line decodes as a corpus record before it is written. The warehouse query
/// itself lives in the companion tooling; this end only owns the file format.
/// Returns the number of records written.
pub fn export_corpus<R: BufRead>(reader: R, path: &Path) -> Result<usize, ExportError> {
    let write_err = |source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(write_err)?;

    let mut count = 0usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(ExportError::Read)?;
        if line.trim().is_empty() {
            continue;
        }
        corpus::decode_line(&line).map_err(|msg| ExportError::Decode {
            line_no: idx + 1,
            msg,
        })?;
        writeln!(file, "{line}").map_err(write_err)?;
        count += 1;
    }

    Ok(count)
}
