//! Newline-delimited JSON record source used by the binary.

use super::service::{SubmitHandle, SubmitOutcome};
use crate::domain::{Binding, Record};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub lines: u64,
    pub invalid: u64,
    pub enqueued: u64,
    pub filtered: u64,
    pub empty: u64,
    pub rejected: u64,
}

/// Reads one JSON record per line and submits each. Blank lines and lines
/// starting with `#` are ignored; unparseable lines are logged and skipped.
/// Stops early once `shutdown` is cancelled.
pub fn ingest<R: BufRead>(
    reader: R,
    binding: Binding,
    handle: &SubmitHandle,
    shutdown: &CancellationToken,
) -> io::Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    for (index, line) in reader.lines().enumerate() {
        if shutdown.is_cancelled() {
            debug!(line = index + 1, "shutdown requested, stopping input");
            break;
        }
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        summary.lines += 1;

        let record: Record = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = index + 1, "Skipping invalid record: {}", e);
                summary.invalid += 1;
                continue;
            }
        };

        match handle.submit(&record, binding) {
            SubmitOutcome::Enqueued => summary.enqueued += 1,
            SubmitOutcome::Filtered => summary.filtered += 1,
            SubmitOutcome::Empty => summary.empty += 1,
            SubmitOutcome::Rejected => summary.rejected += 1,
        }
    }

    Ok(summary)
}

/// Runs [`ingest`] on a dedicated OS thread so a blocking stdin read cannot
/// hold up runtime shutdown. The receiver yields the summary at EOF.
pub fn spawn_reader(
    input: Option<PathBuf>,
    binding: Binding,
    handle: SubmitHandle,
    shutdown: CancellationToken,
) -> io::Result<oneshot::Receiver<io::Result<IngestSummary>>> {
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("record-input".to_string())
        .spawn(move || {
            let result = match input {
                Some(path) => File::open(&path)
                    .and_then(|file| ingest(BufReader::new(file), binding, &handle, &shutdown)),
                None => ingest(io::stdin().lock(), binding, &handle, &shutdown),
            };
            let _ = tx.send(result);
        })?;
    Ok(rx)
}
