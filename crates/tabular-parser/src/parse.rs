//! Streaming file parse with progress reporting and cancellation.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use hydro_common::{CancellationToken, HydroResult, ProgressSink};

use crate::table::DataTable;

/// Outcome of a file parse.
///
/// Cancellation is a first-class outcome, not an error and not a partial
/// success: the table built so far is discarded.
#[derive(Debug)]
pub enum TableParseOutcome {
    Completed(DataTable),
    Cancelled,
}

/// Count the lines in a file.
///
/// Only called when a progress sink is attached, so the extra read is
/// skipped when nobody is listening.
pub fn count_lines(path: &Path) -> std::io::Result<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0u64;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

/// Split one line into fields. Plain comma split; no quoting.
fn split_fields(line: &str) -> Vec<String> {
    line.split(',').map(str::to_string).collect()
}

/// Tracks whole-percent progress, reporting only on increase.
struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    total_steps: u64,
    current_step: u64,
    previous_percent: u8,
}

impl<'a> ProgressTracker<'a> {
    fn new(sink: &'a dyn ProgressSink, total_steps: u64) -> Self {
        Self {
            sink,
            total_steps,
            current_step: 0,
            previous_percent: 0,
        }
    }

    /// Advance one step; reports when the whole percentage increases.
    /// Steps top out at 99; 100 is reserved for [`ProgressTracker::finish`].
    fn step(&mut self, message: impl FnOnce(u64, u64) -> String) {
        self.current_step += 1;
        if self.total_steps == 0 {
            return;
        }
        let percent = (100 * self.current_step / self.total_steps).min(99) as u8;
        if percent > self.previous_percent {
            self.sink
                .report(percent, &message(self.current_step, self.total_steps));
            self.previous_percent = percent;
        }
    }

    /// Terminal report. Guarded like `step`, so 100 is emitted once.
    fn finish(&mut self, message: &str) {
        if self.previous_percent < 100 {
            self.sink.report(100, message);
            self.previous_percent = 100;
        }
    }
}

/// Parse a delimited file into a [`DataTable`], streaming one row at a time.
///
/// When `has_header` is set the first line supplies column names; blank or
/// duplicate header cells are rewritten to generated unique names. The
/// cancellation token is checked before the header read and before each
/// row. An empty file yields an empty table, not an error.
pub fn parse_file(
    path: &Path,
    has_header: bool,
    progress: Option<&dyn ProgressSink>,
    cancel: Option<&CancellationToken>,
) -> HydroResult<TableParseOutcome> {
    let mut table = DataTable::new();

    let is_cancelled = || cancel.map(CancellationToken::is_cancelled).unwrap_or(false);

    if is_cancelled() {
        return Ok(TableParseOutcome::Cancelled);
    }

    // Line count up front, only when somebody is watching.
    let mut tracker = match progress {
        Some(sink) => {
            sink.report(0, "Opening file...");
            let total = count_lines(path)?;
            Some(ProgressTracker::new(sink, total))
        }
        None => None,
    };

    let file = File::open(path)?;
    let mut lines = BufReader::new(file).lines();

    let first = match lines.next() {
        Some(line) => line?,
        None => {
            debug!(path = %path.display(), "File is empty");
            if let Some(tracker) = tracker.as_mut() {
                tracker.finish("All lines read");
            }
            return Ok(TableParseOutcome::Completed(table));
        }
    };

    let mut pending = Some(split_fields(&first));

    if has_header {
        if is_cancelled() {
            return Ok(TableParseOutcome::Cancelled);
        }
        if let Some(tracker) = tracker.as_mut() {
            tracker.step(|_, _| "Reading data header...".to_string());
        }

        for header in pending.take().unwrap() {
            table.add_header_column(&header);
        }

        pending = match lines.next() {
            Some(line) => Some(split_fields(&line?)),
            None => None,
        };
    }

    while let Some(fields) = pending {
        if is_cancelled() {
            return Ok(TableParseOutcome::Cancelled);
        }
        if let Some(tracker) = tracker.as_mut() {
            tracker.step(|step, total| format!("Reading line {} of {}...", step, total));
        }

        table.push_row(fields);

        pending = match lines.next() {
            Some(line) => Some(split_fields(&line?)),
            None => None,
        };
    }

    if is_cancelled() {
        return Ok(TableParseOutcome::Cancelled);
    }

    if let Some(tracker) = tracker.as_mut() {
        tracker.finish("All lines read");
    }

    debug!(
        path = %path.display(),
        rows = table.row_count(),
        columns = table.columns().len(),
        "Parsed file"
    );

    Ok(TableParseOutcome::Completed(table))
}
