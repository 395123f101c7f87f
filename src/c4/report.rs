// Console reporting of finished identifiers
// Output goes through one mutex so result blocks from worker threads never interleave

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use indicatif::ProgressBar;

use super::format::FormatOptions;
use super::id::FileC4Id;
use super::progress::{stdout_bar, DEFAULT_BAR_LENGTH};

struct ReporterState<W> {
    out: W,
    completed: usize,
}

/// Prints each finished identifier, optionally with an overall progress bar
/// counting finished files.
pub struct ConsoleReporter<W: Write + Send> {
    options: FormatOptions,
    json: bool,
    progress: Option<ProgressBar>,
    state: Mutex<ReporterState<W>>,
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, options: FormatOptions) -> Self {
        Self {
            options,
            json: false,
            progress: None,
            state: Mutex::new(ReporterState { out, completed: 0 }),
        }
    }

    /// Draw a bar on stdout, out of `total` expected results.
    pub fn with_progress(self, total: usize) -> Self {
        self.with_progress_bar(stdout_bar(total as u64, DEFAULT_BAR_LENGTH))
    }

    /// Advance `pb` by one for each result.
    pub fn with_progress_bar(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    /// Emit JSON lines instead of text blocks.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn progress_bar(&self) -> Option<&ProgressBar> {
        self.progress.as_ref()
    }

    fn lock(&self) -> MutexGuard<'_, ReporterState<W>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Print one finished identifier.
    pub fn report(&self, id: &FileC4Id) -> io::Result<()> {
        // Format (and touch the filesystem for metadata) before taking the lock.
        let output = if self.json {
            id.to_json(&self.options).map_err(io::Error::other)?
        } else {
            id.format(&self.options)
        };

        let mut state = self.lock();
        state.completed += 1;
        let out = &mut state.out;
        let write = |out: &mut W| -> io::Result<()> {
            writeln!(out, "{}", output)?;
            out.flush()
        };

        match &self.progress {
            Some(pb) => {
                pb.suspend(|| write(out))?;
                pb.inc(1);
            }
            None => write(out)?,
        }
        Ok(())
    }

    /// Number of identifiers reported so far.
    pub fn completed(&self) -> usize {
        self.lock().completed
    }

    /// Leave the bar at its final position and flush the output.
    pub fn finish(&self) -> io::Result<()> {
        if let Some(pb) = &self.progress {
            pb.finish();
        }
        self.lock().out.flush()
    }

    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .out
    }
}
