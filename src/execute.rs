//! Prints changes and applies them according to the run mode.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::change::Change;
use crate::plan::ChangeSink;
use crate::{Directory, Error, Result};

pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Print changes, never apply them.
    DryRun,
    /// Apply each change as soon as it is found.
    Execute,
    /// Collect changes and apply them all after one confirmation.
    #[default]
    Confirm,
}

/// Source of the confirmation answer.
#[async_trait]
pub trait Prompt: Send {
    /// The next line of input, or `None` if there will be none.
    async fn read_answer(&mut self) -> Option<String>;
}

/// Reads the answer from stdin.
///
/// The read happens on its own thread so an unanswered prompt does not keep
/// the process alive once the timeout has passed.
pub struct StdinPrompt;

#[async_trait]
impl Prompt for StdinPrompt {
    async fn read_answer(&mut self) -> Option<String> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        std::thread::spawn(move || {
            let mut line = String::new();
            if std::io::stdin().read_line(&mut line).is_ok() {
                let _ = tx.send(line);
            }
        });
        rx.await.ok()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub found: usize,
    pub applied: usize,
}

pub struct Driver<'a, W, P> {
    directory: &'a dyn Directory,
    mode: Mode,
    out: W,
    prompt: P,
    timeout: Duration,
    pending: Vec<Change>,
    summary: Summary,
}

impl<'a, W: Write + Send, P: Prompt> Driver<'a, W, P> {
    pub fn new(directory: &'a dyn Directory, mode: Mode, out: W, prompt: P) -> Self {
        Self {
            directory,
            mode,
            out,
            prompt,
            timeout: DEFAULT_CONFIRM_TIMEOUT,
            pending: vec![],
            summary: Summary::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn start(&mut self) -> Result<()> {
        if self.mode == Mode::DryRun {
            writeln!(self.out, "*** DRY RUN - no changes will be made ***")?;
        }
        Ok(())
    }

    async fn apply(&mut self, change: &Change) -> Result<()> {
        change
            .apply(self.directory)
            .await
            .map_err(|source| Error::Apply {
                change: change.to_string(),
                source,
            })?;
        if !change.is_report() {
            self.summary.applied += 1;
        }
        Ok(())
    }

    /// Runs the end of the run: the confirmation prompt and batch apply in
    /// confirm mode, closing messages otherwise.
    pub async fn finish(&mut self) -> Result<Summary> {
        if self.summary.found == 0 {
            writeln!(self.out, "No changes needed")?;
        }

        match self.mode {
            Mode::DryRun => {
                writeln!(self.out, "*** DRY RUN - no changes were made ***")?;
            }
            Mode::Execute => {}
            Mode::Confirm if self.pending.is_empty() => {}
            Mode::Confirm => {
                writeln!(self.out, "Do you want to apply the above changes (y/n)?")?;
                self.out.flush()?;
                let answer = tokio::time::timeout(self.timeout, self.prompt.read_answer())
                    .await
                    .ok()
                    .flatten();
                let confirmed = answer
                    .map(|answer| matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
                    .unwrap_or(false);

                if confirmed {
                    for change in std::mem::take(&mut self.pending) {
                        writeln!(self.out, "{change}")?;
                        self.apply(&change).await?;
                    }
                    writeln!(self.out, "Applied {} change(s)", self.summary.applied)?;
                } else {
                    warn!(pending = self.pending.len(), "not confirmed");
                    self.pending.clear();
                    writeln!(self.out, "No changes applied")?;
                }
            }
        }

        info!(
            found = self.summary.found,
            applied = self.summary.applied,
            "run finished"
        );
        Ok(self.summary)
    }

    pub fn into_output(self) -> W {
        self.out
    }
}

#[async_trait]
impl<'a, W: Write + Send, P: Prompt> ChangeSink for Driver<'a, W, P> {
    async fn submit(&mut self, change: Change) -> Result<()> {
        self.summary.found += 1;
        writeln!(self.out, "{change}")?;
        match self.mode {
            Mode::DryRun => {}
            Mode::Execute => self.apply(&change).await?,
            Mode::Confirm => self.pending.push(change),
        }
        Ok(())
    }
}
