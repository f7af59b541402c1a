//! In-flight reporting for insight generation.
//!
//! While at least one generation request is outstanding, the user sees what
//! is queued and what has finished. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a batch of generation tasks.
#[derive(Clone, Debug)]
pub enum GenerationEvent {
    /// Generation tasks have been spawned; `total` are now in flight.
    Started { total: u64 },
    /// One task completed: `n` of `total` done.
    Finished {
        n: u64,
        total: u64,
        note_title: String,
        degraded: bool,
    },
}

/// Reports generation progress. Implementations write to stderr.
pub trait GenerationProgressReporter: Send + Sync {
    fn report(&self, event: GenerationEvent);
}

/// Human-friendly progress: "insights  2 / 5  Q4 Launch".
pub struct StderrProgress;

impl GenerationProgressReporter for StderrProgress {
    fn report(&self, event: GenerationEvent) {
        let line = match &event {
            GenerationEvent::Started { total } => {
                format!("insights  generating {} note(s)...\n", total)
            }
            GenerationEvent::Finished {
                n,
                total,
                note_title,
                degraded,
            } => {
                let tag = if *degraded { "  (fallback)" } else { "" };
                format!("insights  {} / {}  {}{}\n", n, total, note_title, tag)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl GenerationProgressReporter for NoProgress {
    fn report(&self, _event: GenerationEvent) {}
}

/// Progress mode for the CLI: off, or human-readable on stderr.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn GenerationProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
        }
    }
}
