//! Reporting of per-resource outcomes.

use std::fmt;

/// What happened to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Created remotely by Apply.
    Added,
    /// Changed remotely by Apply.
    Updated,
    /// Local and remote copies are equal.
    NoDifferences,
    /// Diff found no remote copy.
    NotFound,
    /// Diff found the copies differ.
    ChangesDetected,
    /// Written to disk by Pull.
    Pulled,
    /// Written to disk by Export.
    Exported,
    /// Export found the file already up to date.
    Unchanged,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Added => "added",
            Event::Updated => "updated",
            Event::NoDifferences => "no differences",
            Event::NotFound => "not found",
            Event::ChangesDetected => "changes detected",
            Event::Pulled => "pulled",
            Event::Exported => "exported",
            Event::Unchanged => "unchanged",
        }
    }

    /// Whether the event means something was written somewhere.
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Event::Added | Event::Updated | Event::Pulled | Event::Exported
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub kind: String,
    pub uid: String,
    pub event: Event,
    /// Unified diff, remote to local, for [`Event::ChangesDetected`].
    pub diff: Option<String>,
}

impl Outcome {
    pub fn new(kind: impl Into<String>, uid: impl Into<String>, event: Event) -> Self {
        Self {
            kind: kind.into(),
            uid: uid.into(),
            event,
            diff: None,
        }
    }

    pub fn with_diff(mut self, diff: String) -> Self {
        self.diff = Some(diff);
        self
    }

    /// `<kind>.<uid>`, the form `get` accepts.
    pub fn id(&self) -> String {
        format!("{}.{}", self.kind, self.uid)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id(), self.event)
    }
}

/// Every outcome of one command, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    outcomes: Vec<Outcome>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of outcomes with the given event.
    pub fn count(&self, event: Event) -> usize {
        self.outcomes.iter().filter(|o| o.event == event).count()
    }

    /// Number of outcomes that wrote something.
    pub fn changes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.event.is_change()).count()
    }

    /// Events in order, handy for assertions.
    pub fn events(&self) -> Vec<Event> {
        self.outcomes.iter().map(|o| o.event).collect()
    }
}

/// Receives outcomes as they happen.
pub trait Notifier: Send + Sync {
    fn notify(&self, outcome: &Outcome);

    /// Called for skipped handlers and other non-fatal conditions.
    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }
}

/// Logs every outcome through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, outcome: &Outcome) {
        match &outcome.diff {
            Some(diff) => log::info!("{}\n{}", outcome, diff),
            None => log::info!("{}", outcome),
        }
    }
}

/// Discards every outcome.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _outcome: &Outcome) {}

    fn warn(&self, _message: &str) {}
}
