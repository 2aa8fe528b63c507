//! Result of running one sync handler.
//!
//! Handlers never return an error to the dispatcher. What happened is
//! reported as an [`Outcome`]: every item handled, some items skipped, or the
//! run abandoned.

use serde::{Deserialize, Serialize};

use crate::models::Entity;

/// A write performed against the target module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Inserted { entity: Entity, name: String },
    Deleted { entity: Entity, name: String },
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inserted { entity, name } => write!(f, "inserted {entity} '{name}'"),
            Self::Deleted { entity, name } => write!(f, "deleted {entity} '{name}'"),
        }
    }
}

/// Why an item was passed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownCourse,
}

/// An item (course line) that was not processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skipped {
    pub item: String,
    pub reason: SkipReason,
}

/// Why a handler stopped before finishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    MissingContactInfo { student: String },
    Unhandled { message: String },
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingContactInfo { student } => {
                write!(f, "no email found for student '{student}'")
            }
            Self::Unhandled { message } => f.write_str(message),
        }
    }
}

/// What one handler run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every item was applied or already in place.
    Completed {
        applied: Vec<Mutation>,
        unchanged: usize,
    },
    /// Some items were skipped; the rest were applied or already in place.
    Partial {
        applied: Vec<Mutation>,
        unchanged: usize,
        skipped: Vec<Skipped>,
    },
    /// The handler gave up. Nothing further was processed.
    Aborted { reason: AbortReason },
}

impl Outcome {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    pub fn applied(&self) -> &[Mutation] {
        match self {
            Self::Completed { applied, .. } | Self::Partial { applied, .. } => applied,
            Self::Aborted { .. } => &[],
        }
    }

    pub fn skipped(&self) -> &[Skipped] {
        match self {
            Self::Partial { skipped, .. } => skipped,
            _ => &[],
        }
    }

    pub fn unchanged(&self) -> usize {
        match self {
            Self::Completed { unchanged, .. } | Self::Partial { unchanged, .. } => *unchanged,
            Self::Aborted { .. } => 0,
        }
    }

    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Partial { .. } => "partial",
            Self::Aborted { .. } => "aborted",
        }
    }

    /// One-line human summary, used for audit details.
    pub fn summary(&self) -> String {
        match self {
            Self::Aborted { reason } => format!("aborted: {reason}"),
            _ => {
                let mut out = format!(
                    "{}: applied {}, unchanged {}",
                    self.status_str(),
                    self.applied().len(),
                    self.unchanged()
                );
                if !self.skipped().is_empty() {
                    let items: Vec<&str> = self.skipped().iter().map(|s| s.item.as_str()).collect();
                    out.push_str(&format!(", skipped [{}]", items.join(", ")));
                }
                out
            }
        }
    }
}

/// Accumulates per-item results while a handler runs.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    applied: Vec<Mutation>,
    unchanged: usize,
    skipped: Vec<Skipped>,
}

impl Tally {
    pub(crate) fn inserted(&mut self, entity: Entity, name: String) {
        self.applied.push(Mutation::Inserted { entity, name });
    }

    pub(crate) fn deleted(&mut self, entity: Entity, name: String) {
        self.applied.push(Mutation::Deleted { entity, name });
    }

    pub(crate) fn unchanged(&mut self) {
        self.unchanged += 1;
    }

    pub(crate) fn skip(&mut self, item: &str, reason: SkipReason) {
        self.skipped.push(Skipped {
            item: item.to_string(),
            reason,
        });
    }

    pub(crate) fn finish(self) -> Outcome {
        if self.skipped.is_empty() {
            Outcome::Completed {
                applied: self.applied,
                unchanged: self.unchanged,
            }
        } else {
            Outcome::Partial {
                applied: self.applied,
                unchanged: self.unchanged,
                skipped: self.skipped,
            }
        }
    }
}
