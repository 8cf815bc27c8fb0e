use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time of the last completed poll cycle. Entries modified after it are new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Watermark {
    /// No cycle has completed; every timestamped file is new.
    Never,
    At(DateTime<Utc>),
}

impl Default for Watermark {
    fn default() -> Self {
        Self::Never
    }
}

impl Watermark {
    /// Starting watermark for a listener.
    pub fn initial(run_on_startup: bool, now: DateTime<Utc>) -> Self {
        if run_on_startup {
            Self::Never
        } else {
            Self::At(now)
        }
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Never => None,
            Self::At(t) => Some(*t),
        }
    }

    /// Strictly after the watermark.
    pub fn is_passed_by(&self, modified: DateTime<Utc>) -> bool {
        match self {
            Self::Never => true,
            Self::At(t) => modified > *t,
        }
    }

    /// Move forward to `to`; never moves backwards.
    pub fn advance(&mut self, to: DateTime<Utc>) {
        *self = (*self).max(Self::At(to));
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Never => f.write_str("never"),
            Self::At(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}
