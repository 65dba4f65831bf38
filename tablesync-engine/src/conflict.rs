//! Last-write-wins conflict resolution between the sheet and the remote.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use tablesync_types::{parse_timestamp, Side};

/// Result of comparing the two "last updated at" values of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// The side with the later (or only) timestamp wins.
    Winner(Side),
    /// Neither timestamp is usable; the configured default side wins.
    Fallback(Side),
    /// Both timestamps are equal; nothing propagates.
    Tie,
}

impl Resolution {
    /// The side whose values propagate, if any.
    #[must_use]
    pub fn winner(self) -> Option<Side> {
        match self {
            Self::Winner(side) | Self::Fallback(side) => Some(side),
            Self::Tie => None,
        }
    }
}

/// Resolves a conflict from parsed timestamps.
///
/// The result depends only on the two values, never on which side is
/// scanned first.
#[must_use]
pub fn resolve(
    sheet: Option<DateTime<Utc>>,
    remote: Option<DateTime<Utc>>,
    default_winner: Side,
) -> Resolution {
    match (sheet, remote) {
        (Some(s), Some(r)) => match s.cmp(&r) {
            Ordering::Greater => Resolution::Winner(Side::Sheet),
            Ordering::Less => Resolution::Winner(Side::Remote),
            Ordering::Equal => Resolution::Tie,
        },
        (Some(_), None) => Resolution::Winner(Side::Sheet),
        (None, Some(_)) => Resolution::Winner(Side::Remote),
        (None, None) => Resolution::Fallback(default_winner),
    }
}

/// Resolves a conflict from raw cell values. Unparsable values count as
/// missing.
#[must_use]
pub fn resolve_raw(sheet: &str, remote: &str, default_winner: Side) -> Resolution {
    resolve(parse_timestamp(sheet), parse_timestamp(remote), default_winner)
}
