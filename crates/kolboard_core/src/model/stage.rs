//! Pipeline stage keys.
//!
//! # Responsibility
//! - Define the closed set of board containers known at startup.
//! - Resolve raw container keys leniently so legacy payloads never fail.
//!
//! # Invariants
//! - `Stage::ALL` is ordered the way columns are rendered.
//! - Resolution never errors: unknown or missing keys map to a fallback stage.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One pipeline container on the deliverable board.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Influencer not yet reached out to.
    #[default]
    ToContact,
    /// Rates and deliverables under discussion.
    Negotiating,
    /// Content is being produced.
    ContentCreation,
    /// Content is live.
    Posted,
    /// Deliverable closed out.
    Completed,
}

impl Stage {
    /// Every stage in board order.
    pub const ALL: [Stage; 5] = [
        Stage::ToContact,
        Stage::Negotiating,
        Stage::ContentCreation,
        Stage::Posted,
        Stage::Completed,
    ];

    /// Canonical storage key (`status` column value).
    pub fn as_key(self) -> &'static str {
        match self {
            Self::ToContact => "to_contact",
            Self::Negotiating => "negotiating",
            Self::ContentCreation => "content_creation",
            Self::Posted => "posted",
            Self::Completed => "completed",
        }
    }

    /// Column title shown by the board shell.
    pub fn title(self) -> &'static str {
        match self {
            Self::ToContact => "To Contact",
            Self::Negotiating => "Negotiating",
            Self::ContentCreation => "Content",
            Self::Posted => "Posted",
            Self::Completed => "Completed",
        }
    }

    /// Parses a raw key, accepting case and separator variants.
    ///
    /// Returns `None` for blank or unrecognized keys.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "to_contact" => Some(Self::ToContact),
            "negotiating" => Some(Self::Negotiating),
            "content_creation" => Some(Self::ContentCreation),
            "posted" => Some(Self::Posted),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Resolves an optional raw key, defaulting to `fallback`.
    pub fn resolve(raw: Option<&str>, fallback: Stage) -> Self {
        raw.and_then(Self::parse).unwrap_or(fallback)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}
