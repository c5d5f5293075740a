//! Registry record states and the transitions between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of an issuer revocation registry record.
///
/// States only move forward, one step at a time:
/// `Init -> Generated -> Posted -> Active -> Full`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// Created, nothing generated yet.
    #[default]
    Init,
    /// Registry, definition, entry and tails file exist locally.
    Generated,
    /// Definition written to the ledger.
    Posted,
    /// Initial entry written to the ledger; accepting revocations.
    Active,
    /// Capacity exhausted; retained for audit only.
    Full,
}

impl RecordState {
    pub const ALL: [RecordState; 5] = [
        RecordState::Init,
        RecordState::Generated,
        RecordState::Posted,
        RecordState::Active,
        RecordState::Full,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Init => "init",
            RecordState::Generated => "generated",
            RecordState::Posted => "posted",
            RecordState::Active => "active",
            RecordState::Full => "full",
        }
    }

    /// Parse the lowercase wire name of a state.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// True once generation has produced a definition.
    pub fn has_definition(&self) -> bool {
        !matches!(self, RecordState::Init)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A forward step of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Generate,
    PublishDefinition,
    PublishEntry,
    MarkFull,
}

impl Transition {
    /// The only state this transition may start from.
    pub fn source(&self) -> RecordState {
        match self {
            Transition::Generate => RecordState::Init,
            Transition::PublishDefinition => RecordState::Generated,
            Transition::PublishEntry => RecordState::Posted,
            Transition::MarkFull => RecordState::Active,
        }
    }

    pub fn target(&self) -> RecordState {
        match self {
            Transition::Generate => RecordState::Generated,
            Transition::PublishDefinition => RecordState::Posted,
            Transition::PublishEntry => RecordState::Active,
            Transition::MarkFull => RecordState::Full,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transition::Generate => "generate",
            Transition::PublishDefinition => "publish definition for",
            Transition::PublishEntry => "publish entry for",
            Transition::MarkFull => "mark full",
        }
    }
}
