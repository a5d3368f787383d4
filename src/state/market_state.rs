/// Per-identifier state definitions for the crawl loop
///
/// Every market identifier moves through a short state machine:
///
/// ```text
/// Fetching -> Extracting -> Recorded
///     |                  \-> Skipped (write failed)
///     v
/// Challenged -> Refetching -> Extracting
///                   \-> Skipped (challenge persisted)
/// ```
use std::fmt;

/// Represents the current state of a market identifier in the crawl loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarketState {
    // ===== Active States =====
    /// First fetch of the market page is in flight
    Fetching,

    /// The first fetch returned the anti-bot interstitial
    Challenged,

    /// The single re-fetch after a session refresh is in flight
    Refetching,

    /// Content markup is being turned into a result row
    Extracting,

    // ===== Terminal States =====
    /// A result row was appended to the sink
    Recorded,

    /// The identifier was given up on; see [`SkipReason`]
    Skipped,
}

impl MarketState {
    /// Returns true if no further processing happens for the identifier
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Recorded | Self::Skipped)
    }

    /// Returns true if the identifier is still being worked on
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: MarketState) -> bool {
        matches!(
            (self, next),
            (Self::Fetching, Self::Challenged)
                | (Self::Fetching, Self::Extracting)
                | (Self::Challenged, Self::Refetching)
                | (Self::Refetching, Self::Extracting)
                | (Self::Refetching, Self::Skipped)
                | (Self::Extracting, Self::Recorded)
                | (Self::Extracting, Self::Skipped)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Challenged => "challenged",
            Self::Refetching => "refetching",
            Self::Extracting => "extracting",
            Self::Recorded => "recorded",
            Self::Skipped => "skipped",
        }
    }

    /// Returns all possible market states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Fetching,
            Self::Challenged,
            Self::Refetching,
            Self::Extracting,
            Self::Recorded,
            Self::Skipped,
        ]
    }
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an identifier ended in [`MarketState::Skipped`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The interstitial came back again after a session refresh
    PersistentChallenge,

    /// The result row could not be appended to the sink
    WriteFailed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersistentChallenge => "persistent_challenge",
            Self::WriteFailed => "write_failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal result of handling one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketOutcome {
    Recorded,
    Skipped(SkipReason),
}

impl MarketOutcome {
    /// The terminal state this outcome corresponds to
    pub fn state(&self) -> MarketState {
        match self {
            Self::Recorded => MarketState::Recorded,
            Self::Skipped(_) => MarketState::Skipped,
        }
    }
}
