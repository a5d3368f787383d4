//! Anti-bot interstitial detection

/// Title text of the interstitial shown while the challenge runs
pub const CHALLENGE_TITLE_MARKER: &str = "Just a moment...";

/// Script path the interstitial loads its challenge from
pub const CHALLENGE_PLATFORM_MARKER: &str = "/cdn-cgi/challenge-platform/";

/// Classification of fetched markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    Challenge,
    Content,
}

/// Classifies markup as the challenge interstitial or real content
///
/// Anything without one of the two fingerprints is content, including empty
/// or truncated markup from a timed-out fetch.
pub fn classify_markup(markup: &str) -> PageClass {
    if markup.contains(CHALLENGE_TITLE_MARKER) || markup.contains(CHALLENGE_PLATFORM_MARKER) {
        PageClass::Challenge
    } else {
        PageClass::Content
    }
}
