//! Meeting platform tags and URL classification.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleMeet,
    Teams,
    Zoom,
    Webex,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::GoogleMeet,
        Platform::Teams,
        Platform::Zoom,
        Platform::Webex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleMeet => "google_meet",
            Self::Teams => "teams",
            Self::Zoom => "zoom",
            Self::Webex => "webex",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::GoogleMeet => "Google Meet",
            Self::Teams => "Microsoft Teams",
            Self::Zoom => "Zoom",
            Self::Webex => "Webex",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown platform '{s}'"))
    }
}

/// Classifies meeting links by their domain.
///
/// Patterns are anchored on the host, and no platform's domain is a
/// substring of another's, so at most one pattern can match.
pub struct PlatformRouter {
    patterns: Vec<(Platform, Regex)>,
}

impl PlatformRouter {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = vec![
            (
                Platform::GoogleMeet,
                Regex::new(r"(?i)^(?:https?://)?meet\.google\.com/")?,
            ),
            (
                Platform::Teams,
                Regex::new(r"(?i)^(?:https?://)?(?:[a-z0-9-]+\.)*teams\.(?:microsoft|live)\.com/")?,
            ),
            (
                Platform::Zoom,
                Regex::new(
                    r"(?i)^(?:https?://)?(?:[a-z0-9-]+\.)*zoom\.(?:us|com)/(?:j|s|my|w|wc/join)/",
                )?,
            ),
            (
                Platform::Webex,
                Regex::new(r"(?i)^(?:https?://)?(?:[a-z0-9-]+\.)*webex\.com/")?,
            ),
        ];

        Ok(Self { patterns })
    }

    /// First matching platform, or `None` when no pattern applies.
    pub fn classify(&self, url_or_code: &str) -> Option<Platform> {
        let candidate = url_or_code.trim();
        self.patterns
            .iter()
            .find(|(_, pattern)| pattern.is_match(candidate))
            .map(|(platform, _)| *platform)
    }
}
