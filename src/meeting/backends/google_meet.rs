//! Google Meet links: `meet.google.com/<code>`, lookup links and bare codes.

use super::{host_of, parse_link, path_segments, PlatformBackend};
use crate::meeting::Platform;

const HOST: &str = "meet.google.com";

pub struct GoogleMeet;

/// Meeting codes look like `abc-defg-hij`.
fn is_meeting_code(candidate: &str) -> bool {
    let parts: Vec<&str> = candidate.split('-').collect();
    parts.len() == 3
        && parts
            .iter()
            .zip([3, 4, 3])
            .all(|(part, len)| part.len() == len && part.chars().all(|c| c.is_ascii_lowercase()))
}

impl PlatformBackend for GoogleMeet {
    const PLATFORM: Platform = Platform::GoogleMeet;

    fn can_handle_url(url: &str) -> bool {
        Self::extract_meeting_id(url).is_some()
    }

    fn extract_meeting_id(url: &str) -> Option<String> {
        let trimmed = url.trim();
        let code = trimmed.to_ascii_lowercase();
        if is_meeting_code(&code) {
            return Some(code);
        }

        let parsed = parse_link(trimmed)?;
        if host_of(&parsed) != HOST {
            return None;
        }

        match path_segments(&parsed).as_slice() {
            [code, ..] if is_meeting_code(&code.to_ascii_lowercase()) => {
                Some(code.to_ascii_lowercase())
            }
            [lookup, alias, ..] if lookup == "lookup" => Some(format!("lookup/{alias}")),
            _ => None,
        }
    }

    fn join_url(_url: &str, meeting_id: &str) -> String {
        format!("https://{HOST}/{meeting_id}")
    }
}
