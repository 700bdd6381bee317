//! Zoom links.
//!
//! Numeric meetings (`/j/<id>`, `/s/<id>`, `/wc/join/<id>`, `zoommtg://`
//! deep links) are opened in the web client with their passcode; personal
//! rooms (`/my/<name>`) are opened as-is.

use reqwest::Url;

use super::{host_matches, host_of, parse_link, path_segments, query_value, PlatformBackend};
use crate::meeting::Platform;

const WEB_CLIENT: &str = "https://app.zoom.us/wc/join";
const PERSONAL_PREFIX: &str = "my/";

pub struct Zoom;

fn is_meeting_number(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit())
}

impl PlatformBackend for Zoom {
    const PLATFORM: Platform = Platform::Zoom;

    fn can_handle_url(url: &str) -> bool {
        Self::extract_meeting_id(url).is_some()
    }

    fn extract_meeting_id(url: &str) -> Option<String> {
        let parsed = parse_link(url)?;

        if matches!(parsed.scheme(), "zoommtg" | "zoomus") {
            return query_value(&parsed, "confno").filter(|id| is_meeting_number(id));
        }

        let host = host_of(&parsed);
        if !host_matches(&host, "zoom.us") && !host_matches(&host, "zoom.com") {
            return None;
        }

        match path_segments(&parsed).as_slice() {
            [kind, id, ..] if matches!(kind.as_str(), "j" | "s" | "w") && is_meeting_number(id) => {
                Some(id.clone())
            }
            [wc, join, id, ..] if wc == "wc" && join == "join" && is_meeting_number(id) => {
                Some(id.clone())
            }
            [wc, id, ..] if wc == "wc" && is_meeting_number(id) => Some(id.clone()),
            [my, name, ..] if my == "my" => Some(format!("{PERSONAL_PREFIX}{name}")),
            _ => None,
        }
    }

    fn join_url(url: &str, meeting_id: &str) -> String {
        if meeting_id.starts_with(PERSONAL_PREFIX) {
            return format!("https://zoom.us/{meeting_id}");
        }

        let base = format!("{WEB_CLIENT}/{meeting_id}");
        let passcode = parse_link(url).and_then(|parsed| query_value(&parsed, "pwd"));
        match (Url::parse(&base), passcode) {
            (Ok(mut join), Some(passcode)) => {
                join.query_pairs_mut().append_pair("pwd", &passcode);
                join.into()
            }
            _ => base,
        }
    }
}
