//! Webex links: personal rooms (`<site>.webex.com/meet/<user>`) and
//! scheduled meetings (`.../j.php?MTID=<id>`).

use super::{host_matches, host_of, parse_link, path_segments, query_value, PlatformBackend};
use crate::meeting::Platform;

const DOMAIN: &str = "webex.com";

pub struct Webex;

impl PlatformBackend for Webex {
    const PLATFORM: Platform = Platform::Webex;

    fn can_handle_url(url: &str) -> bool {
        Self::extract_meeting_id(url).is_some()
    }

    fn extract_meeting_id(url: &str) -> Option<String> {
        let parsed = parse_link(url)?;
        let host = host_of(&parsed);
        if !host_matches(&host, DOMAIN) {
            return None;
        }

        if let Some(mtid) = query_value(&parsed, "MTID") {
            return Some(mtid);
        }

        let site = host.strip_suffix(".webex.com")?;
        match path_segments(&parsed).as_slice() {
            [meet, user, ..] if meet == "meet" => Some(format!("{site}/{user}")),
            [_, meet, user, ..] if meet == "meet" => Some(format!("{site}/{user}")),
            _ => None,
        }
    }

    fn join_url(url: &str, _meeting_id: &str) -> String {
        parse_link(url)
            .map(String::from)
            .unwrap_or_else(|| url.trim().to_string())
    }
}
