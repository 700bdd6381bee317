//! Microsoft Teams links.
//!
//! Work accounts use `teams.microsoft.com/l/meetup-join/<thread>/...`,
//! consumer accounts `teams.live.com/meet/<id>`. Desktop `msteams:` links
//! are rewritten to their web equivalent.

use super::{host_matches, host_of, parse_link, path_segments, PlatformBackend};
use crate::meeting::Platform;

const WORK_HOST: &str = "teams.microsoft.com";
const LIVE_HOST: &str = "teams.live.com";
const DESKTOP_SCHEME: &str = "msteams:";

pub struct Teams;

fn web_link(url: &str) -> String {
    let url = url.trim();
    match url.get(..DESKTOP_SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(DESKTOP_SCHEME) => {
            let rest = &url[DESKTOP_SCHEME.len()..];
            if rest.starts_with("//") {
                format!("https:{rest}")
            } else {
                format!("https://{WORK_HOST}{rest}")
            }
        }
        _ => url.to_string(),
    }
}

impl PlatformBackend for Teams {
    const PLATFORM: Platform = Platform::Teams;

    fn can_handle_url(url: &str) -> bool {
        Self::extract_meeting_id(url).is_some()
    }

    fn extract_meeting_id(url: &str) -> Option<String> {
        let parsed = parse_link(&web_link(url))?;
        let host = host_of(&parsed);
        let segments = path_segments(&parsed);

        if host_matches(&host, LIVE_HOST) {
            return match segments.as_slice() {
                [meet, id, ..] if meet == "meet" => Some(id.clone()),
                _ => None,
            };
        }

        if host_matches(&host, WORK_HOST) {
            return match segments.as_slice() {
                [l, join, thread, ..] if l == "l" && join == "meetup-join" => Some(thread.clone()),
                [meet, id, ..] if meet == "meet" => Some(id.clone()),
                _ => None,
            };
        }

        None
    }

    fn join_url(url: &str, _meeting_id: &str) -> String {
        let link = web_link(url);
        parse_link(&link).map(String::from).unwrap_or(link)
    }
}
