//! CLI handlers for status and meeting control.
//!
//! Everything except `classify` goes through the local HTTP API.

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::args::JoinCliArgs;
use super::client::ApiClient;
use crate::meeting::{backends, Platform, PlatformRouter};

pub async fn show_status(client: &ApiClient) -> Result<()> {
    let services = client.get("/services").await?;
    let meeting = client.get("/meeting").await?;

    println!("Meeting: {}", describe_meeting(&meeting));
    if let Some(platforms) = meeting.get("available_platforms").and_then(Value::as_array) {
        let names: Vec<&str> = platforms.iter().filter_map(Value::as_str).collect();
        println!("Platforms: {}", names.join(", "));
    }

    println!("\nServices:");
    for service in services.as_array().into_iter().flatten() {
        let name = str_field(service, "name");
        let state = str_field(service, "state");
        let mut line = format!("  {:<12} {:<9}", name, state);
        if state == "running" {
            let uptime = service
                .get("uptime_seconds")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            line.push_str(&format!(" up {}", format_uptime(uptime)));
        }
        if let Some(error) = service.get("error").and_then(Value::as_str) {
            line.push_str(&format!(" ({})", error));
        }
        println!("{}", line.trim_end());
    }

    Ok(())
}

pub async fn join(client: &ApiClient, args: JoinCliArgs) -> Result<()> {
    let mut body = Map::new();
    body.insert("url".to_string(), Value::String(args.url));
    if let Some(name) = args.name {
        body.insert("display_name".to_string(), Value::String(name));
    }
    if args.camera_off {
        body.insert("camera_on".to_string(), Value::Bool(false));
    }
    if args.mic_off {
        body.insert("mic_on".to_string(), Value::Bool(false));
    }

    let info = client
        .post("/meeting/join", Some(&Value::Object(body)))
        .await
        .context("Failed to join meeting")?;

    println!(
        "Joined {} meeting {}",
        str_field(&info, "platform"),
        str_field(&info, "meeting_id")
    );
    Ok(())
}

pub async fn leave(client: &ApiClient) -> Result<()> {
    client.post("/meeting/leave", None).await?;
    println!("Left meeting");
    Ok(())
}

pub async fn toggle_camera(client: &ApiClient) -> Result<()> {
    let result = client.post("/meeting/camera", None).await?;
    let on = result.get("camera_on").and_then(Value::as_bool).unwrap_or(false);
    println!("Camera {}", if on { "on" } else { "off" });
    Ok(())
}

pub async fn toggle_mute(client: &ApiClient) -> Result<()> {
    let result = client.post("/meeting/mute", None).await?;
    let muted = result.get("muted").and_then(Value::as_bool).unwrap_or(true);
    println!("Microphone {}", if muted { "muted" } else { "live" });
    Ok(())
}

pub async fn restart(client: &ApiClient, service: &str) -> Result<()> {
    let status = client
        .post(&format!("/services/{}/restart", service), None)
        .await
        .with_context(|| format!("Failed to restart '{}'", service))?;
    println!("{} is {}", service, str_field(&status, "state"));
    Ok(())
}

/// Classify locally; the agent does not need to be running.
pub fn classify(url: &str) -> Result<()> {
    let router = PlatformRouter::new().context("Failed to build platform router")?;
    let platform = router.classify(url).or_else(|| {
        Platform::ALL
            .into_iter()
            .find(|platform| backends::can_handle_url(*platform, url))
    });

    match platform {
        Some(platform) => println!("{} ({})", platform.display_name(), platform),
        None => println!("No platform recognises this link"),
    }
    Ok(())
}

fn describe_meeting(meeting: &Value) -> String {
    let state = str_field(meeting, "state");
    let Some(info) = meeting.get("meeting").filter(|m| !m.is_null()) else {
        return state.to_string();
    };

    let mut description = format!(
        "{} ({} {})",
        state,
        str_field(info, "platform"),
        str_field(info, "meeting_id")
    );
    let camera = info.get("camera_on").and_then(Value::as_bool).unwrap_or(false);
    let muted = info.get("muted").and_then(Value::as_bool).unwrap_or(true);
    description.push_str(&format!(
        ", camera {}, {}",
        if camera { "on" } else { "off" },
        if muted { "muted" } else { "mic live" }
    ));
    if let Some(error) = info.get("error_message").and_then(Value::as_str) {
        description.push_str(&format!(": {}", error));
    }
    description
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("?")
}

fn format_uptime(seconds: u64) -> String {
    match seconds {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m {:02}s", s / 60, s % 60),
        s => format!("{}h {:02}m", s / 3600, (s % 3600) / 60),
    }
}
