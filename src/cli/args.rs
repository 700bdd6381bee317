use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "roomkeeper")]
#[command(about = "Service and meeting agent for meeting room devices", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of ~/.config/roomkeeper/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the agent in the foreground (default)
    Run,
    /// Show service and meeting status
    Status,
    /// Join a meeting link
    Join(JoinCliArgs),
    /// Leave the current meeting
    Leave,
    /// Toggle the camera
    Camera,
    /// Toggle the microphone
    Mute,
    /// Restart a single service
    Restart {
        /// Registered service name
        service: String,
    },
    /// Show which platform handles a meeting link
    Classify {
        url: String,
    },
    /// View agent logs
    Logs(LogsCliArgs),
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct JoinCliArgs {
    /// Meeting link or code
    pub url: String,
    /// Display name (default: the room's display name)
    #[arg(long)]
    pub name: Option<String>,
    /// Join with the camera off
    #[arg(long)]
    pub camera_off: bool,
    /// Join with the microphone muted
    #[arg(long)]
    pub mic_off: bool,
}

#[derive(ClapArgs, Debug)]
pub struct LogsCliArgs {
    /// Number of log entries to show
    #[arg(short = 'n', long, default_value = "50")]
    pub lines: usize,
    /// Only show entries matching this pattern
    #[arg(long)]
    pub grep: Option<String>,
}
