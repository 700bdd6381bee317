use anyhow::Result;
use clap::Parser;
use roomkeeper::{
    app,
    cli::{control, handle_logs_command, load_config, ApiClient, Cli, CliCommand},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let command = match cli.command {
        Some(CliCommand::Version) => {
            println!("roomkeeper {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(CliCommand::Logs(args)) => return handle_logs_command(args),
        Some(CliCommand::Classify { url }) => return control::classify(&url),
        None | Some(CliCommand::Run) => None,
        Some(command) => Some(command),
    };

    let config = load_config(cli.config.as_deref())?;

    let Some(command) = command else {
        return app::run_service(config).await;
    };

    let client = ApiClient::from_config(&config.api);
    match command {
        CliCommand::Status => control::show_status(&client).await,
        CliCommand::Join(args) => control::join(&client, args).await,
        CliCommand::Leave => control::leave(&client).await,
        CliCommand::Camera => control::toggle_camera(&client).await,
        CliCommand::Mute => control::toggle_mute(&client).await,
        CliCommand::Restart { service } => control::restart(&client, &service).await,
        CliCommand::Run
        | CliCommand::Version
        | CliCommand::Logs(_)
        | CliCommand::Classify { .. } => Ok(()),
    }
}
