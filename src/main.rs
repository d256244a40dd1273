//! focusmind CLI - a focus timer with session feedback
//!
//! Alternates work and break intervals:
//! - 45 minutes of focused work, then a 10 minute break (guest defaults)
//! - Signed-in users rate each work session and keep a session log
//! - Optional ambient sound while a session runs

use anyhow::Result;
use chrono::Local;
use clap::{CommandFactory, Parser};
use tokio::time::Duration;

use focusmind::cli::{Cli, Commands, Display, IpcClient};
use focusmind::config::{AppPaths, DaemonOptions};
use focusmind::session::{JsonlSessionLog, SessionStats};
use focusmind::settings::load_auth;
use focusmind::sound::discover_sounds;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        // No command provided, show help
        Cli::command().print_help()?;
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        generate_completions(shell);
        return Ok(());
    }

    let paths = AppPaths::resolve()?;
    let client = IpcClient::new(&paths);

    match command {
        Commands::Start => Display::show_action(&client.start().await?),
        Commands::Pause => Display::show_action(&client.pause().await?),
        Commands::Skip => Display::show_action(&client.skip().await?),
        Commands::Cancel => Display::show_action(&client.cancel().await?),
        Commands::Status => Display::show_status(&client.status().await?),
        Commands::Rate(args) => {
            let rating = if args.skip { None } else { args.rating };
            Display::show_action(&client.feedback(rating).await?);
        }
        Commands::Settings(args) => {
            let response = match args.to_patch() {
                Some(patch) => client.update_settings(patch).await?,
                None => client.settings().await?,
            };
            Display::show_settings(&response, &discover_sounds(&paths.sounds_dir()));
        }
        Commands::Login { user } => Display::show_action(&client.login(&user).await?),
        Commands::Logout => Display::show_action(&client.logout().await?),
        Commands::Suspend => Display::show_action(&client.suspend().await?),
        Commands::Resume => Display::show_action(&client.resume().await?),
        Commands::Stats => show_stats(&paths)?,
        Commands::Daemon(args) => {
            let options = DaemonOptions {
                paths,
                no_sound: args.no_sound,
                feedback_timeout: Duration::from_secs(args.feedback_timeout),
            };
            focusmind::daemon::run(options).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Prints statistics from the session log, limited to the signed-in user.
fn show_stats(paths: &AppPaths) -> Result<()> {
    let user = load_auth(&paths.auth_path()).map(|auth| auth.user);
    let mut records = JsonlSessionLog::new(paths.sessions_path()).read_all()?;
    if let Some(user) = &user {
        records.retain(|r| r.user.as_deref() == Some(user.as_str()));
    }

    let now = Local::now();
    let stats = SessionStats::compute(&records, &now);
    Display::show_stats(&stats, user.as_deref(), now.date_naive());
    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================
