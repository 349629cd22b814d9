pub mod daemon_path;
pub mod process;
pub mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{daemon_executable, kill_previous_servers, restart_server};
use report::{process_report_command, ReportCommand};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::start_daemon,
    screen_api::{ScreenCapturer, XcapCapturer},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

use crate::daemon::args::DaemonArgs;

#[derive(Parser, Debug)]
#[command(name = "Snaptrack", version, long_about = None)]
#[command(about = "Periodic screenshot capture and day-by-day activity tracking", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "List connected monitors")]
    Monitors {},
    #[command(about = "Print day summaries for a date range")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(
        about = "Run the daemon directly in the current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[command(flatten)]
        args: DaemonArgs,
    },
    #[command(about = "Stop the currently running daemon.")]
    Stop {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(
        CLI_PREFIX,
        &create_application_default_path()?,
        logging_level,
        args.log,
    )?;

    match args.commands {
        Commands::Init { dir } => {
            restart_server(dir.as_deref())?;
            Ok(())
        }
        Commands::Stop {} => {
            kill_previous_servers(&daemon_executable()?);
            Ok(())
        }
        Commands::Monitors {} => {
            let mut capturer = XcapCapturer::new();
            for monitor in capturer.monitors()? {
                println!("{}: {monitor}", monitor.id);
            }
            Ok(())
        }
        Commands::Serve { args } => {
            let dir = args
                .dir
                .clone()
                .map_or_else(create_application_default_path, Ok)?;
            start_daemon(dir, args.into()).await?;
            Ok(())
        }
        Commands::Report { command } => process_report_command(command).await,
    }
}
