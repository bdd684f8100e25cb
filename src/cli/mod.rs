use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod chat;
pub mod download;
pub mod init;
pub mod login;
pub mod projects;
pub mod serve;

use crate::core::AppConfig;
use projects::ProjectsCommand;

#[derive(Subcommand)]
enum Command {
    /// Create the database and the downloads directory
    Init {},
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Log in and remember the session
    Login {
        #[arg(long)]
        username: String,
        /// Prompted for when not given
        #[arg(long)]
        access_key: Option<String>,
    },
    /// Forget the saved session
    Logout {},
    /// Show the logged in user
    Whoami {},
    /// Browse or add to the project registry
    Projects {
        #[command(subcommand)]
        command: ProjectsCommand,
    },
    /// Print the command that downloads a project's source archive
    Download {
        #[arg(long)]
        project: String,
    },
    /// Chat with the AI tutor about a project
    Chat {
        #[arg(long)]
        project: String,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // axum logs rejections from built-in extractors with the `axum::rejection`
                // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
                format! {
                    "{}=debug,tower_http=debug,axum::rejection=trace",
                    env!("CARGO_CRATE_NAME")
                }
                .into()
            }),
        )
        // Keep stdout for command output
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    init_tracing();

    let config = AppConfig::default();

    // Handle each sub command
    match args.command {
        Some(Command::Init {}) => {
            init::run(&config).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Login {
            username,
            access_key,
        }) => {
            login::login(&config, &username, access_key).await?;
        }
        Some(Command::Logout {}) => {
            login::logout(&config).await?;
        }
        Some(Command::Whoami {}) => {
            login::whoami(&config).await?;
        }
        Some(Command::Projects { command }) => {
            projects::run(&config, command).await?;
        }
        Some(Command::Download { project }) => {
            download::run(&config, &project).await?;
        }
        Some(Command::Chat { project }) => {
            chat::run(&config, &project).await?;
        }
        None => {}
    }

    Ok(())
}
