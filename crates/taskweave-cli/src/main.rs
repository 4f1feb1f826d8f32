use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

use commands::episode::Episode;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the taskweave directory in the user config dir)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Talk the patrol robot into revealing its flag
    Robot,

    /// Fix the calibration file and fill in its open questions
    Recalibrate,

    /// Anonymise the police report with the local model
    Censor,

    /// Draw the robot from its description and report the image URL
    Robotid,

    /// Deduce the faculty street from witness testimonials
    Testimonials {
        /// Directory with the recordings and their transcripts
        #[arg(short, long, default_value = "./data/testimonials")]
        dir: String,

        /// Transcribe the .m4a recordings before questioning
        #[arg(long)]
        transcribe: bool,
    },

    /// Index weapon test reports and find the theft date
    Vectors {
        /// Directory with the daily reports
        #[arg(short, long)]
        dir: String,
    },

    /// Find the shortest acquaintance chain between two users
    Connections {
        #[arg(long, default_value = "Rafał")]
        from: String,

        #[arg(long, default_value = "Barbara")]
        to: String,
    },

    /// Answer the headquarters questions by browsing the company website
    Softo,

    /// Let the model explore the headquarters database until it finds the datacenters
    Database,

    /// Follow people and places lookups until Barbara is found
    Whereabouts,

    /// Ask the browsing assistant a single question
    Ask {
        /// The question to answer
        question: String,
    },

    /// Display the current version
    Version,
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config.as_deref().map(expand_path);

    match cli.command {
        Some(Command::Robot) => commands::episode::execute(config, Episode::Robot).await,
        Some(Command::Recalibrate) => {
            commands::episode::execute(config, Episode::Recalibrate).await
        }
        Some(Command::Censor) => commands::episode::execute(config, Episode::Censor).await,
        Some(Command::Robotid) => commands::episode::execute(config, Episode::RobotId).await,
        Some(Command::Testimonials { dir, transcribe }) => {
            let episode = Episode::Testimonials {
                dir: expand_path(&dir),
                transcribe,
            };
            commands::episode::execute(config, episode).await
        }
        Some(Command::Vectors { dir }) => {
            let episode = Episode::Vectors {
                dir: expand_path(&dir),
            };
            commands::episode::execute(config, episode).await
        }
        Some(Command::Connections { from, to }) => {
            commands::episode::execute(config, Episode::Connections { from, to }).await
        }
        Some(Command::Softo) => commands::episode::execute(config, Episode::Softo).await,
        Some(Command::Database) => commands::episode::execute(config, Episode::Database).await,
        Some(Command::Whereabouts) => {
            commands::episode::execute(config, Episode::Whereabouts).await
        }
        Some(Command::Ask { question }) => commands::ask::execute(config, &question).await,
        Some(Command::Version) => commands::version::execute().await,
        None => {
            println!("No command provided - Run 'taskweave help' to see available commands.");
            Ok(())
        }
    }
}
