pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::config;

#[derive(Parser)]
#[command(name = "campus")]
#[command(about = "Campus CLI - tenant, user and course administration for the Campus API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Inspect configured tenants and domain resolution")]
    Tenant {
        #[command(subcommand)]
        cmd: commands::tenant::TenantCommands,
    },

    #[command(about = "List tenant users and manage their roles")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "List tenant courses")]
    Course {
        #[command(subcommand)]
        cmd: commands::course::CourseCommands,
    },

    #[command(about = "Name utilities")]
    Name {
        #[command(subcommand)]
        cmd: commands::name::NameCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Tenant { cmd } => {
            let state = AppState::from_config(config::config())?;
            commands::tenant::handle(cmd, &state, output_format).await
        }
        Commands::User { cmd } => {
            let state = AppState::from_config(config::config())?;
            commands::user::handle(cmd, &state, output_format).await
        }
        Commands::Course { cmd } => {
            let state = AppState::from_config(config::config())?;
            commands::course::handle(cmd, &state, output_format).await
        }
        Commands::Name { cmd } => commands::name::handle(cmd, output_format),
    }
}
