pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use client::ApiClient;

#[derive(Parser)]
#[command(name = "users")]
#[command(about = "Users CLI - command-line client for the User API")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = "USER_API_URL",
        default_value = "http://localhost:8001",
        help = "Base URL of the User API"
    )]
    pub server: String,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, env = "USER_API_BASIC_USER", help = "Basic auth user for /users routes")]
    pub basic_user: Option<String>,

    #[arg(long, global = true, env = "USER_API_BASIC_PASSWORD", help = "Basic auth password")]
    pub basic_password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "User records and avatars")]
    Users {
        #[command(subcommand)]
        cmd: commands::users::UsersCommands,
    },

    #[command(about = "Probe /private, /admin and /user with a bearer token")]
    Access {
        #[arg(long, env = "USER_API_TOKEN", help = "Bearer token")]
        token: String,
    },

    #[command(about = "Offline token inspection")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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
        Commands::Users { cmd } => {
            let basic = cli.basic_user.map(|user| (user, cli.basic_password.unwrap_or_default()));
            let client = ApiClient::new(&cli.server, basic)?;
            commands::users::handle(&client, cmd, output_format).await
        }
        Commands::Access { token } => {
            let client = ApiClient::new(&cli.server, None)?;
            commands::access::handle(&client, &token, output_format).await
        }
        Commands::Token { cmd } => commands::token::handle(cmd, output_format),
    }
}
