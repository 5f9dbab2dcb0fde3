use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::utils::{output_success, output_users};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum UsersCommands {
    #[command(about = "List users, optionally filtered by name")]
    List {
        #[arg(long, help = "Case-insensitive name substring")]
        name: Option<String>,
    },

    #[command(about = "Show one user")]
    Get {
        #[arg(help = "User ID")]
        id: u64,
    },

    #[command(about = "Create a user")]
    Create {
        #[arg(long, help = "Display name")]
        name: String,
        #[arg(long, help = "Email address")]
        email: String,
    },

    #[command(about = "Upload an avatar for a user")]
    Avatar {
        #[arg(help = "User ID")]
        id: u64,
        #[arg(help = "Image file to upload")]
        file: PathBuf,
        #[arg(long, help = "Also rename the user")]
        name: Option<String>,
    },
}

pub async fn handle(client: &ApiClient, cmd: UsersCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UsersCommands::List { name } => {
            let users = match name {
                Some(name) => {
                    let builder = client
                        .request(Method::GET, "/users/filter")?
                        .query(&[("name", name.as_str())]);
                    let data = client.send(builder).await?.into_data()?;
                    data["users"].clone()
                }
                None => client.get("/users").await?.into_data()?,
            };
            output_users(&output_format, &users)
        }
        UsersCommands::Get { id } => {
            let user = client.get(&format!("/users/{}", id)).await?.into_data()?;
            output_success(&output_format, &format!("User {}", id), Some(user))
        }
        UsersCommands::Create { name, email } => {
            let builder = client
                .request(Method::POST, "/users")?
                .json(&json!({ "name": name, "email": email }));
            let user = client.send(builder).await?.into_data()?;
            output_success(&output_format, &format!("Created user {}", user["id"]), Some(user))
        }
        UsersCommands::Avatar { id, file, name } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "avatar".to_string());

            let mut form = Form::new().part("avatar", Part::bytes(bytes).file_name(file_name));
            if let Some(name) = name {
                form = form.text("name", name);
            }

            let builder = client.request(Method::PUT, &format!("/users/{}", id))?.multipart(form);
            let user = client.send(builder).await?.into_data()?;
            output_success(&output_format, &format!("Updated avatar for user {}", id), Some(user))
        }
    }
}
