//! Offline token helpers.
//!
//! Nothing here checks a signature: `inspect` and `check` only read the payload,
//! so they answer "what would the role gate decide for these claims", not
//! "is this token valid".

use anyhow::Context;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use clap::Subcommand;
use serde_json::{json, Map, Value};

use crate::auth::{authorize_role, AuthzError, VerifiedToken};
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Print the header and payload of a JWT")]
    Inspect {
        #[arg(help = "Compact JWT")]
        token: String,
    },

    #[command(about = "Evaluate the realm-role gate against a JWT payload")]
    Check {
        #[arg(help = "Compact JWT")]
        token: String,
        #[arg(long, help = "Realm role to require")]
        role: String,
    },
}

pub fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Inspect { token } => {
            let (header, payload) = decode_unverified(&token)?;
            let data = json!({ "header": header, "payload": payload });
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&data)?),
                OutputFormat::Text => {
                    println!("header:  {}", serde_json::to_string_pretty(&data["header"])?);
                    println!("payload: {}", serde_json::to_string_pretty(&data["payload"])?);
                }
            }
            Ok(())
        }
        TokenCommands::Check { token, role } => {
            let (_, payload) = decode_unverified(&token)?;
            match gate_outcome(payload, &role) {
                Ok(subject) => output_success(
                    &output_format,
                    &format!("access allow {}", role),
                    Some(json!({ "status": 200, "subject": subject })),
                ),
                Err(e) => {
                    let (status, code) = match e {
                        AuthzError::MissingClaims => (401, "UNAUTHORIZED"),
                        AuthzError::RoleNotPresent { .. } => (403, "FORBIDDEN"),
                    };
                    let message = format!("{} ({})", e, status);
                    if output_format == OutputFormat::Json {
                        output_error(&output_format, &message, Some(code))?;
                    }
                    // Non-zero exit on deny
                    Err(anyhow::anyhow!(message))
                }
            }
        }
    }
}

/// Gate decision for `payload`, returning the subject on success
pub fn gate_outcome(payload: Map<String, Value>, role: &str) -> Result<Option<String>, AuthzError> {
    let token = VerifiedToken::new(payload);
    let claims = authorize_role(&token, role)?;
    Ok(claims.sub)
}

/// Split a compact JWT and decode its header and payload segments
pub fn decode_unverified(token: &str) -> anyhow::Result<(Value, Map<String, Value>)> {
    let mut parts = token.trim().split('.');
    let (Some(header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        anyhow::bail!("token is not a compact JWT (expected three dot-separated segments)");
    };

    let header: Value = decode_segment(header).context("invalid token header")?;
    let payload: Value = decode_segment(payload).context("invalid token payload")?;

    match payload {
        Value::Object(map) => Ok((header, map)),
        _ => anyhow::bail!("token payload is not a JSON object"),
    }
}

fn decode_segment(segment: &str) -> anyhow::Result<Value> {
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&bytes)?)
}
