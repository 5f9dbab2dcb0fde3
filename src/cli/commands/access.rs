use serde::Serialize;
use serde_json::Value;

use crate::cli::client::ApiClient;
use crate::cli::OutputFormat;

const PROTECTED_ROUTES: [&str; 3] = ["/private", "/admin", "/user"];

#[derive(Debug, Serialize)]
struct ProbeResult {
    route: &'static str,
    status: u16,
    message: String,
}

/// Call each protected route with the token and report what the gate decided
pub async fn handle(client: &ApiClient, token: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut results = Vec::with_capacity(PROTECTED_ROUTES.len());

    for route in PROTECTED_ROUTES {
        let builder = client.request(reqwest::Method::GET, route)?.bearer_auth(token);
        let reply = client.send(builder).await?;

        let message = if reply.status.is_success() {
            reply.body["data"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| reply.body["data"].to_string())
        } else {
            reply.error_message()
        };

        results.push(ProbeResult {
            route,
            status: reply.status.as_u16(),
            message,
        });
    }

    match output_format {
        OutputFormat::Json => {
            let value: Value = serde_json::to_value(&results)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            for result in &results {
                println!("{:<10} {}  {}", result.route, result.status, result.message);
            }
        }
    }

    Ok(())
}
