use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(data_value) = data {
                print_value(&data_value);
            }
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Output a list of user records
pub fn output_users(output_format: &OutputFormat, users: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(users)?),
        OutputFormat::Text => {
            let rows = users.as_array().cloned().unwrap_or_default();
            if rows.is_empty() {
                println!("No users found");
                return Ok(());
            }
            println!("{:<6} {:<24} {:<32} AVATAR", "ID", "NAME", "EMAIL");
            for user in rows {
                println!("{}", user_row(&user));
            }
        }
    }
    Ok(())
}

pub fn user_row(user: &Value) -> String {
    format!(
        "{:<6} {:<24} {:<32} {}",
        user["id"],
        user["name"].as_str().unwrap_or_default(),
        user["email"].as_str().unwrap_or_default(),
        user["avatar"].as_str().unwrap_or("-"),
    )
}

fn print_value(value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                match v {
                    Value::String(s) => println!("  {}: {}", key, s),
                    other => println!("  {}: {}", key, other),
                }
            }
        }
        other => println!("  {}", other),
    }
}
