use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub oidc: OidcConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    pub enabled: bool,
    pub issuer_url: String,
    pub client_id: String,
    /// JWS algorithms accepted from the identity provider (e.g. RS256)
    pub algorithms: Vec<String>,
    pub http_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Run field validation on bound request bodies
    pub validate_input: bool,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    /// Empty list means any origin
    pub cors_origins: Vec<String>,
    pub basic_auth: Option<BasicAuthConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("USER_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("SERVER_UPLOAD_DIR") {
            self.server.upload_dir = v;
        }
        if let Ok(v) = env::var("SERVER_MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = v.parse().unwrap_or(self.server.max_upload_bytes);
        }

        // OIDC overrides
        if let Ok(v) = env::var("OIDC_ENABLED") {
            self.oidc.enabled = v.parse().unwrap_or(self.oidc.enabled);
        }
        if let Ok(v) = env::var("OIDC_ISSUER_URL") {
            self.oidc.issuer_url = v;
        }
        if let Ok(v) = env::var("OIDC_CLIENT_ID") {
            self.oidc.client_id = v;
        }
        if let Ok(v) = env::var("OIDC_ALGORITHMS") {
            self.oidc.algorithms = split_list(&v);
        }
        if let Ok(v) = env::var("OIDC_HTTP_TIMEOUT_SECS") {
            self.oidc.http_timeout_secs = v.parse().unwrap_or(self.oidc.http_timeout_secs);
        }

        // API overrides
        if let Ok(v) = env::var("API_VALIDATE_INPUT") {
            self.api.validate_input = v.parse().unwrap_or(self.api.validate_input);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = split_list(&v);
        }
        if let (Ok(username), Ok(password)) = (
            env::var("SECURITY_BASIC_AUTH_USER"),
            env::var("SECURITY_BASIC_AUTH_PASSWORD"),
        ) {
            if !username.is_empty() {
                self.security.basic_auth = Some(BasicAuthConfig { username, password });
            }
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8001,
                upload_dir: "./uploads".to_string(),
                max_upload_bytes: 10 * 1024 * 1024, // 10MB
            },
            oidc: OidcConfig {
                enabled: true,
                issuer_url: "http://localhost:8080/realms/develop".to_string(),
                client_id: "api-secure".to_string(),
                algorithms: vec!["RS256".to_string()],
                http_timeout_secs: 10,
            },
            api: ApiConfig {
                validate_input: true,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: Vec::new(),
                basic_auth: None,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                port: 8001,
                upload_dir: "/var/lib/user-api/uploads".to_string(),
                max_upload_bytes: 2 * 1024 * 1024, // 2MB
            },
            oidc: OidcConfig {
                enabled: true,
                issuer_url: "http://localhost:8080/realms/develop".to_string(),
                client_id: "api-secure".to_string(),
                algorithms: vec!["RS256".to_string()],
                http_timeout_secs: 5,
            },
            api: ApiConfig {
                validate_input: true,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                basic_auth: None,
            },
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
