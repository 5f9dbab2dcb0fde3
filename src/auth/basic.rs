use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::config::BasicAuthConfig;

/// Username and password decoded from an `Authorization: Basic ...` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl BasicCredentials {
    pub fn parse(header_value: &str) -> Option<Self> {
        let (scheme, encoded) = header_value.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("basic") {
            return None;
        }

        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;

        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn matches(&self, expected: &BasicAuthConfig) -> bool {
        self.username == expected.username && self.password == expected.password
    }
}
