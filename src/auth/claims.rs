use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Claims read from a verified identity token.
///
/// Only the fields the service looks at are modelled; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RealmAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

impl Claims {
    /// Read claims from a verified payload. Only `realm_access` has to be well
    /// formed; identity fields that are not strings are read as absent.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let text = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);

        let realm_access = match payload.get("realm_access") {
            None | Some(Value::Null) => None,
            Some(value) => Some(RealmAccess::deserialize(value)?),
        };

        Ok(Self {
            sub: text("sub"),
            preferred_username: text("preferred_username"),
            email: text("email"),
            realm_access,
        })
    }

    /// `realm_access.roles`, if the token carries it
    pub fn realm_roles(&self) -> Option<&[String]> {
        self.realm_access.as_ref()?.roles.as_deref()
    }

    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_roles()
            .map(|roles| roles.iter().any(|r| r == role))
            .unwrap_or(false)
    }
}
