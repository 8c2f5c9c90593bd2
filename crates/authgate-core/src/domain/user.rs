//! User as seen by the client

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use authgate_security::JwtClaims;

/// `user` object of the login/register responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
}

impl UserInfo {
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => self.email.clone(),
        }
    }
}

fn id_from_any<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(i64),
    }
    Ok(match Id::deserialize(d)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}

/// Result of `get_current_user`: claims of the token currently in storage,
/// plus the stored profile when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub claims: JwtClaims,
    pub profile: Option<UserInfo>,
}

impl CurrentUser {
    pub fn id(&self) -> Option<&str> {
        self.claims
            .subject_id
            .as_deref()
            .or(self.profile.as_ref().map(|p| p.id.as_str()))
    }

    pub fn email(&self) -> Option<&str> {
        self.claims
            .email
            .as_deref()
            .or(self.profile.as_ref().map(|p| p.email.as_str()))
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.claims.roles
    }
}
