//! JWT inspection without verification.
//!
//! These functions read the payload of a compact JWT (`header.payload.signature`)
//! and nothing more. The signature is never checked, so claims decoded here
//! are advisory: good enough to pick a page or skip a doomed request, never a
//! security boundary. The backend re-validates the token on every privileged
//! call and is the only authority on whether it is genuine.
//!
//! Every function is total. A malformed token decodes to `None` and counts
//! as expired.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Decoded payload. Built fresh from the token each time it is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JwtClaims {
    pub subject_id: Option<String>,
    pub email: Option<String>,
    pub roles: BTreeSet<String>,
    /// Seconds since epoch.
    pub issued_at: Option<i64>,
    /// Seconds since epoch.
    pub expires_at: Option<i64>,
}

impl JwtClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        match self.expires_at {
            Some(exp) => now_secs >= exp,
            None => true,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClaims {
    uuid: Option<StringOrNumber>,
    subject_id: Option<StringOrNumber>,
    sub: Option<StringOrNumber>,
    email: Option<String>,
    #[serde(default, deserialize_with = "roles_from_any")]
    roles: BTreeSet<String>,
    iat: Option<i64>,
    exp: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(i64),
}

impl StringOrNumber {
    fn into_string(self) -> String {
        match self {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Num(n) => n.to_string(),
        }
    }
}

fn roles_from_any<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Roles {
        Many(Vec<String>),
        One(String),
        Missing(Option<()>),
    }
    Ok(match Roles::deserialize(d)? {
        Roles::Many(v) => v.into_iter().collect(),
        Roles::One(s) => BTreeSet::from([s]),
        Roles::Missing(_) => BTreeSet::new(),
    })
}

/// Decodes the payload segment. `None` unless the token has exactly three
/// segments and the middle one is base64url JSON.
pub fn decode(token: &str) -> Option<JwtClaims> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        debug!("Token rejected: not a three-segment compact JWT");
        return None;
    };

    let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
        Ok(b) => b,
        Err(e) => {
            debug!("Token rejected: payload is not base64url: {}", e);
            return None;
        }
    };
    let raw: RawClaims = match serde_json::from_slice(&bytes) {
        Ok(c) => c,
        Err(e) => {
            debug!("Token rejected: payload is not a claims object: {}", e);
            return None;
        }
    };

    Some(JwtClaims {
        subject_id: raw
            .uuid
            .or(raw.subject_id)
            .or(raw.sub)
            .map(StringOrNumber::into_string),
        email: raw.email,
        roles: raw.roles,
        issued_at: raw.iat,
        expires_at: raw.exp,
    })
}

/// Fail-closed: undecodable tokens and tokens without `exp` are expired.
pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, Utc::now().timestamp())
}

pub fn is_expired_at(token: &str, now_secs: i64) -> bool {
    decode(token).map_or(true, |c| c.is_expired_at(now_secs))
}

pub fn expires_at(token: &str) -> Option<i64> {
    decode(token).and_then(|c| c.expires_at)
}

/// Seconds left before expiry, `None` when expired or undecodable.
pub fn seconds_until_expiry(token: &str) -> Option<i64> {
    let remaining = expires_at(token)? - Utc::now().timestamp();
    (remaining > 0).then_some(remaining)
}

pub fn get_subject_id(token: &str) -> Option<String> {
    decode(token).and_then(|c| c.subject_id)
}

pub fn get_email(token: &str) -> Option<String> {
    decode(token).and_then(|c| c.email)
}

pub fn get_roles(token: &str) -> BTreeSet<String> {
    decode(token).map(|c| c.roles).unwrap_or_default()
}
