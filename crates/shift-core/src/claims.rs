//! Decoding of verified token payloads.
//!
//! Tokens arrive in more than one historical shape. Each supported shape has
//! exactly one decoder; anything else is rejected with a [`ClaimsError`].
//! Signature verification happens before this module is involved.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Fields that mark the native Shift payload.
const SHIFT_MARKERS: [&str; 3] = ["userId", "email", "name"];
/// Field that marks a Placenet payload.
const PLACENET_MARKER: &str = "avatar_id";
/// camelCase fields from an older Placenet payload that is no longer accepted.
const DEPRECATED_MARKERS: [&str; 3] = ["avatarId", "domainId", "tenantId"];

/// Role granted to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Worker,
    Admin,
}

impl Role {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClaimsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "worker" => Ok(Self::Worker),
            "admin" => Ok(Self::Admin),
            _ => Err(ClaimsError::InvalidRole(s.to_string())),
        }
    }
}

/// Settings for accepting Placenet tokens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacenetConfig {
    pub enabled: bool,
    /// Any of these tags on the user grants [`Role::Admin`].
    pub admin_tags: Vec<String>,
    pub default_role: Role,
}

/// Errors produced while decoding a token payload.
#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("token payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("token payload must be a JSON object")]
    NotAnObject,

    #[error("token payload uses the retired `{field}` field naming; reissue the token")]
    DeprecatedShape { field: &'static str },

    #[error("token payload does not match any known shape")]
    UnrecognizedShape,

    #[error("invalid {shape} token payload: {source}")]
    Invalid {
        shape: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("token payload is missing `{0}`")]
    MissingField(&'static str),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("Placenet tokens are not accepted (integration disabled)")]
    PlacenetDisabled,

    #[error("token expired at {0}")]
    Expired(DateTime<Utc>),
}

/// Native payload issued by Shift itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShiftClaims {
    #[serde(rename = "userId", default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Payload issued by the Placenet host platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlacenetClaims {
    pub avatar_id: String,
    #[serde(default)]
    pub avatar_name: Option<String>,
    #[serde(default)]
    pub avatar_email: Option<String>,
    #[serde(default)]
    pub domain_id: Option<String>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub domain_tags: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// A decoded payload, one variant per accepted shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenClaims {
    Shift(ShiftClaims),
    Placenet(PlacenetClaims),
}

impl TokenClaims {
    /// Parses and decodes a JSON payload.
    pub fn from_json(payload: &str) -> Result<Self, ClaimsError> {
        let value: Value = serde_json::from_str(payload).map_err(ClaimsError::Json)?;
        Self::decode(&value)
    }

    /// Picks the decoder for the payload's shape.
    pub fn decode(payload: &Value) -> Result<Self, ClaimsError> {
        let fields = payload.as_object().ok_or(ClaimsError::NotAnObject)?;

        if SHIFT_MARKERS.iter().any(|key| fields.contains_key(*key)) {
            let claims: ShiftClaims = decode_shape(fields, "shift")?;
            if claims.email.is_empty() {
                return Err(ClaimsError::MissingField("email"));
            }
            if claims.name.is_empty() {
                return Err(ClaimsError::MissingField("name"));
            }
            return Ok(Self::Shift(claims));
        }

        if fields.contains_key(PLACENET_MARKER) {
            return decode_shape(fields, "placenet").map(Self::Placenet);
        }

        if let Some(field) = DEPRECATED_MARKERS
            .into_iter()
            .find(|key| fields.contains_key(*key))
        {
            return Err(ClaimsError::DeprecatedShape { field });
        }

        Err(ClaimsError::UnrecognizedShape)
    }

    /// Expiry instant from the `exp` claim, if any.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = match self {
            Self::Shift(claims) => claims.exp,
            Self::Placenet(claims) => claims.exp,
        }?;
        DateTime::from_timestamp(exp, 0)
    }
}

fn decode_shape<T: DeserializeOwned>(
    fields: &Map<String, Value>,
    shape: &'static str,
) -> Result<T, ClaimsError> {
    serde_json::from_value(Value::Object(fields.clone()))
        .map_err(|source| ClaimsError::Invalid { shape, source })
}

/// Who the caller is, independent of the token shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
}

impl Identity {
    /// Normalizes decoded claims, checking expiry against `now`.
    pub fn from_claims(
        claims: &TokenClaims,
        placenet: &PlacenetConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, ClaimsError> {
        if let Some(expires_at) = claims.expires_at().filter(|at| *at <= now) {
            return Err(ClaimsError::Expired(expires_at));
        }

        match claims {
            TokenClaims::Shift(claims) => Ok(Self {
                email: claims.email.clone(),
                name: claims.name.clone(),
                role: claims.role.unwrap_or_default(),
                domain_id: None,
                domain_name: None,
            }),
            TokenClaims::Placenet(claims) => {
                if !placenet.enabled {
                    return Err(ClaimsError::PlacenetDisabled);
                }
                Ok(Self::from_placenet(claims, placenet))
            }
        }
    }

    fn from_placenet(claims: &PlacenetClaims, placenet: &PlacenetConfig) -> Self {
        let tags = claims
            .domain_tags
            .as_deref()
            .or(claims.tags.as_deref())
            .unwrap_or_default();
        let is_admin = claims.role.as_deref() == Some("admin")
            || tags.iter().any(|tag| placenet.admin_tags.contains(tag));

        Self {
            email: claims
                .avatar_email
                .clone()
                .unwrap_or_else(|| format!("{}@placenet.local", claims.avatar_id)),
            name: claims
                .avatar_name
                .clone()
                .unwrap_or_else(|| "Usuario".to_string()),
            role: if is_admin {
                Role::Admin
            } else {
                placenet.default_role
            },
            domain_id: claims.domain_id.clone(),
            domain_name: claims.domain_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    fn placenet_enabled() -> PlacenetConfig {
        PlacenetConfig {
            enabled: true,
            admin_tags: vec!["hr".to_string()],
            default_role: Role::Worker,
        }
    }

    #[test]
    fn decodes_shift_payload() {
        let claims = TokenClaims::from_json(
            r#"{"userId": 4, "email": "ana@example.com", "name": "Ana", "role": "admin"}"#,
        )
        .unwrap();

        let identity = Identity::from_claims(&claims, &PlacenetConfig::default(), now()).unwrap();

        assert_eq!(identity.email, "ana@example.com");
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn shift_payload_defaults_to_worker() {
        let claims =
            TokenClaims::from_json(r#"{"email": "bo@example.com", "name": "Bo"}"#).unwrap();

        let identity = Identity::from_claims(&claims, &PlacenetConfig::default(), now()).unwrap();

        assert_eq!(identity.role, Role::Worker);
    }

    #[test]
    fn shift_payload_requires_email() {
        let err = TokenClaims::from_json(r#"{"userId": 4, "name": "Ana"}"#).unwrap_err();
        assert!(matches!(err, ClaimsError::MissingField("email")));
    }

    #[test]
    fn shift_payload_rejects_unknown_role() {
        let err = TokenClaims::from_json(r#"{"email": "a@b.c", "name": "A", "role": "owner"}"#)
            .unwrap_err();
        assert!(matches!(err, ClaimsError::Invalid { shape: "shift", .. }));
    }

    #[test]
    fn placenet_payload_is_normalized() {
        let claims = TokenClaims::from_json(
            r#"{"avatar_id": "av-17", "domain_id": "d1", "domain_name": "Acme", "tags": ["hr"]}"#,
        )
        .unwrap();

        let identity = Identity::from_claims(&claims, &placenet_enabled(), now()).unwrap();

        assert_eq!(
            identity,
            Identity {
                email: "av-17@placenet.local".to_string(),
                name: "Usuario".to_string(),
                role: Role::Admin,
                domain_id: Some("d1".to_string()),
                domain_name: Some("Acme".to_string()),
            }
        );
    }

    #[test]
    fn placenet_domain_tags_take_precedence_over_tags() {
        let claims = TokenClaims::from_json(
            r#"{"avatar_id": "7", "avatar_email": "x@acme.test", "avatar_name": "X",
                "domain_tags": ["staff"], "tags": ["hr"]}"#,
        )
        .unwrap();

        let identity = Identity::from_claims(&claims, &placenet_enabled(), now()).unwrap();

        assert_eq!(identity.role, Role::Worker);
        assert_eq!(identity.email, "x@acme.test");
    }

    #[test]
    fn placenet_payload_rejected_when_disabled() {
        let claims = TokenClaims::from_json(r#"{"avatar_id": "7"}"#).unwrap();

        let err = Identity::from_claims(&claims, &PlacenetConfig::default(), now()).unwrap_err();

        assert!(matches!(err, ClaimsError::PlacenetDisabled));
    }

    #[test]
    fn camel_case_placenet_payload_is_deprecated() {
        let err = TokenClaims::from_json(r#"{"avatarId": "7", "domainId": "d"}"#).unwrap_err();
        assert!(matches!(
            err,
            ClaimsError::DeprecatedShape { field: "avatarId" }
        ));
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert!(matches!(
            TokenClaims::from_json(r#"{"sub": "42"}"#).unwrap_err(),
            ClaimsError::UnrecognizedShape
        ));
        assert!(matches!(
            TokenClaims::from_json("[1, 2]").unwrap_err(),
            ClaimsError::NotAnObject
        ));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        // 2024-01-01T00:00:00Z
        let claims =
            TokenClaims::from_json(r#"{"email": "a@b.c", "name": "A", "exp": 1704067200}"#)
                .unwrap();

        let err = Identity::from_claims(&claims, &PlacenetConfig::default(), now()).unwrap_err();

        assert_eq!(err.to_string(), "token expired at 2024-01-01 00:00:00 UTC");
    }
}
