//! Resolving the calling user from token claims.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use shift_core::{Identity, TokenClaims};
use shift_db::{Database, User};

use crate::Config;

/// Decodes the configured claims and returns the matching active user.
///
/// Unknown users are provisioned on first sight with the role and domain
/// carried by their token.
pub fn resolve_user(db: &mut Database, config: &Config, now: DateTime<Utc>) -> Result<User> {
    let Some(claims_path) = config.claims_path.as_deref() else {
        bail!("no token claims configured; pass --claims <PATH> or set claims_path");
    };
    let identity = load_identity(claims_path, config, now)?;

    let user = db
        .get_or_create_user(&identity)
        .context("failed to look up user")?;
    if !user.active {
        bail!("user {} is inactive", user.email);
    }
    tracing::debug!(user_id = user.id, role = %user.role, "resolved user");
    Ok(user)
}

fn load_identity(path: &Path, config: &Config, now: DateTime<Utc>) -> Result<Identity> {
    let payload = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read token claims from {}", path.display()))?;
    let claims = TokenClaims::from_json(&payload).context("failed to decode token claims")?;
    Identity::from_claims(&claims, &config.placenet, now).context("token claims rejected")
}

/// Fails unless `user` is an admin.
pub fn require_admin(user: &User) -> Result<()> {
    if !user.is_admin() {
        bail!("admin role required");
    }
    Ok(())
}
