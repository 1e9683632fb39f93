//! Startup provisioning.

use crate::config::AuthConfig;
use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use yardim_registry::{check_new_user, AidStore, NewUserProfile, Role};

/// Create the configured administrator if it does not exist yet.
///
/// Returns `true` when a profile was created.
pub async fn ensure_admin(store: &dyn AidStore, auth: &AuthConfig) -> Result<bool> {
    let Some(id) = auth.bootstrap_admin_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    else {
        debug!("No bootstrap administrator configured");
        return Ok(false);
    };

    if let Some(existing) = store
        .user(id)
        .await
        .context("Failed to look up bootstrap administrator")?
    {
        if existing.role != Role::Administrator {
            bail!("Bootstrap user {} exists with role {}", id, existing.role);
        }
        debug!(user_id = %id, "Bootstrap administrator already present");
        return Ok(false);
    }

    let Some(email) = auth.bootstrap_admin_email.as_deref() else {
        bail!("AUTH__BOOTSTRAP_ADMIN_EMAIL is required when AUTH__BOOTSTRAP_ADMIN_ID is set");
    };

    let profile = NewUserProfile {
        id: id.to_string(),
        full_name: auth.bootstrap_admin_name.clone(),
        email: email.to_string(),
        role: Role::Administrator,
        neighborhood_id: None,
    };
    check_new_user(&profile).context("Invalid bootstrap administrator")?;

    store
        .create_user(&profile)
        .await
        .context("Failed to create bootstrap administrator")?;
    info!(user_id = %id, "Bootstrap administrator created");
    Ok(true)
}
