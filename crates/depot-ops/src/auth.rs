//! # Authentication and the Authorization Gate
//!
//! ## Authorization Gate
//! Guarded operations ask the gate for a credential. A dismissed prompt is
//! `Cancelled` and writes nothing. A secret matching any admin lets the
//! operation proceed. Anything else is audited as a `block` and returned as
//! `Unauthorized`.
//!
//! ## Session
//! The signed-in user is kept in memory and mirrored, without password, in
//! the `depot.session` key-value slot so a restart keeps the operator.

use std::collections::BTreeSet;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use depot_core::types::normalize_roles;
use depot_core::validation::validate_name;
use depot_core::{AuditAction, Supplier, User, ValidationError, LOCAL_SUPPLIER_ID};
use depot_db::Database;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::Depot;
use crate::error::{OpsError, OpsResult};

/// Key-value slot holding the sanitized signed-in user.
pub const SESSION_KEY: &str = "depot.session";

// =============================================================================
// Secrets
// =============================================================================

/// Hashes a password or PIN into an argon2 PHC string.
pub fn hash_secret(secret: &str) -> OpsResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| OpsError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Checks `presented` against a stored secret.
///
/// Stored values that parse as a PHC string are verified with argon2;
/// anything else is a legacy plaintext secret compared exactly.
pub fn verify_secret(stored: &str, presented: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(presented.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => stored == presented,
    }
}

/// Creates the reserved local supplier if it is missing.
pub async fn ensure_local_supplier(db: &Database) -> OpsResult<()> {
    if db.suppliers().get(LOCAL_SUPPLIER_ID).await?.is_none() {
        info!(id = LOCAL_SUPPLIER_ID, "Creating local supplier");
        db.suppliers().put(&Supplier::local()).await?;
    }
    Ok(())
}

/// Input for [`Depot::create_user`].
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub roles: Vec<String>,
    pub password: Option<String>,
}

impl Depot {
    // =========================================================================
    // Authorization Gate
    // =========================================================================

    /// Challenges for an admin secret before `operation` on
    /// `entity`/`entity_id`.
    ///
    /// ## Errors
    /// - [`OpsError::Cancelled`] if the prompt is dismissed
    /// - [`OpsError::Unauthorized`] if no admin secret matches; a `block`
    ///   audit entry is written first
    pub async fn authorize(&self, operation: &str, entity: &str, entity_id: &str) -> OpsResult<()> {
        let presented = self
            .gate
            .credential(
                "Authorization required",
                &format!("Enter an administrator password to {operation}"),
            )
            .await
            .ok_or_else(|| OpsError::cancelled(operation))?;

        let admins = self
            .db
            .users()
            .filter(|u| u.is_admin() && u.password.is_some())
            .await?;

        let granted_by = admins.iter().find(|admin| {
            admin
                .password
                .as_deref()
                .is_some_and(|stored| verify_secret(stored, &presented))
        });

        match granted_by {
            Some(admin) => {
                info!(
                    operation = %operation,
                    entity = %entity,
                    entity_id = %entity_id,
                    admin = %admin.username,
                    "Authorization granted"
                );
                Ok(())
            }
            None => {
                warn!(operation = %operation, entity = %entity, entity_id = %entity_id, "Authorization denied");
                self.audit
                    .record(
                        &self.actor(),
                        AuditAction::Block,
                        entity,
                        entity_id,
                        json!({ "operation": operation, "reason": "credential mismatch" }).to_string(),
                    )
                    .await?;
                Err(OpsError::unauthorized(operation))
            }
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Signs in `username`. Users with a password are challenged for it.
    ///
    /// Returns `Ok(None)` for an unknown username.
    pub async fn login(&self, username: &str) -> OpsResult<Option<User>> {
        let username = username.trim();
        let Some(user) = self
            .db
            .users()
            .filter(|u| u.username.eq_ignore_ascii_case(username))
            .await?
            .into_iter()
            .next()
        else {
            debug!(username = %username, "Login for unknown user");
            return Ok(None);
        };

        if let Some(stored) = user.password.as_deref() {
            let presented = self
                .gate
                .credential(
                    &format!("Sign in as {}", user.display_name()),
                    "Password",
                )
                .await
                .ok_or_else(|| OpsError::cancelled("sign in"))?;

            if !verify_secret(stored, &presented) {
                warn!(username = %user.username, "Login failed");
                self.audit
                    .record(
                        &crate::audit::Actor::from_user(&user),
                        AuditAction::Block,
                        "session",
                        &user.id,
                        "login: credential mismatch",
                    )
                    .await?;
                return Err(OpsError::unauthorized("sign in"));
            }
        }

        let session = user.sanitized();
        self.db.kv().set(SESSION_KEY, &session).await?;
        self.set_current_user(Some(session.clone()));

        info!(username = %session.username, roles = ?session.roles, "Signed in");
        Ok(Some(session))
    }

    /// Picks up the persisted session, dropping it if the user no longer
    /// exists.
    pub async fn restore_session(&self) -> OpsResult<Option<User>> {
        let Some(saved) = self.db.kv().get::<User>(SESSION_KEY).await? else {
            return Ok(None);
        };

        match self.db.users().get(&saved.id).await? {
            Some(user) => {
                let session = user.sanitized();
                self.set_current_user(Some(session.clone()));
                debug!(username = %session.username, "Session restored");
                Ok(Some(session))
            }
            None => {
                warn!(user_id = %saved.id, "Dropping session of a deleted user");
                self.db.kv().remove(SESSION_KEY).await?;
                self.set_current_user(None);
                Ok(None)
            }
        }
    }

    pub async fn logout(&self) -> OpsResult<()> {
        self.db.kv().remove(SESSION_KEY).await?;
        if let Some(user) = self.current_user() {
            info!(username = %user.username, "Signed out");
        }
        self.set_current_user(None);
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Creates a user. The password, if any, is stored as an argon2 hash.
    pub async fn create_user(&self, new: NewUser) -> OpsResult<User> {
        validate_name("username", &new.username)?;
        let username = new.username.trim().to_string();

        let taken = self
            .db
            .users()
            .filter(|u| u.username.eq_ignore_ascii_case(&username))
            .await?;
        if !taken.is_empty() {
            return Err(ValidationError::Duplicate {
                field: "username".to_string(),
                value: username,
            }
            .into());
        }

        let roles: BTreeSet<String> = normalize_roles(new.roles);
        let password = match new.password.filter(|p| !p.is_empty()) {
            Some(secret) => Some(hash_secret(&secret)?),
            None => None,
        };

        let user = User {
            id: Uuid::new_v4().to_string(),
            username,
            name: new.name.trim().to_string(),
            roles,
            password,
        };
        self.db.users().add(&user).await?;

        self.audit
            .record(
                &self.actor(),
                AuditAction::Create,
                "user",
                &user.id,
                json!({ "username": user.username, "roles": user.roles }).to_string(),
            )
            .await?;

        Ok(user.sanitized())
    }

    /// Deletes a user. Returns `Ok(false)` if there was none.
    pub async fn delete_user(&self, id: &str) -> OpsResult<bool> {
        let Some(user) = self.db.users().get(id).await? else {
            return Ok(false);
        };

        if self.current_user().is_some_and(|u| u.id == user.id) {
            self.logout().await?;
        }

        self.db.users().delete(id).await?;
        self.audit
            .record(&self.actor(), AuditAction::Delete, "user", id, user.username)
            .await?;
        Ok(true)
    }
}
