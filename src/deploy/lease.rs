// ABOUTME: Deploy lease that keeps two mutating commands off the same environment.
// ABOUTME: Stored in the color state store with put-if-absent; stale after one hour.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cloud::ColorStateStore;
use crate::types::EnvironmentName;

use super::{DeployError, LeaseHolderInfo};

/// Information about who holds a deploy lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseInfo {
    /// Hostname of the machine that holds the lease.
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub environment: String,
    /// Command the holder is running.
    pub command: String,
}

impl LeaseInfo {
    /// Create new lease info for the current process.
    pub fn new(environment: &EnvironmentName, command: &str) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            environment: environment.to_string(),
            command: command.to_string(),
        }
    }

    /// Check if this lease is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    fn holder_info(&self) -> LeaseHolderInfo {
        LeaseHolderInfo {
            environment: self.environment.clone(),
            holder: self.holder.clone(),
            pid: self.pid,
            started_at: self.started_at,
            command: self.command.clone(),
        }
    }
}

/// A held deploy lease. Call `release()` when done.
pub struct DeployLease<'a> {
    store: &'a dyn ColorStateStore,
    environment: EnvironmentName,
}

impl std::fmt::Debug for DeployLease<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLease")
            .field("environment", &self.environment)
            .finish()
    }
}

impl<'a> DeployLease<'a> {
    /// Acquire the lease for `environment`.
    ///
    /// Returns an error if another process holds it. Stale leases (>1 hour)
    /// are broken with a warning; `force` breaks any lease.
    pub async fn acquire(
        store: &'a dyn ColorStateStore,
        environment: &EnvironmentName,
        command: &str,
        force: bool,
    ) -> Result<Self, DeployError> {
        let info = LeaseInfo::new(environment, command);
        let record = serde_json::to_string(&info)
            .map_err(|e| DeployError::lease_error(format!("failed to serialize lease: {e}")))?;

        if Self::try_create(store, environment, &record).await? {
            return Ok(Self::held(store, environment));
        }

        let existing = store
            .read_lease(environment)
            .await
            .map_err(|e| DeployError::lease_error(format!("failed to read lease: {e}")))?;
        if !Self::should_break(existing.as_deref(), force)? {
            return Err(DeployError::lease_error(
                "lease held by another process".to_string(),
            ));
        }

        tracing::debug!(%environment, "removing stale or forced deploy lease");
        store
            .remove_lease(environment)
            .await
            .map_err(|e| DeployError::lease_error(format!("failed to break lease: {e}")))?;

        if !Self::try_create(store, environment, &record).await? {
            return Err(DeployError::lease_error(
                "lease acquired by another process during break".to_string(),
            ));
        }
        Ok(Self::held(store, environment))
    }

    fn held(store: &'a dyn ColorStateStore, environment: &EnvironmentName) -> Self {
        tracing::debug!(%environment, "deploy lease acquired");
        Self {
            store,
            environment: environment.clone(),
        }
    }

    async fn try_create(
        store: &dyn ColorStateStore,
        environment: &EnvironmentName,
        record: &str,
    ) -> Result<bool, DeployError> {
        store
            .create_lease(environment, record)
            .await
            .map_err(|e| DeployError::lease_error(format!("failed to acquire lease: {e}")))
    }

    /// Decide whether an existing lease may be broken. A live lease held by
    /// someone else is returned as `LeaseHeld`.
    fn should_break(existing: Option<&str>, force: bool) -> Result<bool, DeployError> {
        let Some(raw) = existing else {
            // Released between our attempt and the read.
            return Ok(true);
        };
        match serde_json::from_str::<LeaseInfo>(raw) {
            Ok(lease) if force => {
                tracing::warn!(
                    "Breaking lease held by {} (pid {}) since {}",
                    lease.holder,
                    lease.pid,
                    lease.started_at
                );
                Ok(true)
            }
            Ok(lease) if lease.is_stale() => {
                tracing::warn!(
                    "Auto-breaking stale lease held by {} (pid {}) since {}",
                    lease.holder,
                    lease.pid,
                    lease.started_at
                );
                Ok(true)
            }
            Ok(lease) => Err(DeployError::lease_held(lease.holder_info())),
            Err(_) => {
                tracing::warn!("Lease info corrupted, breaking lease");
                Ok(true)
            }
        }
    }

    /// Release the lease.
    pub async fn release(self) -> Result<(), DeployError> {
        self.store
            .remove_lease(&self.environment)
            .await
            .map_err(|e| DeployError::lease_error(format!("failed to release lease: {e}")))?;
        tracing::debug!(environment = %self.environment, "deploy lease released");
        Ok(())
    }
}
