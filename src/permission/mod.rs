mod policy;

use std::sync::Arc;

pub use policy::{GrantPolicy, PolicyDecision, PolicyEngine};

use crate::error::{Error, Result};
use crate::server::response::ApiError;
use crate::store::Store;
use crate::types::Acts;

pub const OBJECT_INSTANCE: &str = "instance";
pub const SUB_RESOURCE_LOG: &str = "log";
pub const DOMAIN_DATABASE: &str = "database";
pub const DOMAIN_TABLE: &str = "table";
pub const WILDCARD: &str = "*";

/// A (subject, object, sub-resource, acts, domain) permission question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    pub user_id: i64,
    pub object_type: String,
    pub object_idx: String,
    pub sub_resource: String,
    pub acts: Acts,
    pub domain_type: String,
    pub domain_id: String,
}

impl PermissionRequest {
    /// Log sub-resource of an instance, scoped to one database or table.
    #[must_use]
    pub fn instance_log(user_id: i64, iid: i64, acts: Acts, domain_type: &str, domain_id: i64) -> Self {
        Self {
            user_id,
            object_type: OBJECT_INSTANCE.to_string(),
            object_idx: iid.to_string(),
            sub_resource: SUB_RESOURCE_LOG.to_string(),
            acts,
            domain_type: domain_type.to_string(),
            domain_id: domain_id.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("user {0} is not a root user")]
    NotRoot(i64),

    #[error("{0}")]
    Denied(String),

    #[error(transparent)]
    Store(#[from] Error),
}

impl From<PermissionError> for ApiError {
    fn from(e: PermissionError) -> Self {
        match e {
            PermissionError::NotRoot(_) => {
                ApiError::forbidden("administrator privileges are required to access this api")
                    .with_data(format!("IsRootUser: {e}"))
            }
            PermissionError::Denied(reason) => {
                ApiError::forbidden("permission verification failed").with_data(reason)
            }
            PermissionError::Store(e) => {
                tracing::error!(error = %e, "permission check failed");
                ApiError::internal("permission verification failed")
            }
        }
    }
}

/// Root membership plus a pluggable policy for everyone else.
#[derive(Clone)]
pub struct PermissionManager {
    store: Arc<dyn Store>,
    policy: Arc<dyn PolicyEngine>,
}

impl PermissionManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, policy: Arc<dyn PolicyEngine>) -> Self {
        Self { store, policy }
    }

    /// Manager backed by the stored grants.
    #[must_use]
    pub fn with_grant_policy(store: Arc<dyn Store>) -> Self {
        let policy = Arc::new(GrantPolicy::new(store.clone()));
        Self::new(store, policy)
    }

    pub fn is_root_user(&self, uid: i64) -> std::result::Result<(), PermissionError> {
        if self.store.is_root_user(uid)? {
            Ok(())
        } else {
            Err(PermissionError::NotRoot(uid))
        }
    }

    /// Root users always pass; everyone else goes through the policy engine.
    pub fn check_normal_permission(
        &self,
        req: &PermissionRequest,
    ) -> std::result::Result<(), PermissionError> {
        if self.store.is_root_user(req.user_id)? {
            return Ok(());
        }
        match self.policy.decide(req)? {
            PolicyDecision::Allow => Ok(()),
            PolicyDecision::Deny(reason) => Err(PermissionError::Denied(reason)),
        }
    }

    /// Replaces the root membership with `ids`, deduplicated.
    pub fn grant_root_users(&self, ids: &[i64]) -> Result<()> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        self.store.replace_root_users(&ids)?;
        tracing::info!(target: "logdeck::audit", ?ids, "root users replaced");
        Ok(())
    }

    /// Adds one root user. Returns false when it was already a member.
    pub fn add_root_user(&self, uid: i64) -> Result<bool> {
        let added = self.store.add_root_user(uid)?;
        if added {
            tracing::info!(target: "logdeck::audit", uid, "root user added");
        }
        Ok(added)
    }

    pub fn root_user_ids(&self) -> Result<Vec<i64>> {
        self.store.list_root_users()
    }
}
