use std::sync::Arc;

use super::{PermissionRequest, WILDCARD};
use crate::error::Result;
use crate::store::Store;
use crate::types::{Acts, GrantTarget};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(String),
}

/// Decides non-root permission requests.
pub trait PolicyEngine: Send + Sync {
    fn decide(&self, req: &PermissionRequest) -> Result<PolicyDecision>;
}

/// Policy over the stored permission grants. Allowed acts from every matching
/// grant are expanded and merged, then denied acts are subtracted.
pub struct GrantPolicy {
    store: Arc<dyn Store>,
}

impl GrantPolicy {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

fn matches(pattern: &str, value: &str) -> bool {
    pattern == WILDCARD || pattern == value
}

fn applies_to(target: &GrantTarget, req: &PermissionRequest) -> bool {
    target.object_type == req.object_type
        && matches(&target.object_idx, &req.object_idx)
        && matches(&target.sub_resource, &req.sub_resource)
        && matches(&target.domain_type, &req.domain_type)
        && matches(&target.domain_id, &req.domain_id)
}

impl PolicyEngine for GrantPolicy {
    fn decide(&self, req: &PermissionRequest) -> Result<PolicyDecision> {
        let mut allow = Acts::default();
        let mut deny = Acts::default();

        for grant in self.store.list_user_grants(req.user_id)? {
            if !applies_to(&grant.target, req) {
                continue;
            }
            allow = allow.union(grant.allow_bits.expand_implied());
            deny = deny.union(grant.deny_bits);
        }

        let effective = allow.difference(deny);
        if effective.has(req.acts) {
            return Ok(PolicyDecision::Allow);
        }

        Ok(PolicyDecision::Deny(format!(
            "user {} lacks [{}] on {}:{}/{} in {}:{}",
            req.user_id,
            req.acts.difference(effective),
            req.object_type,
            req.object_idx,
            req.sub_resource,
            req.domain_type,
            req.domain_id,
        )))
    }
}
