use std::sync::Arc;

use axum::extract::{Path, State};
use chrono::Utc;

use crate::auth::RequireRoot;
use crate::server::AppState;
use crate::server::dto::{GrantRequest, GrantResponse};
use crate::server::response::{ApiError, Envelope, JsonBody, StoreOptionExt, StoreResultExt};
use crate::server::validation::parse_id;
use crate::types::{Acts, GrantTarget, PermissionGrant};

// Path parameter names match the route: /base/users/{id}/grants

fn parse_acts(acts: &[String]) -> Result<Acts, ApiError> {
    Acts::parse_many(acts).ok_or_else(|| {
        ApiError::bad_request(format!("invalid act in [{}]", acts.join(", ")))
    })
}

fn validate_target(target: &GrantTarget) -> Result<(), ApiError> {
    let fields = [
        ("objectType", &target.object_type),
        ("objectIdx", &target.object_idx),
        ("subResource", &target.sub_resource),
        ("domainType", &target.domain_type),
        ("domainId", &target.domain_id),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(ApiError::bad_request(format!("{name} cannot be empty")));
        }
    }
    Ok(())
}

fn list_responses(state: &AppState, user_id: i64) -> Result<Vec<GrantResponse>, ApiError> {
    let grants = state
        .store
        .list_user_grants(user_id)
        .api_err("failed to list grants")?;
    Ok(grants.into_iter().map(GrantResponse::from).collect())
}

fn existing_user(state: &AppState, raw_id: &str) -> Result<i64, ApiError> {
    let id = parse_id(raw_id)?;
    state
        .store
        .get_user(id)
        .api_err("failed to load user")?
        .or_not_found("user not found")?;
    Ok(id)
}

pub async fn list_grants(
    _admin: RequireRoot,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Envelope<Vec<GrantResponse>>, ApiError> {
    let user_id = existing_user(&state, &user_id)?;
    Ok(Envelope::success(list_responses(&state, user_id)?))
}

pub async fn upsert_grant(
    RequireRoot(admin): RequireRoot,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    JsonBody(req): JsonBody<GrantRequest>,
) -> Result<Envelope<Vec<GrantResponse>>, ApiError> {
    let user_id = existing_user(&state, &user_id)?;
    validate_target(&req.target)?;

    let allow_bits = parse_acts(&req.allow)?;
    let deny_bits = parse_acts(&req.deny)?;
    if allow_bits.is_empty() && deny_bits.is_empty() {
        return Err(ApiError::bad_request("grant must allow or deny at least one act"));
    }

    let now = Utc::now().timestamp();
    let grant = PermissionGrant {
        user_id,
        target: req.target,
        allow_bits,
        deny_bits,
        ctime: now,
        utime: now,
    };
    state
        .store
        .upsert_grant(&grant)
        .api_err("failed to save grant")?;

    tracing::info!(
        target: "logdeck::audit",
        admin = admin.uid,
        user_id,
        object = %grant.target.object_type,
        object_idx = %grant.target.object_idx,
        allow = %allow_bits,
        deny = %deny_bits,
        "grant saved"
    );
    Ok(Envelope::success(list_responses(&state, user_id)?))
}

pub async fn delete_grant(
    RequireRoot(admin): RequireRoot,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    JsonBody(target): JsonBody<GrantTarget>,
) -> Result<Envelope<Vec<GrantResponse>>, ApiError> {
    let user_id = existing_user(&state, &user_id)?;
    let deleted = state
        .store
        .delete_grant(user_id, &target)
        .api_err("failed to delete grant")?;
    if !deleted {
        return Err(ApiError::not_found("grant not found"));
    }

    tracing::info!(target: "logdeck::audit", admin = admin.uid, user_id, object = %target.object_type, "grant deleted");
    Ok(Envelope::success(list_responses(&state, user_id)?))
}
