use serde::{Deserialize, Serialize};

use crate::service::MappingField;
use crate::types::{GrantTarget, Identity, PermissionGrant};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoResponse {
    #[serde(flatten)]
    pub user: Identity,
    pub is_root: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub password: String,
    pub new_password: String,
    pub confirm_new: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
}

/// Returned once on creation and on reset; the password is never stored in clear.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCredentialResponse {
    pub id: i64,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInstanceRequest {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateDatabaseRequest {
    pub iid: i64,
    pub name: String,
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub desc: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DatabaseListQuery {
    #[serde(default)]
    pub iid: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootUsersRequest {
    pub user_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    #[serde(flatten)]
    pub target: GrantTarget,
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    #[serde(flatten)]
    pub target: GrantTarget,
    pub allow: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deny: Vec<&'static str>,
}

impl From<PermissionGrant> for GrantResponse {
    fn from(g: PermissionGrant) -> Self {
        Self {
            target: g.target,
            allow: g.allow_bits.to_strings(),
            deny: g.deny_bits.to_strings(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct KafkaJsonMappingRequest {
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct KafkaJsonMappingResponse {
    pub data: Vec<MappingField>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}
