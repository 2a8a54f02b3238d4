use std::fmt;

use serde::{Deserialize, Serialize};

use super::Acts;

/// Id of the administrator created by the install step.
pub const DEFAULT_ADMIN_ID: i64 = 1;
pub const DEFAULT_ADMIN_USERNAME: &str = "logdeck";
pub const DEFAULT_ADMIN_PASSWORD: &str = "logdeck";

pub const ANONYMOUS_USER_ID: i64 = 999_999;
pub const ANONYMOUS_USERNAME: &str = "anonymous";

pub const ACCESS_PASSWORD: &str = "password";
pub const ACCESS_PROXY: &str = "auth.proxy";
pub const ACCESS_ANONYMOUS: &str = "anonymous";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub avatar: String,
    #[serde(skip)]
    pub password: String,
    pub access: String,
    pub ctime: i64,
    pub utime: i64,
    #[serde(skip)]
    pub dtime: i64,
}

/// The authenticated caller of a request, independent of how it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: i64,
    pub username: String,
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub access: String,
}

impl Identity {
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            uid: ANONYMOUS_USER_ID,
            username: ANONYMOUS_USERNAME.to_string(),
            nickname: ANONYMOUS_USERNAME.to_string(),
            email: String::new(),
            avatar: String::new(),
            access: ACCESS_ANONYMOUS.to_string(),
        }
    }
}

impl From<&User> for Identity {
    fn from(u: &User) -> Self {
        Self {
            uid: u.id,
            username: u.username.clone(),
            nickname: u.nickname.clone(),
            email: u.email.clone(),
            avatar: u.avatar.clone(),
            access: u.access.clone(),
        }
    }
}

/// An analytical engine endpoint that owns databases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub cluster: String,
    pub desc: String,
    pub ctime: i64,
    pub utime: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Database {
    pub id: i64,
    pub iid: i64,
    pub name: String,
    pub cluster: String,
    pub desc: String,
    pub uid: i64,
    pub ctime: i64,
    pub utime: i64,
}

/// Trace feature attached to a storage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum TraceTableType {
    #[default]
    None,
    JaegerJson,
}

impl From<TraceTableType> for i32 {
    fn from(t: TraceTableType) -> Self {
        match t {
            TraceTableType::None => 0,
            TraceTableType::JaegerJson => 1,
        }
    }
}

impl TryFrom<i32> for TraceTableType {
    type Error = UnknownVariant;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::JaegerJson),
            other => Err(UnknownVariant("trace table type", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownVariant(pub &'static str, pub i32);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {}", self.0, self.1)
    }
}

impl std::error::Error for UnknownVariant {}

/// How a storage table was created.
pub const CREATE_TYPE_JSON_EACH_ROW: i32 = 0;
pub const CREATE_TYPE_TEMPLATE: i32 = 1;

/// A log storage definition mirrored by tables in the analytical engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: i64,
    pub did: i64,
    pub name: String,
    pub typ: i32,
    pub days: i32,
    pub brokers: String,
    pub topic: String,
    pub consumer_num: i32,
    pub kafka_skip_broken_messages: i32,
    pub desc: String,
    pub sql_data: String,
    pub sql_stream: String,
    pub sql_view: String,
    pub time_field: String,
    pub raw_log_field: String,
    pub create_type: i32,
    pub v3_table_type: TraceTableType,
    pub uid: i64,
    pub ctime: i64,
    pub utime: i64,
}

/// Column changes written by the storage update workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableUpdate {
    pub uid: i64,
    pub days: i32,
    pub topic: String,
    pub brokers: String,
    pub consumer_num: i32,
    pub desc: String,
    pub kafka_skip_broken_messages: i32,
    pub v3_table_type: TraceTableType,
    /// Only set when the Kafka stream table was recreated.
    pub sql_stream: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum IndexKind {
    #[default]
    Base,
    Log,
}

impl From<IndexKind> for i32 {
    fn from(k: IndexKind) -> Self {
        match k {
            IndexKind::Base => 0,
            IndexKind::Log => 1,
        }
    }
}

impl TryFrom<i32> for IndexKind {
    type Error = UnknownVariant;

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Base),
            1 => Ok(Self::Log),
            other => Err(UnknownVariant("index kind", other)),
        }
    }
}

/// Declared column type of an index row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Float,
    Json,
    Bool,
    DateTime,
}

impl FieldType {
    pub const fn code(self) -> i32 {
        match self {
            Self::String => 0,
            Self::Int => 1,
            Self::Float => 2,
            Self::Json => 3,
            Self::Bool => 4,
            Self::DateTime => 5,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::String),
            1 => Some(Self::Int),
            2 => Some(Self::Float),
            3 => Some(Self::Json),
            4 => Some(Self::Bool),
            5 => Some(Self::DateTime),
            _ => None,
        }
    }

    /// Column type used when rendering engine DDL.
    pub const fn clickhouse_type(self) -> &'static str {
        match self {
            Self::String | Self::Json => "String",
            Self::Int => "Int64",
            Self::Float => "Float64",
            Self::Bool => "UInt8",
            Self::DateTime => "DateTime",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub id: i64,
    pub tid: i64,
    pub field: String,
    pub root_name: String,
    pub typ: i32,
    pub hash_typ: i32,
    pub alias: String,
    pub kind: IndexKind,
    pub ctime: i64,
    pub utime: i64,
}

/// The (object, sub-resource, domain) a grant applies to. `"*"` in a domain
/// field matches any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantTarget {
    pub object_type: String,
    pub object_idx: String,
    pub sub_resource: String,
    pub domain_type: String,
    pub domain_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    pub user_id: i64,
    #[serde(flatten)]
    pub target: GrantTarget,
    pub allow_bits: Acts,
    pub deny_bits: Acts,
    pub ctime: i64,
    pub utime: i64,
}
