mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the relational metadata interface.
pub trait Store: Send + Sync {
    /// Creates missing tables and indexes. Safe to call repeatedly.
    fn initialize(&self) -> Result<()>;

    // User operations (soft delete: only rows with dtime = 0 are visible)
    fn create_user(&self, user: &User) -> Result<i64>;
    /// Inserts `user` keeping its `id`; used for the install-time administrator.
    fn create_user_with_id(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn update_user_profile(&self, user: &User) -> Result<()>;
    fn update_user_password(&self, id: i64, password_hash: &str) -> Result<()>;
    /// Marks the user deleted and, in the same transaction, drops their
    /// sessions and root membership.
    fn soft_delete_user(&self, id: i64) -> Result<bool>;
    fn has_users(&self) -> Result<bool>;

    // Session operations
    fn create_session(&self, id: &str, user_id: i64, payload: &str, expires_at: i64)
    -> Result<()>;
    /// Returns the payload of an unexpired session; expired rows are removed.
    fn get_session(&self, id: &str, now: i64) -> Result<Option<String>>;
    fn delete_session(&self, id: &str) -> Result<bool>;

    // Root user operations
    fn list_root_users(&self) -> Result<Vec<i64>>;
    fn is_root_user(&self, user_id: i64) -> Result<bool>;
    /// Adds one member atomically. Returns false when it was already present.
    fn add_root_user(&self, user_id: i64) -> Result<bool>;
    /// Replaces the whole membership in one transaction.
    fn replace_root_users(&self, user_ids: &[i64]) -> Result<()>;

    // Permission grant operations
    fn upsert_grant(&self, grant: &PermissionGrant) -> Result<()>;
    fn list_user_grants(&self, user_id: i64) -> Result<Vec<PermissionGrant>>;
    fn delete_grant(&self, user_id: i64, target: &GrantTarget) -> Result<bool>;

    // Instance operations
    fn create_instance(&self, instance: &Instance) -> Result<i64>;
    fn get_instance(&self, id: i64) -> Result<Option<Instance>>;
    fn list_instances(&self) -> Result<Vec<Instance>>;

    // Database operations
    fn create_database(&self, database: &Database) -> Result<i64>;
    fn get_database(&self, id: i64) -> Result<Option<Database>>;
    fn list_databases(&self, iid: Option<i64>) -> Result<Vec<Database>>;

    // Log storage operations
    fn get_table(&self, id: i64) -> Result<Option<Table>>;
    fn get_table_by_name(&self, did: i64, name: &str) -> Result<Option<Table>>;
    /// Inserts the table and its index rows in one transaction.
    /// Fails with `AlreadyExists` when an active table of that name exists.
    fn create_table_with_indexes(&self, table: &Table, indexes: &[Index]) -> Result<i64>;
    fn update_table(&self, id: i64, update: &TableUpdate) -> Result<()>;
    fn list_indexes(&self, tid: i64) -> Result<Vec<Index>>;
}
