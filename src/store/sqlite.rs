use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database, mostly useful for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn map_insert_err(e: rusqlite::Error) -> Error {
    if is_constraint_violation(&e) {
        Error::AlreadyExists
    } else {
        Error::from(e)
    }
}

const USER_COLUMNS: &str =
    "id, username, nickname, email, avatar, password, access, ctime, utime, dtime";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        nickname: row.get(2)?,
        email: row.get(3)?,
        avatar: row.get(4)?,
        password: row.get(5)?,
        access: row.get(6)?,
        ctime: row.get(7)?,
        utime: row.get(8)?,
        dtime: row.get(9)?,
    })
}

const TABLE_COLUMNS: &str = "id, did, name, typ, days, brokers, topic, consumer_num, \
     kafka_skip_broken_messages, description, sql_data, sql_stream, sql_view, time_field, \
     raw_log_field, create_type, v3_table_type, uid, ctime, utime";

fn table_from_row(row: &Row<'_>) -> rusqlite::Result<Table> {
    let v3: i32 = row.get(16)?;
    Ok(Table {
        id: row.get(0)?,
        did: row.get(1)?,
        name: row.get(2)?,
        typ: row.get(3)?,
        days: row.get(4)?,
        brokers: row.get(5)?,
        topic: row.get(6)?,
        consumer_num: row.get(7)?,
        kafka_skip_broken_messages: row.get(8)?,
        desc: row.get(9)?,
        sql_data: row.get(10)?,
        sql_stream: row.get(11)?,
        sql_view: row.get(12)?,
        time_field: row.get(13)?,
        raw_log_field: row.get(14)?,
        create_type: row.get(15)?,
        v3_table_type: TraceTableType::try_from(v3).unwrap_or_else(|e| {
            tracing::error!("Invalid trace table type in database: {e}");
            TraceTableType::None
        }),
        uid: row.get(17)?,
        ctime: row.get(18)?,
        utime: row.get(19)?,
    })
}

fn index_from_row(row: &Row<'_>) -> rusqlite::Result<Index> {
    let kind: i32 = row.get(7)?;
    Ok(Index {
        id: row.get(0)?,
        tid: row.get(1)?,
        field: row.get(2)?,
        root_name: row.get(3)?,
        typ: row.get(4)?,
        hash_typ: row.get(5)?,
        alias: row.get(6)?,
        kind: IndexKind::try_from(kind).unwrap_or_else(|e| {
            tracing::error!("Invalid index kind in database: {e}");
            IndexKind::Log
        }),
        ctime: row.get(8)?,
        utime: row.get(9)?,
    })
}

fn grant_from_row(row: &Row<'_>) -> rusqlite::Result<PermissionGrant> {
    Ok(PermissionGrant {
        user_id: row.get(0)?,
        target: GrantTarget {
            object_type: row.get(1)?,
            object_idx: row.get(2)?,
            sub_resource: row.get(3)?,
            domain_type: row.get(4)?,
            domain_id: row.get(5)?,
        },
        allow_bits: Acts::from(row.get::<_, i64>(6)?),
        deny_bits: Acts::from(row.get::<_, i64>(7)?),
        ctime: row.get(8)?,
        utime: row.get(9)?,
    })
}

fn instance_from_row(row: &Row<'_>) -> rusqlite::Result<Instance> {
    Ok(Instance {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        username: row.get(3)?,
        password: row.get(4)?,
        cluster: row.get(5)?,
        desc: row.get(6)?,
        ctime: row.get(7)?,
        utime: row.get(8)?,
    })
}

fn database_from_row(row: &Row<'_>) -> rusqlite::Result<Database> {
    Ok(Database {
        id: row.get(0)?,
        iid: row.get(1)?,
        name: row.get(2)?,
        cluster: row.get(3)?,
        desc: row.get(4)?,
        uid: row.get(5)?,
        ctime: row.get(6)?,
        utime: row.get(7)?,
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<i64> {
        let conn = self.conn();
        let ts = now();
        conn.execute(
            "INSERT INTO users (username, nickname, email, avatar, password, access, ctime, utime, dtime)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0)",
            params![
                user.username,
                user.nickname,
                user.email,
                user.avatar,
                user.password,
                user.access,
                ts,
            ],
        )
        .map_err(map_insert_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn create_user_with_id(&self, user: &User) -> Result<()> {
        let ts = now();
        self.conn()
            .execute(
                "INSERT INTO users (id, username, nickname, email, avatar, password, access, ctime, utime, dtime)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, 0)",
                params![
                    user.id,
                    user.username,
                    user.nickname,
                    user.email,
                    user.avatar,
                    user.password,
                    user.access,
                    ts,
                ],
            )
            .map_err(map_insert_err)?;
        Ok(())
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND dtime = 0"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1 AND dtime = 0"),
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE dtime = 0 ORDER BY id"
        ))?;
        let rows = stmt.query_map([], user_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_user_profile(&self, user: &User) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET nickname = ?1, email = ?2, avatar = ?3, utime = ?4
             WHERE id = ?5 AND dtime = 0",
            params![user.nickname, user.email, user.avatar, now(), user.id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn update_user_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET password = ?1, utime = ?2 WHERE id = ?3 AND dtime = 0",
            params![password_hash, now(), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn soft_delete_user(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "UPDATE users SET dtime = ?1 WHERE id = ?2 AND dtime = 0",
            params![now(), id],
        )?;
        if rows == 0 {
            return Ok(false);
        }
        tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM root_users WHERE user_id = ?1", params![id])?;
        tx.commit()?;
        Ok(true)
    }

    fn has_users(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count > 0)
    }

    // Session operations

    fn create_session(
        &self,
        id: &str,
        user_id: i64,
        payload: &str,
        expires_at: i64,
    ) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO sessions (id, user_id, payload, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, payload, expires_at],
            )
            .map_err(map_insert_err)?;
        Ok(())
    }

    fn get_session(&self, id: &str, now: i64) -> Result<Option<String>> {
        let conn = self.conn();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT payload, expires_at FROM sessions WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((payload, expires_at)) if expires_at > now => Ok(Some(payload)),
            Some(_) => {
                conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Root user operations

    fn list_root_users(&self) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT user_id FROM root_users ORDER BY user_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn is_root_user(&self, user_id: i64) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM root_users WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn add_root_user(&self, user_id: i64) -> Result<bool> {
        let rows = self.conn().execute(
            "INSERT OR IGNORE INTO root_users (user_id) VALUES (?1)",
            params![user_id],
        )?;
        Ok(rows > 0)
    }

    fn replace_root_users(&self, user_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM root_users", [])?;

        for user_id in user_ids {
            tx.execute(
                "INSERT OR IGNORE INTO root_users (user_id) VALUES (?1)",
                params![user_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    // Permission grant operations

    fn upsert_grant(&self, grant: &PermissionGrant) -> Result<()> {
        let t = &grant.target;
        self.conn().execute(
            "INSERT INTO permission_grants
                (user_id, object_type, object_idx, sub_resource, domain_type, domain_id, allow_bits, deny_bits, ctime, utime)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (user_id, object_type, object_idx, sub_resource, domain_type, domain_id) DO UPDATE SET
                allow_bits = excluded.allow_bits,
                deny_bits = excluded.deny_bits,
                utime = excluded.utime",
            params![
                grant.user_id,
                t.object_type,
                t.object_idx,
                t.sub_resource,
                t.domain_type,
                t.domain_id,
                i64::from(grant.allow_bits),
                i64::from(grant.deny_bits),
                grant.ctime,
                grant.utime,
            ],
        )?;
        Ok(())
    }

    fn list_user_grants(&self, user_id: i64) -> Result<Vec<PermissionGrant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, object_type, object_idx, sub_resource, domain_type, domain_id, allow_bits, deny_bits, ctime, utime
             FROM permission_grants WHERE user_id = ?1
             ORDER BY object_type, object_idx, sub_resource, domain_type, domain_id",
        )?;
        let rows = stmt.query_map(params![user_id], grant_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_grant(&self, user_id: i64, target: &GrantTarget) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM permission_grants
             WHERE user_id = ?1 AND object_type = ?2 AND object_idx = ?3
               AND sub_resource = ?4 AND domain_type = ?5 AND domain_id = ?6",
            params![
                user_id,
                target.object_type,
                target.object_idx,
                target.sub_resource,
                target.domain_type,
                target.domain_id,
            ],
        )?;
        Ok(rows > 0)
    }

    // Instance operations

    fn create_instance(&self, instance: &Instance) -> Result<i64> {
        let conn = self.conn();
        let ts = now();
        conn.execute(
            "INSERT INTO instances (name, url, username, password, cluster, description, ctime, utime)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                instance.name,
                instance.url,
                instance.username,
                instance.password,
                instance.cluster,
                instance.desc,
                ts,
            ],
        )
        .map_err(map_insert_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn get_instance(&self, id: i64) -> Result<Option<Instance>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, url, username, password, cluster, description, ctime, utime
             FROM instances WHERE id = ?1",
            params![id],
            instance_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_instances(&self) -> Result<Vec<Instance>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, url, username, password, cluster, description, ctime, utime
             FROM instances ORDER BY id",
        )?;
        let rows = stmt.query_map([], instance_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Database operations

    fn create_database(&self, database: &Database) -> Result<i64> {
        let conn = self.conn();
        let ts = now();
        conn.execute(
            "INSERT INTO databases (iid, name, cluster, description, uid, ctime, utime, dtime)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 0)",
            params![
                database.iid,
                database.name,
                database.cluster,
                database.desc,
                database.uid,
                ts,
            ],
        )
        .map_err(map_insert_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn get_database(&self, id: i64) -> Result<Option<Database>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, iid, name, cluster, description, uid, ctime, utime
             FROM databases WHERE id = ?1 AND dtime = 0",
            params![id],
            database_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_databases(&self, iid: Option<i64>) -> Result<Vec<Database>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, iid, name, cluster, description, uid, ctime, utime
             FROM databases WHERE dtime = 0 AND (?1 IS NULL OR iid = ?1) ORDER BY id",
        )?;
        let rows = stmt.query_map(params![iid], database_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Log storage operations

    fn get_table(&self, id: i64) -> Result<Option<Table>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {TABLE_COLUMNS} FROM log_tables WHERE id = ?1 AND dtime = 0"),
            params![id],
            table_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_table_by_name(&self, did: i64, name: &str) -> Result<Option<Table>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {TABLE_COLUMNS} FROM log_tables WHERE did = ?1 AND name = ?2 AND dtime = 0"
            ),
            params![did, name],
            table_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn create_table_with_indexes(&self, table: &Table, indexes: &[Index]) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let ts = now();

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM log_tables WHERE did = ?1 AND name = ?2 AND dtime = 0",
            params![table.did, table.name],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(Error::AlreadyExists);
        }

        tx.execute(
            "INSERT INTO log_tables (did, name, typ, days, brokers, topic, consumer_num,
                kafka_skip_broken_messages, description, sql_data, sql_stream, sql_view, time_field,
                raw_log_field, create_type, v3_table_type, uid, ctime, utime, dtime)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18, 0)",
            params![
                table.did,
                table.name,
                table.typ,
                table.days,
                table.brokers,
                table.topic,
                table.consumer_num,
                table.kafka_skip_broken_messages,
                table.desc,
                table.sql_data,
                table.sql_stream,
                table.sql_view,
                table.time_field,
                table.raw_log_field,
                table.create_type,
                i32::from(table.v3_table_type),
                table.uid,
                ts,
            ],
        )
        .map_err(map_insert_err)?;
        let tid = tx.last_insert_rowid();

        for index in indexes {
            tx.execute(
                "INSERT INTO log_indexes (tid, field, root_name, typ, hash_typ, alias, kind, ctime, utime)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    tid,
                    index.field,
                    index.root_name,
                    index.typ,
                    index.hash_typ,
                    index.alias,
                    i32::from(index.kind),
                    ts,
                ],
            )?;
        }

        tx.commit()?;
        Ok(tid)
    }

    fn update_table(&self, id: i64, update: &TableUpdate) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE log_tables SET
                uid = ?1, days = ?2, topic = ?3, brokers = ?4, consumer_num = ?5,
                description = ?6, kafka_skip_broken_messages = ?7, v3_table_type = ?8,
                sql_stream = COALESCE(?9, sql_stream), utime = ?10
             WHERE id = ?11 AND dtime = 0",
            params![
                update.uid,
                update.days,
                update.topic,
                update.brokers,
                update.consumer_num,
                update.desc,
                update.kafka_skip_broken_messages,
                i32::from(update.v3_table_type),
                update.sql_stream,
                now(),
                id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn list_indexes(&self, tid: i64) -> Result<Vec<Index>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, tid, field, root_name, typ, hash_typ, alias, kind, ctime, utime
             FROM log_indexes WHERE tid = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![tid], index_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}
