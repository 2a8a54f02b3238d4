pub const SCHEMA: &str = r#"
-- Console users; password is empty for proxy-provisioned accounts
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    nickname TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    avatar TEXT NOT NULL DEFAULT '',
    password TEXT NOT NULL DEFAULT '',
    access TEXT NOT NULL DEFAULT '',
    ctime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    utime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    dtime INTEGER NOT NULL DEFAULT 0   -- 0 = active
);

-- Server-side sessions keyed by the cookie value
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    payload TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);

-- Users with unrestricted permission
CREATE TABLE IF NOT EXISTS root_users (
    user_id INTEGER PRIMARY KEY
);

-- Policy data for non-root permission checks
CREATE TABLE IF NOT EXISTS permission_grants (
    user_id INTEGER NOT NULL,
    object_type TEXT NOT NULL,
    object_idx TEXT NOT NULL,
    sub_resource TEXT NOT NULL,
    domain_type TEXT NOT NULL,
    domain_id TEXT NOT NULL,
    allow_bits INTEGER NOT NULL DEFAULT 0,
    deny_bits INTEGER NOT NULL DEFAULT 0,
    ctime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    utime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    PRIMARY KEY (user_id, object_type, object_idx, sub_resource, domain_type, domain_id)
);

-- Analytical engine endpoints
CREATE TABLE IF NOT EXISTS instances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    username TEXT NOT NULL DEFAULT '',
    password TEXT NOT NULL DEFAULT '',
    cluster TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    ctime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    utime INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

CREATE TABLE IF NOT EXISTS databases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    iid INTEGER NOT NULL REFERENCES instances(id),
    name TEXT NOT NULL,
    cluster TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    uid INTEGER NOT NULL DEFAULT 0,
    ctime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    utime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    dtime INTEGER NOT NULL DEFAULT 0
);

-- Log storage definitions mirrored in the analytical engine
CREATE TABLE IF NOT EXISTS log_tables (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    did INTEGER NOT NULL REFERENCES databases(id),
    name TEXT NOT NULL,
    typ INTEGER NOT NULL DEFAULT 0,
    days INTEGER NOT NULL DEFAULT 0,
    brokers TEXT NOT NULL DEFAULT '',
    topic TEXT NOT NULL DEFAULT '',
    consumer_num INTEGER NOT NULL DEFAULT 1,
    kafka_skip_broken_messages INTEGER NOT NULL DEFAULT 0,
    description TEXT NOT NULL DEFAULT '',
    sql_data TEXT NOT NULL DEFAULT '',
    sql_stream TEXT NOT NULL DEFAULT '',
    sql_view TEXT NOT NULL DEFAULT '',
    time_field TEXT NOT NULL DEFAULT '',
    raw_log_field TEXT NOT NULL DEFAULT '',
    create_type INTEGER NOT NULL DEFAULT 0,
    v3_table_type INTEGER NOT NULL DEFAULT 0,
    uid INTEGER NOT NULL DEFAULT 0,
    ctime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    utime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    dtime INTEGER NOT NULL DEFAULT 0
);

-- Columns exposed for a log storage; kind 0 = base field, 1 = log field
CREATE TABLE IF NOT EXISTS log_indexes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tid INTEGER NOT NULL REFERENCES log_tables(id) ON DELETE CASCADE,
    field TEXT NOT NULL,
    root_name TEXT NOT NULL DEFAULT '',
    typ INTEGER NOT NULL DEFAULT 0,
    hash_typ INTEGER NOT NULL DEFAULT 0,
    alias TEXT NOT NULL DEFAULT '',
    kind INTEGER NOT NULL DEFAULT 0,
    ctime INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    utime INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
);

-- Create indexes
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username_active ON users(username) WHERE dtime = 0;
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_grants_user ON permission_grants(user_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_databases_name_active ON databases(iid, name) WHERE dtime = 0;
CREATE UNIQUE INDEX IF NOT EXISTS idx_log_tables_name_active ON log_tables(did, name) WHERE dtime = 0;
CREATE INDEX IF NOT EXISTS idx_log_indexes_table ON log_indexes(tid);
"#;
