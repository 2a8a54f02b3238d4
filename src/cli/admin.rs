use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

use crate::auth::{PasswordHasher, generate_password};
use crate::config::AppConfig;
use crate::error::Error;
use crate::permission::PermissionManager;
use crate::store::{SqliteStore, Store};
use crate::types::{
    ACCESS_PASSWORD, DEFAULT_ADMIN_ID, DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME, User,
};

/// Loads the config file and applies the data directory override.
pub fn load_config(path: &Path, data_dir: Option<PathBuf>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    if let Some(data_dir) = data_dir {
        config.server.data_dir = data_dir;
    }
    Ok(config)
}

/// Opens the metadata database, checking it exists.
pub fn open_store(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.server.db_path();
    if !db_path.exists() {
        bail!(
            "Database not found at {}. Run 'logdeck admin init' first.",
            db_path.display()
        );
    }
    SqliteStore::new(&db_path).map_err(Into::into)
}

pub fn run_init(config: &AppConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.server.data_dir)?;

    let store = SqliteStore::new(&config.server.db_path())?;
    store.initialize()?;

    let admin = User {
        id: DEFAULT_ADMIN_ID,
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        nickname: DEFAULT_ADMIN_USERNAME.to_string(),
        password: PasswordHasher::new().hash(DEFAULT_ADMIN_PASSWORD)?,
        access: ACCESS_PASSWORD.to_string(),
        ..Default::default()
    };
    match store.create_user_with_id(&admin) {
        Ok(()) => {}
        Err(Error::AlreadyExists) => bail!("Server already initialized."),
        Err(e) => return Err(e.into()),
    }
    store.add_root_user(DEFAULT_ADMIN_ID)?;

    println!();
    println!("========================================");
    println!("Default administrator created:");
    println!();
    println!("  username: {DEFAULT_ADMIN_USERNAME}");
    println!("  password: {DEFAULT_ADMIN_PASSWORD}");
    println!();
    println!("Change this password before using the v2 api.");
    println!("========================================");
    println!();

    Ok(())
}

pub fn run_grant_root(config: &AppConfig, user_id: i64) -> anyhow::Result<()> {
    let store = std::sync::Arc::new(open_store(config)?);
    if store.get_user(user_id)?.is_none() {
        bail!("User {user_id} not found");
    }

    let permissions = PermissionManager::with_grant_policy(store);
    if permissions.add_root_user(user_id)? {
        println!("User {user_id} is now a root user");
    } else {
        println!("User {user_id} is already a root user");
    }
    Ok(())
}

pub fn run_user_add(
    config: &AppConfig,
    username: &str,
    nickname: Option<String>,
) -> anyhow::Result<()> {
    let store = open_store(config)?;

    let password = generate_password();
    let user = User {
        username: username.to_string(),
        nickname: nickname.unwrap_or_else(|| username.to_string()),
        password: PasswordHasher::new().hash(&password)?,
        access: ACCESS_PASSWORD.to_string(),
        ..Default::default()
    };
    let id = match store.create_user(&user) {
        Ok(id) => id,
        Err(Error::AlreadyExists) => bail!("User '{username}' already exists"),
        Err(e) => return Err(e.into()),
    };

    println!();
    println!("========================================");
    println!("Created user '{username}' (id {id}) with password:");
    println!();
    println!("  {password}");
    println!();
    println!("========================================");
    println!();

    Ok(())
}
