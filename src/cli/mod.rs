mod admin;
mod commands;

pub use admin::{load_config, open_store, run_grant_root, run_init, run_user_add};
pub use commands::{AdminCommands, UserCommands};
