use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Create the schema and the default administrator
    Init {
        /// Path to the TOML configuration file
        #[arg(long, short, default_value = "logdeck.toml")]
        config: PathBuf,

        /// Data directory for the metadata database (overrides the config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Add a user to the root user set
    GrantRoot {
        /// Path to the TOML configuration file
        #[arg(long, short, default_value = "logdeck.toml")]
        config: PathBuf,

        /// Data directory for the metadata database (overrides the config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Id of the user to promote
        #[arg(long)]
        user_id: i64,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a password account; the generated password is printed once
    Add {
        /// Path to the TOML configuration file
        #[arg(long, short, default_value = "logdeck.toml")]
        config: PathBuf,

        /// Data directory for the metadata database (overrides the config file)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Username for the new user
        #[arg(long)]
        username: String,

        /// Display name (defaults to the username)
        #[arg(long)]
        nickname: Option<String>,
    },
}
