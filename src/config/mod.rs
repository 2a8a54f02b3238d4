mod server;

pub use server::{
    AnonymousConfig, AppConfig, AppSection, AuthConfig, DEFAULT_SESSION_TTL_SECS, ProxyConfig,
    ServerConfig,
};
