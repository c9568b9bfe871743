// src/config.rs

use std::{env, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};
use dotenvy::dotenv;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub default_quiz_duration_secs: u32,
    pub tick_interval: Duration,
    pub blob_dir: PathBuf,
    /// Always ends with `/`.
    pub public_base_url: Url,
    pub default_profile_picture_url: String,
    pub catalog_seed_file: Option<PathBuf>,
    /// How long a finished session stays readable before it is dropped.
    pub finished_session_ttl: Duration,
    /// Idle time after which a user's profile and attempt watches are released.
    pub user_idle_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let public_base_url = with_trailing_slash(
            &env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3000/".to_string()),
        );
        let public_base_url = Url::parse(&public_base_url)
            .expect("PUBLIC_BASE_URL must be an absolute URL");

        let default_profile_picture_url = env::var("DEFAULT_PROFILE_PICTURE_URL")
            .unwrap_or_else(|_| format!("{}blobs/profile.png", public_base_url));

        Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_or("JWT_EXPIRATION", 86_400),
            rust_log,
            bind_addr: parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000))),
            default_quiz_duration_secs: parse_or(
                "DEFAULT_QUIZ_DURATION_SECS",
                crate::session::DEFAULT_DURATION_SECS,
            ),
            tick_interval: Duration::from_millis(parse_or("TICK_INTERVAL_MS", 1000u64).max(1)),
            blob_dir: env::var("BLOB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            public_base_url,
            default_profile_picture_url,
            catalog_seed_file: env::var("CATALOG_SEED_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            finished_session_ttl: Duration::from_secs(parse_or("FINISHED_SESSION_TTL_SECS", 300)),
            user_idle_ttl: Duration::from_secs(parse_or("USER_IDLE_TTL_SECS", 1800u64).max(1)),
        }
    }
}

/// Reads `key`, falling back to `default` when unset or unparsable.
fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            eprintln!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}
