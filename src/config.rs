use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
pub const REFRESH_TOKEN_TTL_SECS: i64 = 60 * 60 * 24;

pub const DEFAULT_ACCESS_TOKEN_SECRET: &str = "your-access-token-secret-key";
pub const DEFAULT_REFRESH_TOKEN_SECRET: &str = "your-refresh-token-secret-key";

pub const DEFAULT_PAGE_SKIP: usize = 0;
pub const DEFAULT_PAGE_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    /// Seed the demo accounts (`test`, `alice`, `bob`) on startup.
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            db_path: PathBuf::from("db.json"),
            access_token_secret: DEFAULT_ACCESS_TOKEN_SECRET.to_string(),
            refresh_token_secret: DEFAULT_REFRESH_TOKEN_SECRET.to_string(),
            seed_demo: false,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: var_or("GAMGYUL_BIND_ADDR", defaults.bind_addr),
            db_path: PathBuf::from(var_or(
                "GAMGYUL_DB_PATH",
                defaults.db_path.display().to_string(),
            )),
            access_token_secret: secret_or("ACCESS_TOKEN_SECRET", defaults.access_token_secret),
            refresh_token_secret: secret_or("REFRESH_TOKEN_SECRET", defaults.refresh_token_secret),
            seed_demo: env::var("GAMGYUL_SEED_DEMO")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.seed_demo),
        }
    }
}

fn var_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default
    })
}

// Secrets are never echoed to the log.
fn secret_or(key: &str, default: String) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => {
            warn!("{key} not set, using the development default");
            default
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
