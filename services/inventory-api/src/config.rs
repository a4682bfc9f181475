use std::net::SocketAddr;

use anyhow::{bail, Result};

use crate::db::DbConfig;
use crate::identifiers::MAX_ID_ATTEMPTS_CEILING;

/// Where inventories, counters and items are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local; state is lost on restart.
    Memory,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Some(StorageBackend::Postgres),
            "memory" | "mem" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub storage: StorageBackend,
    /// Creation attempts per item before giving up on a unique identifier.
    pub max_id_attempts: u32,
    pub database: DbConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("STOCKROOM_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level =
            std::env::var("STOCKROOM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("STOCKROOM_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let storage = match std::env::var("STOCKROOM_STORAGE") {
            Ok(raw) => match StorageBackend::parse(&raw) {
                Some(storage) => storage,
                None => bail!("STOCKROOM_STORAGE must be 'postgres' or 'memory', got '{raw}'"),
            },
            Err(_) => StorageBackend::Postgres,
        };

        let max_id_attempts = match std::env::var("STOCKROOM_MAX_ID_ATTEMPTS") {
            Ok(raw) => {
                let n: u32 = raw.parse()?;
                if n == 0 || n > MAX_ID_ATTEMPTS_CEILING {
                    bail!(
                        "STOCKROOM_MAX_ID_ATTEMPTS must be between 1 and {MAX_ID_ATTEMPTS_CEILING}, got {n}"
                    );
                }
                n
            }
            Err(_) => MAX_ID_ATTEMPTS_CEILING,
        };

        let database = DbConfig::from_env();

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            storage,
            max_id_attempts,
            database,
        })
    }
}
