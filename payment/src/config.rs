//! Payment service configuration.

use std::fmt;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use uuid::Uuid;

use sp_payment_common::{AccountId, MAX_MACHINE_ID};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Dev,
    Prod,
}

impl Environment {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Some(Environment::Local),
            "dev" => Some(Environment::Dev),
            "prod" => Some(Environment::Prod),
            _ => None,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        };
        f.write_str(name)
    }
}

/// Main payment service configuration.
#[derive(Clone)]
pub struct PaymentConfig {
    /// Service name, used in logs and the identity client's user agent.
    pub service_name: String,
    /// Instance id.
    pub service_id: String,
    /// Deployment environment.
    pub environment: Environment,
    /// Database URL.
    pub database_url: String,
    /// Pool size.
    pub db_max_connections: u32,
    /// Field encryption key (AES-128/192/256).
    pub db_key: Vec<u8>,
    /// Keyed-hash key for row stamps and account-number lookups.
    pub hash_key: Vec<u8>,
    /// Base URL of the identity service.
    pub auth_service_addr: String,
    /// Sender of system-issued transactions.
    pub system_account_id: AccountId,
    /// Snowflake worker id.
    pub machine_id: u16,
    /// Identity service request timeout.
    pub identity_timeout: Duration,
    /// Skip the embedded migrations at start-up.
    pub ignore_migrations: bool,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            service_name: "sp-payment".to_string(),
            service_id: String::new(),
            environment: Environment::Local,
            database_url: "postgres://localhost/sp_payment".to_string(),
            db_max_connections: 10,
            db_key: Vec::new(),
            hash_key: Vec::new(),
            auth_service_addr: "http://localhost:7780".to_string(),
            system_account_id: AccountId::from_uuid(Uuid::nil()),
            machine_id: 1,
            identity_timeout: Duration::from_secs(10),
            ignore_migrations: false,
        }
    }
}

impl PaymentConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source. Unset or unparsable values keep
    /// their defaults; `validate` reports what is still missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup("SERVICE_NAME") {
            config.service_name = name;
        }

        if let Some(id) = lookup("SERVICE_ID") {
            config.service_id = id;
        }

        if let Some(env) = lookup("ENVIRONMENT").and_then(|e| Environment::parse(&e)) {
            config.environment = env;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(n) = lookup("DB_MAX_CONNECTIONS").and_then(|n| n.parse().ok()) {
            config.db_max_connections = n;
        }

        if let Some(key) = lookup("DB_KEY").and_then(|k| STANDARD.decode(k.trim()).ok()) {
            config.db_key = key;
        }

        if let Some(key) = lookup("HASH_KEY").and_then(|k| STANDARD.decode(k.trim()).ok()) {
            config.hash_key = key;
        }

        if let Some(addr) = lookup("AUTH_SERVICE_ADDR") {
            config.auth_service_addr = addr.trim_end_matches('/').to_string();
        }

        if let Some(id) =
            lookup("SYSTEM_ACCOUNT_ID").and_then(|id| AccountId::parse(id.trim()).ok())
        {
            config.system_account_id = id;
        }

        if let Some(id) = lookup("MACHINE_ID").and_then(|id| id.parse().ok()) {
            config.machine_id = id;
        }

        if let Some(secs) = lookup("IDENTITY_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.identity_timeout = Duration::from_secs(secs);
        }

        if let Some(flag) = lookup("FF_IGNORE_MIGRATIONS") {
            config.ignore_migrations =
                matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.database_url.is_empty() {
            return Err("DATABASE_URL cannot be empty".to_string());
        }

        if self.db_max_connections == 0 {
            return Err("DB_MAX_CONNECTIONS cannot be 0".to_string());
        }

        if !matches!(self.db_key.len(), 16 | 24 | 32) {
            return Err("DB_KEY must be base64 of a 16, 24 or 32 byte key".to_string());
        }

        if self.hash_key.is_empty() {
            return Err("HASH_KEY must be non-empty base64".to_string());
        }

        if self.auth_service_addr.is_empty() {
            return Err("AUTH_SERVICE_ADDR cannot be empty".to_string());
        }

        if self.system_account_id.as_uuid().is_nil() {
            return Err("SYSTEM_ACCOUNT_ID must be a UUID".to_string());
        }

        if self.machine_id > MAX_MACHINE_ID {
            return Err(format!("MACHINE_ID cannot exceed {}", MAX_MACHINE_ID));
        }

        Ok(())
    }
}

impl fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("service_name", &self.service_name)
            .field("service_id", &self.service_id)
            .field("environment", &self.environment)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_key", &format_args!("<{} bytes>", self.db_key.len()))
            .field("hash_key", &format_args!("<{} bytes>", self.hash_key.len()))
            .field("auth_service_addr", &self.auth_service_addr)
            .field("system_account_id", &self.system_account_id)
            .field("machine_id", &self.machine_id)
            .field("identity_timeout", &self.identity_timeout)
            .field("ignore_migrations", &self.ignore_migrations)
            .finish()
    }
}
