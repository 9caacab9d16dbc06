use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use postgres::config::SslMode as PgSslMode;
use serde::Serialize;

use crate::error::PgScopeError;

/// Prefix used by [`ConnectionConfig::from_env`] callers that have no preference.
pub const DEFAULT_ENV_PREFIX: &str = "PG_";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DBNAME: &str = "postgres";
pub const DEFAULT_USER: &str = "postgres";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// TLS negotiation mode, named after the libpq `sslmode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Plain TCP, no TLS.
    #[default]
    Disable,
    /// TLS when the server offers it, without certificate checks.
    Prefer,
    /// TLS required, without certificate checks.
    Require,
    /// TLS required, certificate chain verified, hostname not checked.
    VerifyCa,
    /// TLS required, certificate chain and hostname verified.
    VerifyFull,
}

impl SslMode {
    pub(crate) fn to_pg(self) -> PgSslMode {
        match self {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => PgSslMode::Require,
        }
    }
}

/// Shape of every row fetched through a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowMode {
    /// Column name to value, in result column order.
    #[default]
    #[value(alias = "dict")]
    Mapping,
    /// Values only, in result column order.
    Tuple,
}

/// Validated, immutable connection parameters.
///
/// Build one from the environment with [`ConnectionConfig::from_env`] or
/// programmatically with [`ConnectionConfig::builder`]:
/// ```rust
/// use pgscope::{ConnectionConfig, RowMode};
///
/// let cfg = ConnectionConfig::builder()
///     .host("db.internal")
///     .dbname("bookings")
///     .row_mode(RowMode::Tuple)
///     .build()
///     .unwrap();
/// assert_eq!(cfg.port(), 5432);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    dbname: String,
    user: String,
    password: String,
    ssl_mode: SslMode,
    connect_timeout: u64,
    row_mode: RowMode,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            dbname: DEFAULT_DBNAME.to_string(),
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            ssl_mode: SslMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            row_mode: RowMode::default(),
        }
    }
}

// Hand-written so the password never reaches a log line.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout", &self.connect_timeout)
            .field("row_mode", &self.row_mode)
            .finish()
    }
}

impl ConnectionConfig {
    #[must_use]
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Resolve settings from `{prefix}HOST`, `{prefix}PORT`, ... in the process environment.
    ///
    /// # Errors
    /// Returns `PgScopeError::ConfigError` for a malformed port, timeout, SSL mode or row mode.
    pub fn from_env(prefix: &str) -> Result<Self, PgScopeError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Same as [`ConnectionConfig::from_env`], with a `.env` file (searched from
    /// the working directory upwards) filling in unset variables. Variables
    /// already set in the process win over the file; a missing file is fine.
    ///
    /// # Errors
    /// Returns `PgScopeError::ConfigError` for an unreadable `.env` file or a
    /// malformed setting.
    pub fn from_env_with_dotenv(prefix: &str) -> Result<Self, PgScopeError> {
        match dotenvy::dotenv_iter() {
            Ok(iter) => Self::from_dotenv_iter(prefix, iter),
            Err(err) if err.not_found() => Self::from_env(prefix),
            Err(err) => Err(PgScopeError::ConfigError(format!("cannot read .env: {err}"))),
        }
    }

    /// Like [`ConnectionConfig::from_env_with_dotenv`] for an explicit file path.
    ///
    /// # Errors
    /// Returns `PgScopeError::ConfigError` if the file cannot be read or parsed,
    /// or for a malformed setting.
    pub fn from_dotenv_path(prefix: &str, path: impl AsRef<Path>) -> Result<Self, PgScopeError> {
        let path = path.as_ref();
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            PgScopeError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_dotenv_iter(prefix, iter)
    }

    fn from_dotenv_iter<R: Read>(
        prefix: &str,
        iter: dotenvy::Iter<R>,
    ) -> Result<Self, PgScopeError> {
        let mut file_vars = HashMap::new();
        for item in iter {
            let (key, value) =
                item.map_err(|e| PgScopeError::ConfigError(format!("malformed .env: {e}")))?;
            file_vars.insert(key, value);
        }
        tracing::debug!(entries = file_vars.len(), "loaded .env");
        Self::from_lookup(prefix, |key| {
            std::env::var(key)
                .ok()
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    /// Resolve settings through an arbitrary key lookup.
    ///
    /// Values that are absent or empty fall back to the documented defaults.
    ///
    /// # Errors
    /// Returns `PgScopeError::ConfigError` for a malformed setting.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Self, PgScopeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| lookup(&format!("{prefix}{suffix}")).filter(|v| !v.is_empty());

        let mut builder = Self::builder();
        for setting in &ENV_SETTINGS {
            let value = read(setting.suffix).or_else(|| setting.fallback.and_then(read));
            let raw = value.as_deref().unwrap_or(setting.default);
            let key = format!("{prefix}{}", setting.suffix);
            builder = (setting.apply)(builder, &key, raw)?;
        }
        builder.build()
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn dbname(&self) -> &str {
        &self.dbname
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    #[must_use]
    pub fn ssl_mode(&self) -> SslMode {
        self.ssl_mode
    }

    /// Connect timeout in seconds; 0 disables it.
    #[must_use]
    pub fn connect_timeout(&self) -> u64 {
        self.connect_timeout
    }

    #[must_use]
    pub fn row_mode(&self) -> RowMode {
        self.row_mode
    }

    /// Translate into the driver's own connection config.
    #[must_use]
    pub fn to_pg_config(&self) -> postgres::Config {
        let mut cfg = postgres::Config::new();
        cfg.host(&self.host)
            .port(self.port)
            .dbname(&self.dbname)
            .user(&self.user)
            .ssl_mode(self.ssl_mode.to_pg());
        if !self.password.is_empty() {
            cfg.password(&self.password);
        }
        if self.connect_timeout > 0 {
            cfg.connect_timeout(Duration::from_secs(self.connect_timeout));
        }
        cfg
    }
}

/// Programmatic construction; omitted fields keep their defaults.
#[derive(Debug, Clone, Default)]
pub struct ConnectionConfigBuilder {
    config: ConnectionConfig,
}

impl ConnectionConfigBuilder {
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.config.dbname = dbname.into();
        self
    }

    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = user.into();
        self
    }

    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    #[must_use]
    pub fn ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.config.ssl_mode = ssl_mode;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, secs: u64) -> Self {
        self.config.connect_timeout = secs;
        self
    }

    #[must_use]
    pub fn row_mode(mut self, row_mode: RowMode) -> Self {
        self.config.row_mode = row_mode;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    /// Returns `PgScopeError::ConfigError` if host, dbname or user is empty, or the port is 0.
    pub fn build(self) -> Result<ConnectionConfig, PgScopeError> {
        let cfg = self.config;
        if cfg.host.is_empty() {
            return Err(PgScopeError::ConfigError("host is required".to_string()));
        }
        if cfg.dbname.is_empty() {
            return Err(PgScopeError::ConfigError("dbname is required".to_string()));
        }
        if cfg.user.is_empty() {
            return Err(PgScopeError::ConfigError("user is required".to_string()));
        }
        if cfg.port == 0 {
            return Err(PgScopeError::ConfigError(
                "port must be between 1 and 65535".to_string(),
            ));
        }
        Ok(cfg)
    }
}

type ApplyFn =
    fn(ConnectionConfigBuilder, &str, &str) -> Result<ConnectionConfigBuilder, PgScopeError>;

struct EnvSetting {
    suffix: &'static str,
    /// Secondary suffix consulted when the primary one is unset.
    fallback: Option<&'static str>,
    default: &'static str,
    apply: ApplyFn,
}

const ENV_SETTINGS: [EnvSetting; 8] = [
    EnvSetting {
        suffix: "HOST",
        fallback: None,
        default: DEFAULT_HOST,
        apply: |b, _, v| Ok(b.host(v)),
    },
    EnvSetting {
        suffix: "PORT",
        fallback: None,
        default: "5432",
        apply: |b, key, v| Ok(b.port(parse_port(key, v)?)),
    },
    EnvSetting {
        suffix: "DB",
        fallback: Some("DBNAME"),
        default: DEFAULT_DBNAME,
        apply: |b, _, v| Ok(b.dbname(v)),
    },
    EnvSetting {
        suffix: "USER",
        fallback: None,
        default: DEFAULT_USER,
        apply: |b, _, v| Ok(b.user(v)),
    },
    EnvSetting {
        suffix: "PASSWORD",
        fallback: None,
        default: "",
        apply: |b, _, v| Ok(b.password(v)),
    },
    EnvSetting {
        suffix: "SSLMODE",
        fallback: None,
        default: "disable",
        apply: |b, key, v| Ok(b.ssl_mode(parse_enum(key, v)?)),
    },
    EnvSetting {
        suffix: "CONNECT_TIMEOUT",
        fallback: None,
        default: "10",
        apply: |b, key, v| Ok(b.connect_timeout(parse_timeout(key, v)?)),
    },
    EnvSetting {
        suffix: "ROW_MODE",
        fallback: None,
        default: "mapping",
        apply: |b, key, v| Ok(b.row_mode(parse_enum(key, v)?)),
    },
];

fn parse_port(key: &str, raw: &str) -> Result<u16, PgScopeError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| PgScopeError::ConfigError(format!("{key} must be an integer, got {raw:?}")))?;
    u16::try_from(value)
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| {
            PgScopeError::ConfigError(format!("{key} must be between 1 and 65535, got {value}"))
        })
}

fn parse_timeout(key: &str, raw: &str) -> Result<u64, PgScopeError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| PgScopeError::ConfigError(format!("{key} must be an integer, got {raw:?}")))?;
    u64::try_from(value).map_err(|_| {
        PgScopeError::ConfigError(format!("{key} must not be negative, got {value}"))
    })
}

fn parse_enum<T: ValueEnum>(key: &str, raw: &str) -> Result<T, PgScopeError> {
    T::from_str(raw.trim(), true).map_err(|_| {
        let accepted: Vec<String> = T::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        PgScopeError::ConfigError(format!(
            "{key} must be one of [{}], got {raw:?}",
            accepted.join(", ")
        ))
    })
}
