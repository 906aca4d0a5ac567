//! Gateway configuration from the process environment and an optional
//! `.env` file.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use climgate_executor::{EngineInstall, EngineRegistry, TimeoutPolicy};

/// Ten years, the lifetime of tokens minted without an explicit ttl.
pub const DEFAULT_TTL_SECS: i64 = 315_360_000;

/// Concurrent engine jobs admitted by default.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

const DEFAULT_BC_DIR: &str = r"C:\ClimateBC_v7.50";
const DEFAULT_BC_EXE: &str = "ClimateBC_v7.50.exe";
const DEFAULT_NA_DIR: &str = r"C:\ClimateNA_v7.50";
const DEFAULT_NA_EXE: &str = "ClimateNA_v7.50.exe";

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable is set but cannot be used.
    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// The `.env` file exists but cannot be read or parsed.
    #[error("env file {path}: {reason}")]
    EnvFile { path: PathBuf, reason: String },
}

/// Everything the gateway binary needs to start.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// HMAC key for signing API tokens.
    pub jwt_secret: String,
    /// The root credential.
    pub root_token: String,
    /// Admission gate capacity.
    pub max_concurrent: usize,
    /// Whether `/health` counts against the admission gate.
    pub health_gated: bool,
    /// Token lifetime when the caller does not ask for one.
    pub default_ttl_secs: i64,
    /// Temp directory handed to the engine, if any.
    pub scratch_dir: Option<PathBuf>,
    /// Append-only revocation file; in-memory revocations when unset.
    pub revocation_file: Option<PathBuf>,
    /// Engine installations by variant.
    pub engines: EngineRegistry,
    /// Engine deadline policy.
    pub timeouts: TimeoutPolicy,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("jwt_secret", &"<redacted>")
            .field("root_token", &"<redacted>")
            .field("max_concurrent", &self.max_concurrent)
            .field("health_gated", &self.health_gated)
            .field("default_ttl_secs", &self.default_ttl_secs)
            .field("scratch_dir", &self.scratch_dir)
            .field("revocation_file", &self.revocation_file)
            .field("engines", &self.engines)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

impl GatewayConfig {
    /// Read configuration from `CLIMGATE_*` environment variables.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a required variable is missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), with the `.env` file at `path`
    /// filling in variables the process environment leaves unset.
    ///
    /// # Errors
    /// Returns [`ConfigError::EnvFile`] if the file exists but is unreadable
    /// or malformed, otherwise the same as [`from_env`](Self::from_env).
    pub fn from_env_and_file(path: &Path) -> Result<Self, ConfigError> {
        let file = read_env_file(path)?;
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// Read configuration through an arbitrary lookup function.
    ///
    /// # Errors
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr: SocketAddr = parse_or(&get, "CLIMGATE_LISTEN_ADDR", || {
            DEFAULT_LISTEN_ADDR.parse().map_err(|e: std::net::AddrParseError| e.to_string())
        })?;
        let jwt_secret = get("CLIMGATE_JWT_SECRET").ok_or(ConfigError::Missing("CLIMGATE_JWT_SECRET"))?;
        let root_token = get("CLIMGATE_ROOT_TOKEN").ok_or(ConfigError::Missing("CLIMGATE_ROOT_TOKEN"))?;

        let max_concurrent: usize =
            parse_or(&get, "CLIMGATE_MAX_CONCURRENT", || Ok(DEFAULT_MAX_CONCURRENT))?;
        if max_concurrent == 0 {
            return Err(ConfigError::Invalid {
                var: "CLIMGATE_MAX_CONCURRENT",
                value: "0".to_owned(),
                reason: "must be greater than zero".to_owned(),
            });
        }

        let health_gated = match get("CLIMGATE_HEALTH_GATED") {
            Some(value) => parse_bool("CLIMGATE_HEALTH_GATED", &value)?,
            None => false,
        };

        let default_ttl_secs: i64 =
            parse_or(&get, "CLIMGATE_DEFAULT_TTL_SECS", || Ok(DEFAULT_TTL_SECS))?;
        if default_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "CLIMGATE_DEFAULT_TTL_SECS",
                value: default_ttl_secs.to_string(),
                reason: "must be positive".to_owned(),
            });
        }

        let engines = EngineRegistry::new()
            .with(
                "bc",
                EngineInstall::new(
                    get("CLIMGATE_BC_DIR").unwrap_or_else(|| DEFAULT_BC_DIR.to_owned()),
                    get("CLIMGATE_BC_EXE").unwrap_or_else(|| DEFAULT_BC_EXE.to_owned()),
                ),
            )
            .with(
                "na",
                EngineInstall::new(
                    get("CLIMGATE_NA_DIR").unwrap_or_else(|| DEFAULT_NA_DIR.to_owned()),
                    get("CLIMGATE_NA_EXE").unwrap_or_else(|| DEFAULT_NA_EXE.to_owned()),
                ),
            );

        let defaults = TimeoutPolicy::default();
        let base_ms: u64 = parse_or(&get, "CLIMGATE_TIMEOUT_BASE_MS", || {
            Ok(u64::try_from(defaults.base.as_millis()).unwrap_or(u64::MAX))
        })?;
        let per_location_ms: u64 = parse_or(&get, "CLIMGATE_TIMEOUT_PER_LOCATION_MS", || {
            Ok(u64::try_from(defaults.per_location.as_millis()).unwrap_or(u64::MAX))
        })?;

        Ok(Self {
            listen_addr,
            jwt_secret,
            root_token,
            max_concurrent,
            health_gated,
            default_ttl_secs,
            scratch_dir: get("CLIMGATE_SCRATCH_DIR").map(PathBuf::from),
            revocation_file: get("CLIMGATE_REVOCATION_FILE").map(PathBuf::from),
            engines,
            timeouts: TimeoutPolicy::new(
                Duration::from_millis(base_ms),
                Duration::from_millis(per_location_ms),
            ),
        })
    }
}

/// Variables listed in a dotenv file. A missing file yields an empty map.
///
/// # Errors
/// Returns [`ConfigError::EnvFile`] if the file cannot be read or a line does
/// not parse.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let env_file_error = |e: &dotenv::Error| ConfigError::EnvFile {
        path: path.to_owned(),
        reason: e.to_string(),
    };
    let iter = match dotenv::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => return Err(env_file_error(&e)),
    };
    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| env_file_error(&e))?;
        vars.insert(key, value);
    }
    tracing::debug!(path = %path.display(), count = vars.len(), "env file read");
    Ok(vars)
}

fn parse_or<T, G, D>(get: &G, var: &'static str, default: D) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
    D: FnOnce() -> Result<T, String>,
{
    match get(var) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        None => default().map_err(|reason| ConfigError::Invalid {
            var,
            value: String::new(),
            reason,
        }),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_owned(),
            reason: "expected true or false".to_owned(),
        }),
    }
}
