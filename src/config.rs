use crate::error::{RelayError, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Default upstream API origin
pub const DEFAULT_UPSTREAM_ORIGIN: &str = "https://openapi.blofin.com";

/// Longest deadline an upstream exchange may be given
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Inbound listener configuration
    pub server: ServerConfig,
    /// Upstream origin and transport configuration
    pub upstream: UpstreamConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on (default: 8080)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Upper bound on the buffer used to read request headers
    pub max_header_bytes: usize,
    /// Time allowed for a client to send its request headers
    pub header_read_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Scheme and authority of the upstream API, without a trailing slash
    pub origin: String,
    /// Inbound path prefix routed to the forwarder (default: /api/)
    pub proxy_prefix: String,
    /// Idle connections kept per upstream host
    pub max_idle_per_host: usize,
    /// Concurrent upstream requests per host
    pub max_conns_per_host: usize,
    /// Idle connections are closed after this long
    pub idle_timeout: Duration,
    /// Wait for a free connection slot
    pub pool_timeout: Duration,
    /// TCP connect plus TLS handshake
    pub handshake_timeout: Duration,
    /// Wait for the upstream response headers
    pub response_header_timeout: Duration,
    /// Ceiling on the whole upstream exchange, body included
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log upstream and relay error detail
    pub debug: bool,
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8080,
                host: "0.0.0.0".to_string(),
                max_header_bytes: 1 << 20,
                header_read_timeout: Duration::from_secs(15),
            },
            upstream: UpstreamConfig {
                origin: DEFAULT_UPSTREAM_ORIGIN.to_string(),
                proxy_prefix: "/api/".to_string(),
                max_idle_per_host: 500,
                max_conns_per_host: 500,
                idle_timeout: Duration::from_secs(90),
                pool_timeout: Duration::from_secs(10),
                handshake_timeout: Duration::from_secs(10),
                response_header_timeout: Duration::from_secs(10),
                request_timeout: Duration::from_secs(25),
            },
            log: LogConfig {
                debug: false,
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        let debug = get_env_or("DEBUG", "false").eq_ignore_ascii_case("true");

        Ok(Config {
            server: ServerConfig {
                port: get_env_or("PORT", "8080").parse().map_err(|_| {
                    RelayError::InvalidConfig("PORT must be a valid port number".into())
                })?,
                host: get_env_or("HOST", &defaults.server.host),
                max_header_bytes: parse_env("MAX_HEADER_BYTES", defaults.server.max_header_bytes)?
                    .max(8192),
                header_read_timeout: parse_secs(
                    "HEADER_READ_TIMEOUT",
                    defaults.server.header_read_timeout,
                )?,
            },
            upstream: UpstreamConfig {
                origin: parse_origin(&get_env_or("UPSTREAM_ORIGIN", DEFAULT_UPSTREAM_ORIGIN))?,
                proxy_prefix: parse_prefix(&get_env_or(
                    "PROXY_PREFIX",
                    &defaults.upstream.proxy_prefix,
                ))?,
                max_idle_per_host: parse_env(
                    "UPSTREAM_MAX_IDLE_PER_HOST",
                    defaults.upstream.max_idle_per_host,
                )?,
                max_conns_per_host: parse_env(
                    "UPSTREAM_MAX_CONNS_PER_HOST",
                    defaults.upstream.max_conns_per_host,
                )?
                .max(1),
                idle_timeout: parse_secs("UPSTREAM_IDLE_TIMEOUT", defaults.upstream.idle_timeout)?,
                pool_timeout: parse_secs("UPSTREAM_POOL_TIMEOUT", defaults.upstream.pool_timeout)?,
                handshake_timeout: parse_secs(
                    "UPSTREAM_HANDSHAKE_TIMEOUT",
                    defaults.upstream.handshake_timeout,
                )?,
                response_header_timeout: parse_secs(
                    "UPSTREAM_RESPONSE_HEADER_TIMEOUT",
                    defaults.upstream.response_header_timeout,
                )?,
                request_timeout: parse_request_timeout(defaults.upstream.request_timeout)?,
            },
            log: LogConfig {
                debug,
                level: get_env_or("LOG_LEVEL", if debug { "debug" } else { "info" }),
                format: get_env_or("LOG_FORMAT", &defaults.log.format),
            },
        })
    }

    /// Get the listen address
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Validate an upstream origin: http(s), a host, and nothing after the authority.
pub fn parse_origin(raw: &str) -> Result<String> {
    let raw = raw.trim().trim_end_matches('/');
    let url = Url::parse(raw).map_err(|e| {
        RelayError::InvalidConfig(format!("UPSTREAM_ORIGIN must be a valid URL: {}", e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RelayError::InvalidConfig(format!(
            "UPSTREAM_ORIGIN has unsupported scheme: {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(RelayError::InvalidConfig(
            "UPSTREAM_ORIGIN must include a host".into(),
        ));
    }
    if url.fragment().is_some() || url.query().is_some() {
        return Err(RelayError::InvalidConfig(
            "UPSTREAM_ORIGIN must not include query/fragment".into(),
        ));
    }
    if !(url.path().is_empty() || url.path() == "/") {
        return Err(RelayError::InvalidConfig(
            "UPSTREAM_ORIGIN must not include a path".into(),
        ));
    }

    Ok(raw.to_string())
}

fn parse_prefix(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if !raw.starts_with('/') || raw == "/" {
        return Err(RelayError::InvalidConfig(
            "PROXY_PREFIX must start with '/' and name a path segment".into(),
        ));
    }
    Ok(raw.to_string())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| RelayError::InvalidConfig(format!("{} must be a valid number", key))),
        Err(_) => Ok(default),
    }
}

fn parse_secs(key: &str, default: Duration) -> Result<Duration> {
    parse_env(key, default.as_secs()).map(Duration::from_secs)
}

/// The request deadline must be non-zero and no longer than `MAX_REQUEST_TIMEOUT`.
fn parse_request_timeout(default: Duration) -> Result<Duration> {
    let timeout = parse_secs("UPSTREAM_REQUEST_TIMEOUT", default)?;
    if timeout.is_zero() || timeout > MAX_REQUEST_TIMEOUT {
        return Err(RelayError::InvalidConfig(format!(
            "UPSTREAM_REQUEST_TIMEOUT must be between 1 and {} seconds",
            MAX_REQUEST_TIMEOUT.as_secs()
        )));
    }
    Ok(timeout)
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "PORT",
        "HOST",
        "DEBUG",
        "UPSTREAM_ORIGIN",
        "PROXY_PREFIX",
        "UPSTREAM_MAX_IDLE_PER_HOST",
        "UPSTREAM_MAX_CONNS_PER_HOST",
        "UPSTREAM_IDLE_TIMEOUT",
        "UPSTREAM_POOL_TIMEOUT",
        "UPSTREAM_HANDSHAKE_TIMEOUT",
        "UPSTREAM_RESPONSE_HEADER_TIMEOUT",
        "UPSTREAM_REQUEST_TIMEOUT",
        "MAX_HEADER_BYTES",
        "HEADER_READ_TIMEOUT",
        "LOG_LEVEL",
        "LOG_FORMAT",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let config = Config::from_env().unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.max_header_bytes, 1 << 20);
        assert_eq!(config.upstream.origin, DEFAULT_UPSTREAM_ORIGIN);
        assert_eq!(config.upstream.proxy_prefix, "/api/");
        assert_eq!(config.upstream.request_timeout, Duration::from_secs(25));
        assert_eq!(config.upstream.idle_timeout, Duration::from_secs(90));
        assert!(!config.log.debug);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("PORT", "9000");
        env::set_var("DEBUG", "true");
        env::set_var("UPSTREAM_ORIGIN", "http://127.0.0.1:3000/");
        env::set_var("UPSTREAM_REQUEST_TIMEOUT", "5");
        env::set_var("UPSTREAM_MAX_CONNS_PER_HOST", "16");

        let config = Config::from_env().unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(config.log.debug);
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.upstream.origin, "http://127.0.0.1:3000");
        assert_eq!(config.upstream.request_timeout, Duration::from_secs(5));
        assert_eq!(config.upstream.max_conns_per_host, 16);
        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn test_config_from_env_invalid_port() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("PORT", "not-a-port");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, RelayError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_from_env_invalid_timeout() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("UPSTREAM_POOL_TIMEOUT", "soon");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, RelayError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_request_timeout_bounds() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        for raw in ["0", "31", "600"] {
            env::set_var("UPSTREAM_REQUEST_TIMEOUT", raw);
            let err = Config::from_env().unwrap_err();
            assert!(matches!(err, RelayError::InvalidConfig(_)), "{}", raw);
        }

        for (raw, secs) in [("1", 1), ("30", 30)] {
            env::set_var("UPSTREAM_REQUEST_TIMEOUT", raw);
            let config = Config::from_env().unwrap();
            assert_eq!(config.upstream.request_timeout, Duration::from_secs(secs));
        }
    }

    #[test]
    fn test_parse_origin_rejects_path_and_query() {
        assert!(parse_origin("https://upstream.example").is_ok());
        assert!(matches!(
            parse_origin("https://upstream.example/api"),
            Err(RelayError::InvalidConfig(_))
        ));
        assert!(matches!(
            parse_origin("https://upstream.example?x=1"),
            Err(RelayError::InvalidConfig(_))
        ));
        assert!(matches!(
            parse_origin("ftp://upstream.example"),
            Err(RelayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_prefix() {
        assert_eq!(parse_prefix("/api/").unwrap(), "/api/");
        assert!(parse_prefix("api/").is_err());
        assert!(parse_prefix("/").is_err());
    }
}
