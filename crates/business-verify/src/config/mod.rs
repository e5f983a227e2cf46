use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub verification: VerificationConfig,
    pub auth: AuthConfig,
    pub blobs: BlobConfig,
    pub intake: IntakeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let auto_approve = env::var("AUTO_APPROVE")
            .map(|value| value == "true")
            .unwrap_or(false);

        let non_empty = |key: &str| env::var(key).ok().filter(|value| !value.trim().is_empty());

        let queue_depth = env::var("INTAKE_QUEUE_DEPTH")
            .unwrap_or_else(|_| "64".to_string())
            .parse::<usize>()
            .ok()
            .filter(|depth| *depth > 0)
            .ok_or(ConfigError::InvalidQueueDepth)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            verification: VerificationConfig { auto_approve },
            auth: AuthConfig {
                jwt_secret: non_empty("AUTH_JWT_SECRET"),
                issuer: non_empty("AUTH_JWT_ISSUER"),
                audience: non_empty("AUTH_JWT_AUDIENCE"),
            },
            blobs: BlobConfig {
                root: PathBuf::from(
                    env::var("BLOB_ROOT").unwrap_or_else(|_| "./blobs".to_string()),
                ),
            },
            intake: IntakeConfig {
                queue_depth,
                event_secret: non_empty("INTAKE_EVENT_SECRET"),
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Pipeline behavior resolved once at process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerificationConfig {
    /// Approve requests whose automated checks all pass, without a reviewer.
    pub auto_approve: bool,
}

/// Bearer-token verification settings for the decision endpoint.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

impl AuthConfig {
    pub fn require_secret(&self) -> Result<&str, ConfigError> {
        self.jwt_secret
            .as_deref()
            .ok_or(ConfigError::MissingJwtSecret)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

/// Location of the filesystem blob store.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    pub root: PathBuf,
}

/// Intake event queue sizing and the shared secret expected from the event source.
#[derive(Clone)]
pub struct IntakeConfig {
    pub queue_depth: usize,
    pub event_secret: Option<String>,
}

impl IntakeConfig {
    pub fn require_event_secret(&self) -> Result<&str, ConfigError> {
        self.event_secret
            .as_deref()
            .ok_or(ConfigError::MissingIntakeSecret)
    }
}

impl fmt::Debug for IntakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeConfig")
            .field("queue_depth", &self.queue_depth)
            .field("event_secret", &self.event_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidQueueDepth,
    MissingJwtSecret,
    MissingIntakeSecret,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidQueueDepth => {
                write!(f, "INTAKE_QUEUE_DEPTH must be a positive integer")
            }
            ConfigError::MissingJwtSecret => {
                write!(f, "AUTH_JWT_SECRET is required to verify reviewer tokens")
            }
            ConfigError::MissingIntakeSecret => {
                write!(f, "INTAKE_EVENT_SECRET is required to accept request events")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidQueueDepth
            | ConfigError::MissingJwtSecret
            | ConfigError::MissingIntakeSecret => None,
        }
    }
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> &'static std::sync::Mutex<()> {
    static GUARD: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD.get_or_init(|| std::sync::Mutex::new(()))
}
