//! Board constants and environment-selected client settings.

use core::fmt;
use core::str::FromStr;
use std::env;
use std::time::Duration;

use url::Url;

pub const BOARD_HEIGHT: usize = 6;
pub const BOARD_WIDTH: usize = 7;
/// Pieces in a row the server needs to declare a winner. The client never checks it.
pub const WINNING_LENGTH: usize = 4;

const DEV_API_URL: &str = "http://localhost:5000/api";
const DEV_SOCKET_URL: &str = "ws://localhost:5000/socket.io/?EIO=4&transport=websocket";
const PROD_API_URL: &str = "https://c4.joyce.red/api";
const PROD_SOCKET_URL: &str = "wss://c4.joyce.red/socket.io/?EIO=4&transport=websocket";

/// Default timeout for a single HTTP request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a subscription gets to leave its channel before it is aborted.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Deployment the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Read `C4_ENV`, falling back to development when unset or unknown.
    pub fn from_env() -> Self {
        env::var("C4_ENV")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn api_url(self) -> &'static str {
        match self {
            Environment::Development => DEV_API_URL,
            Environment::Production => PROD_API_URL,
        }
    }

    pub fn socket_url(self) -> &'static str {
        match self {
            Environment::Development => DEV_SOCKET_URL,
            Environment::Production => PROD_SOCKET_URL,
        }
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(anyhow::anyhow!("unknown environment: {}", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Bounded reconnection schedule for the push channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Consecutive failed connection attempts before the subscription gives up.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Random extra delay as a fraction of the computed delay (0.0 disables jitter).
    ///
    /// Clamped to `0.0..=1.0`; a non-finite value disables jitter.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter: 0.5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `retry` (zero based), without jitter.
    ///
    /// Doubles from `initial_delay` and never exceeds `max_delay`.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.min(31)).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay before retry number `retry` with random jitter applied.
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        let jitter = if self.jitter.is_finite() { self.jitter.min(1.0) } else { 0.0 };
        if jitter <= 0.0 || base.is_zero() {
            return base;
        }
        use rand::Rng;
        let extra = rand::rng().random_range(0.0..=jitter);
        Duration::try_from_secs_f64(base.as_secs_f64() * (1.0 + extra))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Attempts allowed, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Everything the session needs to reach the game server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub socket_url: Url,
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    /// Default settings for the given deployment.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            api_base_url: Url::parse(environment.api_url()).expect("built-in API URL is valid"),
            socket_url: Url::parse(environment.socket_url()).expect("built-in socket URL is valid"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Settings selected by `C4_ENV`, with `C4_API_URL` and `C4_SOCKET_URL` overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::for_environment(Environment::from_env());
        if let Ok(api) = env::var("C4_API_URL") {
            config = config.with_api_base_url(&api)?;
        }
        if let Ok(socket) = env::var("C4_SOCKET_URL") {
            config = config.with_socket_url(&socket)?;
        }
        Ok(config)
    }

    pub fn with_api_base_url(mut self, url: &str) -> anyhow::Result<Self> {
        let parsed = Url::parse(url).map_err(|e| anyhow::anyhow!("invalid API URL {}: {}", url, e))?;
        if parsed.cannot_be_a_base() {
            return Err(anyhow::anyhow!("API URL {} cannot be used as a base", url));
        }
        self.api_base_url = parsed;
        Ok(self)
    }

    pub fn with_socket_url(mut self, url: &str) -> anyhow::Result<Self> {
        let parsed =
            Url::parse(url).map_err(|e| anyhow::anyhow!("invalid socket URL {}: {}", url, e))?;
        match parsed.scheme() {
            "ws" | "wss" => {}
            other => return Err(anyhow::anyhow!("unsupported socket scheme: {}", other)),
        }
        self.socket_url = parsed;
        Ok(self)
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Development)
    }
}
