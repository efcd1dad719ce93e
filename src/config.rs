//! Application-level configuration, loaded from the environment.

use std::env;

use time::Duration;
use tracing::warn;

/// Port the HTTP server binds to when none is configured.
const DEFAULT_PORT: u16 = 8080;
/// Base URL advertised in photo links when none is configured.
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
/// Signing secret used when none is configured. Fine for local play, not for
/// anything reachable from the internet.
const DEFAULT_TOKEN_SECRET: &str = "gotcha-dev-secret";
/// Lifetime of player credentials.
const DEFAULT_CREDENTIAL_TTL_SECONDS: i64 = 86_400;
/// Lifetime of photo access tokens.
const DEFAULT_PHOTO_URL_TTL_SECONDS: i64 = 3_600;
/// Smallest roster a session may start with.
const DEFAULT_MIN_PLAYERS: usize = 2;
/// Length of generated join codes.
const DEFAULT_CODE_LENGTH: usize = 6;
/// How many collisions code generation tolerates before giving up.
const DEFAULT_CODE_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Externally reachable base URL, used to build photo links.
    pub public_base_url: String,
    /// HS256 signing secret for credentials and photo tokens.
    pub token_secret: String,
    /// How long player credentials stay valid.
    pub credential_ttl: Duration,
    /// How long photo links stay valid.
    pub photo_url_ttl: Duration,
    /// Minimum roster size required to start a session.
    pub min_players: usize,
    /// Length of generated join codes.
    pub code_length: usize,
    /// Join code generation attempts before reporting exhaustion.
    pub code_attempts: u32,
    /// Whether eliminations must pass face verification.
    pub verification_required: bool,
}

impl AppConfig {
    /// Build the configuration from `GOTCHA_*` environment variables, falling
    /// back to local-play defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let token_secret = match env::var("GOTCHA_TOKEN_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("GOTCHA_TOKEN_SECRET not set; using the built-in development secret");
                defaults.token_secret
            }
        };

        let min_players = parse_var("GOTCHA_MIN_PLAYERS").unwrap_or(defaults.min_players);
        let min_players = if min_players < DEFAULT_MIN_PLAYERS {
            warn!(
                requested = min_players,
                "GOTCHA_MIN_PLAYERS below the smallest viable ring; clamping"
            );
            DEFAULT_MIN_PLAYERS
        } else {
            min_players
        };

        Self {
            port: env::var("PORT")
                .or_else(|_| env::var("GOTCHA_PORT"))
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.port),
            public_base_url: env::var("GOTCHA_PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            token_secret,
            credential_ttl: parse_var("GOTCHA_CREDENTIAL_TTL_SECONDS")
                .map(Duration::seconds)
                .unwrap_or(defaults.credential_ttl),
            photo_url_ttl: parse_var("GOTCHA_PHOTO_URL_TTL_SECONDS")
                .map(Duration::seconds)
                .unwrap_or(defaults.photo_url_ttl),
            min_players,
            code_length: parse_var("GOTCHA_CODE_LENGTH").unwrap_or(defaults.code_length),
            code_attempts: parse_var("GOTCHA_CODE_ATTEMPTS").unwrap_or(defaults.code_attempts),
            verification_required: parse_var("GOTCHA_VERIFICATION_REQUIRED")
                .unwrap_or(defaults.verification_required),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.to_string(),
            token_secret: DEFAULT_TOKEN_SECRET.to_string(),
            credential_ttl: Duration::seconds(DEFAULT_CREDENTIAL_TTL_SECONDS),
            photo_url_ttl: Duration::seconds(DEFAULT_PHOTO_URL_TTL_SECONDS),
            min_players: DEFAULT_MIN_PLAYERS,
            code_length: DEFAULT_CODE_LENGTH,
            code_attempts: DEFAULT_CODE_ATTEMPTS,
            verification_required: true,
        }
    }
}

/// Read and parse an environment variable, ignoring unset or malformed values.
fn parse_var<T: std::str::FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|value| value.parse().ok())
}
