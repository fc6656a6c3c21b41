use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use opsgrid_core::AppError;
use tracing_subscriber::EnvFilter;

/// How the API establishes the caller's identity. Picked once at startup;
/// request handling never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Server-side sessions; identity installed via `/auth/assume`.
    Session,
    /// Identity read from a header set by an authenticating proxy.
    TrustedHeader,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub frontend_url: String,
    pub bootstrap_token: String,
    pub api_host: String,
    pub api_port: u16,
    pub auth_strategy: AuthStrategy,
    pub cookie_secure: bool,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let bootstrap_token = required_env("AUTH_BOOTSTRAP_TOKEN")?;

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let auth_strategy = match env::var("AUTH_STRATEGY")
            .unwrap_or_else(|_| "session".to_owned())
            .as_str()
        {
            "session" => AuthStrategy::Session,
            "trusted-header" => AuthStrategy::TrustedHeader,
            other => {
                return Err(AppError::Validation(format!(
                    "AUTH_STRATEGY must be either 'session' or 'trusted-header', got '{other}'"
                )));
            }
        };

        if auth_strategy == AuthStrategy::Session {
            let session_secret = required_env("SESSION_SECRET")?;
            if session_secret.len() < 32 {
                return Err(AppError::Validation(
                    "SESSION_SECRET must be at least 32 characters".to_owned(),
                ));
            }
        }

        let cookie_secure = env::var("SESSION_COOKIE_SECURE")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        Ok(Self {
            migrate_only,
            database_url,
            frontend_url,
            bootstrap_token,
            api_host,
            api_port,
            auth_strategy,
            cookie_secure,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}
