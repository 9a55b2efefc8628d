use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::rate_limiter::RateLimit;
use crate::session_manager::SessionPolicy;
use crate::verifier::VerifierLimits;

/// Command line and environment configuration of the leaderboard server
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    pub port: u16,
    /// Store endpoint: redis://[:password@]host:port or memory://
    #[clap(long, env = "REDIS_URL")]
    pub store_url: Option<String>,
    /// Timeout for one store round trip
    #[clap(long, default_value = "2000")]
    pub store_timeout_ms: u64,
    /// Lifetime of an issued session, clamped to the min/max below
    #[clap(long, env = "LEADERBOARD_SESSION_TTL_MS", default_value = "300000")]
    pub session_ttl_ms: u64,
    #[clap(long, default_value = "10000")]
    pub min_session_ttl_ms: u64,
    #[clap(long, default_value = "1800000")]
    pub max_session_ttl_ms: u64,
    /// Sessions issued per fingerprint per window
    #[clap(long, default_value = "10")]
    pub session_fingerprint_limit: u64,
    /// Sessions issued per network origin per window
    #[clap(long, default_value = "30")]
    pub session_origin_limit: u64,
    #[clap(long, default_value = "10")]
    pub submit_fingerprint_limit: u64,
    #[clap(long, default_value = "20")]
    pub submit_origin_limit: u64,
    /// Rate limit window length
    #[clap(long, default_value = "60000")]
    pub rate_window_ms: u64,
    /// Bind sessions to the network origin that requested them
    #[clap(long, default_value_t = true, action = ArgAction::Set)]
    pub bind_origin: bool,
    /// Take the client origin from the right-most X-Forwarded-For hop. Only
    /// set behind a proxy that appends the peer address to that header.
    #[clap(long, env = "LEADERBOARD_TRUST_FORWARDED_FOR")]
    pub trust_forwarded_for: bool,
    /// Salt mixed into fingerprint and origin hashes
    #[clap(long, env = "LEADERBOARD_IDENTITY_SALT", default_value = "")]
    pub identity_salt: String,
    /// JSON file overriding verifier tolerances
    #[clap(long)]
    pub limits_file: Option<PathBuf>,
    /// Number of entries kept on the leaderboard
    #[clap(long, default_value = "10")]
    pub leaderboard_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            store_url: None,
            store_timeout_ms: 2_000,
            session_ttl_ms: 300_000,
            min_session_ttl_ms: 10_000,
            max_session_ttl_ms: 1_800_000,
            session_fingerprint_limit: 10,
            session_origin_limit: 30,
            submit_fingerprint_limit: 10,
            submit_origin_limit: 20,
            rate_window_ms: 60_000,
            bind_origin: true,
            trust_forwarded_for: false,
            identity_salt: String::new(),
            limits_file: None,
            leaderboard_size: 10,
        }
    }
}

/// Submission thresholds, one per identity scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitLimits {
    pub fingerprint: RateLimit,
    pub origin: RateLimit,
}

impl Default for SubmitLimits {
    fn default() -> Self {
        ServerConfig::default().submit_limits()
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Configured session lifetime clamped to the operator bounds
    pub fn effective_session_ttl_ms(&self) -> Result<u64, String> {
        if self.min_session_ttl_ms > self.max_session_ttl_ms {
            return Err(format!(
                "minimum session ttl {}ms exceeds maximum {}ms",
                self.min_session_ttl_ms, self.max_session_ttl_ms
            ));
        }
        Ok(self
            .session_ttl_ms
            .clamp(self.min_session_ttl_ms, self.max_session_ttl_ms))
    }

    pub fn session_policy(&self) -> Result<SessionPolicy, String> {
        Ok(SessionPolicy {
            ttl_ms: self.effective_session_ttl_ms()?,
            bind_origin: self.bind_origin,
            fingerprint_limit: RateLimit::new(self.session_fingerprint_limit, self.rate_window_ms),
            origin_limit: RateLimit::new(self.session_origin_limit, self.rate_window_ms),
            ..SessionPolicy::default()
        })
    }

    pub fn submit_limits(&self) -> SubmitLimits {
        SubmitLimits {
            fingerprint: RateLimit::new(self.submit_fingerprint_limit, self.rate_window_ms),
            origin: RateLimit::new(self.submit_origin_limit, self.rate_window_ms),
        }
    }

    /// Verifier tolerances from `--limits-file`, or the built-in defaults
    pub fn verifier_limits(&self) -> Result<VerifierLimits, Box<dyn std::error::Error>> {
        match &self.limits_file {
            Some(path) => VerifierLimits::from_json_file(path),
            None => Ok(VerifierLimits::default()),
        }
    }
}
