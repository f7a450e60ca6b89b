//! Configuration for caretrack-api
//!
//! Everything resolves from command-line flags with environment-variable
//! fallbacks (`CARETRACK_*`). The token secret has no default: the service
//! refuses to start without one.

use caretrack_common::{Error, Result};
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "caretrack-api", version, about = "CareTrack administration backend")]
pub struct Config {
    /// PostgreSQL connection URL
    #[arg(long, env = "CARETRACK_DATABASE_URL")]
    pub database_url: String,

    /// Address to listen on
    #[arg(long, env = "CARETRACK_BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind_addr: String,

    /// Secret used to sign access tokens
    #[arg(long, env = "CARETRACK_TOKEN_SECRET")]
    pub token_secret: String,

    /// Access-token lifetime in minutes
    #[arg(long, env = "CARETRACK_TOKEN_TTL_MINUTES", default_value_t = 480)]
    pub token_ttl_minutes: i64,

    /// Audit-log retention in months; cleanup deletes older entries
    #[arg(long, env = "CARETRACK_AUDIT_RETENTION_MONTHS", default_value_t = 84)]
    pub audit_retention_months: u32,

    /// Enable audit logging (off unless explicitly switched on)
    #[arg(long, env = "CARETRACK_ENABLE_AUDIT", default_value_t = false)]
    pub enable_audit: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.token_secret.trim().is_empty() {
            return Err(Error::Config(
                "CARETRACK_TOKEN_SECRET must not be empty".to_string(),
            ));
        }
        if self.token_ttl_minutes <= 0 {
            return Err(Error::Config(
                "Token TTL must be a positive number of minutes".to_string(),
            ));
        }
        if self.audit_retention_months == 0 {
            return Err(Error::Config(
                "Audit retention must be at least one month".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "caretrack-api",
            "--database-url",
            "postgres://localhost/caretrack",
            "--token-secret",
            "s3cret",
        ]
    }

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(base_args()).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.token_ttl_minutes, 480);
        assert_eq!(config.audit_retention_months, 84);
        assert!(!config.enable_audit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_secret_rejected() {
        let mut args = base_args();
        args[4] = "  ";
        let config = Config::try_parse_from(args).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nonpositive_ttl_rejected() {
        let mut args = base_args();
        args.extend(["--token-ttl-minutes", "0"]);
        let config = Config::try_parse_from(args).unwrap();
        assert!(config.validate().is_err());
    }
}
