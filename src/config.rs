// src/config.rs

use std::time::Duration;

use anyhow::{anyhow, Context};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub cors_origin: Option<String>,
    pub jwt: JwtConfig,
    pub notify: NotifyConfig,
    pub stripe: StripeConfig,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Upper bound for every outbound push/email/SMS call.
    pub timeout: Duration,
    pub fcm_server_key: Option<String>,
    pub sendgrid: Option<SendGridConfig>,
    pub twilio: Option<TwilioConfig>,
}

#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    pub from_email: String,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} must be set"));

        let port = parse_or(var("PORT"), 8080u16).context("PORT must be a port number")?;
        let max_connections = parse_or(var("DATABASE_MAX_CONNECTIONS"), 10u32)
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
        let timeout_secs = parse_or(var("NOTIFY_TIMEOUT_SECS"), 5u64)
            .context("NOTIFY_TIMEOUT_SECS must be a whole number of seconds")?;

        let sendgrid = match (var("SENDGRID_API_KEY"), var("SENDGRID_FROM_EMAIL")) {
            (Some(api_key), Some(from_email)) => Some(SendGridConfig { api_key, from_email }),
            _ => None,
        };
        let twilio = match (
            var("TWILIO_ACCOUNT_SID"),
            var("TWILIO_AUTH_TOKEN"),
            var("TWILIO_FROM_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port,
            max_connections,
            cors_origin: var("CORS_ORIGIN"),
            jwt: JwtConfig {
                secret: required("JWT_SECRET")?,
                issuer: var("JWT_ISSUER").unwrap_or_else(|| "hotel-booking-api".into()),
            },
            notify: NotifyConfig {
                timeout: Duration::from_secs(timeout_secs),
                fcm_server_key: var("FCM_SERVER_KEY"),
                sendgrid,
                twilio,
            },
            stripe: StripeConfig {
                secret_key: var("STRIPE_SECRET_KEY"),
                webhook_secret: var("STRIPE_WEBHOOK_SECRET"),
                api_base: var("STRIPE_API_BASE").unwrap_or_else(|| "https://api.stripe.com".into()),
            },
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => Ok(v.trim().parse()?),
        None => Ok(default),
    }
}
