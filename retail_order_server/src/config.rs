use std::env;

use log::*;
use ros_common::{parse_boolean_flag, Secret};

use retail_order_engine::helpers::DEFAULT_MIN_REFERENCE_RUN;

const DEFAULT_ROS_HOST: &str = "127.0.0.1";
const DEFAULT_ROS_PORT: u16 = 8360;

/// The HMAC signature header the payment gateway attaches to webhook calls.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-payment-signature";
/// The API key header for the admin surface.
pub const ADMIN_API_KEY_HEADER: &str = "x-api-key";
/// The buyer identity header installed by the upstream auth collaborator.
pub const BUYER_ID_HEADER: &str = "x-buyer-id";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for validating payment webhook signatures. Distinct from anything user-session related.
    pub webhook_secret: Secret<String>,
    /// If false, webhook HMAC validation is skipped entirely. **DANGER**: only for local development.
    pub webhook_hmac_checks: bool,
    /// API key required on the `/api` admin surface.
    pub admin_api_key: Secret<String>,
    /// The shortest alphanumeric run the payment reference extractor will treat as a stripped order id.
    pub min_reference_run: usize,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address in access logs,
    /// rather than the connection's remote address.
    pub use_x_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_ROS_HOST.to_string(),
            port: DEFAULT_ROS_PORT,
            database_url: String::default(),
            webhook_secret: Secret::default(),
            webhook_hmac_checks: true,
            admin_api_key: Secret::default(),
            min_reference_run: DEFAULT_MIN_REFERENCE_RUN,
            use_x_forwarded_for: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("ROS_HOST").ok().unwrap_or_else(|| DEFAULT_ROS_HOST.into());
        let port = env::var("ROS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for ROS_PORT. {e} Using the default, {DEFAULT_ROS_PORT}, instead."
                    );
                    DEFAULT_ROS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_ROS_PORT);
        let database_url = env::var("ROS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ ROS_DATABASE_URL is not set. Please set it to the URL for the order database.");
            String::default()
        });
        let webhook_secret = env::var("ROS_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ ROS_WEBHOOK_SECRET is not set. Webhook signatures cannot be validated without it. Set it to the \
                 shared secret configured at the payment gateway."
            );
            String::default()
        });
        let webhook_hmac_checks = parse_boolean_flag(env::var("ROS_WEBHOOK_HMAC_CHECKS").ok(), true);
        if !webhook_hmac_checks {
            warn!(
                "🚨️ Webhook HMAC checks are DISABLED. Any caller can submit payment notifications. Do not run a \
                 production instance like this."
            );
        }
        let admin_api_key = env::var("ROS_ADMIN_API_KEY").ok().unwrap_or_else(|| {
            warn!("🪛️ ROS_ADMIN_API_KEY is not set. The admin API will reject every request.");
            String::default()
        });
        let min_reference_run = env::var("ROS_MIN_REFERENCE_RUN")
            .ok()
            .and_then(|s| {
                s.parse::<usize>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for ROS_MIN_REFERENCE_RUN. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_MIN_REFERENCE_RUN);
        let use_x_forwarded_for = parse_boolean_flag(env::var("ROS_USE_X_FORWARDED_FOR").ok(), false);
        Self {
            host,
            port,
            database_url,
            webhook_secret: Secret::new(webhook_secret),
            webhook_hmac_checks,
            admin_api_key: Secret::new(admin_api_key),
            min_reference_run,
            use_x_forwarded_for,
        }
    }
}
