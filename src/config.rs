use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub share_base_domain: String,
    pub payment_service_url: String,
    pub payment_service_token: String,
    /// Shared secret the payment gateway sends on payment callbacks. Unset rejects every callback.
    pub payment_callback_token: Option<String>,
    pub fulfillment_service_url: String,
    pub fulfillment_service_token: String,
    pub min_window_hours: i64,
    pub max_window_hours: i64,
    pub sweep_interval_secs: u64,
    pub sweep_batch_size: i64,
    pub session_code_attempts: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().expect("PORT must be a number"),
            share_base_domain: env::var("SHARE_BASE_DOMAIN").unwrap_or_else(|_| "order.local".to_string()),
            payment_service_url: env::var("PAYMENT_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8100/api/v1".to_string()),
            payment_service_token: env::var("PAYMENT_SERVICE_TOKEN").unwrap_or_else(|_| "test-token-1".to_string()),
            payment_callback_token: env::var("PAYMENT_CALLBACK_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            fulfillment_service_url: env::var("FULFILLMENT_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8200/api/v1/tickets".to_string()),
            fulfillment_service_token: env::var("FULFILLMENT_SERVICE_TOKEN").unwrap_or_else(|_| "test-token-1".to_string()),
            min_window_hours: parse_or("MIN_WINDOW_HOURS", 1),
            max_window_hours: parse_or("MAX_WINDOW_HOURS", 4),
            sweep_interval_secs: parse_or("SWEEP_INTERVAL_SECS", 30),
            sweep_batch_size: parse_or("SWEEP_BATCH_SIZE", 25),
            session_code_attempts: parse_or("SESSION_CODE_ATTEMPTS", 10),
        }
    }

    /// Defaults used by tests and local tooling; only the database URL varies.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            port: 0,
            share_base_domain: "order.local".to_string(),
            payment_service_url: "http://localhost".to_string(),
            payment_service_token: "token".to_string(),
            payment_callback_token: Some("callback-secret".to_string()),
            fulfillment_service_url: "http://localhost".to_string(),
            fulfillment_service_token: "token".to_string(),
            min_window_hours: 1,
            max_window_hours: 4,
            sweep_interval_secs: 30,
            sweep_batch_size: 25,
            session_code_attempts: 10,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| panic!("{} must be a number", key)),
        Err(_) => default,
    }
}
