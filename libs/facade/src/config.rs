use std::time::Duration;

use gsb_domain_models::ListName;

/// The single typed configuration record the façade is built from (spec
/// §9's replacement for a duck-typed "kwargs bag").
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub db_path: String,
    pub discard_fair_use: bool,
    pub subscribed_lists: Vec<ListName>,
    pub http_timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, db_path: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            db_path: db_path.into(),
            discard_fair_use: false,
            subscribed_lists: default_subscribed_lists(),
            http_timeout: Duration::from_secs(30),
            user_agent: "gsb/0.1".to_string(),
        }
    }
}

/// The upstream Safe Browsing v3 lists this workspace mirrors by default.
pub fn default_subscribed_lists() -> Vec<ListName> {
    vec![
        ListName::new("goog-malware-shavar"),
        ListName::new("googpub-phish-shavar"),
        ListName::new("goog-unwanted-shavar"),
    ]
}
