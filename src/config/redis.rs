//! Redis configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Redis configuration for the conversation store and the analysis queue
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Prefix of conversation record keys
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Expiry of idle conversation records in seconds; 0 disables it
    #[serde(default = "default_record_ttl")]
    pub record_ttl_secs: u64,
}

impl RedisConfig {
    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS__URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.key_prefix.is_empty() {
            return Err(ValidationError::MissingRequired("REDIS__KEY_PREFIX"));
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key_prefix: default_key_prefix(),
            record_ttl_secs: default_record_ttl(),
        }
    }
}

fn default_key_prefix() -> String {
    "conversations".to_string()
}

fn default_record_ttl() -> u64 {
    7 * 24 * 60 * 60
}
