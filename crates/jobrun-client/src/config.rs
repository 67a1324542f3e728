//! Client configuration.

/// Environment variable overriding [`ClientConfig::endpoint`].
pub const ENV_ENDPOINT: &str = "JOBRUN_ENDPOINT";
/// Environment variable overriding [`ClientConfig::username`].
pub const ENV_USERNAME: &str = "JOBRUN_USERNAME";
/// Environment variable overriding [`ClientConfig::password`].
pub const ENV_PASSWORD: &str = "JOBRUN_PASSWORD";

/// Connection settings for the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the service.
    pub endpoint: String,

    /// Basic-auth user name.
    pub username: Option<String>,

    /// Basic-auth password.
    pub password: Option<String>,

    /// Per-request timeout (seconds).
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000".to_string(),
            username: None,
            password: None,
            request_timeout_secs: 60,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `JOBRUN_ENDPOINT`, `JOBRUN_USERNAME` and
    /// `JOBRUN_PASSWORD` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        config.username = lookup(ENV_USERNAME).or(config.username);
        config.password = lookup(ENV_PASSWORD).or(config.password);
        config
    }

    /// Builder method to set the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Builder method to set basic-auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Builder method to set the request timeout.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_overrides_defaults() {
        let config = ClientConfig::from_lookup(|key| match key {
            ENV_ENDPOINT => Some("http://core.test".to_string()),
            ENV_USERNAME => Some("usr".to_string()),
            _ => None,
        });

        assert_eq!(config.endpoint, "http://core.test");
        assert_eq!(config.username.as_deref(), Some("usr"));
        assert!(config.password.is_none());
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::default()
            .with_endpoint("http://core.test")
            .with_credentials("usr", "pwd")
            .with_request_timeout(5);

        assert_eq!(config.endpoint, "http://core.test");
        assert_eq!(config.password.as_deref(), Some("pwd"));
        assert_eq!(config.request_timeout_secs, 5);
    }
}
