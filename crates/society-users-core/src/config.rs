//! Users service configuration.

use std::fmt;

use society_core::{SocietyError, SocietyResult};

/// Users service configuration.
#[derive(Clone)]
pub struct UsersConfig {
    /// Namespace every user key lives in.
    pub namespace: String,
    /// Maximum number of users returned by a list.
    pub list_limit: usize,
    /// Prefix the routes are mounted under.
    pub base_path: String,
    /// Static bearer token; `None` disables auth.
    pub api_key: Option<String>,
    /// Endpoint advertised in the preflight document.
    pub documentation_url: String,
}

impl fmt::Debug for UsersConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsersConfig")
            .field("namespace", &self.namespace)
            .field("list_limit", &self.list_limit)
            .field("base_path", &self.base_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("documentation_url", &self.documentation_url)
            .finish()
    }
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            namespace: "NeverLand".to_owned(),
            list_limit: 10,
            base_path: String::new(),
            api_key: None,
            documentation_url: "http://abhijit-kar.com/swagger/".to_owned(),
        }
    }
}

impl UsersConfig {
    /// Create configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `USERS_NAMESPACE` | `NeverLand` |
    /// | `USERS_LIST_LIMIT` | `10` |
    /// | `USERS_BASE_PATH` | empty |
    /// | `USERS_API_KEY` | unset (auth disabled) |
    /// | `USERS_DOCUMENTATION_URL` | `http://abhijit-kar.com/swagger/` |
    ///
    /// # Errors
    ///
    /// Returns [`SocietyError::Config`] when a value cannot be parsed.
    pub fn from_env() -> SocietyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SocietyError::Config`] when a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SocietyResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("USERS_NAMESPACE") {
            config.namespace = v;
        }
        if let Some(v) = lookup("USERS_LIST_LIMIT") {
            config.list_limit = match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(SocietyError::Config(format!(
                        "USERS_LIST_LIMIT must be a positive integer, got {v:?}"
                    )));
                }
            };
        }
        if let Some(v) = lookup("USERS_BASE_PATH") {
            config.base_path = v;
        }
        config.api_key = lookup("USERS_API_KEY").filter(|v| !v.is_empty());
        if let Some(v) = lookup("USERS_DOCUMENTATION_URL") {
            config.documentation_url = v;
        }

        Ok(config)
    }
}
