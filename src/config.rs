//! Construction-time proxy configuration.

use crate::error::{Error, Result};

/// Default bound on concurrently running background writes and refreshes.
/// Override with the `CACHE_PROXY_MAX_BACKGROUND_TASKS` environment variable.
pub const DEFAULT_MAX_BACKGROUND_TASKS: usize = 256;

/// Configuration fixed for the lifetime of a [`CacheProxy`](crate::CacheProxy).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Prefix prepended to every store key as `"{namespace}:{key}"`.
    pub namespace: Option<String>,

    /// Maximum number of detached tasks running at once. Further tasks queue.
    pub max_background_tasks: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            namespace: None,
            max_background_tasks: DEFAULT_MAX_BACKGROUND_TASKS,
        }
    }
}

impl ProxyConfig {
    /// Build configuration from the environment.
    ///
    /// - `CACHE_PROXY_NAMESPACE`: key namespace (unset = none)
    /// - `CACHE_PROXY_MAX_BACKGROUND_TASKS`: background task bound
    ///
    /// Unparsable values fall back to the defaults with a warning.
    pub fn from_env() -> Self {
        let namespace = std::env::var("CACHE_PROXY_NAMESPACE")
            .ok()
            .filter(|s| !s.is_empty());

        let max_background_tasks = match std::env::var("CACHE_PROXY_MAX_BACKGROUND_TASKS") {
            Ok(raw) => raw.parse::<usize>().unwrap_or_else(|_| {
                warn!(
                    "Ignoring invalid CACHE_PROXY_MAX_BACKGROUND_TASKS={:?}, using {}",
                    raw, DEFAULT_MAX_BACKGROUND_TASKS
                );
                DEFAULT_MAX_BACKGROUND_TASKS
            }),
            Err(_) => DEFAULT_MAX_BACKGROUND_TASKS,
        };

        ProxyConfig {
            namespace,
            max_background_tasks,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_max_background_tasks(mut self, max: usize) -> Self {
        self.max_background_tasks = max;
        self
    }

    /// Reject configurations the proxy cannot run with.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for a zero task bound or an empty namespace.
    pub fn validate(&self) -> Result<()> {
        if self.max_background_tasks == 0 {
            return Err(Error::ConfigError(
                "max_background_tasks must be at least 1".to_string(),
            ));
        }

        if let Some(ns) = &self.namespace {
            if ns.is_empty() {
                return Err(Error::ConfigError(
                    "namespace must not be empty when set".to_string(),
                ));
            }
        }

        Ok(())
    }
}
