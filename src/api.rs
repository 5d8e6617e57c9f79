//! Entry point for host applications.

use std::sync::Arc;

use tracing::info;

use crate::access::ProfileId;
use crate::backend::{DiscoveryBackend, RequestBackend};
use crate::cache::NetworkClass;
use crate::config::{ConfigResult, CoreConfig};
use crate::discovery::{DiscoveryAggregator, DiscoveryFilters, FeedCaches};

/// Core interface for Mirror functionality.
///
/// Owns the caches shared by every feed. Build one per signed-in session and
/// hand out aggregators with [`MirrorCore::feed`]; aggregators built from the
/// same core coalesce their loads.
#[derive(Debug, Clone)]
pub struct MirrorCore {
    config: CoreConfig,
    caches: FeedCaches,
}

impl Default for MirrorCore {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

impl MirrorCore {
    /// Creates a core from an already validated config.
    ///
    /// # Examples
    ///
    /// ```
    /// use mirror_core::{CoreConfig, MirrorCore};
    ///
    /// let core = MirrorCore::new(CoreConfig::default());
    /// assert_eq!(core.default_filters().limit, 20);
    /// ```
    #[must_use]
    pub fn new(config: CoreConfig) -> Self {
        Self {
            caches: FeedCaches::new(config.cache.ttl_policy()),
            config,
        }
    }

    /// Validates `config` and creates a core.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`](crate::config::ConfigError::Invalid)
    /// for out-of-range values.
    pub fn from_config(config: CoreConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Returns the active config.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Returns the shared caches.
    #[must_use]
    pub const fn caches(&self) -> &FeedCaches {
        &self.caches
    }

    /// Returns the network class used for new cache entries.
    #[must_use]
    pub fn network_class(&self) -> NetworkClass {
        self.caches.pages.network_class()
    }

    /// Updates the network hint. Entries already stored keep their TTL.
    pub fn set_network_class(&self, network: NetworkClass) {
        info!(network = network.as_str(), "Network class changed");
        self.caches.set_network_class(network);
    }

    /// Default filters with the configured page size.
    #[must_use]
    pub fn default_filters(&self) -> DiscoveryFilters {
        self.config.default_filters()
    }

    /// Builds a feed for `viewer` backed by the shared caches.
    #[must_use]
    pub fn feed<B>(&self, viewer: impl Into<ProfileId>, backend: Arc<B>) -> DiscoveryAggregator<B>
    where
        B: DiscoveryBackend + RequestBackend + 'static,
    {
        DiscoveryAggregator::new(viewer, backend, self.caches.clone())
    }

    /// Drops every cached value, e.g. on sign-out.
    ///
    /// Loads still in flight are detached; their waiters receive
    /// [`CacheError::Invalidated`](crate::cache::CacheError::Invalidated).
    pub fn logout(&self) {
        info!("Clearing cached discovery data");
        self.caches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::access::ProfileId;
    use crate::discovery::{DiscoveryPage, PageKey};

    #[test]
    fn default_uses_default_config() {
        let core = MirrorCore::default();
        assert_eq!(core.config(), &CoreConfig::default());
        assert_eq!(core.network_class(), NetworkClass::Normal);
    }

    #[test]
    fn from_config_rejects_invalid() {
        let config = CoreConfig {
            cache: CacheConfig {
                normal_ttl_secs: 0,
                constrained_ttl_secs: 0,
            },
            ..CoreConfig::default()
        };
        assert!(MirrorCore::from_config(config).is_err());
    }

    #[test]
    fn set_network_class_updates_caches() {
        let core = MirrorCore::default();
        core.set_network_class(NetworkClass::Constrained);
        assert_eq!(core.network_class(), NetworkClass::Constrained);
        assert_eq!(
            core.caches().access.network_class(),
            NetworkClass::Constrained
        );
    }

    #[tokio::test]
    async fn logout_clears_caches() {
        let core = MirrorCore::default();
        core.caches().pages.insert(
            PageKey {
                viewer: ProfileId::from("v"),
                signature: "sig".to_string(),
                offset: 0,
            },
            DiscoveryPage {
                profiles: Vec::new(),
                has_more: false,
            },
            None,
        );
        assert_eq!(core.caches().pages.stats().entries, 1);

        core.logout();
        assert_eq!(core.caches().pages.stats().entries, 0);
    }

    #[test]
    fn debug_trait_implementation() {
        let core = MirrorCore::default();
        let debug_str = format!("{core:?}");
        assert!(debug_str.contains("MirrorCore"));
    }
}
