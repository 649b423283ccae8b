//! Bridge Registry
//!
//! Holds every active bridge in registration order. The session layer calls
//! into the registry whenever a local client subscribes or unsubscribes so
//! that matching `sub` rules on any bridge can mirror the subscription.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{info, trace};

use crate::config::{BridgeConfig, ConfigError};
use crate::topic::TopicTokens;

use super::error::{BridgeError, Result};
use super::mirror::UpstreamRequest;
use super::topic::Bridge;

/// Registry of active bridges
pub struct BridgeRegistry {
    bridges: RwLock<Vec<Arc<Bridge>>>,
}

impl BridgeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            bridges: RwLock::new(Vec::new()),
        }
    }

    /// Build a registry from bridge configurations, skipping disabled bridges.
    ///
    /// Each bridge gets a clone of `upstream` for its mirrored subscriptions.
    /// Fails on the first bridge with an invalid rule or a duplicate name.
    pub fn from_configs(
        configs: &[BridgeConfig],
        upstream: Option<&mpsc::UnboundedSender<UpstreamRequest>>,
    ) -> std::result::Result<Self, ConfigError> {
        let registry = Self::new();

        for config in configs.iter().filter(|b| b.enabled) {
            let bridge_error = |source| ConfigError::Bridge {
                name: config.name.clone(),
                source,
            };

            let mut bridge = Bridge::from_config(config).map_err(bridge_error)?;
            if let Some(upstream) = upstream {
                bridge = bridge.with_upstream(upstream.clone());
            }
            registry.add_bridge(bridge).map_err(bridge_error)?;
        }

        Ok(registry)
    }

    /// Add a fully registered bridge.
    ///
    /// Bridge names must be unique within the registry.
    pub fn add_bridge(&self, bridge: Bridge) -> Result<Arc<Bridge>> {
        let mut bridges = self.bridges.write();

        if bridges.iter().any(|b| b.name() == bridge.name()) {
            return Err(BridgeError::InvalidArgument("duplicate bridge name"));
        }

        bridges.try_reserve(1)?;
        let bridge = Arc::new(bridge);
        bridges.push(bridge.clone());

        info!("Bridge registry: Added bridge '{}'", bridge.name());

        Ok(bridge)
    }

    /// Look up a bridge by name
    pub fn get(&self, name: &str) -> Option<Arc<Bridge>> {
        self.bridges.read().iter().find(|b| b.name() == name).cloned()
    }

    /// Snapshot of all bridges, in registration order
    pub fn bridges(&self) -> Vec<Arc<Bridge>> {
        self.bridges.read().clone()
    }

    /// Get the number of bridges
    pub fn len(&self) -> usize {
        self.bridges.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bridges.read().is_empty()
    }

    /// Mirror a local subscription on the first bridge with a covering `sub` rule.
    ///
    /// Returns `NotFound` when no bridge mirrors the subscription.
    pub fn on_local_subscribe(&self, client_id: &str, tokens: &TopicTokens) -> Result<()> {
        let bridges = self.bridges.read();

        for bridge in bridges.iter() {
            match bridge.on_local_subscribe(client_id, tokens) {
                Err(BridgeError::NotFound) => continue,
                result => return result,
            }
        }

        trace!("No bridge mirrors subscription '{}'", tokens);
        Err(BridgeError::NotFound)
    }

    /// Release a local subscription on every bridge that mirrors it.
    ///
    /// Returns `NotFound` when no bridge held the subscription.
    pub fn on_local_unsubscribe(&self, client_id: &str, tokens: &TopicTokens) -> Result<()> {
        let bridges = self.bridges.read();
        let mut found = false;

        for bridge in bridges.iter() {
            match bridge.on_local_unsubscribe(client_id, tokens) {
                Ok(()) => found = true,
                Err(BridgeError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        if found {
            Ok(())
        } else {
            Err(BridgeError::NotFound)
        }
    }
}

impl Default for BridgeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
