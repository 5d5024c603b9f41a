use reqwest::Url;

use super::delete_guard::DeleteGuardPolicy;
use crate::network::NetworkConfig;
use crate::resilience::ResilienceConfig;

/// Everything one service instance needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listener and HTTP stack settings.
    pub network: NetworkConfig,
    /// Breaker, retry and timeout settings for calls to the peer.
    pub resilience: ResilienceConfig,
    /// Base URL of the counterpart service's API.
    pub peer_url: Url,
    /// Where lifecycle events are POSTed. Empty means `peer_url`.
    pub event_peers: Vec<Url>,
    /// Department service only: what to do when the roster lookup fails.
    pub delete_guard_policy: DeleteGuardPolicy,
}

impl ServiceConfig {
    /// Config with defaults around the given peer.
    #[must_use]
    pub fn new(peer_url: Url) -> Self {
        Self {
            network: NetworkConfig::default(),
            resilience: ResilienceConfig::default(),
            peer_url,
            event_peers: Vec::new(),
            delete_guard_policy: DeleteGuardPolicy::default(),
        }
    }

    /// Event destinations, falling back to the API peer.
    #[must_use]
    pub fn event_targets(&self) -> Vec<Url> {
        if self.event_peers.is_empty() {
            vec![self.peer_url.clone()]
        } else {
            self.event_peers.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn defaults() {
        let peer = Url::parse("http://localhost:8082").unwrap();
        let config = ServiceConfig::new(peer.clone());
        assert_eq!(config.resilience.call_timeout, Duration::from_secs(2));
        assert_eq!(config.delete_guard_policy, DeleteGuardPolicy::FailOpen);
        assert_eq!(config.event_targets(), vec![peer]);
    }

    #[test]
    fn explicit_event_peers_win() {
        let mut config = ServiceConfig::new(Url::parse("http://a:1").unwrap());
        let b = Url::parse("http://b:2").unwrap();
        config.event_peers.push(b.clone());
        assert_eq!(config.event_targets(), vec![b]);
    }
}
