// ── Connectivity snapshot and walled-network prober ──
//
// The platform feeds network state through a watch channel; readers
// consume the cached snapshot without re-querying the OS. The walled
// check probes `{server}/index.php/204` and accepts only an empty 204;
// anything else (captive portal, proxy interception, no account, no
// network) counts as walled. Verdicts are cached behind a mutex held
// across the probe, so concurrent callers never race duplicate probes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::factory::ClientFactory;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a walled verdict stays valid before the next probe.
pub const DEFAULT_WALLED_CACHE_TTL: Duration = Duration::from_secs(600);

/// Physical transport reported by the platform for the active network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Wifi,
    Ethernet,
    Cellular,
    Vpn,
    Bluetooth,
    WifiAware,
    Usb,
}

/// Snapshot of the device's network state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    pub is_connected: bool,
    pub is_metered: bool,
    pub is_wifi_or_ethernet: bool,
}

impl Connectivity {
    /// Canonical "no network" snapshot.
    pub const DISCONNECTED: Self = Self {
        is_connected: false,
        is_metered: false,
        is_wifi_or_ethernet: false,
    };

    /// Classify platform capabilities into a snapshot. Connected means
    /// the platform reports internet capability or any recognized
    /// transport; metered mirrors the restricted flag.
    pub fn from_capabilities(
        has_internet: bool,
        transports: &[TransportKind],
        restricted: bool,
    ) -> Self {
        let is_connected = has_internet || !transports.is_empty();
        let is_wifi_or_ethernet = transports
            .iter()
            .any(|t| matches!(t, TransportKind::Wifi | TransportKind::Ethernet));
        Self {
            is_connected,
            is_metered: restricted,
            is_wifi_or_ethernet,
        }
    }
}

/// Publisher half of the network state channel, handed to the platform
/// integration. Publishing is eager: every callback pushes a fresh
/// snapshot and readers see it on their next borrow.
#[derive(Clone)]
pub struct NetworkStateHandle {
    tx: watch::Sender<Connectivity>,
}

impl NetworkStateHandle {
    pub fn publish(&self, state: Connectivity) {
        // Send only fails with no receivers left, which is fine.
        let _ = self.tx.send(state);
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

/// Create the network state channel, starting disconnected.
pub fn network_state_channel() -> (NetworkStateHandle, watch::Receiver<Connectivity>) {
    let (tx, rx) = watch::channel(Connectivity::DISCONNECTED);
    (NetworkStateHandle { tx }, rx)
}

#[derive(Debug, Clone, Copy)]
struct WalledVerdict {
    walled: bool,
    checked_at: Instant,
}

/// Connectivity questions for the current account's server: raw network
/// state plus the walled-network probe with its time-windowed cache.
pub struct ConnectivityService {
    state: watch::Receiver<Connectivity>,
    factory: Arc<ClientFactory>,
    walled_cache: Mutex<Option<WalledVerdict>>,
    cache_ttl: Duration,
}

impl ConnectivityService {
    pub fn new(state: watch::Receiver<Connectivity>, factory: Arc<ClientFactory>) -> Self {
        Self::with_cache_ttl(state, factory, DEFAULT_WALLED_CACHE_TTL)
    }

    pub fn with_cache_ttl(
        state: watch::Receiver<Connectivity>,
        factory: Arc<ClientFactory>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            state,
            factory,
            walled_cache: Mutex::new(None),
            cache_ttl,
        }
    }

    /// Current network snapshot, straight from the watch channel.
    pub fn connectivity(&self) -> Connectivity {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity().is_connected
    }

    /// Drop the cached walled verdict so the next check re-probes.
    pub async fn invalidate_walled_cache(&self) {
        *self.walled_cache.lock().await = None;
    }

    /// Whether internet access is walled (captive portal, restrictive
    /// proxy) as seen from the current account's server.
    ///
    /// Uncertainty counts as walled: no network, no account, or any
    /// probe failure all yield `true`. The verdict is cached for the
    /// configured window; the cache lock is held across the probe so
    /// only one caller probes at a time.
    pub async fn is_internet_walled(&self) -> bool {
        let mut cache = self.walled_cache.lock().await;
        if let Some(verdict) = *cache {
            if verdict.checked_at.elapsed() < self.cache_ttl {
                return verdict.walled;
            }
        }

        let walled = self.probe_walled().await;
        *cache = Some(WalledVerdict {
            walled,
            checked_at: Instant::now(),
        });
        walled
    }

    async fn probe_walled(&self) -> bool {
        if !self.is_connected() {
            debug!("walled probe skipped, no network");
            return true;
        }
        let Some(base) = self.current_server_url().await else {
            debug!("walled probe skipped, no account configured");
            return true;
        };

        let probe = format!("{}/index.php/204", base.as_str().trim_end_matches('/'));
        let url = match Url::parse(&probe) {
            Ok(url) => url,
            Err(err) => {
                warn!(%probe, error = %err, "walled probe URL invalid");
                return true;
            }
        };

        let client = match self.factory.create_anonymous(base, true) {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "walled probe client construction failed");
                return true;
            }
        };

        match client.probe_status(url, PROBE_TIMEOUT).await {
            Ok((status, body)) => {
                let open = status.as_u16() == 204 && body.is_empty();
                if !open {
                    warn!(status = status.as_u16(), body_len = body.len(), "walled network detected");
                }
                !open
            }
            Err(err) => {
                warn!(error = %err, "walled probe failed");
                true
            }
        }
    }

    /// Base URL of the currently selected account's server, if any.
    pub async fn current_server_url(&self) -> Option<Url> {
        let store = self.factory.store();
        let account = store.current_account().await?;
        let record = store.record(&account).await.ok()?;
        Some(record.base_url)
    }

    /// Non-blocking combined check: network up and server reachable
    /// through an unwalled connection. The probe runs on a spawned task;
    /// the receiver resolves with the verdict.
    pub fn network_and_server_available(self: &Arc<Self>) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let available = service.is_connected() && !service.is_internet_walled().await;
            let _ = tx.send(available);
        });
        rx
    }
}
