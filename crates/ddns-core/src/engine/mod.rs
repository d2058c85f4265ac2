//! Core DDNS engine
//!
//! The DdnsEngine is the periodic reconciliation driver. Every tick it:
//! - Discovers the interface addresses via AddressSource
//! - Reloads zone and key configuration via ConfigSource
//! - Replaces the A record of every configured hostname via UpdateClient
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────┐
//!  interval ─┤  DdnsEngine  ├── ExecutionGuard (Idle ⇄ Running)
//!            └──────────────┘
//!                   │
//!     ┌─────────────┼─────────────────┬──────────────────┐
//!     ▼             ▼                 ▼                  ▼
//! ┌───────────┐ ┌──────────────┐ ┌──────────────┐ ┌─────────────┐
//! │ Address   │ │ ConfigSource │ │ UpdateClient │ │   Events    │
//! │ Source    │ │ (reload)     │ │ (replace)    │ │  (notify)   │
//! └───────────┘ └──────────────┘ └──────────────┘ └─────────────┘
//! ```
//!
//! ## Tick Flow
//!
//! 1. Acquire the guard; if another tick holds it, drop this tick
//! 2. Discover addresses (tick-fatal on failure)
//! 3. Load zones and keys (tick-fatal on failure)
//! 4. zones → hostnames → addresses, one update each, sequentially
//! 5. Release the guard, emit a summary

pub mod guard;

pub use guard::{ExecutionGuard, GuardToken};

use crate::config::{AddressPolicy, ConfigSource, EngineConfig, FailurePolicy, KeyRing, ZoneConfig};
use crate::error::{Error, Result};
use crate::traits::{AddressSource, RecordData, UpdateClient, UpdateRequest};
use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        interface: String,
    },

    /// A tick acquired the guard and began reconciling
    TickStarted {
        at: DateTime<Utc>,
    },

    /// A tick found the guard held and did nothing
    TickSkipped,

    /// Zone has no nameserver configured
    ZoneSkipped {
        zone: String,
    },

    /// Server accepted the replace
    UpdateSucceeded {
        owner: String,
        address: String,
    },

    /// Replace failed for one owner/address pair
    UpdateFailed {
        owner: String,
        nameserver: String,
        error: String,
    },

    /// Tick aborted before any update could be attempted safely
    TickFailed {
        error: String,
    },

    /// Tick finished
    TickCompleted {
        attempted: usize,
        applied: usize,
        failed: usize,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Counters for one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Update calls issued
    pub attempted: usize,
    /// Calls the server acknowledged
    pub applied: usize,
    /// Calls that returned an error
    pub failed: usize,
}

/// What a call to [`DdnsEngine::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick ran to the end
    Completed(TickReport),
    /// Another tick held the guard; nothing was done
    Skipped,
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`], or drive single passes with
///    [`DdnsEngine::tick()`]
/// 3. Engine runs until shutdown signal received (or the first error in
///    fail-fast mode)
///
/// ## Threading
///
/// Ticks are serialized by the engine's own [`ExecutionGuard`]; concurrent
/// callers of `tick()` never interleave, the loser is skipped. Separate
/// engines have separate guards.
pub struct DdnsEngine {
    /// Interface address discovery
    address_source: Box<dyn AddressSource>,

    /// RFC 2136 (or test) update client
    client: Box<dyn UpdateClient>,

    /// Zone and key configuration, reloaded every tick
    config_source: Box<dyn ConfigSource>,

    /// Engine settings fixed at startup
    config: EngineConfig,

    /// Single-in-flight guard
    guard: ExecutionGuard,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        address_source: Box<dyn AddressSource>,
        client: Box<dyn UpdateClient>,
        config_source: Box<dyn ConfigSource>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            address_source,
            client,
            config_source,
            config,
            guard: ExecutionGuard::new(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a tick is currently in flight
    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Run the engine
    ///
    /// Ticks immediately, then every `interval_secs`, until Ctrl-C.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: First error in fail-fast mode
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine until `shutdown_rx` fires
    ///
    /// Without a receiver this behaves like `run()`. The daemon passes a
    /// receiver fed by its SIGTERM/SIGINT handler.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            interface: self.config.interface.clone(),
        });
        info!(
            "Reconciling interface {} every {}s ({:?} mode)",
            self.config.interface, self.config.interval_secs, self.config.failure_policy
        );

        let mut interval = tokio::time::interval(self.config.interval());
        // The tick body runs inline, so tick N+1 cannot start before tick N returns
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    if let Err(e) = self.tick().await {
                        if self.config.failure_policy == FailurePolicy::FailFast {
                            error!("Aborting on error: {}", e);
                            self.emit_event(EngineEvent::Stopped {
                                reason: e.to_string(),
                            });
                            return Err(e);
                        }
                        // Resilient: the next tick is the retry
                        error!("Tick failed: {}", e);
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        info!("Engine stopped");
        Ok(())
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(TickOutcome::Skipped)`: another tick holds the guard
    /// - `Ok(TickOutcome::Completed(report))`: all pairs were attempted
    ///   (in resilient mode, failed pairs are counted, not returned)
    /// - `Err(Error)`: a tick-fatal error, or the first update error in
    ///   fail-fast mode
    pub async fn tick(&self) -> Result<TickOutcome> {
        let Some(_token) = self.guard.try_acquire() else {
            warn!("Another tick is updating, skipping");
            self.emit_event(EngineEvent::TickSkipped);
            return Ok(TickOutcome::Skipped);
        };

        self.emit_event(EngineEvent::TickStarted { at: Utc::now() });

        match self.reconcile().await {
            Ok(report) => {
                info!(
                    "Tick complete: {} attempted, {} applied, {} failed",
                    report.attempted, report.applied, report.failed
                );
                self.emit_event(EngineEvent::TickCompleted {
                    attempted: report.attempted,
                    applied: report.applied,
                    failed: report.failed,
                });
                Ok(TickOutcome::Completed(report))
            }
            Err(e) => {
                self.emit_event(EngineEvent::TickFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Tick body, runs while the guard is held
    async fn reconcile(&self) -> Result<TickReport> {
        info!("Reading addresses from interface {}", self.address_source.interface());
        let found = self.address_source.discover().await.inspect_err(|e| {
            error!("Address discovery on {} failed: {}", self.address_source.interface(), e);
        })?;
        info!("ipv4 addresses: {:?}", found.ipv4);
        // IPv6 is discovered but not published
        info!("ipv6 addresses: {:?}", found.ipv6);

        let zones = self.config_source.load_zones().await.inspect_err(|e| {
            error!("Loading zone config failed: {}", e);
        })?;
        let keys = self.config_source.load_keys().await.inspect_err(|e| {
            error!("Loading key config failed: {}", e);
        })?;
        debug!(
            "Loaded {} zone(s), {} key(s): {:?}",
            zones.len(),
            keys.len(),
            keys.names().collect::<Vec<_>>()
        );

        let addresses = self.addresses_to_publish(&found.ipv4);
        if addresses.is_empty() {
            warn!("No IPv4 address on {}, nothing to publish", self.address_source.interface());
        }

        let mut report = TickReport::default();
        for zone in &zones {
            if !zone.has_nameserver() {
                warn!("No nameserver configured for zone {}", zone.zone);
                self.emit_event(EngineEvent::ZoneSkipped {
                    zone: zone.zone.clone(),
                });
                continue;
            }

            self.reconcile_zone(zone, addresses, &keys, &mut report).await?;
        }

        Ok(report)
    }

    async fn reconcile_zone(
        &self,
        zone: &ZoneConfig,
        addresses: &[String],
        keys: &KeyRing,
        report: &mut TickReport,
    ) -> Result<()> {
        for hostname in &zone.hostnames {
            for address in addresses {
                report.attempted += 1;
                match self.publish(zone, hostname, address, keys).await {
                    Ok(owner) => {
                        report.applied += 1;
                        info!("{} updated to {}", owner, address);
                        self.emit_event(EngineEvent::UpdateSucceeded {
                            owner,
                            address: address.clone(),
                        });
                    }
                    Err(e) => {
                        report.failed += 1;
                        let owner = crate::name::owner_name(hostname, &zone.zone);
                        error!(
                            "Update of {} to {} via {} (zone {}) failed: {}",
                            owner, address, zone.nameserver, zone.zone, e
                        );
                        self.emit_event(EngineEvent::UpdateFailed {
                            owner,
                            nameserver: zone.nameserver.clone(),
                            error: e.to_string(),
                        });
                        if self.config.failure_policy == FailurePolicy::FailFast {
                            return Err(e);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn publish(
        &self,
        zone: &ZoneConfig,
        hostname: &str,
        address: &str,
        keys: &KeyRing,
    ) -> Result<String> {
        let ip: Ipv4Addr = address
            .parse()
            .map_err(|_| Error::invalid_input(format!("not an IPv4 address: {}", address)))?;

        let request = UpdateRequest::new(
            hostname,
            zone.zone.as_str(),
            RecordData::A(ip),
            self.config.record_ttl,
            zone.nameserver.as_str(),
            self.config.exchange_timeout(),
        );
        debug!(
            "Sending {} update for {} to {}",
            self.client.client_name(),
            request.owner(),
            request.nameserver
        );

        let outcome = self.client.update(&request, keys).await?;
        Ok(outcome.owner)
    }

    fn addresses_to_publish<'a>(&self, ipv4: &'a [String]) -> &'a [String] {
        match self.config.address_policy {
            AddressPolicy::Each => ipv4,
            AddressPolicy::First => &ipv4[..ipv4.len().min(1)],
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Never block the tick on a slow consumer
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
