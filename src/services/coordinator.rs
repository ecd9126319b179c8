//! Poll coordinator: one authenticated fetch cycle per interval
//!
//! A cycle walks `Idle → Authenticating → Fetching → Normalizing` and ends
//! either `Updated` (snapshot swapped) or `Failed` (snapshot untouched).
//! At most one cycle is in flight; a tick that arrives meanwhile is dropped.
//! A cycle that is dropped midway (shutdown, host timeout) still returns the
//! phase to `Idle`.

use crate::auth::manager::AuthClient;
use crate::client::{create_client, DeviceEndpoint};
use crate::config::credentials::Credentials;
use crate::config::{PollingConfig, ServerConfig, UpdateInterval};
use crate::error::{ErrorKind, HannaError, Result};
use crate::services::models::Snapshot;
use crate::services::normalizer::normalize;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Where the current cycle is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Authenticating,
    Fetching,
    Normalizing,
}

/// Result of one call to [`PollCoordinator::run_cycle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Snapshot replaced
    Updated,
    /// Cycle aborted; previous snapshot kept
    Failed(ErrorKind),
    /// Another cycle was in flight
    Skipped,
}

/// Availability and error state reported to the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollStatus {
    /// Last cycle succeeded
    pub available: bool,
    /// The snapshot on display predates a failed cycle
    pub stale: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Credentials were rejected; the host should prompt for new ones
    pub reauth_required: bool,
}

/// What the host reads after each cycle
#[derive(Debug, Clone)]
pub struct HostView {
    pub snapshot: Arc<Snapshot>,
    pub status: PollStatus,
}

/// Drives poll cycles for one account
pub struct PollCoordinator {
    /// Held for the duration of a cycle; doubles as the re-entry guard
    auth: Mutex<AuthClient>,
    devices: Arc<dyn DeviceEndpoint>,
    snapshot: RwLock<Arc<Snapshot>>,
    status: RwLock<PollStatus>,
    phase: watch::Sender<CyclePhase>,
    interval: watch::Sender<UpdateInterval>,
    persistent_error_threshold: u32,
}

impl PollCoordinator {
    pub fn new(auth: AuthClient, devices: Arc<dyn DeviceEndpoint>, polling: &PollingConfig) -> Self {
        let (interval, _) = watch::channel(polling.update_interval);
        let (phase, _) = watch::channel(CyclePhase::Idle);
        Self {
            auth: Mutex::new(auth.with_refresh_margin(polling.refresh_margin)),
            devices,
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
            status: RwLock::new(PollStatus::default()),
            phase,
            interval,
            persistent_error_threshold: polling.persistent_error_threshold.max(1),
        }
    }

    /// Wire a coordinator against Hanna Cloud from configuration
    pub fn connect(config: &ServerConfig, credentials: Credentials) -> Result<Self> {
        config.validate()?;
        let client = create_client(&config.cloud)?;
        let auth = AuthClient::new(client.clone(), credentials);
        Ok(Self::new(auth, client, &config.polling))
    }

    pub fn phase(&self) -> CyclePhase {
        *self.phase.borrow()
    }

    pub async fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.read().await.clone()
    }

    pub async fn status(&self) -> PollStatus {
        self.status.read().await.clone()
    }

    pub async fn host_view(&self) -> HostView {
        HostView {
            snapshot: self.snapshot().await,
            status: self.status().await,
        }
    }

    pub fn update_interval(&self) -> UpdateInterval {
        *self.interval.borrow()
    }

    /// Options update; a running loop picks it up without restarting
    pub fn set_update_interval(&self, interval: UpdateInterval) {
        info!("Update interval set to {} minutes", interval.minutes());
        self.interval.send_replace(interval);
    }

    /// Run a cycle now, subject to the same re-entry guard as the timer
    pub async fn refresh_now(&self) -> CycleOutcome {
        debug!("Immediate refresh requested");
        self.run_cycle().await
    }

    /// Run one cycle unless another one is in flight
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(mut auth) = self.auth.try_lock() else {
            debug!("Poll cycle already in flight, dropping tick");
            return CycleOutcome::Skipped;
        };

        let _idle_on_exit = PhaseReset(&self.phase);

        let started = Utc::now();
        self.status.write().await.last_attempt = Some(started);

        match self.execute(&mut auth).await {
            Ok(snapshot) => {
                let devices = snapshot.devices.len();
                let readings = snapshot.readings.len();
                self.publish(snapshot, started).await;
                info!("Poll cycle updated {} devices, {} readings", devices, readings);
                CycleOutcome::Updated
            }
            Err(e) => CycleOutcome::Failed(self.record_failure(&e).await),
        }
    }

    async fn execute(&self, auth: &mut AuthClient) -> Result<Snapshot> {
        self.set_phase(CyclePhase::Authenticating);
        let token = auth.valid_token().await?;

        self.set_phase(CyclePhase::Fetching);
        let payload = match self.devices.fetch_devices(&token).await {
            Err(e) if e.is_auth_error() => {
                warn!("Token rejected ({}), re-authenticating once", e);
                self.set_phase(CyclePhase::Authenticating);
                let token = auth.force_reauthenticate().await?;
                self.set_phase(CyclePhase::Fetching);
                self.devices.fetch_devices(&token).await?
            }
            other => other?,
        };

        self.set_phase(CyclePhase::Normalizing);
        Ok(normalize(&payload))
    }

    fn set_phase(&self, phase: CyclePhase) {
        transition(&self.phase, phase);
    }

    /// Swap the snapshot and mark the cycle successful under both locks
    async fn publish(&self, snapshot: Snapshot, started: DateTime<Utc>) {
        let mut status = self.status.write().await;
        let mut current = self.snapshot.write().await;

        *current = Arc::new(snapshot);
        if status.reauth_required {
            info!("Credentials accepted again");
        }
        *status = PollStatus {
            available: true,
            stale: false,
            last_success: Some(Utc::now()),
            last_attempt: Some(started),
            last_error: None,
            consecutive_failures: 0,
            reauth_required: false,
        };
    }

    async fn record_failure(&self, err: &HannaError) -> ErrorKind {
        let kind = err.kind();
        let has_data = !self.snapshot.read().await.is_empty();

        let mut status = self.status.write().await;
        status.available = false;
        status.stale = has_data;
        status.last_error = Some(err.to_string());
        status.consecutive_failures = status.consecutive_failures.saturating_add(1);

        match kind {
            ErrorKind::Auth => {
                status.reauth_required = true;
                error!("Poll cycle failed, credentials rejected: {}", err);
            }
            _ if status.consecutive_failures == self.persistent_error_threshold => {
                error!(
                    "Poll cycle failed {} times in a row ({}): {}",
                    status.consecutive_failures, kind, err
                );
            }
            _ => warn!("Poll cycle failed ({}), retrying next interval: {}", kind, err),
        }

        kind
    }

    /// Poll on the configured interval until `shutdown` fires
    ///
    /// The first cycle runs immediately. Cancelling drops an in-flight
    /// cycle; the published snapshot is only ever swapped whole.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval_rx = self.interval.subscribe();
        let mut first_tick = Instant::now();

        loop {
            let period = interval_rx.borrow_and_update().as_duration();
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Polling every {} minutes", period.as_secs() / 60);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Poll loop stopped");
                        return;
                    }
                    changed = interval_rx.changed() => {
                        if changed.is_ok() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                info!("Poll loop stopped during a cycle");
                                return;
                            }
                            outcome = self.run_cycle() => {
                                debug!("Cycle finished: {:?}", outcome);
                            }
                        }
                    }
                }
            }

            let period = interval_rx.borrow().as_duration();
            first_tick = Instant::now() + period;
        }
    }
}

fn transition(sender: &watch::Sender<CyclePhase>, phase: CyclePhase) {
    sender.send_if_modified(|current| {
        if *current == phase {
            return false;
        }
        debug!("Poll phase {:?} -> {:?}", *current, phase);
        *current = phase;
        true
    });
}

/// Returns the phase to `Idle` when a cycle ends, including when it is dropped
struct PhaseReset<'a>(&'a watch::Sender<CyclePhase>);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        transition(self.0, CyclePhase::Idle);
    }
}
