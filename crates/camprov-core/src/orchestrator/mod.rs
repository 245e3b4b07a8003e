// ── Provisioning orchestrator ──
//
// Lifecycle, observation handles and the background reconciliation task.
// The cycle itself lives in `reconcile`, configuration attempts in
// `dispatch`, and manual operator commands in `operator`.

mod dispatch;
mod operator;
mod reconcile;

use std::any::Any;
use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, Semaphore, broadcast, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::collaborator::{DeviceClient, DiscoverySource};
use crate::config::{AllocationMode, ProvisionerConfig};
use crate::error::CoreError;
use crate::model::{Device, DispatchBlocker, MacAddress, ProvisioningEvent};
use crate::pool::AddressPool;
use crate::store::DeviceStore;
use crate::stream::DeviceStream;

pub use dispatch::ConfigurationOutcome;
pub use reconcile::CycleReport;

const EVENT_CHANNEL_SIZE: usize = 256;

// ── RunState ─────────────────────────────────────────────────────

/// Whether the periodic reconciliation timer is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Stopped,
    Running,
}

/// Point-in-time view of the address pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub range: String,
    pub capacity: usize,
    pub reserved: BTreeSet<Ipv4Addr>,
}

// ── Orchestrator ─────────────────────────────────────────────────

/// The provisioning control loop.
///
/// Cheaply cloneable via `Arc<OrchestratorInner>`. Owns the device store
/// and the address pool, drives discovery on a fixed cadence and runs
/// configuration attempts with bounded concurrency.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    config: ProvisionerConfig,
    store: Arc<DeviceStore>,
    /// Locked after the registry whenever both are needed.
    pool: Mutex<AddressPool>,
    discovery: Arc<dyn DiscoverySource>,
    client: Arc<dyn DeviceClient>,
    mode: watch::Sender<AllocationMode>,
    run_state: watch::Sender<RunState>,
    status: watch::Sender<String>,
    event_tx: broadcast::Sender<ProvisioningEvent>,
    permits: Arc<Semaphore>,
    /// Cancelled once, on shutdown. Every operation observes it.
    cancel: CancellationToken,
    /// Child token for the current run, replaced on every `start()`.
    cancel_run: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// In-flight configuration attempts.
    attempts: TaskTracker,
    /// Devices an auto-configure dispatch is already working on.
    auto_queued: std::sync::Mutex<HashSet<MacAddress>>,
}

impl Orchestrator {
    /// Build an orchestrator. Does NOT start the timer -- call
    /// [`start()`](Self::start) for that, or drive cycles by hand with
    /// [`reconcile()`](Self::reconcile).
    pub fn new(
        config: ProvisionerConfig,
        discovery: Arc<dyn DiscoverySource>,
        client: Arc<dyn DeviceClient>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let pool = AddressPool::from_config(&config)?;

        let (mode, _) = watch::channel(config.allocation_mode);
        let (run_state, _) = watch::channel(RunState::Stopped);
        let (status, _) = watch::channel(String::from("Ready"));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_configurations));
        let cancel = CancellationToken::new();
        let cancel_run = cancel.child_token();

        Ok(Self {
            inner: Arc::new(OrchestratorInner {
                config,
                store: Arc::new(DeviceStore::new()),
                pool: Mutex::new(pool),
                discovery,
                client,
                mode,
                run_state,
                status,
                event_tx,
                permits,
                cancel,
                cancel_run: Mutex::new(cancel_run),
                task_handles: Mutex::new(Vec::new()),
                attempts: TaskTracker::new(),
                auto_queued: std::sync::Mutex::new(HashSet::new()),
            }),
        })
    }

    pub fn config(&self) -> &ProvisionerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run one reconciliation cycle immediately, then keep reconciling on
    /// the configured interval until [`stop()`](Self::stop).
    ///
    /// A failing first cycle is reported through the status message, not
    /// as an error: the timer starts anyway. Calling `start` while already
    /// running is a no-op.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }

        // Claim the run under the token lock so concurrent starts and
        // stops see one consistent state.
        let run = {
            let mut cancel_run = self.inner.cancel_run.lock().await;
            let claimed = self.inner.run_state.send_if_modified(|state| {
                if *state == RunState::Running {
                    false
                } else {
                    *state = RunState::Running;
                    true
                }
            });
            if !claimed {
                debug!("start requested while already running");
                return Ok(());
            }
            let run = self.inner.cancel.child_token();
            *cancel_run = run.clone();
            run
        };
        self.set_status("Discovery running");

        if let Err(e) = self.reconcile_cancellable(&run).await {
            debug!(error = %e, "initial reconciliation failed");
        }

        let handle = tokio::spawn(reconcile_task(
            self.clone(),
            self.inner.config.reconcile_interval,
            run,
        ));
        self.inner.task_handles.lock().await.push(handle);

        info!(
            interval_secs = self.inner.config.reconcile_interval.as_secs(),
            mode = %self.mode(),
            "orchestrator started"
        );
        Ok(())
    }

    /// Stop the reconciliation timer.
    ///
    /// Attempts started by auto-configure are cancelled with the timer;
    /// attempts started through [`configure()`](Self::configure) keep
    /// running.
    pub async fn stop(&self) {
        self.inner.cancel_run.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "reconciliation task ended abnormally");
            }
        }
        drop(handles);

        if self.inner.run_state.send_replace(RunState::Stopped) == RunState::Running {
            self.set_status("Discovery stopped");
            info!("orchestrator stopped");
        }
    }

    /// Stop everything: the timer, pending dispatches, and every in-flight
    /// configuration attempt (which end up `Failed`). Waits until all
    /// attempts have recorded their outcome. The orchestrator cannot be
    /// restarted afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.stop().await;

        self.inner.attempts.close();
        self.inner.attempts.wait().await;

        self.set_status("Shut down");
        info!("orchestrator shut down");
    }

    pub fn is_running(&self) -> bool {
        *self.inner.run_state.borrow() == RunState::Running
    }

    // ── Mode ─────────────────────────────────────────────────────

    pub fn mode(&self) -> AllocationMode {
        *self.inner.mode.borrow()
    }

    /// Switch allocation mode. Takes effect for devices first seen by the
    /// next cycle; existing assignments are kept.
    pub fn set_mode(&self, mode: AllocationMode) {
        let previous = self.inner.mode.send_replace(mode);
        if previous != mode {
            info!(%mode, "allocation mode changed");
        }
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn devices_snapshot(&self) -> Arc<Vec<Device>> {
        self.inner.store.snapshot()
    }

    pub fn devices(&self) -> DeviceStream {
        self.inner.store.subscribe()
    }

    pub fn device(&self, hardware_id: &MacAddress) -> Option<Device> {
        self.inner.store.device(hardware_id)
    }

    /// Subscribe to provisioning events. Slow receivers lose the oldest
    /// events (`RecvError::Lagged`), never block the orchestrator.
    pub fn events(&self) -> broadcast::Receiver<ProvisioningEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn run_state(&self) -> watch::Receiver<RunState> {
        self.inner.run_state.subscribe()
    }

    pub fn status(&self) -> watch::Receiver<String> {
        self.inner.status.subscribe()
    }

    pub fn status_text(&self) -> String {
        self.inner.status.borrow().clone()
    }

    // ── Pool queries ─────────────────────────────────────────────

    pub async fn pool_status(&self) -> PoolStatus {
        let pool = self.inner.pool.lock().await;
        PoolStatus {
            range: pool.range_label(),
            capacity: pool.capacity(),
            reserved: pool.list_reserved(),
        }
    }

    pub async fn pool_reserved(&self) -> BTreeSet<Ipv4Addr> {
        self.inner.pool.lock().await.list_reserved()
    }

    /// The address automatic mode would hand out next. Does not reserve,
    /// but does advance the pool cursor.
    pub async fn preview_next_address(&self) -> Option<Ipv4Addr> {
        self.inner.pool.lock().await.allocate_next()
    }

    // ── Internal helpers ─────────────────────────────────────────

    fn emit(&self, event: ProvisioningEvent) {
        // No receivers is fine: events are fire-and-forget.
        let _ = self.inner.event_tx.send(event);
    }

    fn emit_all(&self, events: Vec<ProvisioningEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    fn set_status(&self, message: impl Into<String>) {
        self.inner.status.send_replace(message.into());
    }

    fn ensure_live(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            Err(CoreError::ShutDown)
        } else {
            Ok(())
        }
    }
}

fn device_not_found(hardware_id: &MacAddress) -> CoreError {
    CoreError::DeviceNotFound {
        identifier: hardware_id.to_string(),
    }
}

fn dispatch_rejected(hardware_id: &MacAddress, blocker: DispatchBlocker) -> CoreError {
    CoreError::ValidationFailed {
        message: format!("cannot configure {hardware_id}: {blocker}"),
    }
}

/// Describe a collaborator task that did not run to completion.
fn panic_message(err: JoinError) -> String {
    let payload: Box<dyn Any + Send> = match err.try_into_panic() {
        Ok(payload) => payload,
        Err(err) => return err.to_string(),
    };
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "collaborator panicked".to_owned()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically reconcile discovery results, dispatching eligible devices
/// after each cycle when auto-configure is enabled. Dispatches run on the
/// attempt tracker, so a slow camera never holds up the next tick.
async fn reconcile_task(orchestrator: Orchestrator, period: Duration, cancel: CancellationToken) {
    let auto_configure = orchestrator.inner.config.auto_configure;
    if auto_configure {
        orchestrator.spawn_auto_configure(&cancel);
    }

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                debug!("reconcile_task tick");
                if orchestrator.reconcile_cancellable(&cancel).await.is_ok() && auto_configure {
                    orchestrator.spawn_auto_configure(&cancel);
                }
            }
        }
    }
}

impl Orchestrator {
    /// Start one tracked configuration task per eligible device that no
    /// earlier pass is still handling.
    fn spawn_auto_configure(&self, cancel: &CancellationToken) {
        let mut queued = self.auto_queued();
        let mut dispatched = 0;
        for hardware_id in self.eligible_devices() {
            if !queued.insert(hardware_id.clone()) {
                continue;
            }
            dispatched += 1;
            let orchestrator = self.clone();
            let cancel = cancel.clone();
            self.inner.attempts.spawn(async move {
                let result = orchestrator.configure_cancellable(&hardware_id, &cancel).await;
                orchestrator.auto_queued().remove(&hardware_id);
                match result {
                    Ok(outcome) => {
                        debug!(mac = %hardware_id, configured = outcome.is_configured(), "auto-configure finished");
                    }
                    Err(e) => debug!(mac = %hardware_id, error = %e, "auto-configure not dispatched"),
                }
            });
        }
        if dispatched > 0 {
            debug!(dispatched, in_flight = queued.len(), "auto-configure pass");
        }
    }

    fn auto_queued(&self) -> MutexGuard<'_, HashSet<MacAddress>> {
        self.inner
            .auto_queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
