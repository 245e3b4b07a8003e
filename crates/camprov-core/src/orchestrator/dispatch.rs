// ── Configuration dispatch ──
//
// One attempt = precondition check, concurrency permit, transition to
// Configuring, apply, optional reachability check, outcome. Everything
// after the transition runs in a tracked task that owns the permit, so a
// caller dropping its future can never strand a device in Configuring.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Orchestrator, device_not_found, dispatch_rejected, panic_message};
use crate::collaborator::ApplyError;
use crate::error::CoreError;
use crate::model::{DispatchBlocker, MacAddress, ProvisioningEvent};

/// How a configuration attempt ended. Collaborator failures land here,
/// never in `CoreError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfigurationOutcome {
    Configured { address: Ipv4Addr },
    Failed { message: String },
}

impl ConfigurationOutcome {
    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured { .. })
    }
}

/// Why an attempt that reached `Configuring` did not succeed. The display
/// text becomes the device's `error_message`.
#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("device client fault: {0}")]
    Panicked(String),

    #[error("configuration cancelled")]
    Cancelled,

    #[error("configuration cancelled: orchestrator shutting down")]
    ShuttingDown,

    #[error("configuration timed out after {0:?}")]
    TimedOut(Duration),

    #[error("device not reachable at {0} after configuration")]
    Unreachable(Ipv4Addr),
}

impl AttemptError {
    fn is_fault(&self) -> bool {
        matches!(self, Self::Apply(ApplyError::Fault { .. }) | Self::Panicked(_))
    }
}

impl Orchestrator {
    /// Configure one device with its pending address.
    pub async fn configure(
        &self,
        hardware_id: &MacAddress,
    ) -> Result<ConfigurationOutcome, CoreError> {
        self.configure_cancellable(hardware_id, &CancellationToken::new())
            .await
    }

    /// Configure one device, failing the attempt if `cancel` fires.
    ///
    /// Returns `Err` only when the dispatch is rejected (unknown device,
    /// no pending address, skipped, already configuring) or cancelled
    /// before the device entered `Configuring`. In both cases nothing
    /// about the device changed.
    pub async fn configure_cancellable(
        &self,
        hardware_id: &MacAddress,
        cancel: &CancellationToken,
    ) -> Result<ConfigurationOutcome, CoreError> {
        self.ensure_live()?;
        self.check_dispatchable(hardware_id).await?;

        let permit = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return Err(CoreError::ShutDown),
            () = cancel.cancelled() => {
                return Err(CoreError::Cancelled {
                    operation: format!("Configuration of {hardware_id}"),
                });
            }
            permit = Arc::clone(&self.inner.permits).acquire_owned() => {
                permit.map_err(|_| CoreError::ShutDown)?
            }
        };

        // The device may have changed while we waited for the permit.
        let (target, attempt) = {
            let mut registry = self.inner.store.write().await;
            let device = registry
                .find_mut(hardware_id)
                .ok_or_else(|| device_not_found(hardware_id))?;
            let target = device
                .begin_attempt()
                .map_err(|blocker| dispatch_rejected(hardware_id, blocker))?;
            (target, device.attempt_count)
        };

        info!(mac = %hardware_id, address = %target, attempt, "configuration started");
        self.set_status(format!("Configuring camera {hardware_id}..."));
        self.emit(ProvisioningEvent::ConfigurationStarted {
            hardware_id: hardware_id.clone(),
            address: target,
            attempt,
        });

        let handle = self.inner.attempts.spawn(run_attempt(
            self.clone(),
            hardware_id.clone(),
            target,
            cancel.clone(),
            permit,
        ));
        handle.await.map_err(|_| CoreError::Cancelled {
            operation: format!("Configuration of {hardware_id}"),
        })
    }

    /// Configure every device that is currently eligible, at most
    /// `max_concurrent_configurations` at a time.
    pub async fn configure_pending(&self) -> Vec<(MacAddress, Result<ConfigurationOutcome, CoreError>)> {
        self.configure_pending_cancellable(&CancellationToken::new())
            .await
    }

    pub async fn configure_pending_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> Vec<(MacAddress, Result<ConfigurationOutcome, CoreError>)> {
        let eligible = self.eligible_devices();
        if eligible.is_empty() {
            return Vec::new();
        }
        debug!(count = eligible.len(), "dispatching eligible devices");

        join_all(eligible.into_iter().map(|hardware_id| async move {
            let result = self.configure_cancellable(&hardware_id, cancel).await;
            (hardware_id, result)
        }))
        .await
    }

    pub(super) fn eligible_devices(&self) -> Vec<MacAddress> {
        self.inner
            .store
            .snapshot()
            .iter()
            .filter(|device| device.dispatch_blocker().is_none())
            .map(|device| device.hardware_id.clone())
            .collect()
    }

    async fn check_dispatchable(&self, hardware_id: &MacAddress) -> Result<(), CoreError> {
        let registry = self.inner.store.read().await;
        let device = registry
            .find(hardware_id)
            .ok_or_else(|| device_not_found(hardware_id))?;
        match device.dispatch_blocker() {
            None => Ok(()),
            Some(blocker) => {
                if blocker == DispatchBlocker::NoPendingAddress {
                    self.set_status(format!(
                        "Please assign a new IP address to camera {hardware_id}"
                    ));
                }
                Err(dispatch_rejected(hardware_id, blocker))
            }
        }
    }

    async fn drive_apply(
        &self,
        hardware_id: &MacAddress,
        target: Ipv4Addr,
        cancel: &CancellationToken,
    ) -> Result<(), AttemptError> {
        let client = Arc::clone(&self.inner.client);
        let mac = hardware_id.clone();
        // Own task, so a panicking client surfaces as a JoinError.
        let mut apply = tokio::spawn(async move { client.apply(&mac, target).await });

        let applied = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(AttemptError::ShuttingDown),
            () = cancel.cancelled() => Err(AttemptError::Cancelled),
            limit = apply_deadline(self.inner.config.apply_timeout) => Err(AttemptError::TimedOut(limit)),
            joined = &mut apply => flatten_apply(joined),
        };
        apply.abort();
        applied?;

        if self.inner.config.verify_after_apply {
            self.verify_reachable(target, cancel).await?;
        }
        Ok(())
    }

    async fn verify_reachable(
        &self,
        target: Ipv4Addr,
        cancel: &CancellationToken,
    ) -> Result<(), AttemptError> {
        let client = Arc::clone(&self.inner.client);
        let mut check = tokio::spawn(async move { client.test_reachable(IpAddr::V4(target)).await });

        let reachable = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(AttemptError::ShuttingDown),
            () = cancel.cancelled() => Err(AttemptError::Cancelled),
            joined = &mut check => joined.map_err(attempt_join_error),
        };
        check.abort();
        if reachable? {
            Ok(())
        } else {
            Err(AttemptError::Unreachable(target))
        }
    }

    async fn record_outcome(
        &self,
        hardware_id: &MacAddress,
        target: Ipv4Addr,
        result: Result<(), AttemptError>,
    ) -> ConfigurationOutcome {
        {
            let mut registry = self.inner.store.write().await;
            match registry.find_mut(hardware_id) {
                Some(device) => match &result {
                    Ok(()) => device.complete_success(),
                    Err(e) => device.complete_failure(e.to_string()),
                },
                None => warn!(mac = %hardware_id, "device missing from registry after attempt"),
            }
        }

        match result {
            Ok(()) => {
                info!(mac = %hardware_id, address = %target, "camera configured");
                self.set_status(format!("Camera {hardware_id} configured successfully"));
                self.emit(ProvisioningEvent::Configured {
                    hardware_id: hardware_id.clone(),
                    address: target,
                });
                ConfigurationOutcome::Configured { address: target }
            }
            Err(e) => {
                if e.is_fault() {
                    error!(mac = %hardware_id, error = %e, "device client fault");
                } else {
                    warn!(mac = %hardware_id, error = %e, "configuration failed");
                }
                let message = e.to_string();
                if e.is_fault() {
                    self.set_status(format!("Error configuring camera: {message}"));
                } else {
                    self.set_status(format!("Failed to configure camera {hardware_id}"));
                }
                self.emit(ProvisioningEvent::ConfigurationFailed {
                    hardware_id: hardware_id.clone(),
                    message: message.clone(),
                });
                ConfigurationOutcome::Failed { message }
            }
        }
    }
}

/// Body of a tracked attempt task. Holds the permit until the outcome has
/// been recorded.
async fn run_attempt(
    orchestrator: Orchestrator,
    hardware_id: MacAddress,
    target: Ipv4Addr,
    cancel: CancellationToken,
    _permit: OwnedSemaphorePermit,
) -> ConfigurationOutcome {
    let result = orchestrator.drive_apply(&hardware_id, target, &cancel).await;
    orchestrator.record_outcome(&hardware_id, target, result).await
}

/// Resolves after `timeout`, or never.
async fn apply_deadline(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(limit) => {
            tokio::time::sleep(limit).await;
            limit
        }
        None => std::future::pending().await,
    }
}

fn flatten_apply(joined: Result<Result<(), ApplyError>, JoinError>) -> Result<(), AttemptError> {
    joined
        .map_err(attempt_join_error)?
        .map_err(AttemptError::from)
}

/// A collaborator task that panicked is a client fault; one that was
/// aborted only happens on runtime shutdown.
fn attempt_join_error(err: JoinError) -> AttemptError {
    if err.is_panic() {
        AttemptError::Panicked(panic_message(err))
    } else {
        AttemptError::Cancelled
    }
}
