// ── Reconciliation cycle ──
//
// Discovery → registry upsert → pool allocation for new devices. The
// discovery call happens outside any lock; everything after it happens
// under one registry write guard so watchers never see a half-applied
// batch.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Orchestrator, panic_message};
use crate::config::AllocationMode;
use crate::error::CoreError;
use crate::model::{DeviceDescriptor, ProvisioningEvent};
use crate::pool::Allocation;
use crate::store::UpsertOutcome;

/// Summary of one completed reconciliation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// Devices known to the registry after the cycle.
    pub device_count: usize,
    /// Devices seen for the first time in this cycle.
    pub new_devices: usize,
    /// New devices that received a pending address.
    pub assigned: usize,
    /// New devices left without an address because the pool is full.
    pub deferred: usize,
}

impl Orchestrator {
    /// Run one reconciliation cycle on demand.
    pub async fn reconcile(&self) -> Result<CycleReport, CoreError> {
        self.reconcile_cancellable(&CancellationToken::new()).await
    }

    /// Run one reconciliation cycle, abandoning the discovery call if
    /// `cancel` fires. A failed or cancelled discovery leaves the registry
    /// and the pool untouched.
    pub async fn reconcile_cancellable(
        &self,
        cancel: &CancellationToken,
    ) -> Result<CycleReport, CoreError> {
        self.ensure_live()?;

        let batch = match self.discover(cancel).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "reconciliation cycle failed");
                self.set_status(format!("Discovery error: {e}"));
                self.emit(ProvisioningEvent::CycleFailed {
                    message: e.to_string(),
                    at: Utc::now(),
                });
                return Err(e);
            }
        };

        let report = self.apply_batch(batch).await;
        self.set_status(format!(
            "Discovery running - {} cameras found",
            report.device_count
        ));
        Ok(report)
    }

    async fn discover(&self, cancel: &CancellationToken) -> Result<Vec<DeviceDescriptor>, CoreError> {
        let discovery = Arc::clone(&self.inner.discovery);
        // Own task, so a panicking source fails the cycle instead of the timer.
        let mut scan = tokio::spawn(async move { discovery.discover().await });

        let result = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(CoreError::ShutDown),
            () = cancel.cancelled() => Err(CoreError::Cancelled {
                operation: "Discovery".into(),
            }),
            joined = &mut scan => match joined {
                Ok(result) => result.map_err(CoreError::from),
                Err(e) => Err(CoreError::DiscoveryUnavailable {
                    message: format!("discovery source fault: {}", panic_message(e)),
                }),
            },
        };
        scan.abort();
        result
    }

    async fn apply_batch(&self, batch: Vec<DeviceDescriptor>) -> CycleReport {
        let mode = self.mode();
        let batch_size = batch.len();
        let mut events = Vec::new();

        let report = {
            let mut registry = self.inner.store.write().await;

            let mut created = Vec::new();
            for descriptor in batch {
                let hardware_id = descriptor.hardware_id.clone();
                if registry.upsert(descriptor) == UpsertOutcome::Created {
                    debug!(mac = %hardware_id, "new device discovered");
                    events.push(ProvisioningEvent::DeviceDiscovered {
                        hardware_id: hardware_id.clone(),
                    });
                    created.push(hardware_id);
                }
            }

            let mut assigned = 0;
            let mut deferred = 0;
            if mode == AllocationMode::Automatic && !created.is_empty() {
                let mut pool = self.inner.pool.lock().await;
                for hardware_id in &created {
                    let Some(device) = registry.find_mut(hardware_id) else {
                        continue;
                    };
                    match pool.allocate_and_reserve() {
                        Allocation::Allocated(address) => {
                            device.set_pending(Some(address));
                            assigned += 1;
                            info!(mac = %hardware_id, %address, "address assigned");
                            events.push(ProvisioningEvent::AddressAssigned {
                                hardware_id: hardware_id.clone(),
                                address,
                            });
                        }
                        Allocation::Exhausted => {
                            deferred += 1;
                            warn!(
                                mac = %hardware_id,
                                range = %pool.range_label(),
                                "address pool exhausted, assignment deferred"
                            );
                            events.push(ProvisioningEvent::PoolExhausted {
                                hardware_id: hardware_id.clone(),
                            });
                        }
                    }
                }
            }

            CycleReport {
                device_count: registry.len(),
                new_devices: created.len(),
                assigned,
                deferred,
            }
        };

        let at = Utc::now();
        self.inner.store.mark_reconciled(at);
        events.push(ProvisioningEvent::CycleCompleted {
            device_count: report.device_count,
            new_devices: report.new_devices,
            at,
        });
        self.emit_all(events);

        info!(
            seen = batch_size,
            known = report.device_count,
            new = report.new_devices,
            assigned = report.assigned,
            "reconciliation cycle complete"
        );
        report
    }
}
