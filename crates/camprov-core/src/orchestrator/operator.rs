// ── Operator commands ──
//
// Manual interventions on single devices. Each takes the registry write
// guard (and the pool after it when addresses move) so it serializes with
// reconciliation and with attempt bookkeeping.

use std::net::Ipv4Addr;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Orchestrator, device_not_found};
use crate::error::CoreError;
use crate::model::{Device, DeviceState, MacAddress, ProvisioningEvent};
use crate::pool::Allocation;

fn busy(hardware_id: &MacAddress, action: &str) -> CoreError {
    CoreError::ValidationFailed {
        message: format!("cannot {action} {hardware_id}: a configuration attempt is in progress"),
    }
}

impl Orchestrator {
    /// Give a device a pending address.
    ///
    /// With `Some(address)` that exact address is reserved; with `None`
    /// the next free address is taken from the pool. A previously pending
    /// address is released back to the pool. Works in either allocation
    /// mode.
    pub async fn assign_address(
        &self,
        hardware_id: &MacAddress,
        address: Option<Ipv4Addr>,
    ) -> Result<Ipv4Addr, CoreError> {
        self.ensure_live()?;
        let mut events = Vec::new();

        let assigned = {
            let mut registry = self.inner.store.write().await;
            let device = registry
                .find_mut(hardware_id)
                .ok_or_else(|| device_not_found(hardware_id))?;
            if device.state.is_in_flight() {
                return Err(busy(hardware_id, "re-address"));
            }
            if let Some(requested) = address {
                if device.pending_address == Some(requested) {
                    return Ok(requested);
                }
            }

            let mut pool = self.inner.pool.lock().await;
            let assigned = match address {
                Some(requested) => {
                    pool.reserve(requested)?;
                    requested
                }
                None => match pool.allocate_and_reserve() {
                    Allocation::Allocated(next) => next,
                    Allocation::Exhausted => {
                        return Err(CoreError::PoolExhausted {
                            range: pool.range_label(),
                        });
                    }
                },
            };

            if let Some(previous) = device.set_pending(Some(assigned)) {
                pool.release(previous);
                events.push(ProvisioningEvent::AddressReleased {
                    hardware_id: hardware_id.clone(),
                    address: previous,
                });
            }
            assigned
        };

        info!(mac = %hardware_id, address = %assigned, "address assigned manually");
        events.push(ProvisioningEvent::AddressAssigned {
            hardware_id: hardware_id.clone(),
            address: assigned,
        });
        self.emit_all(events);
        Ok(assigned)
    }

    /// Drop a device's pending address and return it to the pool.
    /// Returns the released address, or `None` if nothing was pending.
    pub async fn release_address(
        &self,
        hardware_id: &MacAddress,
    ) -> Result<Option<Ipv4Addr>, CoreError> {
        self.ensure_live()?;

        let released = {
            let mut registry = self.inner.store.write().await;
            let device = registry
                .find_mut(hardware_id)
                .ok_or_else(|| device_not_found(hardware_id))?;
            if device.state.is_in_flight() {
                return Err(busy(hardware_id, "release the address of"));
            }
            if device.pending_address.is_none() {
                return Ok(None);
            }
            let released = device.set_pending(None);
            if let Some(address) = released {
                self.inner.pool.lock().await.release(address);
            }
            released
        };

        if let Some(address) = released {
            info!(mac = %hardware_id, %address, "pending address released");
            self.emit(ProvisioningEvent::AddressReleased {
                hardware_id: hardware_id.clone(),
                address,
            });
        }
        Ok(released)
    }

    /// Exclude a device from provisioning. Its pending address, if any,
    /// stays reserved.
    pub async fn skip(&self, hardware_id: &MacAddress) -> Result<(), CoreError> {
        self.ensure_live()?;
        let mut registry = self.inner.store.write().await;
        let device = registry
            .find_mut(hardware_id)
            .ok_or_else(|| device_not_found(hardware_id))?;
        match device.state {
            DeviceState::Skipped => Ok(()),
            DeviceState::Configuring => Err(busy(hardware_id, "skip")),
            _ => {
                device.state = DeviceState::Skipped;
                device.touch();
                info!(mac = %hardware_id, "device skipped");
                Ok(())
            }
        }
    }

    /// Return a skipped device to `Discovered`. No-op for any other state.
    pub async fn include(&self, hardware_id: &MacAddress) -> Result<(), CoreError> {
        self.ensure_live()?;
        let mut registry = self.inner.store.write().await;
        let device = registry
            .find_mut(hardware_id)
            .ok_or_else(|| device_not_found(hardware_id))?;
        if device.state == DeviceState::Skipped {
            device.state = DeviceState::Discovered;
            device.error_message = None;
            device.touch();
            info!(mac = %hardware_id, "device included");
        } else {
            debug!(mac = %hardware_id, state = %device.state, "include on a device that is not skipped");
        }
        Ok(())
    }

    /// Ask the device itself for its identity and firmware, and merge the
    /// answer with the same policy as discovery.
    pub async fn refresh_device_info(&self, hardware_id: &MacAddress) -> Result<Device, CoreError> {
        self.refresh_device_info_cancellable(hardware_id, &CancellationToken::new())
            .await
    }

    /// Refresh device info, abandoning the query if `cancel` fires or the
    /// orchestrator shuts down. The registry is untouched in that case.
    pub async fn refresh_device_info_cancellable(
        &self,
        hardware_id: &MacAddress,
        cancel: &CancellationToken,
    ) -> Result<Device, CoreError> {
        self.ensure_live()?;

        let address = {
            let registry = self.inner.store.read().await;
            let device = registry
                .find(hardware_id)
                .ok_or_else(|| device_not_found(hardware_id))?;
            device
                .current_address
                .ok_or_else(|| CoreError::ValidationFailed {
                    message: format!("{hardware_id} has no known address to query"),
                })?
        };

        let mut descriptor = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return Err(CoreError::ShutDown),
            () = cancel.cancelled() => {
                return Err(CoreError::Cancelled {
                    operation: format!("Info refresh of {hardware_id}"),
                });
            }
            info = self.inner.client.get_info(address) => info?,
        };
        if &descriptor.hardware_id != hardware_id {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "device at {address} reports hardware id {}, expected {hardware_id}",
                    descriptor.hardware_id
                ),
            });
        }
        if descriptor.current_address.is_none() {
            descriptor.current_address = Some(address);
        }

        let mut registry = self.inner.store.write().await;
        let device = registry
            .find_mut(hardware_id)
            .ok_or_else(|| device_not_found(hardware_id))?;
        device.merge_descriptor(descriptor);
        debug!(
            mac = %hardware_id,
            %address,
            model = device.model.as_deref().unwrap_or("-"),
            "device info refreshed"
        );
        Ok(device.clone())
    }
}
