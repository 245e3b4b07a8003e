//! Simulated camera fleet.
//!
//! Stands in for both collaborators the orchestrator consumes: a
//! discovery broadcast and the per-camera configuration API. Cameras keep
//! their address between scans and move when an apply succeeds, so a
//! provisioned camera shows up at its new address on the next cycle.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use camprov_config::SimulationSettings;
use camprov_core::{
    ApplyError, DeviceClient, DeviceDescriptor, DiscoveryError, DiscoverySource, MacAddress,
    NetworkPrefix, QueryError,
};

/// Axis Communications OUI.
const VENDOR_OUI: &str = "AC:CC:8E";

#[derive(Debug, Clone)]
struct SimCamera {
    hardware_id: MacAddress,
    address: Ipv4Addr,
    model: String,
    firmware_version: String,
}

impl SimCamera {
    fn descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::new(self.hardware_id.clone())
            .with_address(self.address)
            .with_model(self.model.clone())
            .with_firmware(self.firmware_version.clone())
    }
}

struct FleetState {
    rng: StdRng,
    cameras: Vec<SimCamera>,
}

impl FleetState {
    /// `false` for a zero rate without touching the generator.
    fn roll(&mut self, rate: f64) -> bool {
        rate > 0.0 && self.rng.gen_bool(rate)
    }

    fn camera_mut(&mut self, hardware_id: &MacAddress) -> Option<&mut SimCamera> {
        self.cameras.iter_mut().find(|c| &c.hardware_id == hardware_id)
    }

    fn camera_at(&self, address: IpAddr) -> Option<&SimCamera> {
        self.cameras.iter().find(|c| IpAddr::V4(c.address) == address)
    }
}

/// A fixed set of cameras with random latency and failures.
pub struct SimulatedFleet {
    settings: SimulationSettings,
    state: Mutex<FleetState>,
}

impl SimulatedFleet {
    /// Build `settings.fleet_size` cameras sitting on factory addresses
    /// `.100`-`.199` under `prefix`. A configured seed makes the fleet and
    /// every random outcome reproducible.
    pub fn new(settings: &SimulationSettings, prefix: NetworkPrefix) -> Self {
        let mut rng = settings
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        let mut seen = HashSet::new();
        let mut cameras = Vec::with_capacity(settings.fleet_size);
        while cameras.len() < settings.fleet_size {
            let [a, b, c]: [u8; 3] = rng.r#gen();
            let hardware_id = MacAddress::new(format!("{VENDOR_OUI}:{a:02X}:{b:02X}:{c:02X}"));
            if !seen.insert(hardware_id.clone()) {
                continue;
            }
            cameras.push(SimCamera {
                hardware_id,
                address: prefix.host(rng.gen_range(100..=199)),
                model: format!("AXIS P{}", rng.gen_range(1000..=9999)),
                firmware_version: format!("9.{}.{}", rng.gen_range(1..=8), rng.gen_range(1..=98)),
            });
        }
        debug!(cameras = cameras.len(), seeded = settings.seed.is_some(), "simulated fleet ready");

        Self {
            settings: settings.clone(),
            state: Mutex::new(FleetState { rng, cameras }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FleetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn discovery_latency(&self) -> Duration {
        Duration::from_millis(self.settings.discovery_latency_ms)
    }

    fn apply_latency(&self) -> Duration {
        Duration::from_millis(self.settings.apply_latency_ms)
    }
}

async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

#[async_trait]
impl DiscoverySource for SimulatedFleet {
    async fn discover(&self) -> Result<Vec<DeviceDescriptor>, DiscoveryError> {
        simulate_latency(self.discovery_latency()).await;

        let mut state = self.state();
        if state.roll(self.settings.discovery_failure_rate) {
            return Err(DiscoveryError::ScanFailed(
                "simulated broadcast got no response".into(),
            ));
        }

        let visibility = self.settings.visibility;
        let cameras = state.cameras.clone();
        let visible: Vec<_> = cameras
            .iter()
            .filter(|_| state.roll(visibility))
            .map(SimCamera::descriptor)
            .collect();
        trace!(visible = visible.len(), total = cameras.len(), "simulated scan");
        Ok(visible)
    }
}

#[async_trait]
impl DeviceClient for SimulatedFleet {
    async fn apply(&self, hardware_id: &MacAddress, target: Ipv4Addr) -> Result<(), ApplyError> {
        simulate_latency(self.apply_latency()).await;

        let mut state = self.state();
        let fails = state.roll(self.settings.apply_failure_rate);
        let Some(camera) = state.camera_mut(hardware_id) else {
            return Err(ApplyError::Fault {
                message: format!("no camera answers as {hardware_id}"),
            });
        };
        if fails {
            return Err(ApplyError::Rejected {
                message: "failed to apply network configuration".into(),
            });
        }
        debug!(mac = %hardware_id, from = %camera.address, to = %target, "simulated camera moved");
        camera.address = target;
        Ok(())
    }

    async fn get_info(&self, address: IpAddr) -> Result<DeviceDescriptor, QueryError> {
        simulate_latency(self.discovery_latency() / 2).await;

        let mut state = self.state();
        if state.roll(self.settings.query_failure_rate) {
            return Err(QueryError::Unreachable { address });
        }
        state
            .camera_at(address)
            .map(SimCamera::descriptor)
            .ok_or(QueryError::Unreachable { address })
    }

    async fn test_reachable(&self, address: IpAddr) -> bool {
        let mut state = self.state();
        let drops = state.roll(self.settings.unreachable_rate);
        state.camera_at(address).is_some() && !drops
    }
}
