// Shared fakes for orchestrator integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use camprov_core::{
    ApplyError, DeviceClient, DeviceDescriptor, DiscoveryError, DiscoverySource, MacAddress,
    Orchestrator, ProvisionerConfig, ProvisioningEvent, QueryError,
};
use tokio::sync::broadcast;

pub fn camera(mac: &str, host: u8) -> DeviceDescriptor {
    DeviceDescriptor::new(mac)
        .with_address(Ipv4Addr::new(192, 168, 1, host))
        .with_model("AXIS M3106-L Mk II")
        .with_firmware("10.12.1")
}

pub fn addr(host: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, host)
}

// ── Discovery ───────────────────────────────────────────────────────

/// Returns whatever batch was last set, or a queued failure.
#[derive(Default)]
pub struct ScriptedDiscovery {
    batch: Mutex<Vec<DeviceDescriptor>>,
    failures: Mutex<Vec<DiscoveryError>>,
    panic_next: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedDiscovery {
    pub fn with_batch(batch: Vec<DeviceDescriptor>) -> Arc<Self> {
        let discovery = Self::default();
        *discovery.batch.lock().unwrap() = batch;
        Arc::new(discovery)
    }

    pub fn set_batch(&self, batch: Vec<DeviceDescriptor>) {
        *self.batch.lock().unwrap() = batch;
    }

    pub fn fail_next(&self, error: DiscoveryError) {
        self.failures.lock().unwrap().push(error);
    }

    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoverySource for ScriptedDiscovery {
    async fn discover(&self) -> Result<Vec<DeviceDescriptor>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("broadcast socket exploded");
        }
        if let Some(error) = self.failures.lock().unwrap().pop() {
            return Err(error);
        }
        Ok(self.batch.lock().unwrap().clone())
    }
}

// ── Device client ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Reject(String),
    Fault(String),
    Panic,
    /// Never completes; the attempt has to be cancelled or time out.
    Block,
}

pub struct FakeClient {
    default: Mutex<Behavior>,
    per_device: Mutex<HashMap<MacAddress, Behavior>>,
    apply_delay: Duration,
    reachable: AtomicBool,
    reachability_panics: AtomicBool,
    info_blocks: AtomicBool,
    info: Mutex<HashMap<IpAddr, DeviceDescriptor>>,
    applied: Mutex<Vec<(MacAddress, Ipv4Addr)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Arc<Self> {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(apply_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            default: Mutex::new(Behavior::Succeed),
            per_device: Mutex::new(HashMap::new()),
            apply_delay,
            reachable: AtomicBool::new(true),
            reachability_panics: AtomicBool::new(false),
            info_blocks: AtomicBool::new(false),
            info: Mutex::new(HashMap::new()),
            applied: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn behave(&self, behavior: Behavior) {
        *self.default.lock().unwrap() = behavior;
    }

    pub fn behave_for(&self, mac: &str, behavior: Behavior) {
        self.per_device
            .lock()
            .unwrap()
            .insert(MacAddress::new(mac), behavior);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn panic_on_reachability(&self) {
        self.reachability_panics.store(true, Ordering::SeqCst);
    }

    /// Info queries never answer from now on.
    pub fn block_info(&self) {
        self.info_blocks.store(true, Ordering::SeqCst);
    }

    pub fn answer_info(&self, address: Ipv4Addr, descriptor: DeviceDescriptor) {
        self.info
            .lock()
            .unwrap()
            .insert(IpAddr::V4(address), descriptor);
    }

    pub fn applied(&self) -> Vec<(MacAddress, Ipv4Addr)> {
        self.applied.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, mac: &MacAddress) -> Behavior {
        self.per_device
            .lock()
            .unwrap()
            .get(mac)
            .cloned()
            .unwrap_or_else(|| self.default.lock().unwrap().clone())
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DeviceClient for FakeClient {
    async fn apply(&self, hardware_id: &MacAddress, target: Ipv4Addr) -> Result<(), ApplyError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.applied
            .lock()
            .unwrap()
            .push((hardware_id.clone(), target));

        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }

        match self.behavior_for(hardware_id) {
            Behavior::Succeed => Ok(()),
            Behavior::Reject(message) => Err(ApplyError::Rejected { message }),
            Behavior::Fault(message) => Err(ApplyError::Fault { message }),
            Behavior::Panic => panic!("firmware exploded"),
            Behavior::Block => std::future::pending().await,
        }
    }

    async fn get_info(&self, address: IpAddr) -> Result<DeviceDescriptor, QueryError> {
        if self.info_blocks.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.info
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .ok_or(QueryError::Unreachable { address })
    }

    async fn test_reachable(&self, _address: IpAddr) -> bool {
        if self.reachability_panics.load(Ordering::SeqCst) {
            panic!("reachability check exploded");
        }
        self.reachable.load(Ordering::SeqCst)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

pub fn orchestrator(
    config: ProvisionerConfig,
    discovery: &Arc<ScriptedDiscovery>,
    client: &Arc<FakeClient>,
) -> Orchestrator {
    Orchestrator::new(config, discovery.clone(), client.clone()).unwrap()
}

/// Wait until the device has entered `Configuring`.
pub async fn wait_for_start(events: &mut broadcast::Receiver<ProvisioningEvent>, mac: &str) {
    let wanted = MacAddress::new(mac);
    loop {
        if let ProvisioningEvent::ConfigurationStarted { hardware_id, .. } = events.recv().await.unwrap() {
            if hardware_id == wanted {
                return;
            }
        }
    }
}

pub fn drain(events: &mut broadcast::Receiver<ProvisioningEvent>) -> Vec<ProvisioningEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
