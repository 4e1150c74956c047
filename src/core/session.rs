use crate::core::endpoint::ServiceEndpoint;
use crate::core::error::ClientError;
use crate::core::fork::{ForkOutcome, fork_vm};
use crate::core::inventory::{VmRecord, list_vms};
use crate::core::launch::{self, ConflictResolver, LaunchOutcome};
use crate::core::transport::Transport;

/// What a host keeps between operations: where the service is, how to reach it, and
/// the last inventory it saw.
pub struct VmSession<T: Transport> {
    endpoint: ServiceEndpoint,
    transport: T,
    vms: Vec<VmRecord>,
}

impl<T: Transport> VmSession<T> {
    pub fn new(endpoint: ServiceEndpoint, transport: T) -> Self {
        Self {
            endpoint,
            transport,
            vms: Vec::new(),
        }
    }

    /// Rejects an empty or malformed base address before anything is sent.
    pub fn connect(address: &str, transport: T) -> Result<Self, ClientError> {
        Ok(Self::new(ServiceEndpoint::parse(address)?, transport))
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    /// Snapshot from the most recent refresh.
    pub fn vms(&self) -> &[VmRecord] {
        &self.vms
    }

    pub fn find(&self, vmid: u64) -> Option<&VmRecord> {
        self.vms.iter().find(|vm| vm.id() == vmid)
    }

    pub fn running(&self) -> Option<&VmRecord> {
        self.vms.iter().find(|vm| vm.is_running())
    }

    pub async fn refresh(&mut self) -> &[VmRecord] {
        self.vms = list_vms(&self.transport, &self.endpoint).await;
        &self.vms
    }

    /// Runs the launch negotiation. The snapshot is refreshed whenever the service
    /// was asked to act, and left alone when the operator cancelled.
    pub async fn launch<R>(&mut self, vmid: u64, resolver: &R) -> LaunchOutcome
    where
        R: ConflictResolver + ?Sized,
    {
        let outcome = launch::launch(&self.transport, &self.endpoint, vmid, resolver).await;
        if outcome.reached_service() {
            self.refresh().await;
        }
        outcome
    }

    pub async fn shutdown_host<R>(&mut self, resolver: &R) -> LaunchOutcome
    where
        R: ConflictResolver + ?Sized,
    {
        let outcome = launch::shutdown_host(&self.transport, &self.endpoint, resolver).await;
        if outcome.reached_service() {
            self.refresh().await;
        }
        outcome
    }

    pub async fn fork(&mut self, vmid: u64, name: &str) -> ForkOutcome {
        let outcome = fork_vm(&self.transport, &self.endpoint, vmid, name).await;
        if outcome.created {
            self.refresh().await;
        }
        outcome
    }
}
