//! Entities tracked by the registry: clients, jobs and malleability offers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable 128-bit client identifier, carried on the wire in string form.
pub type ClientId = String;

/// Resource-manager job identifier.
pub type JobId = u32;

/// The kind of process a client represents.
///
/// `(job_id, kind)` is deliberately *not* unique: several steps of the same
/// job may register clients of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    /// A rigid MPI job step.
    Mpi,
    /// An elastic FlexMPI job step, able to grow/shrink its process count.
    FlexMpi,
    /// The `jobcleaner` example client.
    JobCleaner,
    /// A Slurm job-monitor spank plugin.
    JobMonitor,
    /// An ad-hoc storage CLI client.
    AdhocCli,
    /// A client that only emits I/O-set hints.
    IoSets,
    /// A client using the second-generation reconfigure protocol.
    Reconfig2,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClientKind::Mpi => "mpi",
            ClientKind::FlexMpi => "flexmpi",
            ClientKind::JobCleaner => "jobcleaner",
            ClientKind::JobMonitor => "jobmonitor",
            ClientKind::AdhocCli => "adhoc_cli",
            ClientKind::IoSets => "iosets",
            ClientKind::Reconfig2 => "reconfig2",
        };
        f.write_str(s)
    }
}

/// A registered client process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Stable client identifier, unique across live clients.
    pub id: ClientId,
    /// The kind of process this client represents.
    pub kind: ClientKind,
    /// Opaque callback transport address, used by the malleability
    /// coordinator to reach the client with outbound RPCs.
    pub addr: String,
    /// Small integer tag identifying the RPC provider/transport in use.
    pub provider: i32,
    /// Job this client belongs to, or 0 if none.
    pub job_id: JobId,
    /// Total CPU count of the client's job, as known at registration time.
    pub job_ncpus: u32,
    /// Total node count of the client's job, as known at registration time.
    pub job_nnodes: u32,
    /// Current process count of this client.
    pub nprocs: u32,
}

/// Allocation summary for a job, as tracked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Job {
    /// Total CPU count currently allocated (current allocation + pending grants).
    pub ncpus: u32,
    /// Total node count currently allocated.
    pub nnodes: u32,
}

/// An offer made by an elastic application that it can host other work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalleabilityOffer {
    /// Kind of the offering application.
    pub kind: ClientKind,
    /// Contact address (port name) at which the offer can be redeemed.
    pub portname: String,
    /// Number of nodes available for the offer.
    pub nnodes: u32,
}

/// Filter applied to `list_clients`.
#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    /// Restrict to clients of this kind.
    pub kind: Option<ClientKind>,
    /// Restrict to clients of this job.
    pub job_id: Option<JobId>,
}
