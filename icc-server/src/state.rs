//! Server-wide state, created once at startup and injected into every
//! handler — no handler reads ambient/global state.

use crate::status::HealthState;
use icc_core::ioset::{AdmissionToken, IoSetController};
use icc_core::malleability::WakeSender;
use icc_core::resource_manager::ResourceManager;
use icc_core::store::RegistryStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything an RPC handler needs, grouped behind a single `web::Data`.
///
/// The registry store is guarded by a mutex rather than partitioned one
/// handle per worker thread: actix-web's own worker pool already supplies
/// the cooperative-concurrency substrate the design calls for, and a single
/// synchronized handle keeps the invariants (one record per client,
/// atomic `incr_nprocs`) trivially true without per-worker hash routing.
/// The handles are `Arc`-shared with the malleability coordinator task, so a
/// client registered through this state is visible to the coordinator's very
/// next reshape cycle rather than a private copy of its own.
pub struct AppState {
    /// Registry store (C1), shared and mutex-guarded.
    pub store: Arc<Mutex<Box<dyn RegistryStore>>>,
    /// Resource-manager adapter (C2), shared and mutex-guarded.
    pub rm: Arc<Mutex<Box<dyn ResourceManager>>>,
    /// I/O-set admission controller (C4); internally lock-partitioned per
    /// the algorithm in the admission design, so handed out by value.
    pub ioset: IoSetController,
    /// Wakes the malleability coordinator (C5) for a given job.
    pub wake: WakeSender,
    /// Liveness/readiness flags exposed by the status service.
    pub health: HealthState,
    /// Admission tokens awaiting their matching `hint_io_end`, keyed by
    /// `(job_id, step)` since the RPC table carries no separate client ID
    /// for I/O hints.
    pub pending_admissions: Mutex<HashMap<(u32, u32), AdmissionToken>>,
}
