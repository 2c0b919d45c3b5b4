//! Malleability coordinator (C5).
//!
//! A single long-lived task cycling `Idle -> Armed -> Working -> Idle`.
//! Idle waits on a channel of job-id wake events (replacing the source's
//! condvar-plus-shared-flag pattern, see the redesign note); Armed drains
//! the registry for the stamped job; Working reshapes FlexMPI clients'
//! process counts and demonstrates grow/shrink for rigid MPI clients.

use crate::model::{Client, ClientFilter, ClientKind, Job, JobId};
use crate::resource_manager::ResourceManager;
use crate::store::{Cursor, RegistryStore};
use parking_lot::Mutex as SyncMutex;
use std::collections::{HashSet, VecDeque};
use std::convert::TryFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Page size used while draining the registry for a stamped job, expandable
/// up to `LIST_CLIENTS_CEILING`.
const LIST_CLIENTS_CEILING: usize = 1024;

/// Errors a single client's reconfiguration attempt can raise. Never
/// propagated out of a coordinator cycle: every variant is logged and the
/// cycle continues to the next client.
#[derive(Debug, Error)]
pub enum ReconfigureError {
    /// The outbound call exceeded its timeout.
    #[error("reconfigure call to {0} timed out")]
    Timeout(String),
    /// The outbound transport itself failed (connection refused, DNS, ...).
    #[error("reconfigure call to {0} failed: {1}")]
    Transport(String, String),
    /// `delta_procs` did not fit in a signed 32-bit integer.
    #[error("delta_procs overflow for client {0}")]
    Overflow(String),
}

/// How the coordinator delivers a reconfigure command to a given client.
/// Selected per client at registration time, replacing the source's
/// dlopen-or-UDP FlexMPI glue.
#[derive(Clone)]
pub enum ReconfigureSink {
    /// Call an in-process function directly (used by co-located test
    /// clients and by the reference in-process FlexMPI glue).
    InProcessFunction(Arc<dyn Fn(JobId, i64) + Send + Sync>),
    /// Send a UDP datagram carrying the new process count.
    DatagramSocket(String),
    /// Forward as an HTTP RPC to the client's callback address.
    RpcForward(String),
}

impl ReconfigureSink {
    /// Pick a sink from a client's registered transport address and
    /// provider tag. Provider `0` selects HTTP forwarding, `1` selects a
    /// raw datagram, anything else is treated as an in-process no-op
    /// (used by tests).
    pub fn for_client(client: &Client) -> Self {
        match client.provider {
            1 => ReconfigureSink::DatagramSocket(client.addr.clone()),
            0 => ReconfigureSink::RpcForward(client.addr.clone()),
            _ => ReconfigureSink::InProcessFunction(Arc::new(|_, _| {})),
        }
    }
}

/// Default timeout for an outbound unary reconfigure call.
pub const DEFAULT_RECONFIGURE_TIMEOUT: Duration = Duration::from_secs(2);

async fn send_reconfigure(sink: &ReconfigureSink, job_id: JobId, maxprocs: i64, timeout: Duration, http: &reqwest::Client) -> Result<(), ReconfigureError> {
    match sink {
        ReconfigureSink::InProcessFunction(f) => {
            f(job_id, maxprocs);
            Ok(())
        }
        ReconfigureSink::DatagramSocket(addr) => {
            let sock = tokio::net::UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| ReconfigureError::Transport(addr.clone(), e.to_string()))?;
            let payload = format!("reconfigure {job_id} {maxprocs}");
            tokio::time::timeout(timeout, sock.send_to(payload.as_bytes(), addr))
                .await
                .map_err(|_| ReconfigureError::Timeout(addr.clone()))?
                .map_err(|e| ReconfigureError::Transport(addr.clone(), e.to_string()))?;
            Ok(())
        }
        ReconfigureSink::RpcForward(url) => {
            let body = serde_json::json!({ "jobid": job_id, "maxprocs": maxprocs });
            tokio::time::timeout(timeout, http.post(url).json(&body).send())
                .await
                .map_err(|_| ReconfigureError::Timeout(url.clone()))?
                .map_err(|e| ReconfigureError::Transport(url.clone(), e.to_string()))?;
            Ok(())
        }
    }
}

fn checked_delta(job: &Job, nclients: u32, client: &Client) -> Result<i64, ReconfigureError> {
    if nclients == 0 {
        return Ok(0);
    }
    let target = job.ncpus as i64 / nclients as i64;
    let delta = target - client.nprocs as i64;
    i32::try_from(delta).map_err(|_| ReconfigureError::Overflow(client.id.clone()))?;
    Ok(delta)
}

/// Wake-event sender handed to RPC handlers. Cloned freely; sending is
/// non-blocking and drops the event if the channel is full rather than
/// stalling a handler (the coordinator's next cycle will still observe
/// the job via any later event, and bursts are meant to collapse).
#[derive(Clone)]
pub struct WakeSender(mpsc::Sender<JobId>);

impl WakeSender {
    /// Stamp a job ID so the coordinator reshapes it on its next cycle.
    pub fn wake(&self, job_id: JobId) {
        let _ = self.0.try_send(job_id);
    }
}

/// Create a bounded wake channel: `(sender handed to RPC handlers,
/// coordinator-side receiver)`.
pub fn wake_channel(capacity: usize) -> (WakeSender, mpsc::Receiver<JobId>) {
    let (tx, rx) = mpsc::channel(capacity);
    (WakeSender(tx), rx)
}

/// The malleability coordinator task.
///
/// Holds the same `Arc<Mutex<...>>` store and resource-manager handles as
/// the RPC dispatcher's [`AppState`](../../icc_server/struct.AppState.html)
/// rather than its own private handle, so a client registered over HTTP is
/// visible to the very next reshape cycle.
pub struct Coordinator<S: ?Sized, R: ?Sized> {
    store: Arc<SyncMutex<Box<S>>>,
    rm: Arc<SyncMutex<Box<R>>>,
    wake_rx: mpsc::Receiver<JobId>,
    http: reqwest::Client,
    reconfigure_timeout: Duration,
    settle_delay: Duration,
    readiness: Arc<AtomicBool>,
}

impl<S, R> Coordinator<S, R>
where
    S: RegistryStore + ?Sized,
    R: ResourceManager + ?Sized,
{
    /// Build a coordinator over the same store and resource-manager handles
    /// the RPC dispatcher uses, reading wake events from `wake_rx`.
    pub fn new(store: Arc<SyncMutex<Box<S>>>, rm: Arc<SyncMutex<Box<R>>>, wake_rx: mpsc::Receiver<JobId>) -> Self {
        Self {
            store,
            rm,
            wake_rx,
            http: reqwest::Client::new(),
            reconfigure_timeout: DEFAULT_RECONFIGURE_TIMEOUT,
            settle_delay: Duration::from_secs(30),
            readiness: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Override the settle delay between allocations (production default is
    /// tens of seconds; tests shrink this to keep runtime bounded).
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Override the per-client outbound reconfigure timeout.
    pub fn with_reconfigure_timeout(mut self, timeout: Duration) -> Self {
        self.reconfigure_timeout = timeout;
        self
    }

    /// Flip `flag` to false while a pass is in flight and back to true once
    /// the coordinator returns to Idle, for the status service's readiness
    /// probe. Idle-with-no-pending-work already reads as ready since the
    /// flag starts `true`.
    pub fn with_readiness_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.readiness = flag;
        self
    }

    /// Run the Idle/Armed/Working cycle until the wake channel closes.
    pub async fn run(&mut self) {
        while let Some(first) = self.wake_rx.recv().await {
            let mut jobs: VecDeque<JobId> = VecDeque::new();
            let mut seen = HashSet::new();
            seen.insert(first);
            jobs.push_back(first);
            while let Ok(job_id) = self.wake_rx.try_recv() {
                if seen.insert(job_id) {
                    jobs.push_back(job_id);
                }
            }

            self.readiness.store(false, Ordering::Relaxed);
            for job_id in jobs {
                self.reshape_job(job_id).await;
            }
            self.readiness.store(true, Ordering::Relaxed);
        }
    }

    async fn reshape_job(&mut self, job_id: JobId) {
        let job = match self.store.lock().get_job(job_id) {
            Ok(job) => job,
            Err(e) => {
                log::warn!("malleability: job {job_id} vanished before reshaping: {e}");
                return;
            }
        };

        let mut clients = Vec::new();
        let mut cursor = Cursor::done();
        loop {
            let filter = ClientFilter { kind: None, job_id: Some(job_id) };
            match self.store.lock().list_clients(&filter, cursor) {
                Ok((page, next)) => {
                    clients.extend(page);
                    if next.is_done() || clients.len() >= LIST_CLIENTS_CEILING {
                        break;
                    }
                    cursor = next;
                }
                Err(e) => {
                    log::warn!("malleability: list_clients failed for job {job_id}: {e}");
                    break;
                }
            }
        }

        let flexmpi: Vec<&Client> = clients.iter().filter(|c| c.kind == ClientKind::FlexMpi).collect();
        let nclients = flexmpi.len() as u32;

        for client in flexmpi {
            if let Err(e) = self.reshape_flexmpi_client(&job, nclients, client).await {
                log::warn!("malleability: reconfigure of {} failed: {e}", client.id);
            }
        }

        for client in clients.iter().filter(|c| c.kind == ClientKind::Mpi) {
            self.demonstrate_resalloc(job_id, client).await;
        }
    }

    async fn reshape_flexmpi_client(&mut self, job: &Job, nclients: u32, client: &Client) -> Result<(), ReconfigureError> {
        let delta = checked_delta(job, nclients, client)?;
        let sink = ReconfigureSink::for_client(client);
        send_reconfigure(&sink, client.job_id, delta, self.reconfigure_timeout, &self.http).await?;
        self.store
            .lock()
            .incr_nprocs(&client.id, delta)
            .map_err(|e| ReconfigureError::Transport(client.id.clone(), e.to_string()))?;
        Ok(())
    }

    async fn demonstrate_resalloc(&mut self, job_id: JobId, client: &Client) {
        if let Err(e) = self.rm.lock().alloc(job_id, client.job_nnodes + 1, false) {
            log::warn!("malleability: resalloc grow for {} failed: {e}", client.id);
            return;
        }
        tokio::time::sleep(self.settle_delay).await;
        if let Err(e) = self.rm.lock().alloc(job_id, client.job_nnodes, true) {
            log::warn!("malleability: resalloc shrink for {} failed: {e}", client.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClientKind;
    use crate::resource_manager::{HostAlloc, JobState, ResourceManagerError, RmResult};
    use crate::store::InMemoryStore;

    struct StubRm;
    impl ResourceManager for StubRm {
        fn job_state(&mut self, _job_id: JobId) -> RmResult<JobState> {
            Ok(JobState::Running)
        }
        fn alloc(&mut self, _job_id: JobId, _n_nodes: u32, shrink: bool) -> RmResult<()> {
            if shrink {
                return Err(ResourceManagerError::NotImplemented("shrink".to_string()));
            }
            Ok(())
        }
        fn hostlist(&mut self, _job_id: JobId) -> RmResult<Vec<HostAlloc>> {
            Ok(Vec::new())
        }
    }

    fn flexmpi_client(id: &str, job_id: JobId, nprocs: u32) -> Client {
        Client {
            id: id.to_string(),
            kind: ClientKind::FlexMpi,
            addr: String::new(),
            provider: 2,
            job_id,
            job_ncpus: 8,
            job_nnodes: 1,
            nprocs,
        }
    }

    #[tokio::test]
    async fn reshapes_flexmpi_clients_toward_even_split() {
        let mut store = InMemoryStore::new();
        store.set_job(7, Job { ncpus: 8, nnodes: 2 }).unwrap();
        store.set_client(flexmpi_client("a", 7, 4)).unwrap();
        store.set_client(flexmpi_client("b", 7, 4)).unwrap();
        let store = Arc::new(SyncMutex::new(Box::new(store)));
        let rm = Arc::new(SyncMutex::new(Box::new(StubRm)));

        let (tx, rx) = wake_channel(8);
        let mut coord = Coordinator::new(store.clone(), rm, rx).with_settle_delay(Duration::from_millis(1));
        tx.wake(7);
        drop(tx);

        coord.run().await;

        // even split: 8 cpus / 2 clients - 4 already held = delta 0, clamped to 4.
        assert_eq!(store.lock().get_client("a").unwrap().nprocs, 4);
        assert_eq!(store.lock().get_client("b").unwrap().nprocs, 4);
    }

    #[test]
    fn checked_delta_detects_overflow() {
        let job = Job { ncpus: u32::MAX, nnodes: 1 };
        let client = flexmpi_client("a", 1, 0);
        assert!(matches!(checked_delta(&job, 1, &client), Err(ReconfigureError::Overflow(_))));
    }

    /// A TCP listener that accepts connections but never reads or writes,
    /// so a request against it always runs out its caller's timeout rather
    /// than being refused or answered.
    fn spawn_black_hole() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let _held = stream;
                std::thread::sleep(Duration::from_secs(10));
            }
        });
        format!("http://{addr}/reconfigure")
    }

    #[tokio::test]
    async fn send_reconfigure_reports_timeout_for_unresponsive_peer() {
        let url = spawn_black_hole();
        let result = send_reconfigure(&ReconfigureSink::RpcForward(url.clone()), 1, 2, Duration::from_millis(50), &reqwest::Client::new()).await;
        assert!(matches!(result, Err(ReconfigureError::Timeout(got)) if got == url));
    }

    #[tokio::test]
    async fn outbound_timeout_does_not_block_other_clients_or_mutate_store() {
        let stuck_url = spawn_black_hole();

        let mut store = InMemoryStore::new();
        store.set_job(9, Job { ncpus: 8, nnodes: 2 }).unwrap();
        let mut stuck = flexmpi_client("slow", 9, 2);
        stuck.provider = 0;
        stuck.addr = stuck_url;
        store.set_client(stuck).unwrap();
        let fast = flexmpi_client("fast", 9, 6);
        store.set_client(fast).unwrap();
        let store = Arc::new(SyncMutex::new(Box::new(store)));
        let rm = Arc::new(SyncMutex::new(Box::new(StubRm)));

        let (tx, rx) = wake_channel(8);
        let mut coord = Coordinator::new(store.clone(), rm, rx)
            .with_settle_delay(Duration::from_millis(1))
            .with_reconfigure_timeout(Duration::from_millis(50));
        tx.wake(9);
        drop(tx);

        coord.run().await;

        // the stuck client's process count is untouched by the timed-out call...
        assert_eq!(store.lock().get_client("slow").unwrap().nprocs, 2);
        // ...while the coordinator still reshaped the other client toward the even split.
        assert_eq!(store.lock().get_client("fast").unwrap().nprocs, 4);
    }
}
