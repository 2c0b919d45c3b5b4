//! Registry Store adapter (C1).
//!
//! Persists and queries clients, jobs and malleability offers keyed by
//! opaque IDs. A single [`RegistryStore`] handle is not safe for concurrent
//! use on its own: the server shares one handle behind a mutex (see
//! `icc_server::state::AppState`), so the store implementation itself
//! never needs to lock.

use crate::model::{Client, ClientFilter, ClientId, Job, JobId, MalleabilityOffer};
use std::collections::BTreeMap;
use thiserror::Error;

/// Outcome of a store operation that may legitimately miss.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the given key.
    #[error("not found")]
    NotFound,
    /// The underlying store reported a protocol- or I/O-level failure.
    #[error("store error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque pagination cursor. Iteration terminates when a returned cursor is
/// `Cursor(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor(pub u64);

impl Cursor {
    /// The cursor value signalling "no more pages".
    pub fn done() -> Self {
        Cursor(0)
    }

    /// Whether this cursor signals the end of iteration.
    pub fn is_done(&self) -> bool {
        self.0 == 0
    }
}

/// Registry Store adapter: the abstract persistence boundary for clients,
/// jobs and malleability offers.
///
/// Implementations are synchronous and non-reentrant; a single handle must
/// not be shared across worker identities.
pub trait RegistryStore: Send {
    /// Insert or overwrite a client record.
    fn set_client(&mut self, client: Client) -> StoreResult<()>;

    /// Fetch a client record.
    fn get_client(&mut self, id: &str) -> StoreResult<Client>;

    /// List clients matching `filter`, paginated by `cursor`.
    ///
    /// The returned batch is a best-effort snapshot: duplicates are
    /// acceptable, and misses are acceptable only for items inserted after
    /// iteration started.
    fn list_clients(&mut self, filter: &ClientFilter, cursor: Cursor) -> StoreResult<(Vec<Client>, Cursor)>;

    /// Remove a client record, returning its job ID. Idempotent: a second
    /// delete of the same ID returns `NotFound` without mutating anything.
    fn delete_client(&mut self, id: &str) -> StoreResult<JobId>;

    /// Insert or overwrite a job's allocation summary.
    fn set_job(&mut self, id: JobId, job: Job) -> StoreResult<()>;

    /// Fetch a job's allocation summary.
    fn get_job(&mut self, id: JobId) -> StoreResult<Job>;

    /// Remove a job's allocation summary.
    fn delete_job(&mut self, id: JobId) -> StoreResult<()>;

    /// Atomically add `delta` (which may be negative) to a client's process
    /// count.
    fn incr_nprocs(&mut self, id: &str, delta: i64) -> StoreResult<()>;

    /// Insert or overwrite the single live malleability offer for a job.
    /// Concurrent writers race last-writer-wins, matching the store's lack
    /// of cross-entity atomicity (see §5 ordering guarantees).
    fn set_malleability_offer(&mut self, job_id: JobId, offer: MalleabilityOffer) -> StoreResult<()>;

    /// Fetch the live malleability offer for a job, if any.
    fn get_malleability_offer(&mut self, job_id: JobId) -> StoreResult<MalleabilityOffer>;
}

/// In-process reference implementation of [`RegistryStore`].
///
/// A production deployment would back this with a real persistent store
/// (the original used hiredis); swapping in another backend only requires
/// a different `RegistryStore` impl, since every call site depends on the
/// trait, not on this type.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    clients: BTreeMap<ClientId, Client>,
    jobs: BTreeMap<JobId, Job>,
    offers: BTreeMap<JobId, MalleabilityOffer>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryStore for InMemoryStore {
    fn set_client(&mut self, client: Client) -> StoreResult<()> {
        self.clients.insert(client.id.clone(), client);
        Ok(())
    }

    fn get_client(&mut self, id: &str) -> StoreResult<Client> {
        self.clients.get(id).cloned().ok_or(StoreError::NotFound)
    }

    fn list_clients(&mut self, filter: &ClientFilter, cursor: Cursor) -> StoreResult<(Vec<Client>, Cursor)> {
        const PAGE_SIZE: usize = 4;

        let matches: Vec<&Client> = self
            .clients
            .values()
            .filter(|c| filter.kind.is_none_or(|k| k == c.kind))
            .filter(|c| filter.job_id.is_none_or(|j| j == c.job_id))
            .collect();

        let start = cursor.0 as usize;
        if start >= matches.len() {
            return Ok((Vec::new(), Cursor::done()));
        }

        let end = (start + PAGE_SIZE).min(matches.len());
        let page: Vec<Client> = matches[start..end].iter().map(|c| (*c).clone()).collect();
        let next = if end >= matches.len() { Cursor::done() } else { Cursor(end as u64) };

        Ok((page, next))
    }

    fn delete_client(&mut self, id: &str) -> StoreResult<JobId> {
        self.clients.remove(id).map(|c| c.job_id).ok_or(StoreError::NotFound)
    }

    fn set_job(&mut self, id: JobId, job: Job) -> StoreResult<()> {
        self.jobs.insert(id, job);
        Ok(())
    }

    fn get_job(&mut self, id: JobId) -> StoreResult<Job> {
        self.jobs.get(&id).copied().ok_or(StoreError::NotFound)
    }

    fn delete_job(&mut self, id: JobId) -> StoreResult<()> {
        self.jobs.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    fn incr_nprocs(&mut self, id: &str, delta: i64) -> StoreResult<()> {
        let client = self.clients.get_mut(id).ok_or(StoreError::NotFound)?;
        let updated = client.nprocs as i64 + delta;
        client.nprocs = updated.max(0) as u32;
        Ok(())
    }

    fn set_malleability_offer(&mut self, job_id: JobId, offer: MalleabilityOffer) -> StoreResult<()> {
        self.offers.insert(job_id, offer);
        Ok(())
    }

    fn get_malleability_offer(&mut self, job_id: JobId) -> StoreResult<MalleabilityOffer> {
        self.offers.get(&job_id).cloned().ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClientKind;

    fn sample_client(id: &str, job_id: JobId) -> Client {
        Client {
            id: id.to_string(),
            kind: ClientKind::Mpi,
            addr: "tcp://x:1".to_string(),
            provider: 0,
            job_id,
            job_ncpus: 4,
            job_nnodes: 1,
            nprocs: 4,
        }
    }

    #[test]
    fn register_deregister_register_matches_single_register() {
        let mut store = InMemoryStore::new();
        store.set_client(sample_client("a", 42)).unwrap();
        store.delete_client("a").unwrap();
        store.set_client(sample_client("a", 42)).unwrap();

        let (clients, cursor) = store.list_clients(&ClientFilter { kind: None, job_id: Some(42) }, Cursor::done()).unwrap();
        assert_eq!(clients.len(), 1);
        assert!(cursor.is_done());
    }

    #[test]
    fn delete_is_idempotent() {
        let mut store = InMemoryStore::new();
        store.set_client(sample_client("a", 42)).unwrap();
        assert!(store.delete_client("a").is_ok());
        assert!(matches!(store.delete_client("a"), Err(StoreError::NotFound)));
    }

    #[test]
    fn list_clients_paginates() {
        let mut store = InMemoryStore::new();
        for i in 0..10 {
            store.set_client(sample_client(&format!("c{i}"), 1)).unwrap();
        }

        let mut seen = 0;
        let mut cursor = Cursor::done();
        loop {
            let (page, next) = store.list_clients(&ClientFilter { kind: None, job_id: Some(1) }, cursor).unwrap();
            seen += page.len();
            if next.is_done() {
                break;
            }
            cursor = next;
        }
        assert_eq!(seen, 10);
    }

    #[test]
    fn malleability_offer_last_writer_wins() {
        let mut store = InMemoryStore::new();
        store
            .set_malleability_offer(7, MalleabilityOffer { kind: ClientKind::FlexMpi, portname: "a".into(), nnodes: 2 })
            .unwrap();
        store
            .set_malleability_offer(7, MalleabilityOffer { kind: ClientKind::FlexMpi, portname: "b".into(), nnodes: 5 })
            .unwrap();

        let offer = store.get_malleability_offer(7).unwrap();
        assert_eq!(offer.portname, "b");
        assert_eq!(offer.nnodes, 5);
    }

    #[test]
    fn incr_nprocs_clamps_at_zero() {
        let mut store = InMemoryStore::new();
        store.set_client(sample_client("a", 1)).unwrap();
        store.incr_nprocs("a", -100).unwrap();
        assert_eq!(store.get_client("a").unwrap().nprocs, 0);
    }
}
