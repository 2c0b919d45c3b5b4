//! I/O-set admission controller (C4).
//!
//! Co-scheduled applications are grouped by characteristic write period into
//! "I/O sets"; the controller admits at most one writer per set and at most
//! one writer system-wide at any instant, handing out a slice budget
//! proportional to each set's priority. See `hint_io_begin`/`hint_io_end`.

use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors surfaced by the I/O-set admission controller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IoSetError {
    /// `witer_ms` was zero or otherwise not a valid period.
    #[error("invalid write period")]
    InvalidPeriod,
    /// `hint_io_end` was called for a set/phase that was never begun.
    #[error("no matching admission in progress")]
    NotAdmitted,
}

/// Result alias for admission-controller operations.
pub type IoSetResult<T> = Result<T, IoSetError>;

/// Identifier of an I/O set, derived from the characteristic write period.
pub type SetId = i32;

/// `set_id = round(log10(witer_ms / 1000))`.
pub fn set_id_for_period(witer_ms: u64) -> IoSetResult<SetId> {
    if witer_ms == 0 {
        return Err(IoSetError::InvalidPeriod);
    }
    let ratio = witer_ms as f64 / 1000.0;
    Ok(ratio.log10().round() as SetId)
}

/// `p = 10^set_id`, always strictly positive.
fn priority_for_set(set_id: SetId) -> f64 {
    10f64.powi(set_id)
}

struct SetEntry {
    priority: f64,
    in_phase: Mutex<bool>,
    phase_cv: Condvar,
}

/// Token returned by `hint_io_begin`, required by the matching
/// `hint_io_end` call. Carries the bookkeeping the release step needs
/// without re-deriving it (and without letting callers forge an
/// admission).
pub struct AdmissionToken {
    set_id: SetId,
    witer_ms: u64,
    phase_flag: bool,
    wait_start: Instant,
    io_start: Instant,
}

impl AdmissionToken {
    /// Characteristic set this admission belongs to.
    pub fn set_id(&self) -> SetId {
        self.set_id
    }
}

/// One logged I/O event, persisted for offline fairness analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct IoEvent {
    /// Client that performed the I/O.
    pub client_id: String,
    /// Characteristic write period, in milliseconds.
    pub witer_ms: u64,
    /// Time spent waiting for admission, in milliseconds.
    pub wait_ms: u64,
    /// Time spent actually writing, in milliseconds.
    pub io_ms: u64,
}

/// Sink for persisted I/O events. Implementations back the `iosets_out.csv`
/// trail; tests can substitute an in-memory collector.
pub trait IoEventSink: Send + Sync {
    /// Record one completed begin/end pair.
    fn record(&self, event: IoEvent);
}

/// A sink that discards events, for callers that don't need the trail.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl IoEventSink for NullEventSink {
    fn record(&self, _event: IoEvent) {}
}

/// Admission controller state shared by every RPC worker.
///
/// Cloned handles share the same underlying locks: unlike the Registry
/// Store, admission state is inherently cross-worker (the whole point is
/// serializing writers system-wide), so it is not partitioned per worker
/// identity.
#[derive(Clone)]
pub struct IoSetController {
    sets: Arc<RwLock<HashMap<SetId, Arc<SetEntry>>>>,
    any_writer_running: Arc<Mutex<bool>>,
    global_cv: Arc<Condvar>,
    sink: Arc<dyn IoEventSink>,
}

impl IoSetController {
    /// Create a controller that logs events to `sink`.
    pub fn new(sink: Arc<dyn IoEventSink>) -> Self {
        Self {
            sets: Arc::new(RwLock::new(HashMap::new())),
            any_writer_running: Arc::new(Mutex::new(false)),
            global_cv: Arc::new(Condvar::new()),
            sink,
        }
    }

    fn entry(&self, set_id: SetId) -> Arc<SetEntry> {
        if let Some(e) = self.sets.read().get(&set_id) {
            return e.clone();
        }
        let mut sets = self.sets.write();
        sets.entry(set_id)
            .or_insert_with(|| {
                Arc::new(SetEntry {
                    priority: priority_for_set(set_id),
                    in_phase: Mutex::new(false),
                    phase_cv: Condvar::new(),
                })
            })
            .clone()
    }

    /// Request admission to write. Blocks until both the per-set phase gate
    /// and the system-wide writer gate admit the caller, then returns the
    /// slice budget to use and a token required by `hint_io_end`.
    pub fn hint_io_begin(&self, client_id: &str, witer_ms: u64, phase_flag: bool) -> IoSetResult<(u32, AdmissionToken)> {
        let set_id = set_id_for_period(witer_ms)?;
        let wait_start = Instant::now();
        let set = self.entry(set_id);

        if phase_flag {
            let mut in_phase = set.in_phase.lock();
            while *in_phase {
                set.phase_cv.wait(&mut in_phase);
            }
            *in_phase = true;
        }

        {
            let mut running = self.any_writer_running.lock();
            while *running {
                self.global_cv.wait(&mut running);
            }
            *running = true;
        }

        let nslices = {
            let sets = self.sets.read();
            let min_p = sets
                .values()
                .filter(|s| *s.in_phase.lock())
                .map(|s| s.priority)
                .fold(f64::INFINITY, f64::min);
            let min_p = if min_p.is_finite() { min_p } else { set.priority };
            let scale = 1.0 / min_p;
            ((set.priority * scale).round().max(1.0)) as u32
        };

        let io_start = Instant::now();
        let _ = client_id;

        Ok((
            nslices,
            AdmissionToken { set_id, witer_ms, phase_flag, wait_start, io_start },
        ))
    }

    /// Release an admission acquired via `hint_io_begin`.
    pub fn hint_io_end(&self, client_id: &str, token: AdmissionToken) -> IoSetResult<()> {
        let io_end = Instant::now();

        {
            let mut running = self.any_writer_running.lock();
            *running = false;
            self.global_cv.notify_one();
        }

        if token.phase_flag {
            let set = self.entry(token.set_id);
            let mut in_phase = set.in_phase.lock();
            *in_phase = false;
            set.phase_cv.notify_one();
        }

        self.sink.record(IoEvent {
            client_id: client_id.to_string(),
            witer_ms: token.witer_ms,
            wait_ms: duration_ms(token.io_start.duration_since(token.wait_start)),
            io_ms: duration_ms(io_end.duration_since(token.io_start)),
        });

        Ok(())
    }
}

fn duration_ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct CollectingSink(StdMutex<Vec<IoEvent>>);

    impl IoEventSink for CollectingSink {
        fn record(&self, event: IoEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn rejects_zero_period() {
        assert_eq!(set_id_for_period(0), Err(IoSetError::InvalidPeriod));
    }

    #[test]
    fn set_id_matches_log10_of_seconds() {
        assert_eq!(set_id_for_period(1000).unwrap(), 0);
        assert_eq!(set_id_for_period(10_000).unwrap(), 1);
        assert_eq!(set_id_for_period(100).unwrap(), -1);
    }

    #[test]
    fn monopoly_case_yields_one_slice() {
        let ctrl = IoSetController::new(Arc::new(NullEventSink));
        let (nslices, token) = ctrl.hint_io_begin("c1", 1000, true).unwrap();
        assert_eq!(nslices, 1);
        ctrl.hint_io_end("c1", token).unwrap();
    }

    #[test]
    fn begin_end_round_trip_logs_one_event() {
        let sink = Arc::new(CollectingSink::default());
        let ctrl = IoSetController::new(sink.clone());
        let (_, token) = ctrl.hint_io_begin("c1", 1000, false).unwrap();
        ctrl.hint_io_end("c1", token).unwrap();
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn sequential_admissions_in_same_set_do_not_deadlock() {
        let ctrl = IoSetController::new(Arc::new(NullEventSink));
        for _ in 0..5 {
            let (_, token) = ctrl.hint_io_begin("c1", 1000, true).unwrap();
            ctrl.hint_io_end("c1", token).unwrap();
        }
    }
}
