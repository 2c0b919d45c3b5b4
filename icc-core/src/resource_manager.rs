//! Resource-Manager adapter (C2).
//!
//! Wraps queries and allocation requests against the external scheduler.
//! Job-state polling mirrors the original's `icrm_jobstate`, which folds the
//! scheduler's full state enum down to `{Pending, Running, Other}`; hostlist
//! expansion mirrors `expand_nodelist`/`add_hostlist` from the standalone
//! reference client.

use crate::model::JobId;
use thiserror::Error;

/// Errors surfaced by the resource-manager adapter.
#[derive(Debug, Error)]
pub enum ResourceManagerError {
    /// The scheduler has no record of this job ID.
    #[error("invalid job id: {0}")]
    InvalidJobId(JobId),
    /// The scheduler rejected or failed to service the request.
    #[error("resource manager error: {0}")]
    Backend(String),
    /// A growth or shrink request named an operation the adapter does not
    /// support (e.g. shrinking below a scheduler-imposed minimum).
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// The hostlist expression or its cpu-count groups were malformed.
    #[error("malformed hostlist: {0}")]
    MalformedHostlist(String),
}

/// Result alias for resource-manager operations.
pub type RmResult<T> = Result<T, ResourceManagerError>;

/// Live scheduler state of a job, folded to the three states the
/// coordinator cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Queued, not yet running.
    Pending,
    /// Running.
    Running,
    /// Any other state (suspended, completed, cancelled, failed, ...).
    Other,
}

/// One physical host and the CPU count allocated to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAlloc {
    /// Hostname.
    pub host: String,
    /// CPUs allocated on this host.
    pub cpus: u16,
}

/// Resource-Manager adapter: the abstract boundary to the external
/// scheduler (Slurm in the reference deployment).
pub trait ResourceManager: Send {
    /// Query a job's current scheduler state.
    fn job_state(&mut self, job_id: JobId) -> RmResult<JobState>;

    /// Request the scheduler grow or shrink a job's node allocation.
    /// Blocks until the scheduler responds.
    fn alloc(&mut self, job_id: JobId, n_nodes: u32, shrink: bool) -> RmResult<()>;

    /// Fetch and expand the current hostlist for a job.
    fn hostlist(&mut self, job_id: JobId) -> RmResult<Vec<HostAlloc>>;
}

/// Expand a compact host-range expression against parallel CPU-count groups.
///
/// `host_expr` is a comma-separated list of tokens, each either a bare
/// hostname or a `prefix[a-b]` range (zero-padded to the width of `a`/`b`).
/// `groups` is the `(cpus, reps)` sequence the scheduler returns alongside
/// the host list: the first `reps` hosts get `cpus` each, then the next
/// group takes over. The total of all `reps` must equal the host count
/// exactly, matching the explicit testable contract chosen over guessing at
/// the original's re-arm behavior past that point.
pub fn expand_hostlist(host_expr: &str, groups: &[(u16, u32)]) -> RmResult<Vec<HostAlloc>> {
    let hosts = expand_host_expr(host_expr)?;

    let total_reps: u64 = groups.iter().map(|&(_, reps)| reps as u64).sum();
    if total_reps != hosts.len() as u64 {
        return Err(ResourceManagerError::MalformedHostlist(format!(
            "group repetitions ({total_reps}) do not cover host count ({})",
            hosts.len()
        )));
    }

    let mut out = Vec::with_capacity(hosts.len());
    let mut groups = groups.iter();
    let mut current = groups.next();
    let mut remaining = current.map(|&(_, reps)| reps).unwrap_or(0);

    for host in hosts {
        while remaining == 0 {
            current = groups.next();
            remaining = current
                .ok_or_else(|| ResourceManagerError::MalformedHostlist("ran out of cpu groups".into()))?
                .1;
        }
        let cpus = current.unwrap().0;
        out.push(HostAlloc { host, cpus });
        remaining -= 1;
    }

    Ok(out)
}

fn expand_host_expr(host_expr: &str) -> RmResult<Vec<String>> {
    let mut hosts = Vec::new();
    for token in host_expr.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(ResourceManagerError::MalformedHostlist("empty host token".into()));
        }
        match (token.find('['), token.find(']')) {
            (Some(open), Some(close)) if open < close => {
                let prefix = &token[..open];
                let range = &token[open + 1..close];
                let (lo, hi) = range
                    .split_once('-')
                    .ok_or_else(|| ResourceManagerError::MalformedHostlist(format!("bad range in {token}")))?;
                let width = lo.len();
                let lo: u32 = lo
                    .parse()
                    .map_err(|_| ResourceManagerError::MalformedHostlist(format!("bad range in {token}")))?;
                let hi: u32 = hi
                    .parse()
                    .map_err(|_| ResourceManagerError::MalformedHostlist(format!("bad range in {token}")))?;
                if lo > hi {
                    return Err(ResourceManagerError::MalformedHostlist(format!("descending range in {token}")));
                }
                for n in lo..=hi {
                    hosts.push(format!("{prefix}{n:0width$}"));
                }
            }
            (None, None) => hosts.push(token.to_string()),
            _ => return Err(ResourceManagerError::MalformedHostlist(format!("unbalanced brackets in {token}"))),
        }
    }
    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_plain_and_ranged_hosts() {
        let hosts = expand_host_expr("node[01-03],head").unwrap();
        assert_eq!(hosts, vec!["node01", "node02", "node03", "head"]);
    }

    #[test]
    fn rejects_unbalanced_brackets() {
        assert!(expand_host_expr("node[01-03").is_err());
    }

    #[test]
    fn zips_cpu_groups_across_hosts() {
        let out = expand_hostlist("node[01-02],node[03-04]", &[(8, 3), (16, 1)]).unwrap();
        assert_eq!(
            out,
            vec![
                HostAlloc { host: "node01".into(), cpus: 8 },
                HostAlloc { host: "node02".into(), cpus: 8 },
                HostAlloc { host: "node03".into(), cpus: 8 },
                HostAlloc { host: "node04".into(), cpus: 16 },
            ]
        );
    }

    #[test]
    fn rejects_group_reps_not_covering_all_hosts() {
        let err = expand_hostlist("node[01-04]", &[(8, 2)]).unwrap_err();
        assert!(matches!(err, ResourceManagerError::MalformedHostlist(_)));
    }
}
