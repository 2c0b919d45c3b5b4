//! Scheduler environment defaults.
//!
//! `SLURM_JOBID`/`SLURM_JOB_ID`/`SLURM_NNODES`, when present in the
//! process environment, seed default values for client registrations that
//! omit them. `ADMIRE_ENABLE` is read here only for completeness: spank
//! plugins consult it, the server itself ignores it.

use std::env;

/// Job ID the scheduler placed us under, if any.
pub fn slurm_job_id() -> Option<u32> {
    env::var("SLURM_JOBID").or_else(|_| env::var("SLURM_JOB_ID")).ok()?.parse().ok()
}

/// Node count of the current scheduler allocation, if any.
pub fn slurm_nnodes() -> Option<u32> {
    env::var("SLURM_NNODES").ok()?.parse().ok()
}

/// Whether the ADMIRE stack is enabled per the spank-plugin convention.
/// The server does not act on this; it is read only so the convention is
/// documented in one place.
pub fn admire_enabled() -> bool {
    match env::var("ADMIRE_ENABLE") {
        Ok(v) => !matches!(v.as_str(), "" | "0" | "no" | "NO"),
        Err(_) => false,
    }
}
