//! Wire-level request/response schemas for the RPC surface.
//!
//! Every RPC is logically a flat tuple of fixed-width integers and strings;
//! this module gives that tuple contract typed JSON field names instead of
//! positional offsets, field-for-field matching the RPC table.

use icc_core::model::ClientKind;
use serde_derive::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Client-observable result code. `Success` is always `0`; every other
/// variant is a nonzero failure the client must treat as opaque beyond
/// its discriminant. Serialized as its integer discriminant, not its
/// variant name, since the wire contract is a flat tuple of integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum RpcStatus {
    /// The RPC completed and had its intended effect.
    Success = 0,
    /// Generic failure.
    Failure = 1,
    /// A request field was invalid (malformed, out of range, or the
    /// referenced entity does not exist).
    InvalidParameter = 2,
    /// Allocation failed.
    OutOfMemory = 3,
    /// A computed quantity did not fit its wire type.
    Overflow = 4,
    /// An outbound call this RPC depended on exceeded its timeout.
    Timeout = 5,
}

impl From<RpcStatus> for i32 {
    fn from(status: RpcStatus) -> i32 {
        status as i32
    }
}

impl TryFrom<i32> for RpcStatus {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RpcStatus::Success),
            1 => Ok(RpcStatus::Failure),
            2 => Ok(RpcStatus::InvalidParameter),
            3 => Ok(RpcStatus::OutOfMemory),
            4 => Ok(RpcStatus::Overflow),
            5 => Ok(RpcStatus::Timeout),
            other => Err(format!("unknown RpcStatus discriminant {other}")),
        }
    }
}

/// Minimal response shared by every RPC that returns only a status.
#[derive(Debug, Serialize, Deserialize)]
pub struct RcResponse {
    /// Result code.
    pub rc: RpcStatus,
}

impl RcResponse {
    /// Build a success response.
    pub fn ok() -> Self {
        RcResponse { rc: RpcStatus::Success }
    }

    /// Build a response carrying the given failure code.
    pub fn failure(rc: RpcStatus) -> Self {
        RcResponse { rc }
    }
}

/// `client_register` input.
#[derive(Debug, Deserialize)]
pub struct ClientRegisterRequest {
    pub clid: String,
    pub kind: ClientKind,
    pub addr: String,
    pub provid: i32,
    pub jobid: u32,
    pub jobncpus: u32,
    pub jobnnodes: u32,
    pub nprocs: u32,
}

/// `client_deregister` input.
#[derive(Debug, Deserialize)]
pub struct ClientDeregisterRequest {
    pub clid: String,
}

/// `test` input.
#[derive(Debug, Deserialize)]
pub struct TestRequest {
    pub number: i64,
}

/// `jobclean` input.
#[derive(Debug, Deserialize)]
pub struct JobCleanRequest {
    pub jobid: u32,
}

/// `jobmon_submit` input.
#[derive(Debug, Deserialize)]
pub struct JobMonSubmitRequest {
    pub jobid: u32,
    pub step: u32,
    pub nnodes: u32,
}

/// `jobmon_exit` input.
#[derive(Debug, Deserialize)]
pub struct JobMonExitRequest {
    pub jobid: u32,
    pub step: u32,
}

/// `adhoc_nodes` input.
#[derive(Debug, Deserialize)]
pub struct AdhocNodesRequest {
    pub jobid: u32,
    pub nnodes: u32,
    pub adhoc_nnodes: u32,
}

/// `resallocdone` input.
#[derive(Debug, Deserialize)]
pub struct ResallocDoneRequest {
    pub jobid: u32,
    pub ncpus: u32,
    pub hostlist: String,
}

/// `malleability_avail` input.
#[derive(Debug, Deserialize)]
pub struct MalleabilityAvailRequest {
    pub jobid: u32,
    pub kind: ClientKind,
    pub portname: String,
    pub nnodes: u32,
}

/// Whether a client is entering or leaving a malleability region.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalleabilityAction {
    Enter,
    Leave,
}

/// `malleability_region` input.
#[derive(Debug, Deserialize)]
pub struct MalleabilityRegionRequest {
    pub client_id: String,
    pub action: MalleabilityAction,
}

/// `hint_io_begin` input.
#[derive(Debug, Deserialize)]
pub struct HintIoBeginRequest {
    pub jobid: u32,
    pub step: u32,
    pub witer_ms: u64,
    pub phase_flag: bool,
}

/// `hint_io_begin` output.
#[derive(Debug, Serialize)]
pub struct HintIoBeginResponse {
    pub rc: RpcStatus,
    pub nslices: u32,
}

/// `hint_io_end` input.
#[derive(Debug, Deserialize)]
pub struct HintIoEndRequest {
    pub jobid: u32,
    pub step: u32,
    pub witer_ms: u64,
    pub phase_flag: bool,
}
