//! RPC dispatcher (C3): one `actix-web` handler per registered RPC name,
//! forwarding to the registry store, resource-manager adapter, I/O-set
//! controller or malleability coordinator as the table in the design
//! dictates. Every handler always returns exactly one response, translating
//! every internal error into a single `rc` field.

use crate::slurm_env;
use crate::state::AppState;
use crate::wire::*;
use actix_web::{web, HttpResponse};
use icc_core::model::{Client, Job, MalleabilityOffer};
use icc_core::resource_manager::JobState;
use icc_core::store::StoreError;

/// `POST /client_register`
pub async fn client_register(state: web::Data<AppState>, body: web::Json<ClientRegisterRequest>) -> HttpResponse {
    let req = body.into_inner();
    let job_id = if req.jobid != 0 { req.jobid } else { slurm_env::slurm_job_id().unwrap_or(0) };
    let job_nnodes = if req.jobnnodes != 0 { req.jobnnodes } else { slurm_env::slurm_nnodes().unwrap_or(0) };
    let client = Client {
        id: req.clid,
        kind: req.kind,
        addr: req.addr,
        provider: req.provid,
        job_id,
        job_ncpus: req.jobncpus,
        job_nnodes,
        nprocs: req.nprocs,
    };

    match state.store.lock().set_client(client) {
        Ok(()) => {
            state.wake.wake(job_id);
            HttpResponse::Ok().json(RcResponse::ok())
        }
        Err(e) => {
            log::error!("client_register failed: {e}");
            HttpResponse::Ok().json(RcResponse::failure(RpcStatus::Failure))
        }
    }
}

/// `POST /client_deregister`
pub async fn client_deregister(state: web::Data<AppState>, body: web::Json<ClientDeregisterRequest>) -> HttpResponse {
    match state.store.lock().delete_client(&body.clid) {
        Ok(job_id) => {
            state.wake.wake(job_id);
            HttpResponse::Ok().json(RcResponse::ok())
        }
        Err(StoreError::NotFound) => HttpResponse::Ok().json(RcResponse::failure(RpcStatus::InvalidParameter)),
        Err(e) => {
            log::error!("client_deregister failed: {e}");
            HttpResponse::Ok().json(RcResponse::failure(RpcStatus::Failure))
        }
    }
}

/// `POST /test`
pub async fn test(body: web::Json<TestRequest>) -> HttpResponse {
    log::info!("test RPC: number={}", body.number);
    HttpResponse::Ok().json(RcResponse::ok())
}

/// `POST /jobclean`
pub async fn jobclean(state: web::Data<AppState>, body: web::Json<JobCleanRequest>) -> HttpResponse {
    let job_state = match state.rm.lock().job_state(body.jobid) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("jobclean: job_state query failed for {}: {e}", body.jobid);
            return HttpResponse::Ok().json(RcResponse::failure(RpcStatus::InvalidParameter));
        }
    };

    if matches!(job_state, JobState::Pending | JobState::Running) {
        return HttpResponse::Ok().json(RcResponse::failure(RpcStatus::Failure));
    }

    match state.store.lock().delete_job(body.jobid) {
        Ok(()) | Err(StoreError::NotFound) => HttpResponse::Ok().json(RcResponse::ok()),
        Err(e) => {
            log::error!("jobclean: delete_job failed: {e}");
            HttpResponse::Ok().json(RcResponse::failure(RpcStatus::Failure))
        }
    }
}

/// `POST /jobmon_submit`
pub async fn jobmon_submit(state: web::Data<AppState>, body: web::Json<JobMonSubmitRequest>) -> HttpResponse {
    match state.store.lock().set_job(body.jobid, Job { ncpus: 0, nnodes: body.nnodes }) {
        Ok(()) => HttpResponse::Ok().json(RcResponse::ok()),
        Err(e) => {
            log::error!("jobmon_submit failed: {e}");
            HttpResponse::Ok().json(RcResponse::failure(RpcStatus::Failure))
        }
    }
}

/// `POST /jobmon_exit`
pub async fn jobmon_exit(body: web::Json<JobMonExitRequest>) -> HttpResponse {
    log::info!("jobmon_exit: job {} step {} exited", body.jobid, body.step);
    HttpResponse::Ok().json(RcResponse::ok())
}

/// `POST /adhoc_nodes`
pub async fn adhoc_nodes(state: web::Data<AppState>, body: web::Json<AdhocNodesRequest>) -> HttpResponse {
    let mut store = state.store.lock();
    let mut job = store.get_job(body.jobid).unwrap_or_default();
    job.nnodes = body.nnodes + body.adhoc_nnodes;
    match store.set_job(body.jobid, job) {
        Ok(()) => HttpResponse::Ok().json(RcResponse::ok()),
        Err(e) => {
            log::error!("adhoc_nodes failed: {e}");
            HttpResponse::Ok().json(RcResponse::failure(RpcStatus::Failure))
        }
    }
}

/// `POST /resallocdone`
pub async fn resallocdone(state: web::Data<AppState>, body: web::Json<ResallocDoneRequest>) -> HttpResponse {
    match state.store.lock().set_job(body.jobid, Job { ncpus: body.ncpus, nnodes: body.hostlist.split(',').count() as u32 }) {
        Ok(()) => HttpResponse::Ok().json(RcResponse::ok()),
        Err(e) => {
            log::error!("resallocdone failed: {e}");
            HttpResponse::Ok().json(RcResponse::failure(RpcStatus::Failure))
        }
    }
}

/// `POST /malleability_avail`
pub async fn malleability_avail(state: web::Data<AppState>, body: web::Json<MalleabilityAvailRequest>) -> HttpResponse {
    let offer = MalleabilityOffer { kind: body.kind, portname: body.portname.clone(), nnodes: body.nnodes };
    match state.store.lock().set_malleability_offer(body.jobid, offer) {
        Ok(()) => HttpResponse::Ok().json(RcResponse::ok()),
        Err(e) => {
            log::error!("malleability_avail failed: {e}");
            HttpResponse::Ok().json(RcResponse::failure(RpcStatus::Failure))
        }
    }
}

/// `POST /malleability_region`
pub async fn malleability_region(body: web::Json<MalleabilityRegionRequest>) -> HttpResponse {
    log::info!("malleability_region: client {} {:?}", body.client_id, body.action);
    HttpResponse::Ok().json(RcResponse::ok())
}

/// `POST /hint_io_begin`
pub async fn hint_io_begin(state: web::Data<AppState>, body: web::Json<HintIoBeginRequest>) -> HttpResponse {
    let appid = format!("{}.{}", body.jobid, body.step);
    match state.ioset.hint_io_begin(&appid, body.witer_ms, body.phase_flag) {
        Ok((nslices, token)) => {
            state.pending_admissions.lock().insert((body.jobid, body.step), token);
            HttpResponse::Ok().json(HintIoBeginResponse { rc: RpcStatus::Success, nslices })
        }
        Err(_) => HttpResponse::Ok().json(HintIoBeginResponse { rc: RpcStatus::InvalidParameter, nslices: 0 }),
    }
}

/// `POST /hint_io_end`
pub async fn hint_io_end(state: web::Data<AppState>, body: web::Json<HintIoEndRequest>) -> HttpResponse {
    let appid = format!("{}.{}", body.jobid, body.step);
    let token = state.pending_admissions.lock().remove(&(body.jobid, body.step));
    match token {
        Some(token) => match state.ioset.hint_io_end(&appid, token) {
            Ok(()) => HttpResponse::Ok().json(RcResponse::ok()),
            Err(_) => HttpResponse::Ok().json(RcResponse::failure(RpcStatus::Failure)),
        },
        None => HttpResponse::Ok().json(RcResponse::failure(RpcStatus::InvalidParameter)),
    }
}

/// Register every RPC handler under its name from the dispatch table.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/client_register", web::post().to(client_register))
        .route("/client_deregister", web::post().to(client_deregister))
        .route("/test", web::post().to(test))
        .route("/jobclean", web::post().to(jobclean))
        .route("/jobmon_submit", web::post().to(jobmon_submit))
        .route("/jobmon_exit", web::post().to(jobmon_exit))
        .route("/adhoc_nodes", web::post().to(adhoc_nodes))
        .route("/resallocdone", web::post().to(resallocdone))
        .route("/malleability_avail", web::post().to(malleability_avail))
        .route("/malleability_region", web::post().to(malleability_region))
        .route("/hint_io_begin", web::post().to(hint_io_begin))
        .route("/hint_io_end", web::post().to(hint_io_end));
}
