// Copyright 2018 Alex Crawford
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use icc_core::ioset::IoSetController;
use icc_core::malleability::{wake_channel, Coordinator};
use icc_core::resource_manager::{HostAlloc, JobState, ResourceManager, ResourceManagerError, RmResult};
use icc_core::store::InMemoryStore;
use icc_server::config::AppSettings;
use icc_server::state::AppState;
use icc_server::status::{self, HealthState};
use icc_server::{addrfile, iolog, rpc};
use std::collections::HashMap;
use std::sync::Arc;

/// A resource-manager adapter backed only by in-process job records,
/// standing in for a real Slurm integration. Good enough to exercise
/// `jobclean`'s Pending/Running gate and the malleability demonstration
/// resalloc path without a scheduler present.
struct StandaloneResourceManager {
    jobs: HashMap<u32, JobState>,
}

impl ResourceManager for StandaloneResourceManager {
    fn job_state(&mut self, job_id: u32) -> RmResult<JobState> {
        Ok(*self.jobs.get(&job_id).unwrap_or(&JobState::Other))
    }

    fn alloc(&mut self, _job_id: u32, _n_nodes: u32, shrink: bool) -> RmResult<()> {
        if shrink {
            return Err(ResourceManagerError::NotImplemented("shrink".to_string()));
        }
        Ok(())
    }

    fn hostlist(&mut self, _job_id: u32) -> RmResult<Vec<HostAlloc>> {
        Ok(Vec::new())
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    let settings = AppSettings::assemble()?;

    env_logger::Builder::from_default_env().filter(Some(module_path!()), settings.verbosity).init();
    log::debug!("application settings:\n{:#?}", &settings);

    let ioset_sink = Arc::new(iolog::CsvEventSink::open(&settings.ioset_log_path).context("failed to open I/O-set event log")?);
    let (wake_tx, wake_rx) = wake_channel(64);
    let health = HealthState::default();

    let store: Arc<parking_lot::Mutex<Box<dyn icc_core::store::RegistryStore>>> = Arc::new(parking_lot::Mutex::new(Box::new(InMemoryStore::new())));
    let rm: Arc<parking_lot::Mutex<Box<dyn ResourceManager>>> = Arc::new(parking_lot::Mutex::new(Box::new(StandaloneResourceManager { jobs: HashMap::new() })));

    let mut coordinator = Coordinator::new(store.clone(), rm.clone(), wake_rx)
        .with_settle_delay(settings.settle_delay)
        .with_reconfigure_timeout(settings.reconfigure_timeout)
        .with_readiness_flag(health.ready.clone());
    tokio::spawn(async move {
        coordinator.run().await;
    });

    let app_state = web::Data::new(AppState {
        store,
        rm,
        ioset: IoSetController::new(ioset_sink),
        wake: wake_tx,
        health: health.clone(),
        pending_admissions: parking_lot::Mutex::new(HashMap::new()),
    });

    let rpc_addr = (settings.address, settings.port);
    let status_addr = (settings.status_address, settings.status_port);

    let status_health = web::Data::new(health.clone());
    let status_server = HttpServer::new(move || {
        App::new()
            .app_data(status_health.clone())
            .route("/liveness", web::get().to(status::serve_liveness))
            .route("/readiness", web::get().to(status::serve_readiness))
            .route("/metrics", web::get().to(status::serve_metrics))
    })
    .bind(status_addr)?
    .run();

    let rpc_server = HttpServer::new(move || App::new().app_data(app_state.clone()).configure(rpc::configure))
        .bind(rpc_addr)
        .context("failed to bind RPC listener")?
        .run();

    let addr_line = format!("http://{}:{}", rpc_addr.0, rpc_addr.1);
    addrfile::write_addr_file(&settings.addr_file_path(), &addr_line).context("failed to write address bootstrap file")?;

    tokio::try_join!(status_server, rpc_server)?;
    Ok(())
}
