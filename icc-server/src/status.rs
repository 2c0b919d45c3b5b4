//! Status service: liveness, readiness and metrics, served on a separate
//! listening address from the RPC surface.

use actix_web::{web, HttpResponse};
use icc_commons::metrics::RegistryWrapper;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Common prefix for intelligent-controller metrics.
static ICC_METRICS_PREFIX: &str = "icc";

lazy_static::lazy_static! {
    /// Metrics registry.
    pub static ref PROM_REGISTRY: prometheus::Registry =
        icc_commons::metrics::new_registry(Some(ICC_METRICS_PREFIX.to_string()))
            .expect("could not create metrics registry");
}

/// Shared liveness/readiness flags, flipped by the dispatcher and
/// coordinator respectively.
#[derive(Clone)]
pub struct HealthState {
    /// True once the RPC worker pool has served at least one request.
    pub live: Arc<AtomicBool>,
    /// True once the malleability coordinator has completed a pass, or has
    /// been idle since startup with no pending work.
    pub ready: Arc<AtomicBool>,
}

impl Default for HealthState {
    fn default() -> Self {
        HealthState {
            live: Arc::new(AtomicBool::new(true)),
            ready: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Expose metrics (Prometheus textual format).
pub async fn serve_metrics() -> HttpResponse {
    let wrapper = web::Data::new(RegistryWrapper(&PROM_REGISTRY));
    icc_commons::metrics::serve(wrapper).await.unwrap_or_else(|_| HttpResponse::InternalServerError().finish())
}

/// Expose liveness status: 200 if the RPC worker pool is responsive.
pub async fn serve_liveness(health: web::Data<HealthState>) -> HttpResponse {
    if health.live.load(Ordering::Relaxed) {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::InternalServerError().finish()
    }
}

/// Expose readiness status: 200 if the malleability coordinator has
/// completed a pass, or has no pending work.
pub async fn serve_readiness(health: web::Data<HealthState>) -> HttpResponse {
    if health.ready.load(Ordering::Relaxed) {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::InternalServerError().finish()
    }
}
