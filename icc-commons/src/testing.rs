//! Test helpers.

use anyhow::Result;

/// Initialize logging, idempotent across repeated test-binary invocations.
pub fn init_logger() {
    let _ = env_logger::try_init_from_env(env_logger::Env::default());
}

/// Register a dummy gauge, with given value.
pub fn dummy_gauge(registry: &prometheus::Registry, value: f64) -> Result<()> {
    let test_gauge = prometheus::Gauge::new("dummy_gauge", "dummy help")?;
    test_gauge.set(value);
    registry.register(Box::new(test_gauge))?;
    Ok(())
}
