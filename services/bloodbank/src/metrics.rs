use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Donation ledger
    pub static ref DONATIONS_RECORDED: IntCounter = IntCounter::new(
        "bloodbank_donations_recorded_total",
        "Total donations recorded"
    ).expect("metric can be created");

    pub static ref DONATED_VOLUME_ML: IntCounterVec = IntCounterVec::new(
        Opts::new("bloodbank_donated_volume_ml_total", "Total donated volume in ml"),
        &["blood_type"]
    ).expect("metric can be created");

    // Inventory ledger
    pub static ref UNITS_USED: IntCounterVec = IntCounterVec::new(
        Opts::new("bloodbank_units_used_total", "Inventory units marked used"),
        &["blood_type"]
    ).expect("metric can be created");

    pub static ref UNITS_EXPIRED: IntCounterVec = IntCounterVec::new(
        Opts::new("bloodbank_units_expired_total", "Inventory units expired by the sweep"),
        &["blood_type"]
    ).expect("metric can be created");

    // Request intake
    pub static ref BLOOD_REQUESTS: IntCounterVec = IntCounterVec::new(
        Opts::new("bloodbank_blood_requests_total", "Blood requests accepted"),
        &["blood_type", "urgency"]
    ).expect("metric can be created");

    // Credentials
    pub static ref LOGIN_FAILURES: IntCounter = IntCounter::new(
        "bloodbank_login_failures_total",
        "Failed login attempts"
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    registry.register(Box::new(DONATIONS_RECORDED.clone()))?;
    registry.register(Box::new(DONATED_VOLUME_ML.clone()))?;
    registry.register(Box::new(UNITS_USED.clone()))?;
    registry.register(Box::new(UNITS_EXPIRED.clone()))?;
    registry.register(Box::new(BLOOD_REQUESTS.clone()))?;
    registry.register(Box::new(LOGIN_FAILURES.clone()))?;

    Ok(())
}

/// Register with the service registry; repeated calls are no-ops.
pub fn init() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        if let Err(e) = register_metrics(&REGISTRY) {
            tracing::warn!("Failed to register metrics: {}", e);
        }
    });
}

/// Generate metrics output in Prometheus text format
pub fn metrics_handler() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
