//! # Metrics
//!
//! Prometheus counters for simulated calls, behind the `metrics` feature.
//! Without the feature every recorder is a no-op.
//!
//! All metrics follow the naming convention: `mirror_evm_<metric>_<unit>`

#[cfg(feature = "metrics")]
mod enabled {
    use lazy_static::lazy_static;
    use prometheus::{
        exponential_buckets, Counter, CounterVec, Encoder, Histogram, HistogramOpts, Opts,
        Registry, TextEncoder,
    };

    lazy_static! {
        /// Registry holding the engine metrics.
        pub static ref REGISTRY: Registry = Registry::new();

        /// Calls executed.
        pub static ref CALLS_EXECUTED: Counter = Counter::new(
            "mirror_evm_calls_total",
            "Total number of simulated calls"
        ).expect("metric creation failed");

        /// Failed calls by halt reason.
        pub static ref CALLS_FAILED: CounterVec = CounterVec::new(
            Opts::new("mirror_evm_calls_failed_total", "Failed simulated calls"),
            &["reason"]
        ).expect("metric creation failed");

        /// Precompile dispatches by function.
        pub static ref PRECOMPILE_DISPATCHES: CounterVec = CounterVec::new(
            Opts::new("mirror_evm_precompile_dispatches_total", "Token precompile dispatches"),
            &["function"]
        ).expect("metric creation failed");

        /// Gas used per call.
        pub static ref GAS_USED: Histogram = Histogram::with_opts(
            HistogramOpts::new("mirror_evm_gas_used", "Gas used per simulated call")
                .buckets(exponential_buckets(1_000.0, 4.0, 10).unwrap_or_default())
        ).expect("metric creation failed");
    }

    pub fn register() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(CALLS_EXECUTED.clone()))?;
        REGISTRY.register(Box::new(CALLS_FAILED.clone()))?;
        REGISTRY.register(Box::new(PRECOMPILE_DISPATCHES.clone()))?;
        REGISTRY.register(Box::new(GAS_USED.clone()))?;
        Ok(())
    }

    pub fn encode() -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Registers the engine metrics with the module registry. Call once.
///
/// # Errors
///
/// Prometheus registration error as text, e.g. on a second call.
pub fn register_metrics() -> Result<(), String> {
    #[cfg(feature = "metrics")]
    {
        enabled::register().map_err(|e| e.to_string())
    }
    #[cfg(not(feature = "metrics"))]
    {
        Ok(())
    }
}

/// Text exposition of the registry; empty without the feature.
///
/// # Errors
///
/// Encoder error as text.
pub fn encode_metrics() -> Result<String, String> {
    #[cfg(feature = "metrics")]
    {
        enabled::encode().map_err(|e| e.to_string())
    }
    #[cfg(not(feature = "metrics"))]
    {
        Ok(String::new())
    }
}

/// Records a finished call.
pub fn record_call(gas_used: u64, failure: Option<&str>) {
    #[cfg(feature = "metrics")]
    {
        enabled::CALLS_EXECUTED.inc();
        #[allow(clippy::cast_precision_loss)]
        enabled::GAS_USED.observe(gas_used as f64);
        if let Some(reason) = failure {
            enabled::CALLS_FAILED.with_label_values(&[reason]).inc();
        }
    }
    #[cfg(not(feature = "metrics"))]
    {
        let _ = (gas_used, failure);
    }
}

/// Records one precompile dispatch.
pub fn record_precompile(function: &str) {
    #[cfg(feature = "metrics")]
    enabled::PRECOMPILE_DISPATCHES
        .with_label_values(&[function])
        .inc();
    #[cfg(not(feature = "metrics"))]
    let _ = function;
}
