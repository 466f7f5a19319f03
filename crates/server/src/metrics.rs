use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::Result;

/// Compile request outcome label values
pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_INVALID: &str = "invalid_request";
pub const OUTCOME_ERROR: &str = "compile_error";

/// Prometheus metrics owned by the server
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    compile_requests: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let compile_requests = IntCounterVec::new(
            Opts::new(
                "spandsl_compile_requests_total",
                "Number of compile requests by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(compile_requests.clone()))?;

        Ok(Self {
            registry,
            compile_requests,
        })
    }

    pub fn observe(&self, outcome: &str) {
        self.compile_requests.with_label_values(&[outcome]).inc();
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_and_encode() {
        let metrics = Metrics::new().unwrap();
        metrics.observe(OUTCOME_SUCCESS);
        metrics.observe(OUTCOME_SUCCESS);
        metrics.observe(OUTCOME_ERROR);

        let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(text.contains("spandsl_compile_requests_total{outcome=\"success\"} 2"));
        assert!(text.contains("spandsl_compile_requests_total{outcome=\"compile_error\"} 1"));
    }
}
