//! Prometheus registry for the daemon.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::info::Info;
use prometheus_client::registry::Registry;

/// Labels of the per-RPC request counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RpcLabels {
    /// RPC method name.
    pub method: String,
    /// `ok` or the error code.
    pub outcome: String,
}

/// Metrics exposed at `/metrics` when `metrics/enable` is set.
#[derive(Debug)]
pub struct Metrics {
    registry: Registry,
    rpc_requests: Family<RpcLabels, Counter>,
    mutations_in_flight: Gauge,
}

impl Metrics {
    /// Build the registry with the daemon's collectors.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("director");

        let build_info = Info::new(vec![(
            "version".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        )]);
        registry.register("build", "Build information", build_info);

        let rpc_requests = Family::<RpcLabels, Counter>::default();
        registry.register(
            "rpc_requests",
            "Admin RPC requests by method and outcome",
            rpc_requests.clone(),
        );

        let mutations_in_flight = Gauge::default();
        registry.register(
            "mutations_in_flight",
            "Mutating admin requests currently executing",
            mutations_in_flight.clone(),
        );

        Self {
            registry,
            rpc_requests,
            mutations_in_flight,
        }
    }

    /// Count one finished RPC.
    pub fn observe_rpc(&self, method: &str, outcome: &str) {
        self.rpc_requests
            .get_or_create(&RpcLabels {
                method: method.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// A mutating request entered execution.
    pub fn mutation_started(&self) {
        self.mutations_in_flight.inc();
    }

    /// A mutating request left execution.
    pub fn mutation_finished(&self) {
        self.mutations_in_flight.dec();
    }

    /// Render the registry in Prometheus text exposition format.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if encode(&mut out, &self.registry).is_err() {
            out.clear();
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_includes_registered_series() {
        let metrics = Metrics::new();
        metrics.observe_rpc("list_virtual_servers", "ok");
        metrics.mutation_started();

        let text = metrics.encode();
        assert!(text.contains("director_rpc_requests_total"));
        assert!(text.contains(r#"method="list_virtual_servers""#));
        assert!(text.contains("director_mutations_in_flight 1"));

        metrics.mutation_finished();
        assert!(metrics.encode().contains("director_mutations_in_flight 0"));
    }
}
