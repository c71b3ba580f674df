// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"auth_gateway_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Publishes how many expired calls are parked behind the in-flight renewal.
///
/// Set on every enqueue and reset to zero when an episode drains its queue.
pub fn record_queue_depth(depth: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::gauge!("auth_gateway_renewal_queue_depth").set(depth as f64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = depth;
	}
}
