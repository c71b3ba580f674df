// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by gateway flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("auth_gateway.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Runs a synchronous section inside the span.
	pub fn in_scope<F, R>(&self, f: F) -> R
	where
		F: FnOnce() -> R,
	{
		#[cfg(feature = "tracing")]
		{
			self.span.in_scope(f)
		}
		#[cfg(not(feature = "tracing"))]
		{
			f()
		}
	}
}

/// Emits a debug-level event for routine state transitions.
pub fn debug_event(kind: FlowKind, message: &str) {
	#[cfg(feature = "tracing")]
	tracing::debug!(flow = kind.as_str(), "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, message);
}

/// Emits a warn-level event for failures that end a session or drop queued calls.
pub fn warn_event(kind: FlowKind, message: &str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(flow = kind.as_str(), "{message}");
	#[cfg(not(feature = "tracing"))]
	let _ = (kind, message);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn events_are_noops_without_subscriber() {
		debug_event(FlowKind::Dispatch, "dispatching");
		warn_event(FlowKind::Logout, "logging out");
	}

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Renewal, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
		assert_eq!(span.in_scope(|| value + 1), 43);
	}
}
