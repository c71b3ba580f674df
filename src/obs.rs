//! Optional observability helpers for gateway flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `auth_gateway.flow` with the `flow` and
//!   `stage` (call site) fields, plus debug/warn events at state transitions.
//! - Enable `metrics` to increment the `auth_gateway_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and to publish the
//!   `auth_gateway_renewal_queue_depth` gauge while a renewal is in flight.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Gateway flow kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// First send of an application call.
	Dispatch,
	/// Credential renewal driven by the refresh coordinator.
	Renewal,
	/// Re-issue of a call after a successful renewal.
	Replay,
	/// Session teardown after an unrecoverable authentication failure.
	Logout,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Dispatch => "dispatch",
			FlowKind::Renewal => "renewal",
			FlowKind::Replay => "replay",
			FlowKind::Logout => "logout",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a gateway flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
