// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for renewal, queueing, and replay activity.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
	renewals_attempted: AtomicU64,
	renewals_succeeded: AtomicU64,
	renewals_failed: AtomicU64,
	calls_queued: AtomicU64,
	calls_replayed: AtomicU64,
	logouts: AtomicU64,
}
impl GatewayMetrics {
	/// Returns the number of renewals started (one per single-flight episode).
	pub fn renewals_attempted(&self) -> u64 {
		self.renewals_attempted.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that produced a fresh access credential.
	pub fn renewals_succeeded(&self) -> u64 {
		self.renewals_succeeded.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals that failed, abandoned ones included.
	pub fn renewals_failed(&self) -> u64 {
		self.renewals_failed.load(Ordering::Relaxed)
	}

	/// Returns the number of calls that waited behind an in-flight renewal.
	pub fn calls_queued(&self) -> u64 {
		self.calls_queued.load(Ordering::Relaxed)
	}

	/// Returns the number of calls re-issued with a renewed credential.
	pub fn calls_replayed(&self) -> u64 {
		self.calls_replayed.load(Ordering::Relaxed)
	}

	/// Returns the number of logouts triggered by renewal failures.
	pub fn logouts(&self) -> u64 {
		self.logouts.load(Ordering::Relaxed)
	}

	pub(crate) fn record_renewal_attempt(&self) {
		self.renewals_attempted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_renewal_success(&self) {
		self.renewals_succeeded.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_renewal_failure(&self) {
		self.renewals_failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_queued(&self) {
		self.calls_queued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_replay(&self) {
		self.calls_replayed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_logout(&self) {
		self.logouts.fetch_add(1, Ordering::Relaxed);
	}
}
