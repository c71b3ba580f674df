//! Single-flight credential renewal with FIFO queuing and batch release.
//!
//! [`RefreshCoordinator::acquire`] is the only entry point. Every expired call is parked behind
//! a oneshot completion handle. The first one to arrive while the coordinator is idle flips the
//! phase to [`CoordinatorPhase::Refreshing`] under the same lock acquisition that observed
//! [`CoordinatorPhase::Idle`] and spawns the renewal as its own task. When the renewal resolves,
//! the queue is drained in one batch and every parked caller receives the same outcome: the
//! fresh access credential on success, the same [`RenewalError`] on failure. A failed renewal
//! ends the session through the [`LogoutTrigger`] exactly once.
//!
//! The renewal task is owned by the coordinator, not by the caller that started it. A caller
//! whose future is dropped only gives up its own place in the queue; the renewal still runs to
//! completion and its credentials are persisted. The state mutex is never held across an
//! `.await`. If the renewal task itself is torn down (runtime shutdown), a guard resets the
//! phase and rejects parked callers with [`RenewalError::Abandoned`] without logging out.
//!
//! Callers must run inside a Tokio runtime.

mod metrics;

pub use metrics::GatewayMetrics;

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	auth::Credential,
	error::RenewalError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	renewal::CredentialRenewer,
	request::PendingCall,
	session::{LogoutReason, LogoutTrigger},
	store::TokenStore,
};

/// Coordinator phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoordinatorPhase {
	/// No renewal in flight; the queue is empty.
	Idle,
	/// A renewal is in flight; expired calls are queued behind it.
	Refreshing,
}

/// A call released for replay together with the credential to replay it with.
#[derive(Clone, Debug)]
pub struct Replay {
	/// The captured call.
	pub call: PendingCall,
	/// Fresh access credential produced by the renewal.
	pub access: Credential,
}

/// Serializes renewals and releases queued callers once a renewal resolves.
pub struct RefreshCoordinator {
	shared: Arc<Shared>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator.
	pub fn new(
		store: Arc<dyn TokenStore>,
		renewer: Arc<dyn CredentialRenewer>,
		logout: Arc<dyn LogoutTrigger>,
		metrics: Arc<GatewayMetrics>,
	) -> Self {
		Self {
			shared: Arc::new(Shared {
				state: Mutex::new(CoordinatorState::default()),
				store,
				renewer,
				logout,
				metrics,
			}),
		}
	}

	/// Current phase.
	pub fn phase(&self) -> CoordinatorPhase {
		self.shared.state.lock().phase
	}

	/// Number of callers waiting on the in-flight renewal, the one that started it included.
	pub fn queued(&self) -> usize {
		self.shared.state.lock().queue.len()
	}

	/// Shared counters.
	pub fn metrics(&self) -> &Arc<GatewayMetrics> {
		&self.shared.metrics
	}

	/// Hands an expired call to the coordinator and resolves once a renewal settles.
	///
	/// Returns the call paired with the fresh access credential, or the renewal failure shared
	/// by every caller of the same episode. Dropping the returned future withdraws only this
	/// call.
	pub async fn acquire(&self, call: PendingCall) -> Result<Replay> {
		let (completion, receiver) = oneshot::channel();
		let leads = {
			let mut state = self.shared.state.lock();

			state.queue.push_back(Waiter { call, completion });
			obs::record_queue_depth(state.queue.len());

			match state.phase {
				CoordinatorPhase::Refreshing => false,
				CoordinatorPhase::Idle => {
					state.phase = CoordinatorPhase::Refreshing;

					true
				},
			}
		};

		if leads {
			tokio::spawn(self.shared.clone().run());
		} else {
			self.shared.metrics.record_queued();
			obs::debug_event(FlowKind::Renewal, "Queued behind in-flight renewal.");
		}

		match receiver.await {
			Ok(Ok(replay)) => Ok(replay),
			Ok(Err(e)) => Err(e.into()),
			Err(_) => Err(RenewalError::Abandoned.into()),
		}
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.shared.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("phase", &state.phase)
			.field("queued", &state.queue.len())
			.finish()
	}
}

struct Shared {
	state: Mutex<CoordinatorState>,
	store: Arc<dyn TokenStore>,
	renewer: Arc<dyn CredentialRenewer>,
	logout: Arc<dyn LogoutTrigger>,
	metrics: Arc<GatewayMetrics>,
}
impl Shared {
	/// One renewal episode, from the network call to the batch release.
	async fn run(self: Arc<Self>) {
		const KIND: FlowKind = FlowKind::Renewal;

		let span = FlowSpan::new(KIND, "renew");
		let guard = EpisodeGuard { shared: &self, armed: true };

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_renewal_attempt();

		let outcome = span.instrument(self.renew()).await;
		let waiters = guard.release();

		match outcome {
			Ok(access) => {
				self.metrics.record_renewal_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				obs::debug_event(
					KIND,
					&format!("Renewal succeeded; releasing {} queued call(s).", waiters.len()),
				);

				for waiter in waiters {
					let replay = Replay { call: waiter.call, access: access.clone() };
					// A dropped caller simply stopped listening.
					let _ = waiter.completion.send(Ok(replay));
				}
			},
			Err(e) => {
				self.metrics.record_renewal_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				obs::warn_event(
					KIND,
					&format!("Renewal failed; rejecting {} queued call(s): {e}", waiters.len()),
				);

				if e.requires_logout() {
					self.metrics.record_logout();
					self.logout.logout(&LogoutReason::RenewalFailed(e.clone()));
				}
				for waiter in waiters {
					let _ = waiter.completion.send(Err(e.clone()));
				}
			},
		}
	}

	async fn renew(&self) -> Result<Credential, RenewalError> {
		let refresh = self.store.refresh()?.ok_or(RenewalError::Unavailable)?;
		let renewed = self.renewer.renew(&refresh).await?;
		let access = renewed.access.clone();

		self.store.replace(renewed)?;

		Ok(access)
	}

	/// Returns to idle and takes every parked waiter, in arrival order.
	fn finish(&self) -> VecDeque<Waiter> {
		let mut state = self.state.lock();

		state.phase = CoordinatorPhase::Idle;
		obs::record_queue_depth(0);

		std::mem::take(&mut state.queue)
	}
}

#[derive(Debug)]
struct CoordinatorState {
	phase: CoordinatorPhase,
	queue: VecDeque<Waiter>,
}
impl Default for CoordinatorState {
	fn default() -> Self {
		Self { phase: CoordinatorPhase::Idle, queue: VecDeque::new() }
	}
}

#[derive(Debug)]
struct Waiter {
	call: PendingCall,
	completion: oneshot::Sender<Result<Replay, RenewalError>>,
}

struct EpisodeGuard<'a> {
	shared: &'a Shared,
	armed: bool,
}
impl EpisodeGuard<'_> {
	fn release(mut self) -> VecDeque<Waiter> {
		self.armed = false;

		self.shared.finish()
	}
}
impl Drop for EpisodeGuard<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}

		let waiters = self.shared.finish();

		self.shared.metrics.record_renewal_failure();
		obs::record_flow_outcome(FlowKind::Renewal, FlowOutcome::Failure);
		obs::warn_event(
			FlowKind::Renewal,
			&format!("Renewal abandoned; rejecting {} queued call(s).", waiters.len()),
		);

		for waiter in waiters {
			let _ = waiter.completion.send(Err(RenewalError::Abandoned));
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		sync::atomic::{AtomicUsize, Ordering},
		time::Duration as StdDuration,
	};
	// crates.io
	use http::Method;
	// self
	use super::*;
	use crate::{
		_preludet::{RecordingLogout, seeded_store},
		auth::RenewedCredentials,
		renewal::RenewalFuture,
		request::ApiRequest,
		store::MemoryStore,
	};

	struct ScriptedRenewer {
		calls: AtomicUsize,
		delay: StdDuration,
		outcome: Result<RenewedCredentials, RenewalError>,
	}
	impl ScriptedRenewer {
		fn succeeding(access: &str, refresh: Option<&str>) -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				delay: StdDuration::from_millis(50),
				outcome: Ok(RenewedCredentials {
					access: Credential::new(access),
					refresh: refresh.map(Credential::new),
				}),
			})
		}

		fn failing(err: RenewalError) -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				delay: StdDuration::from_millis(50),
				outcome: Err(err),
			})
		}

		fn slow(access: &str, refresh: Option<&str>, delay: StdDuration) -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				delay,
				outcome: Ok(RenewedCredentials {
					access: Credential::new(access),
					refresh: refresh.map(Credential::new),
				}),
			})
		}

		fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}
	}
	impl CredentialRenewer for ScriptedRenewer {
		fn renew<'a>(&'a self, _refresh: &'a Credential) -> RenewalFuture<'a> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Box::pin(async move {
				tokio::time::sleep(self.delay).await;

				self.outcome.clone()
			})
		}
	}

	fn call(path: &str) -> PendingCall {
		let url = Url::parse("https://shop.example.com/api/")
			.and_then(|base| base.join(path))
			.expect("Fixture URL should parse.");
		let mut call = PendingCall::capture(&ApiRequest::new(Method::GET, url));

		call.mark_retried();

		call
	}

	fn coordinator(
		store: Arc<MemoryStore>,
		renewer: Arc<ScriptedRenewer>,
	) -> (Arc<RefreshCoordinator>, Arc<RecordingLogout>) {
		let logout = Arc::new(RecordingLogout::default());
		let coordinator = RefreshCoordinator::new(
			store,
			renewer,
			logout.clone(),
			Arc::new(GatewayMetrics::default()),
		);

		(Arc::new(coordinator), logout)
	}

	#[tokio::test]
	async fn concurrent_expiries_share_one_renewal() {
		let store = seeded_store("T1", Some("R1"));
		let renewer = ScriptedRenewer::succeeding("T2", None);
		let (coordinator, logout) = coordinator(store.clone(), renewer.clone());
		let (a, b, c) = tokio::join!(
			coordinator.acquire(call("profile/")),
			coordinator.acquire(call("cart/")),
			coordinator.acquire(call("orders/")),
		);
		let replays: Vec<Replay> = [a, b, c]
			.into_iter()
			.map(|result| result.expect("Every caller should be released for replay."))
			.collect();

		assert_eq!(renewer.calls(), 1);
		assert_eq!(logout.calls(), 0);
		assert!(replays.iter().all(|replay| replay.access == Credential::new("T2")));
		assert_eq!(
			replays.iter().map(|replay| replay.call.request().url.path()).collect::<Vec<_>>(),
			vec!["/api/profile/", "/api/cart/", "/api/orders/"],
		);
		assert_eq!(store.access().expect("Read should succeed."), Some(Credential::new("T2")));
		assert_eq!(store.refresh().expect("Read should succeed."), Some(Credential::new("R1")));
		assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);
		assert_eq!(coordinator.queued(), 0);
		assert_eq!(coordinator.metrics().renewals_attempted(), 1);
		assert_eq!(coordinator.metrics().renewals_succeeded(), 1);
		assert_eq!(coordinator.metrics().calls_queued(), 2);
	}

	#[tokio::test]
	async fn rotated_refresh_credential_is_persisted() {
		let store = seeded_store("T1", Some("R1"));
		let renewer = ScriptedRenewer::succeeding("T2", Some("R2"));
		let (coordinator, _) = coordinator(store.clone(), renewer);

		coordinator.acquire(call("profile/")).await.expect("Renewal should succeed.");

		assert_eq!(store.refresh().expect("Read should succeed."), Some(Credential::new("R2")));
	}

	#[tokio::test]
	async fn failed_renewal_rejects_everyone_and_logs_out_once() {
		let store = seeded_store("T1", Some("R1"));
		let err = RenewalError::Rejected { status: 401, message: "blacklisted".into() };
		let renewer = ScriptedRenewer::failing(err.clone());
		let (coordinator, logout) = coordinator(store, renewer.clone());
		let (a, b, c) = tokio::join!(
			coordinator.acquire(call("profile/")),
			coordinator.acquire(call("cart/")),
			coordinator.acquire(call("orders/")),
		);

		for result in [a, b, c] {
			match result {
				Err(Error::Renewal(actual)) => assert_eq!(actual, err),
				other => panic!("Unexpected outcome: {other:?}"),
			}
		}

		assert_eq!(renewer.calls(), 1);
		assert_eq!(logout.calls(), 1);
		assert_eq!(logout.reasons(), vec![LogoutReason::RenewalFailed(err)]);
		assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);
		assert_eq!(coordinator.metrics().renewals_failed(), 1);
		assert_eq!(coordinator.metrics().logouts(), 1);
	}

	#[tokio::test]
	async fn missing_refresh_credential_short_circuits() {
		let renewer = ScriptedRenewer::succeeding("T2", None);
		let (coordinator, logout) = coordinator(seeded_store("T1", None), renewer.clone());
		let err = coordinator
			.acquire(call("profile/"))
			.await
			.expect_err("Renewal without a refresh credential should fail.");

		assert!(matches!(err, Error::Renewal(RenewalError::Unavailable)));
		assert_eq!(renewer.calls(), 0);
		assert_eq!(logout.calls(), 1);
	}

	#[tokio::test]
	async fn coordinator_renews_again_after_an_episode_settles() {
		let renewer = ScriptedRenewer::succeeding("T2", None);
		let (coordinator, _) = coordinator(seeded_store("T1", Some("R1")), renewer.clone());

		coordinator.acquire(call("profile/")).await.expect("First episode should succeed.");
		coordinator.acquire(call("cart/")).await.expect("Second episode should succeed.");

		assert_eq!(renewer.calls(), 2);
	}

	#[tokio::test]
	async fn timed_out_caller_does_not_cancel_the_renewal() {
		let store = seeded_store("T1", Some("R1"));
		let renewer = ScriptedRenewer::slow("T2", Some("R2"), StdDuration::from_millis(300));
		let (coordinator, logout) = coordinator(store.clone(), renewer.clone());
		let (first, second) = tokio::join!(
			tokio::time::timeout(StdDuration::from_millis(150), coordinator.acquire(call("profile/"))),
			coordinator.acquire(call("cart/")),
		);

		assert!(first.is_err());

		let replay = second.expect("The queued caller should still be released.");

		assert_eq!(replay.access, Credential::new("T2"));
		assert_eq!(replay.call.request().url.path(), "/api/cart/");
		assert_eq!(renewer.calls(), 1);
		assert_eq!(store.access().expect("Read should succeed."), Some(Credential::new("T2")));
		assert_eq!(store.refresh().expect("Read should succeed."), Some(Credential::new("R2")));
		assert_eq!(logout.calls(), 0);
		assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);
		assert_eq!(coordinator.metrics().renewals_failed(), 0);
	}

	#[tokio::test]
	async fn renewal_completes_after_every_caller_gave_up() {
		let store = seeded_store("T1", Some("R1"));
		let renewer = ScriptedRenewer::slow("T2", Some("R2"), StdDuration::from_millis(100));
		let (coordinator, _) = coordinator(store.clone(), renewer);
		let gave_up =
			tokio::time::timeout(StdDuration::from_millis(20), coordinator.acquire(call("profile/")))
				.await;

		assert!(gave_up.is_err());

		while coordinator.phase() != CoordinatorPhase::Idle {
			tokio::time::sleep(StdDuration::from_millis(10)).await;
		}

		assert_eq!(store.refresh().expect("Read should succeed."), Some(Credential::new("R2")));
		assert_eq!(coordinator.metrics().renewals_succeeded(), 1);
	}

	#[test]
	fn torn_down_episode_rejects_waiters_without_logout() {
		let (coordinator, logout) = coordinator(
			seeded_store("T1", Some("R1")),
			ScriptedRenewer::succeeding("T2", None),
		);
		let (completion, mut receiver) = oneshot::channel();

		{
			let mut state = coordinator.shared.state.lock();

			state.phase = CoordinatorPhase::Refreshing;
			state.queue.push_back(Waiter { call: call("cart/"), completion });
		}

		drop(EpisodeGuard { shared: &coordinator.shared, armed: true });

		let outcome = receiver.try_recv().expect("The guard should settle every waiter.");

		assert!(matches!(outcome, Err(RenewalError::Abandoned)));
		assert_eq!(coordinator.phase(), CoordinatorPhase::Idle);
		assert_eq!(coordinator.queued(), 0);
		assert_eq!(logout.calls(), 0);
		assert_eq!(coordinator.metrics().renewals_failed(), 1);
	}
}
