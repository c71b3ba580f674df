//! Session teardown after an unrecoverable authentication failure.
//!
//! The refresh coordinator calls [`LogoutTrigger::logout`] exactly once per failed renewal
//! episode. [`SessionLogout`] is the built-in trigger: it wipes both credential slots, clears the
//! named [`SessionMarkers`], then hands a [`LogoutEvent`] to the host so it can notify the user
//! and navigate to the login route.

// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	error::RenewalError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

/// Why a session was ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogoutReason {
	/// Credential renewal failed; the session cannot be recovered.
	RenewalFailed(RenewalError),
	/// The host ended the session explicitly.
	Manual,
}
impl LogoutReason {
	/// Short user-facing notice for the reason.
	pub fn notice(&self) -> &'static str {
		match self {
			Self::RenewalFailed(_) => "Your session has expired. Please sign in again.",
			Self::Manual => "You have been signed out.",
		}
	}
}

/// Notification handed to the host after the session was torn down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogoutEvent {
	/// Reason the session ended.
	pub reason: LogoutReason,
	/// Route the host should navigate to.
	pub redirect_to: String,
	/// User-facing notice.
	pub notice: String,
	/// Moment the teardown completed.
	pub at: OffsetDateTime,
}

/// Ends the authenticated session.
///
/// Implementations must tolerate concurrent calls; the gateway itself only calls once per
/// renewal failure.
pub trait LogoutTrigger
where
	Self: Send + Sync,
{
	/// Tears the session down.
	fn logout(&self, reason: &LogoutReason);
}

/// Receives [`LogoutEvent`]s (UI notification and navigation live on the host side).
pub trait LogoutListener
where
	Self: Send + Sync,
{
	/// Called after credentials and markers were cleared.
	fn on_logout(&self, event: &LogoutEvent);
}
impl<F> LogoutListener for F
where
	F: Send + Sync + Fn(&LogoutEvent),
{
	fn on_logout(&self, event: &LogoutEvent) {
		self(event)
	}
}

/// Named local session flags (e.g. `"logged_in"`, `"checkout_started"`) cleared on logout.
#[derive(Debug, Default)]
pub struct SessionMarkers(RwLock<BTreeSet<String>>);
impl SessionMarkers {
	/// Sets a marker.
	pub fn set(&self, name: impl Into<String>) {
		self.0.write().insert(name.into());
	}

	/// Removes a single marker; returns whether it was present.
	pub fn remove(&self, name: &str) -> bool {
		self.0.write().remove(name)
	}

	/// Whether a marker is currently set.
	pub fn contains(&self, name: &str) -> bool {
		self.0.read().contains(name)
	}

	/// Snapshot of every set marker, sorted.
	pub fn names(&self) -> Vec<String> {
		self.0.read().iter().cloned().collect()
	}

	/// Removes every marker.
	pub fn clear(&self) {
		self.0.write().clear();
	}
}

/// Built-in [`LogoutTrigger`] that clears local session state and notifies the host.
pub struct SessionLogout {
	store: Arc<dyn TokenStore>,
	markers: Arc<SessionMarkers>,
	listener: Option<Arc<dyn LogoutListener>>,
	login_path: String,
}
impl SessionLogout {
	/// Creates a trigger that clears `store` and navigates to the default login route.
	pub fn new(store: Arc<dyn TokenStore>) -> Self {
		Self {
			store,
			markers: Default::default(),
			listener: None,
			login_path: GatewayConfig::DEFAULT_LOGIN_PATH.into(),
		}
	}

	/// Creates a trigger using the configuration's login route.
	pub fn from_config(store: Arc<dyn TokenStore>, config: &GatewayConfig) -> Self {
		Self::new(store).with_login_path(config.login_path.clone())
	}

	/// Shares an existing marker set with the trigger.
	pub fn with_markers(mut self, markers: Arc<SessionMarkers>) -> Self {
		self.markers = markers;

		self
	}

	/// Registers the host listener.
	pub fn with_listener(mut self, listener: Arc<dyn LogoutListener>) -> Self {
		self.listener = Some(listener);

		self
	}

	/// Overrides the login route.
	pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}

	/// Marker set cleared on logout.
	pub fn markers(&self) -> &Arc<SessionMarkers> {
		&self.markers
	}
}
impl Debug for SessionLogout {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionLogout")
			.field("markers", &self.markers)
			.field("has_listener", &self.listener.is_some())
			.field("login_path", &self.login_path)
			.finish()
	}
}
impl LogoutTrigger for SessionLogout {
	fn logout(&self, reason: &LogoutReason) {
		const KIND: FlowKind = FlowKind::Logout;

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let cleared = FlowSpan::new(KIND, "session_logout").in_scope(|| {
			// Markers and navigation still happen when the store cannot be cleared.
			let cleared = self.store.clear_all();

			if let Err(e) = &cleared {
				obs::warn_event(KIND, &format!("Failed to clear credentials on logout: {e}"));
			}

			self.markers.clear();

			let event = LogoutEvent {
				notice: reason.notice().into(),
				reason: reason.clone(),
				redirect_to: self.login_path.clone(),
				at: OffsetDateTime::now_utc(),
			};

			if let Some(listener) = &self.listener {
				listener.on_logout(&event);
			}

			obs::debug_event(KIND, "Session cleared.");

			cleared
		});

		match cleared {
			Ok(()) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{Credential, CredentialPair},
		store::{MemoryStore, StoreError},
	};

	#[derive(Debug, Default)]
	struct BrokenStore;
	impl TokenStore for BrokenStore {
		fn access(&self) -> Result<Option<Credential>, StoreError> {
			Ok(None)
		}

		fn refresh(&self) -> Result<Option<Credential>, StoreError> {
			Ok(None)
		}

		fn set_access(&self, _: Credential) -> Result<(), StoreError> {
			Ok(())
		}

		fn set_refresh(&self, _: Credential) -> Result<(), StoreError> {
			Ok(())
		}

		fn clear_all(&self) -> Result<(), StoreError> {
			Err(StoreError::Backend { message: "read-only".into() })
		}
	}

	fn recording_listener() -> (Arc<dyn LogoutListener>, Arc<Mutex<Vec<LogoutEvent>>>) {
		let events = Arc::new(Mutex::new(Vec::new()));
		let sink = events.clone();
		let listener: Arc<dyn LogoutListener> =
			Arc::new(move |event: &LogoutEvent| sink.lock().push(event.clone()));

		(listener, events)
	}

	#[test]
	fn logout_clears_credentials_markers_and_notifies() {
		let store = Arc::new(MemoryStore::default());

		store.save_pair(CredentialPair::new("a", "r")).expect("Seeding should succeed.");

		let (listener, events) = recording_listener();
		let logout = SessionLogout::new(store.clone())
			.with_listener(listener)
			.with_login_path("/account/login");

		logout.markers().set("logged_in");
		logout.markers().set("checkout_started");
		logout.logout(&LogoutReason::RenewalFailed(RenewalError::Unavailable));

		assert!(store.snapshot().is_empty());
		assert!(logout.markers().names().is_empty());

		let events = events.lock();

		assert_eq!(events.len(), 1);
		assert_eq!(events[0].redirect_to, "/account/login");
		assert_eq!(events[0].reason, LogoutReason::RenewalFailed(RenewalError::Unavailable));
		assert_eq!(events[0].notice, "Your session has expired. Please sign in again.");
	}

	#[test]
	fn store_failures_do_not_block_navigation() {
		let (listener, events) = recording_listener();
		let markers = Arc::new(SessionMarkers::default());
		let logout = SessionLogout::new(Arc::new(BrokenStore))
			.with_markers(markers.clone())
			.with_listener(listener);

		markers.set("logged_in");
		logout.logout(&LogoutReason::Manual);

		assert!(!markers.contains("logged_in"));
		assert_eq!(events.lock().len(), 1);
		assert_eq!(events.lock()[0].redirect_to, "/login");
	}

	#[test]
	fn markers_track_individual_flags() {
		let markers = SessionMarkers::default();

		markers.set("b");
		markers.set("a");

		assert_eq!(markers.names(), vec!["a".to_owned(), "b".to_owned()]);
		assert!(markers.remove("a"));
		assert!(!markers.remove("a"));
		assert!(markers.contains("b"));
	}
}
