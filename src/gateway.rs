//! Request pipeline: credential attachment, expiry detection, and replay after renewal.
//!
//! Every outbound call goes through [`Gateway::send`]. The current access credential is read
//! from the store at send time and attached as a bearer header. Responses below 400 pass
//! through untouched. An expiry status from any endpoint other than the renewal endpoint is
//! recovered once: the call is captured, handed to the [`RefreshCoordinator`], and replayed
//! with the credential the coordinator hands back. A replayed call that expires again is
//! terminal and surfaces as [`Error::CredentialExpired`] with `replayed: true`. A call that
//! expires after another caller already renewed the credential is replayed with the stored
//! credential directly, without starting another renewal.

// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	config::GatewayConfig,
	coordinator::{GatewayMetrics, RefreshCoordinator, Replay},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	renewal::{CredentialRenewer, HttpRenewer},
	request::{ApiRequest, ApiResponse, PendingCall},
	session::{LogoutReason, LogoutTrigger},
	store::TokenStore,
	transport::HttpTransport,
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Gateway specialized for the crate's default reqwest transport.
pub type ReqwestGateway = Gateway<ReqwestTransport>;

/// Authenticated request gateway.
///
/// Cloning is cheap for any transport, trait objects included; clones share the transport,
/// store, and coordinator, so the single-flight guarantee spans every clone.
pub struct Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Transport used for resource calls (and, by default, renewals).
	pub transport: Arc<T>,
	/// Credential store read on every send.
	pub store: Arc<dyn TokenStore>,
	/// Immutable gateway configuration.
	pub config: Arc<GatewayConfig>,
	logout: Arc<dyn LogoutTrigger>,
	coordinator: Arc<RefreshCoordinator>,
}
impl<T> Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a gateway that renews credentials over the same transport it sends calls with.
	pub fn with_transport(
		config: GatewayConfig,
		store: Arc<dyn TokenStore>,
		logout: Arc<dyn LogoutTrigger>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let transport = transport.into();
		let renewer =
			Arc::new(HttpRenewer::new(transport.clone(), config.renewal_endpoint.clone()));

		Self::with_renewer(config, store, logout, transport, renewer)
	}

	/// Creates a gateway with a caller-provided renewal client.
	pub fn with_renewer(
		config: GatewayConfig,
		store: Arc<dyn TokenStore>,
		logout: Arc<dyn LogoutTrigger>,
		transport: impl Into<Arc<T>>,
		renewer: Arc<dyn CredentialRenewer>,
	) -> Self {
		let coordinator = RefreshCoordinator::new(
			store.clone(),
			renewer,
			logout.clone(),
			Arc::new(GatewayMetrics::default()),
		);

		Self {
			transport: transport.into(),
			store,
			config: Arc::new(config),
			logout,
			coordinator: Arc::new(coordinator),
		}
	}

	/// Refresh coordinator shared by every clone of this gateway.
	pub fn coordinator(&self) -> &RefreshCoordinator {
		&self.coordinator
	}

	/// Renewal, queueing, replay, and logout counters.
	pub fn metrics(&self) -> &GatewayMetrics {
		self.coordinator.metrics()
	}

	/// Sends `request`, renewing and replaying once if the credential expired.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.dispatch(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Builds a `GET` request for a path relative to the base URL.
	pub fn get(&self, path: &str) -> Result<ApiRequest> {
		Ok(ApiRequest::new(Method::GET, self.config.resolve(path)?))
	}

	/// Builds a `POST` request carrying `body` as JSON.
	pub fn post_json<B>(&self, path: &str, body: &B) -> Result<ApiRequest>
	where
		B: ?Sized + Serialize,
	{
		Ok(ApiRequest::new(Method::POST, self.config.resolve(path)?).json(body)?)
	}

	/// Builds a `PUT` request carrying `body` as JSON.
	pub fn put_json<B>(&self, path: &str, body: &B) -> Result<ApiRequest>
	where
		B: ?Sized + Serialize,
	{
		Ok(ApiRequest::new(Method::PUT, self.config.resolve(path)?).json(body)?)
	}

	/// Builds a `DELETE` request.
	pub fn delete(&self, path: &str) -> Result<ApiRequest> {
		Ok(ApiRequest::new(Method::DELETE, self.config.resolve(path)?))
	}

	/// Ends the session on the host's request (sign-out button, account switch).
	pub fn end_session(&self) {
		self.logout.logout(&LogoutReason::Manual);
	}

	async fn dispatch(&self, request: ApiRequest) -> Result<ApiResponse> {
		let sent_with = self.store.access()?;
		let response = self.transport.execute(request.to_http(sent_with.as_ref())?).await?;

		if response.is_success() {
			return Ok(response);
		}

		let status = response.status.as_u16();

		if !self.config.is_expiry_status(status) {
			return Err(http_error(response));
		}
		// Expiry on the renewal endpoint itself is never routed back into renewal.
		if self.config.is_renewal_target(&request.url) {
			return Err(expired_error(response, false));
		}

		let mut call = PendingCall::capture(&request);

		call.mark_retried();

		// Another caller renewed while this call was in flight.
		let current = self.store.access()?;

		if let Some(access) = current.filter(|current| Some(current) != sent_with.as_ref()) {
			obs::debug_event(FlowKind::Dispatch, "Credential already renewed; replaying directly.");

			return self.replay(Replay { call, access }).await;
		}

		obs::debug_event(FlowKind::Dispatch, "Credential expired; handing call to coordinator.");

		let replay = self.coordinator.acquire(call).await?;

		self.replay(replay).await
	}

	async fn replay(&self, replay: Replay) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Replay;

		let span = FlowSpan::new(KIND, "replay");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.coordinator.metrics().record_replay();

		let result = span
			.instrument(async move {
				let Replay { call, access } = replay;
				let request = call.into_request();
				let response = self.transport.execute(request.to_http(Some(&access))?).await?;

				if response.is_success() {
					return Ok(response);
				}

				let status = response.status.as_u16();

				if self.config.is_expiry_status(status) {
					obs::warn_event(KIND, "Credential expired again after replay.");

					return Err(expired_error(response, true));
				}

				Err(http_error(response))
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
#[cfg(feature = "reqwest")]
impl Gateway<ReqwestTransport> {
	/// Creates a gateway backed by a reqwest client built from `config`.
	pub fn new(
		config: GatewayConfig,
		store: Arc<dyn TokenStore>,
		logout: Arc<dyn LogoutTrigger>,
	) -> Result<Self> {
		let transport = ReqwestTransport::from_config(&config)?;

		Ok(Self::with_transport(config, store, logout, transport))
	}
}
impl<T> Clone for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			store: self.store.clone(),
			config: self.config.clone(),
			logout: self.logout.clone(),
			coordinator: self.coordinator.clone(),
		}
	}
}
impl<T> Debug for Gateway<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("base_url", &self.config.base_url.as_str())
			.field("renewal_endpoint", &self.config.renewal_endpoint.as_str())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

fn http_error(response: ApiResponse) -> Error {
	Error::Http {
		status: response.status.as_u16(),
		retry_after: response.retry_after(),
		body: response.text(),
	}
}

fn expired_error(response: ApiResponse, replayed: bool) -> Error {
	Error::CredentialExpired {
		status: response.status.as_u16(),
		replayed,
		retry_after: response.retry_after(),
		body: response.text(),
	}
}
