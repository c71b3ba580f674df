//! Credential renewal client.
//!
//! [`CredentialRenewer`] is the seam the refresh coordinator drives; [`HttpRenewer`] is the
//! built-in implementation that exchanges the refresh credential at the configured renewal
//! endpoint over any [`HttpTransport`].

// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	auth::{Credential, RenewedCredentials},
	error::RenewalError,
	request::ApiRequest,
	transport::HttpTransport,
};

/// Boxed future returned by [`CredentialRenewer::renew`].
pub type RenewalFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RenewedCredentials, RenewalError>> + 'a + Send>>;

/// Exchanges a refresh credential for a fresh access credential.
pub trait CredentialRenewer
where
	Self: Send + Sync,
{
	/// Performs one renewal round trip.
	fn renew<'a>(&'a self, refresh: &'a Credential) -> RenewalFuture<'a>;
}

/// Renewer that POSTs `{"refresh": "<credential>"}` to the renewal endpoint.
///
/// The request never carries an `Authorization` header. Success bodies must contain `access`
/// (or `access_token`) and may contain a rotated `refresh` (or `refresh_token`).
pub struct HttpRenewer<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	endpoint: Url,
}
impl<T> HttpRenewer<T>
where
	T: ?Sized + HttpTransport,
{
	/// Longest body excerpt carried by [`RenewalError::Rejected`].
	const MESSAGE_PREVIEW: usize = 256;

	/// Creates a renewer bound to `endpoint`.
	pub fn new(transport: Arc<T>, endpoint: Url) -> Self {
		Self { transport, endpoint }
	}

	/// Renewal endpoint.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	async fn exchange(&self, refresh: &Credential) -> Result<RenewedCredentials, RenewalError> {
		let request = ApiRequest::new(Method::POST, self.endpoint.clone())
			.json(&RenewalPayload { refresh: refresh.expose() })
			.and_then(|request| request.to_http(None))?;
		let response = self
			.transport
			.execute(request)
			.await
			.map_err(|e| RenewalError::Transport { message: e.to_string() })?;

		if !response.is_success() {
			return Err(RenewalError::Rejected {
				status: response.status.as_u16(),
				message: preview(&response.text(), Self::MESSAGE_PREVIEW),
			});
		}

		parse_renewal_body(&response.body)
	}
}
impl<T> CredentialRenewer for HttpRenewer<T>
where
	T: ?Sized + HttpTransport,
{
	fn renew<'a>(&'a self, refresh: &'a Credential) -> RenewalFuture<'a> {
		Box::pin(self.exchange(refresh))
	}
}
impl<T> Debug for HttpRenewer<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpRenewer").field("endpoint", &self.endpoint.as_str()).finish()
	}
}

#[derive(Serialize)]
struct RenewalPayload<'a> {
	refresh: &'a str,
}

#[derive(Deserialize)]
struct RenewalResponse {
	#[serde(alias = "access_token")]
	access: Credential,
	#[serde(default, alias = "refresh_token")]
	refresh: Option<Credential>,
}

fn parse_renewal_body(body: &[u8]) -> Result<RenewedCredentials, RenewalError> {
	let de = &mut serde_json::Deserializer::from_slice(body);
	let parsed: RenewalResponse = serde_path_to_error::deserialize(de).map_err(|e| {
		RenewalError::Malformed { message: format!("{} at `{}`", e.inner(), e.path()) }
	})?;

	if parsed.access.expose().is_empty() {
		return Err(RenewalError::Malformed { message: "empty access credential".into() });
	}

	Ok(RenewedCredentials {
		access: parsed.access,
		refresh: parsed.refresh.filter(|refresh| !refresh.expose().is_empty()),
	})
}

fn preview(text: &str, limit: usize) -> String {
	let trimmed = text.trim();

	match trimmed.char_indices().nth(limit) {
		Some((cut, _)) => format!("{}...", &trimmed[..cut]),
		None => trimmed.to_owned(),
	}
}
