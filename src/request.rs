//! Request/response models and the replayable pending-call snapshot.

// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
	header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, auth::Credential, error::ConfigError};

/// Outbound call as issued by application code.
///
/// The value is owned and cheap to clone, so a [`PendingCall`] can keep an independent copy for
/// replay long after the caller's own request went out of scope.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Caller-supplied headers. Any `Authorization` header is replaced at send time.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Vec<u8>,
}
impl ApiRequest {
	/// Creates a request with no headers and an empty body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: Vec::new() }
	}

	/// Appends a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	/// Replaces the body with raw bytes.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Serializes `payload` as the JSON body and sets `Content-Type: application/json`.
	pub fn json<T>(mut self, payload: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = serde_json::to_vec(payload)?;
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Builds the wire request, attaching `bearer` as the only `Authorization` header.
	pub fn to_http(
		&self,
		bearer: Option<&Credential>,
	) -> Result<http::Request<Vec<u8>>, ConfigError> {
		let uri = self.url.as_str().parse::<Uri>().map_err(http::Error::from)?;
		let mut request = http::Request::new(self.body.clone());

		*request.method_mut() = self.method.clone();
		*request.uri_mut() = uri;
		*request.headers_mut() = self.headers.clone();

		request.headers_mut().remove(AUTHORIZATION);

		if let Some(credential) = bearer {
			let mut value = HeaderValue::from_str(&credential.bearer())?;

			value.set_sensitive(true);
			request.headers_mut().insert(AUTHORIZATION, value);
		}

		Ok(request)
	}
}

/// Response received from the backend, fully buffered.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response from its parts.
	pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers, body: body.into() }
	}

	/// Returns `true` for every status below 400.
	pub fn is_success(&self) -> bool {
		!(self.status.is_client_error() || self.status.is_server_error())
	}

	/// Body decoded lossily as UTF-8.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let de = &mut serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(de)
			.map_err(|source| Error::Decode { status: self.status.as_u16(), source })
	}

	/// Retry-After hint expressed as a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers)
	}
}

/// Replayable snapshot of a call that hit credential expiry.
///
/// The snapshot never carries an `Authorization` header; the credential is applied again when
/// the call is replayed. `retried` flips once, so a call is handed to the refresh coordinator at
/// most one time.
#[derive(Clone, Debug)]
pub struct PendingCall {
	request: ApiRequest,
	retried: bool,
}
impl PendingCall {
	/// Captures an owned copy of `request` with its `Authorization` header removed.
	pub fn capture(request: &ApiRequest) -> Self {
		let mut request = request.clone();

		request.headers.remove(AUTHORIZATION);

		Self { request, retried: false }
	}

	/// Captured request.
	pub fn request(&self) -> &ApiRequest {
		&self.request
	}

	/// Whether the call already went through a renewal.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Marks the call as retried; returns `false` if it already was.
	pub fn mark_retried(&mut self) -> bool {
		!std::mem::replace(&mut self.retried, true)
	}

	/// Consumes the snapshot and returns the captured request.
	pub fn into_request(self) -> ApiRequest {
		self.request
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
