//! Gateway-level error types shared by the pipeline, coordinator, transports, and stores.

// self
use crate::_prelude::*;

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error surfaced to the original caller.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No response was received (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Credential renewal failed; every call waiting on the renewal receives the same failure.
	#[error(transparent)]
	Renewal(#[from] RenewalError),

	/// The backend signalled credential expiry and the gateway will not renew for this call.
	///
	/// `replayed` is `true` when the call already went through one renewal-triggered replay.
	/// The backend's body and `Retry-After` hint are carried as received.
	#[error("Credential expired (HTTP {status}){suffix}.", suffix = replay_suffix(.replayed))]
	CredentialExpired {
		/// Expiry status returned by the backend.
		status: u16,
		/// Whether the call had already been replayed with a renewed credential.
		replayed: bool,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Response body, decoded lossily.
		body: String,
	},
	/// Any other 4xx/5xx response.
	#[error("Request failed with HTTP {status}.")]
	Http {
		/// HTTP status code returned by the backend.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Response body, decoded lossily.
		body: String,
	},
	/// A successful response body did not match the expected JSON shape.
	#[error("Response body (HTTP {status}) could not be decoded.")]
	Decode {
		/// HTTP status of the response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Returns the HTTP status attached to the error, when one was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::CredentialExpired { status, .. } | Self::Http { status, .. } => Some(*status),
			Self::Renewal(RenewalError::Rejected { status, .. }) => Some(*status),
			_ => None,
		}
	}

	/// Returns `true` when the failure ends the authenticated session.
	pub fn is_terminal_auth_failure(&self) -> bool {
		matches!(self, Self::CredentialExpired { replayed: true, .. } | Self::Renewal(_))
	}
}

fn replay_suffix(replayed: &bool) -> &'static str {
	if *replayed { " after replay" } else { "" }
}

/// Configuration and request construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] http::Error),
	/// A header value could not be encoded.
	#[error("Header value is invalid.")]
	InvalidHeader(#[from] http::header::InvalidHeaderValue),
	/// A request path could not be resolved against the base URL.
	#[error("Request path `{path}` cannot be resolved.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Body(#[from] serde_json::Error),
	/// Gateway configuration failed validation.
	#[error(transparent)]
	Gateway(#[from] crate::config::GatewayConfigError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete within the configured timeout.
	#[error("Request timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

/// Credential renewal failures.
///
/// The type is `Clone` because one renewal outcome is delivered to every queued caller.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RenewalError {
	/// No refresh credential was available, so no renewal call was made.
	#[error("No refresh credential is available.")]
	Unavailable,
	/// The renewal endpoint answered with a non-success status.
	#[error("Renewal endpoint rejected the refresh credential (HTTP {status}): {message}.")]
	Rejected {
		/// HTTP status returned by the renewal endpoint.
		status: u16,
		/// Body preview returned by the renewal endpoint.
		message: String,
	},
	/// The renewal request could not be built locally, so nothing was sent.
	#[error("Renewal request could not be built: {message}.")]
	Request {
		/// Construction failure summary.
		message: String,
	},
	/// The renewal call never received a response.
	#[error("Renewal request failed in transit: {message}.")]
	Transport {
		/// Transport failure summary.
		message: String,
	},
	/// The renewal endpoint answered successfully but the body could not be decoded.
	#[error("Renewal response is malformed: {message}.")]
	Malformed {
		/// Decoding failure summary, including the JSON path.
		message: String,
	},
	/// Renewed credentials could not be persisted.
	#[error("Renewed credentials could not be stored: {message}.")]
	Storage {
		/// Store failure summary.
		message: String,
	},
	/// The task driving the renewal was dropped before it finished.
	#[error("Renewal was abandoned before it completed.")]
	Abandoned,
}
impl RenewalError {
	/// Returns `true` when the failure should end the session.
	pub fn requires_logout(&self) -> bool {
		!matches!(self, Self::Abandoned)
	}
}
impl From<ConfigError> for RenewalError {
	fn from(e: ConfigError) -> Self {
		Self::Request { message: e.to_string() }
	}
}
impl From<crate::store::StoreError> for RenewalError {
	fn from(e: crate::store::StoreError) -> Self {
		Self::Storage { message: e.to_string() }
	}
}
