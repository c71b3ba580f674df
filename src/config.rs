//! Gateway configuration: backend base URL, renewal endpoint, expiry statuses, and the login
//! surface users are sent to after an unrecoverable authentication failure.

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Errors raised while constructing or validating a [`GatewayConfig`].
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum GatewayConfigError {
	/// Base URL is mandatory.
	#[error("Missing base URL.")]
	MissingBaseUrl,
	/// Renewal endpoint is mandatory.
	#[error("Missing renewal endpoint.")]
	MissingRenewalEndpoint,
	/// Endpoints must use HTTPS unless insecure endpoints are explicitly allowed.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// At least one status must signal credential expiry.
	#[error("At least one expiry status is required.")]
	NoExpiryStatuses,
	/// Expiry statuses must be HTTP error statuses.
	#[error("Expiry status {status} is not an HTTP error status.")]
	InvalidExpiryStatus {
		/// Offending status.
		status: u16,
	},
	/// Login path must be an absolute path.
	#[error("Login path `{path}` must start with `/`.")]
	InvalidLoginPath {
		/// Offending path.
		path: String,
	},
	/// Serialized configuration could not be decoded.
	#[error("Configuration could not be parsed: {message}.")]
	Parse {
		/// Decoding failure summary.
		message: String,
	},
}

/// Immutable gateway configuration consumed by the pipeline and coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
	/// Base URL that relative request paths are resolved against.
	pub base_url: Url,
	/// Endpoint that exchanges a refresh credential for a new access credential.
	pub renewal_endpoint: Url,
	/// Client-side route users are navigated to after logout.
	#[serde(default = "GatewayConfig::default_login_path")]
	pub login_path: String,
	/// Statuses treated as "credential expired".
	#[serde(default = "GatewayConfig::default_expiry_statuses")]
	pub expiry_statuses: Vec<u16>,
	/// Permits plain-HTTP endpoints (local development and tests only).
	#[serde(default)]
	pub allow_insecure: bool,
	/// Per-request timeout applied by the built-in transport.
	#[serde(default)]
	pub request_timeout: Option<StdDuration>,
}
impl GatewayConfig {
	/// Default login route.
	pub const DEFAULT_LOGIN_PATH: &'static str = "/login";
	/// Default expiry status (`401 Unauthorized`).
	pub const DEFAULT_EXPIRY_STATUS: u16 = 401;

	/// Creates a new builder.
	pub fn builder() -> GatewayConfigBuilder {
		GatewayConfigBuilder::default()
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(raw: &str) -> Result<Self, GatewayConfigError> {
		let de = &mut serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(de).map_err(|e| {
			GatewayConfigError::Parse { message: format!("{} at `{}`", e.inner(), e.path()) }
		})?;

		config.validate()?;

		Ok(config)
	}

	/// Returns `true` when `status` signals credential expiry.
	pub fn is_expiry_status(&self, status: u16) -> bool {
		self.expiry_statuses.contains(&status)
	}

	/// Returns `true` when `url` targets the renewal endpoint (query and fragment ignored).
	pub fn is_renewal_target(&self, url: &Url) -> bool {
		url.origin() == self.renewal_endpoint.origin()
			&& url.path().trim_end_matches('/')
				== self.renewal_endpoint.path().trim_end_matches('/')
	}

	/// Resolves a request path (or absolute URL) against the base URL.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		self.base_url
			.join(path)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}

	fn default_login_path() -> String {
		Self::DEFAULT_LOGIN_PATH.into()
	}

	fn default_expiry_statuses() -> Vec<u16> {
		vec![Self::DEFAULT_EXPIRY_STATUS]
	}

	fn validate(&self) -> Result<(), GatewayConfigError> {
		if !self.allow_insecure {
			validate_endpoint("base", &self.base_url)?;
			validate_endpoint("renewal", &self.renewal_endpoint)?;
		}
		if self.expiry_statuses.is_empty() {
			return Err(GatewayConfigError::NoExpiryStatuses);
		}
		if let Some(&status) = self.expiry_statuses.iter().find(|s| !(400..=599).contains(*s)) {
			return Err(GatewayConfigError::InvalidExpiryStatus { status });
		}
		if !self.login_path.starts_with('/') {
			return Err(GatewayConfigError::InvalidLoginPath { path: self.login_path.clone() });
		}

		Ok(())
	}
}

/// Builder for [`GatewayConfig`] values.
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
	/// Base URL for relative request paths.
	pub base_url: Option<Url>,
	/// Renewal endpoint.
	pub renewal_endpoint: Option<Url>,
	/// Login route; defaults to [`GatewayConfig::DEFAULT_LOGIN_PATH`].
	pub login_path: Option<String>,
	/// Expiry statuses; defaults to `[401]`.
	pub expiry_statuses: Option<Vec<u16>>,
	/// Whether plain-HTTP endpoints are accepted.
	pub allow_insecure: bool,
	/// Per-request timeout.
	pub request_timeout: Option<StdDuration>,
}
impl GatewayConfigBuilder {
	/// Sets the base URL.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Sets the renewal endpoint.
	pub fn renewal_endpoint(mut self, url: Url) -> Self {
		self.renewal_endpoint = Some(url);

		self
	}

	/// Overrides the login route.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = Some(path.into());

		self
	}

	/// Replaces the set of statuses treated as credential expiry.
	pub fn expiry_statuses<I>(mut self, statuses: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		let mut statuses: Vec<u16> = statuses.into_iter().collect();

		statuses.sort_unstable();
		statuses.dedup();

		self.expiry_statuses = Some(statuses);

		self
	}

	/// Allows plain-HTTP endpoints.
	pub fn allow_insecure(mut self, allow: bool) -> Self {
		self.allow_insecure = allow;

		self
	}

	/// Sets the per-request timeout used by the built-in transport.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<GatewayConfig, GatewayConfigError> {
		let base_url = self.base_url.ok_or(GatewayConfigError::MissingBaseUrl)?;
		let renewal_endpoint =
			self.renewal_endpoint.ok_or(GatewayConfigError::MissingRenewalEndpoint)?;
		let config = GatewayConfig {
			base_url,
			renewal_endpoint,
			login_path: self.login_path.unwrap_or_else(GatewayConfig::default_login_path),
			expiry_statuses: self
				.expiry_statuses
				.unwrap_or_else(GatewayConfig::default_expiry_statuses),
			allow_insecure: self.allow_insecure,
			request_timeout: self.request_timeout,
		};

		config.validate()?;

		Ok(config)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), GatewayConfigError> {
	if url.scheme() != "https" {
		Err(GatewayConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}
