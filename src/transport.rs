//! Transport primitives for outbound gateway calls.
//!
//! [`HttpTransport`] is the gateway's only dependency on an HTTP stack. It receives a fully
//! assembled [`http::Request`] (the bearer header is already attached) and must return the
//! buffered response for every status, leaving status classification to the pipeline. Only
//! failures where no response arrived should surface as errors.

// self
use crate::{_prelude::*, request::ApiResponse};
#[cfg(feature = "reqwest")] use crate::config::GatewayConfig;

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse>> + 'a + Send>>;

/// Abstraction over HTTP clients capable of executing gateway calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// pipeline and the renewal client behind an `Arc`.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the response.
	///
	/// Non-success statuses are returned as `Ok`; only transport failures (no response) and
	/// request construction failures are errors.
	fn execute(&self, request: http::Request<Vec<u8>>) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client honoring the configuration's request timeout.
	pub fn from_config(config: &GatewayConfig) -> Result<Self> {
		let mut builder = ReqwestClient::builder();

		if let Some(timeout) = config.request_timeout {
			builder = builder.timeout(timeout);
		}

		let client = builder.build().map_err(crate::error::ConfigError::from)?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: http::Request<Vec<u8>>) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let request = reqwest::Request::try_from(request).map_err(map_reqwest_error)?;
			let response = client.execute(request).await.map_err(map_reqwest_error)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(map_reqwest_error)?;

			Ok(ApiResponse::new(status, headers, body.to_vec()))
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return crate::error::ConfigError::from(err).into();
	}

	crate::error::TransportError::from(err).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[cfg(feature = "reqwest")]
	#[test]
	fn reqwest_transport_builds_from_config() {
		let config = GatewayConfig::builder()
			.base_url(Url::parse("https://shop.example.com/").expect("Fixture URL should parse."))
			.renewal_endpoint(
				Url::parse("https://shop.example.com/token/refresh/")
					.expect("Fixture URL should parse."),
			)
			.request_timeout(std::time::Duration::from_secs(5))
			.build()
			.expect("Configuration should build.");

		assert!(ReqwestTransport::from_config(&config).is_ok());
	}

	#[tokio::test]
	async fn transport_failures_surface_through_trait_objects() {
		struct Refusing;
		impl HttpTransport for Refusing {
			fn execute(&self, _request: http::Request<Vec<u8>>) -> TransportFuture<'_> {
				Box::pin(async { Err(crate::error::TransportError::Timeout.into()) })
			}
		}

		let transport: Arc<dyn HttpTransport> = Arc::new(Refusing);
		let err = transport
			.execute(http::Request::new(Vec::new()))
			.await
			.expect_err("Refusing transport should always fail.");

		assert!(matches!(err, Error::Transport(crate::error::TransportError::Timeout)));
	}
}
