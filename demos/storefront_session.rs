//! Demonstrates wiring a custom transport into the gateway and watching a renewal episode.
//!
//! 1. Implement [`HttpTransport`] for an in-process storefront backend that only accepts the
//!    newest access credential and rotates it whenever the renewal endpoint is called.
//! 2. Build a [`Gateway`] with [`Gateway::with_transport`] and a [`SessionLogout`] whose listener
//!    prints the navigation it would perform.
//! 3. Fire three calls with an expired credential at once; one renewal serves all of them.
//! 4. Revoke the refresh credential on the backend and watch the session end exactly once.

// std
use std::{
	sync::{
		Arc,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use color_eyre::Result;
use parking_lot::Mutex;
// self
use auth_gateway::{
	auth::CredentialPair,
	config::GatewayConfig,
	gateway::Gateway,
	http::{self, HeaderMap, StatusCode, header::AUTHORIZATION},
	request::ApiResponse,
	session::{LogoutEvent, SessionLogout, SessionMarkers},
	store::{MemoryStore, TokenStore},
	transport::{HttpTransport, TransportFuture},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = GatewayConfig::builder()
		.base_url(Url::parse("https://shop.example.com/api/")?)
		.renewal_endpoint(Url::parse("https://shop.example.com/api/token/refresh/")?)
		.build()?;
	let store = Arc::new(MemoryStore::default());

	store.save_pair(CredentialPair::new("access-0", "refresh-0"))?;

	let markers = Arc::new(SessionMarkers::default());

	markers.set("logged_in");

	let logout = SessionLogout::from_config(store.clone(), &config)
		.with_markers(markers.clone())
		.with_listener(Arc::new(|event: &LogoutEvent| {
			println!("{} Navigating to {}.", event.notice, event.redirect_to);
		}));
	let backend = Arc::new(MockStorefront::default());
	let gateway: Gateway<MockStorefront> =
		Gateway::with_transport(config, store.clone(), Arc::new(logout), backend.clone());

	// The backend already moved on to `access-1`, so every call below starts out expired.
	backend.rotate();

	let (profile, cart, orders) = tokio::join!(
		gateway.send(gateway.get("profile/")?),
		gateway.send(gateway.get("cart/")?),
		gateway.send(gateway.get("orders/")?),
	);

	for response in [profile?, cart?, orders?] {
		println!("Replayed call answered with {}: {}.", response.status, response.text());
	}

	println!(
		"Renewals performed: {}; calls queued behind it: {}.",
		backend.renewals.load(Ordering::SeqCst),
		gateway.metrics().calls_queued(),
	);

	backend.revoke_refresh.store(true, Ordering::SeqCst);
	backend.rotate();

	match gateway.send(gateway.get("profile/")?).await {
		Ok(_) => println!("The backend unexpectedly accepted the stale credential."),
		Err(e) => println!("Session ended after a failed renewal: {e}"),
	}

	println!(
		"Credentials left in the store: {}; logged_in marker set: {}.",
		!store.snapshot().is_empty(),
		markers.contains("logged_in"),
	);

	for line in backend.log.lock().iter() {
		println!("{line}");
	}

	Ok(())
}

/// In-process storefront backend that accepts a single access credential at a time.
#[derive(Debug, Default)]
struct MockStorefront {
	generation: AtomicUsize,
	renewals: AtomicUsize,
	revoke_refresh: AtomicBool,
	log: Mutex<Vec<String>>,
}
impl MockStorefront {
	fn rotate(&self) {
		self.generation.fetch_add(1, Ordering::SeqCst);
	}

	fn current(&self) -> String {
		format!("Bearer access-{}", self.generation.load(Ordering::SeqCst))
	}

	fn respond(&self, request: &http::Request<Vec<u8>>) -> ApiResponse {
		let json = |status, body: String| {
			let mut headers = HeaderMap::new();

			headers.insert(
				http::header::CONTENT_TYPE,
				http::HeaderValue::from_static("application/json"),
			);

			ApiResponse::new(status, headers, body)
		};

		if request.uri().path() == "/api/token/refresh/" {
			self.renewals.fetch_add(1, Ordering::SeqCst);

			if self.revoke_refresh.load(Ordering::SeqCst) {
				return json(
					StatusCode::UNAUTHORIZED,
					r#"{"detail":"Token is blacklisted"}"#.into(),
				);
			}

			let generation = self.generation.load(Ordering::SeqCst);

			return json(StatusCode::OK, format!(r#"{{"access":"access-{generation}"}}"#));
		}

		let presented = request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());

		if presented == Some(self.current().as_str()) {
			json(StatusCode::OK, format!(r#"{{"path":"{}"}}"#, request.uri().path()))
		} else {
			json(StatusCode::UNAUTHORIZED, r#"{"detail":"Token expired"}"#.into())
		}
	}
}
impl HttpTransport for MockStorefront {
	fn execute(&self, request: http::Request<Vec<u8>>) -> TransportFuture<'_> {
		Box::pin(async move {
			if request.uri().path() == "/api/token/refresh/" {
				tokio::time::sleep(Duration::from_millis(100)).await;
			}

			let response = self.respond(&request);

			self.log.lock().push(format!(
				"{} {} -> {}",
				request.method(),
				request.uri().path(),
				response.status
			));

			Ok(response)
		})
	}
}
