//! Authenticated request gateway for storefront clients: bearer attachment on every call,
//! single-flight credential renewal when calls expire, and replay of every caller that was
//! waiting on the renewal.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod obs;
pub mod renewal;
pub mod request;
pub mod session;
pub mod store;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and fixtures for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;

	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		auth::{Credential, CredentialPair},
		config::GatewayConfig,
		session::{LogoutReason, LogoutTrigger},
		store::{MemoryStore, TokenStore},
	};

	/// Logout trigger that only records how often (and why) it fired.
	#[derive(Debug, Default)]
	pub struct RecordingLogout {
		calls: AtomicUsize,
		reasons: Mutex<Vec<LogoutReason>>,
	}
	impl RecordingLogout {
		/// Number of times [`LogoutTrigger::logout`] has been invoked.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		/// Reasons passed to every recorded logout, oldest first.
		pub fn reasons(&self) -> Vec<LogoutReason> {
			self.reasons.lock().clone()
		}
	}
	impl LogoutTrigger for RecordingLogout {
		fn logout(&self, reason: &LogoutReason) {
			self.calls.fetch_add(1, Ordering::SeqCst);
			self.reasons.lock().push(reason.clone());
		}
	}

	/// Builds an in-memory store seeded with the provided access/refresh pair.
	pub fn seeded_store(access: &str, refresh: Option<&str>) -> Arc<MemoryStore> {
		let store = Arc::new(MemoryStore::default());

		match refresh {
			Some(refresh) => store
				.save_pair(CredentialPair::new(access, refresh))
				.expect("Memory store should accept the seeded credential pair."),
			None => store
				.set_access(Credential::new(access))
				.expect("Memory store should accept the seeded access credential."),
		}

		store
	}

	/// Builds a plain-HTTP gateway configuration pointed at a mock server base URL.
	pub fn test_config(base_url: &str, renewal_path: &str) -> GatewayConfig {
		let base = Url::parse(base_url).expect("Mock base URL should parse successfully.");
		let renewal = base.join(renewal_path).expect("Renewal path should join onto the base URL.");

		GatewayConfig::builder()
			.base_url(base)
			.renewal_endpoint(renewal)
			.allow_insecure(true)
			.build()
			.expect("Test gateway configuration should build successfully.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeSet, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
