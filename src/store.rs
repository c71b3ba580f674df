//! Credential storage contract and built-in store implementations.
//!
//! The gateway reads the access credential from the store on every send and the refresh
//! coordinator is the only component that writes renewed credentials back. Stores therefore only
//! need atomic single-slot reads and writes; they never coordinate renewals themselves.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialPair, RenewedCredentials},
};

/// Storage backend contract implemented by credential stores.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the current access credential, if any.
	fn access(&self) -> Result<Option<Credential>, StoreError>;

	/// Returns the current refresh credential, if any.
	fn refresh(&self) -> Result<Option<Credential>, StoreError>;

	/// Replaces the access credential.
	fn set_access(&self, credential: Credential) -> Result<(), StoreError>;

	/// Replaces the refresh credential.
	fn set_refresh(&self, credential: Credential) -> Result<(), StoreError>;

	/// Removes both credentials.
	fn clear_all(&self) -> Result<(), StoreError>;

	/// Stores a full login pair, replacing both slots.
	fn save_pair(&self, pair: CredentialPair) -> Result<(), StoreError> {
		self.set_access(pair.access)?;
		self.set_refresh(pair.refresh)
	}

	/// Writes the outcome of a renewal. The refresh slot is only touched when the backend
	/// rotated it.
	fn replace(&self, renewed: RenewedCredentials) -> Result<(), StoreError> {
		self.set_access(renewed.access)?;

		match renewed.refresh {
			Some(refresh) => self.set_refresh(refresh),
			None => Ok(()),
		}
	}
}

/// Snapshot of both credential slots, as persisted by [`FileStore`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSlots {
	/// Access credential slot.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access: Option<Credential>,
	/// Refresh credential slot.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh: Option<Credential>,
}
impl CredentialSlots {
	/// Returns `true` when neither slot holds a credential.
	pub fn is_empty(&self) -> bool {
		self.access.is_none() && self.refresh.is_none()
	}
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::{Error, RenewalError};

	#[test]
	fn store_error_converts_into_gateway_error_with_source() {
		let store_error = StoreError::Backend { message: "disk unreachable".into() };
		let gateway_error: Error = store_error.clone().into();

		assert!(matches!(gateway_error, Error::Storage(_)));
		assert!(gateway_error.to_string().contains("disk unreachable"));

		let source = StdError::source(&gateway_error)
			.expect("Gateway error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn store_error_becomes_renewal_storage_failure() {
		let renewal = RenewalError::from(StoreError::Serialization { message: "eof".into() });

		assert_eq!(renewal, RenewalError::Storage { message: "Serialization error: eof.".into() });
	}

	#[test]
	fn replace_keeps_refresh_when_not_rotated() {
		let store = MemoryStore::default();

		store.save_pair(CredentialPair::new("a1", "r1")).expect("Saving a pair should succeed.");
		store
			.replace(RenewedCredentials { access: Credential::new("a2"), refresh: None })
			.expect("Replacing should succeed.");

		assert_eq!(store.access().expect("Read should succeed."), Some(Credential::new("a2")));
		assert_eq!(store.refresh().expect("Read should succeed."), Some(Credential::new("r1")));

		store
			.replace(RenewedCredentials {
				access: Credential::new("a3"),
				refresh: Some(Credential::new("r3")),
			})
			.expect("Replacing should succeed.");

		assert_eq!(store.refresh().expect("Read should succeed."), Some(Credential::new("r3")));
	}

	#[test]
	fn empty_slots_serialize_to_empty_object() {
		let payload = serde_json::to_string(&CredentialSlots::default())
			.expect("Empty slots should serialize to JSON.");

		assert_eq!(payload, "{}");
		assert!(CredentialSlots::default().is_empty());
	}
}
