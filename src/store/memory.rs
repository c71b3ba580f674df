//! Thread-safe in-memory [`TokenStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::Credential,
	store::{CredentialSlots, StoreError, TokenStore},
};

/// Thread-safe storage backend that keeps credentials in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Arc<RwLock<CredentialSlots>>);
impl MemoryStore {
	/// Returns a copy of both slots.
	pub fn snapshot(&self) -> CredentialSlots {
		self.0.read().clone()
	}
}
impl TokenStore for MemoryStore {
	fn access(&self) -> Result<Option<Credential>, StoreError> {
		Ok(self.0.read().access.clone())
	}

	fn refresh(&self) -> Result<Option<Credential>, StoreError> {
		Ok(self.0.read().refresh.clone())
	}

	fn set_access(&self, credential: Credential) -> Result<(), StoreError> {
		self.0.write().access = Some(credential);

		Ok(())
	}

	fn set_refresh(&self, credential: Credential) -> Result<(), StoreError> {
		self.0.write().refresh = Some(credential);

		Ok(())
	}

	fn clear_all(&self) -> Result<(), StoreError> {
		*self.0.write() = CredentialSlots::default();

		Ok(())
	}
}
