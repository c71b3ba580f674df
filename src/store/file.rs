//! File-backed [`TokenStore`] that keeps the session across process restarts.
//!
//! Credentials are written as plain JSON; encrypting them at rest is left to the host.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::Credential,
	store::{CredentialSlots, StoreError, TokenStore},
};

/// Persists both credential slots to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<CredentialSlots>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing JSON file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<CredentialSlots, StoreError> {
		if !path.exists() {
			return Ok(CredentialSlots::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(CredentialSlots::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, slots: &CredentialSlots) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(slots).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize credential snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn mutate(&self, apply: impl FnOnce(&mut CredentialSlots)) -> Result<(), StoreError> {
		let mut guard = self.inner.write();
		let mut next = guard.clone();

		apply(&mut next);
		self.persist_locked(&next)?;
		*guard = next;

		Ok(())
	}
}
impl TokenStore for FileStore {
	fn access(&self) -> Result<Option<Credential>, StoreError> {
		Ok(self.inner.read().access.clone())
	}

	fn refresh(&self) -> Result<Option<Credential>, StoreError> {
		Ok(self.inner.read().refresh.clone())
	}

	fn set_access(&self, credential: Credential) -> Result<(), StoreError> {
		self.mutate(|slots| slots.access = Some(credential))
	}

	fn set_refresh(&self, credential: Credential) -> Result<(), StoreError> {
		self.mutate(|slots| slots.refresh = Some(credential))
	}

	fn clear_all(&self) -> Result<(), StoreError> {
		self.mutate(|slots| *slots = CredentialSlots::default())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;
	use crate::auth::CredentialPair;

	fn temp_path(tag: &str) -> PathBuf {
		let unique = format!(
			"auth_gateway_file_store_{tag}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path("reload");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store
			.save_pair(CredentialPair::new("access-token", "refresh-token"))
			.expect("Failed to save fixture pair to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");

		assert_eq!(
			reopened.access().expect("Read should succeed."),
			Some(Credential::new("access-token"))
		);
		assert_eq!(
			reopened.refresh().expect("Read should succeed."),
			Some(Credential::new("refresh-token"))
		);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn clear_all_persists_an_empty_snapshot() {
		let path = temp_path("clear");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");

		store.set_access(Credential::new("a")).expect("Write should succeed.");
		store.clear_all().expect("Clear should succeed.");

		let raw = fs::read_to_string(&path).expect("Snapshot file should exist after a write.");

		assert_eq!(raw.trim(), "{}");
		assert!(FileStore::open(&path).expect("Reopen should succeed.").access().unwrap().is_none());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn corrupt_snapshot_is_reported() {
		let path = temp_path("corrupt");

		fs::write(&path, b"not json").expect("Fixture write should succeed.");

		let err = FileStore::open(&path).expect_err("Corrupt snapshots should fail to load.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}
}
