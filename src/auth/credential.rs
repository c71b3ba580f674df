//! Opaque bearer credentials that redact themselves in logs.

// self
use crate::_prelude::*;

/// Redacted credential wrapper keeping access and refresh tokens out of logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);
impl Credential {
	/// Wraps a new credential string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner credential value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Formats the credential as an `Authorization` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for Credential {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Credential").field(&"<redacted>").finish()
	}
}
impl Display for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Access/refresh pair issued at login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
	/// Short-lived request-signing credential.
	pub access: Credential,
	/// Longer-lived credential used to obtain a new access credential.
	pub refresh: Credential,
}
impl CredentialPair {
	/// Creates a pair from raw strings.
	pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
		Self { access: Credential::new(access), refresh: Credential::new(refresh) }
	}
}

/// Credentials returned by a successful renewal.
///
/// The refresh credential is optional because backends that do not rotate refresh tokens only
/// return a new access credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewedCredentials {
	/// Fresh access credential.
	pub access: Credential,
	/// Rotated refresh credential, when the backend issued one.
	pub refresh: Option<Credential>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn credential_formatters_redact() {
		let credential = Credential::new("super-secret");

		assert_eq!(format!("{credential:?}"), "Credential(\"<redacted>\")");
		assert_eq!(format!("{credential}"), "<redacted>");
		assert_eq!(credential.bearer(), "Bearer super-secret");
	}

	#[test]
	fn pair_debug_never_leaks_secrets() {
		let pair = CredentialPair::new("access-1", "refresh-1");
		let rendered = format!("{pair:?}");

		assert!(!rendered.contains("access-1"));
		assert!(!rendered.contains("refresh-1"));
	}

	#[test]
	fn credential_serializes_as_plain_string() {
		let payload = serde_json::to_string(&Credential::new("abc"))
			.expect("Credential should serialize to JSON.");

		assert_eq!(payload, "\"abc\"");
	}
}
