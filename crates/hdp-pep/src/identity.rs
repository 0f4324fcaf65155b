//! Identity translation.
//!
//! The PCM's `patient` binding is a `system|value` national identifier; the
//! Data Source never stores it directly. The local subject is the hex
//! SHA-256 of the value, prefixed `Patient/`.

use sha2::{Digest, Sha256};

use hdp_auth::error::{AuthError, AuthResult};

/// Maps a `system|value` patient binding to the local hashed subject.
///
/// # Errors
///
/// Returns `AuthError::Unauthorized` when the binding is missing the
/// `system|value` shape or has an empty value.
pub fn local_subject(patient: &str) -> AuthResult<String> {
    let (_, value) = patient
        .split_once('|')
        .filter(|(system, value)| !system.is_empty() && !value.is_empty())
        .ok_or_else(|| AuthError::unauthorized("patient binding is not system|value"))?;
    Ok(format!("Patient/{}", hex::encode(Sha256::digest(value))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_the_value_part() {
        // SHA-256("123") in lowercase hex.
        assert_eq!(
            local_subject("sys|123").unwrap(),
            "Patient/a665a45920422f9d417e4867efdc4fb8a04a1f3fff1fa07e998e86f7f7a27ae3"
        );
    }

    #[test]
    fn same_value_same_subject_regardless_of_system() {
        assert_eq!(
            local_subject("http://a|99887766").unwrap(),
            local_subject("http://b|99887766").unwrap()
        );
    }

    #[test]
    fn malformed_bindings_are_rejected() {
        assert!(local_subject("no-separator").is_err());
        assert!(local_subject("|value").is_err());
        assert!(local_subject("system|").is_err());
        assert!(local_subject("").is_err());
    }
}
