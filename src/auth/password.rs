use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::{error, warn};

pub const MIN_PASSWORD_LEN: usize = 6;

lazy_static! {
    /// Stand-in hash verified when no account matches, so a login for an
    /// unknown email costs the same as one with a wrong password.
    static ref ABSENT_ACCOUNT_HASH: Option<String> = {
        let filler: String = OsRng
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        hash_password(&filler)
            .map_err(|e| warn!(error = %e, "could not prepare absent-account hash"))
            .ok()
    };
}

#[cfg(test)]
thread_local! {
    static VERIFICATIONS: std::cell::Cell<usize> = std::cell::Cell::new(0);
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

fn verify_hash(plain: &str, hash: &str) -> anyhow::Result<bool> {
    #[cfg(test)]
    VERIFICATIONS.with(|n| n.set(n.get() + 1));

    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Checks `plain` against a stored hash. With no stored hash (unknown
/// account) the absent-account hash is verified instead and the answer is `false`.
pub fn verify_password(plain: &str, stored: Option<&str>) -> anyhow::Result<bool> {
    match stored {
        Some(hash) => verify_hash(plain, hash),
        None => {
            if let Some(hash) = ABSENT_ACCOUNT_HASH.as_deref() {
                verify_hash(plain, hash)?;
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
pub(crate) fn verifications() -> usize {
    VERIFICATIONS.with(|n| n.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        assert_ne!(hash, password);
        assert!(verify_password(password, Some(&hash)).expect("verify should succeed"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("correct-horse-battery-staple").unwrap();
        assert!(!verify_password("wrong-password", Some(&hash)).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", Some("not-a-valid-hash")).unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn unknown_account_still_runs_argon2() {
        assert!(ABSENT_ACCOUNT_HASH.is_some());
        let before = verifications();
        assert!(!verify_password("whatever", None).unwrap());
        assert_eq!(verifications(), before + 1);
    }
}
