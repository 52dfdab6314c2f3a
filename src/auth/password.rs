use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordConfig;

fn hasher(config: &PasswordConfig) -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
        .map_err(|e| {
            error!(error = %e, "invalid argon2 parameters");
            anyhow::anyhow!(e.to_string())
        })?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Argon2id PHC string with a fresh random salt.
pub fn hash_password(plain: &str, config: &PasswordConfig) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher(config)?
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Parameters are read back from the PHC string, so hashes made under an
/// older work factor still verify.
pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Spends the same work as a verification for an email with no account.
pub fn equalize_timing(plain: &str, config: &PasswordConfig) {
    let _ = hash_password(plain, config);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> PasswordConfig {
        PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_password("Secur3Pass", &cheap()).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Secur3Pass", &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = hash_password("Secur3Pass", &cheap()).expect("hashing should succeed");
        assert!(!verify_password("Wr0ngPass", &hash).expect("verify should not error"));
    }

    #[test]
    fn salts_differ() {
        let a = hash_password("Same1Pass", &cheap()).unwrap();
        let b = hash_password("Same1Pass", &cheap()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn invalid_parameters_are_reported() {
        let bad = PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(hash_password("Secur3Pass", &bad).is_err());
    }
}
