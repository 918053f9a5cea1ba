//! scrypt password hasher.
//!
//! Hashes are stored as `hex(salt):hex(key)` with a 16-byte random salt and a
//! 64-byte derived key. Derivation is CPU-bound and runs on the blocking pool.

use async_trait::async_trait;
use rand::RngCore;
use scrypt::{Params, scrypt};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::domain::PasswordHash;
use crate::domain::ports::{PasswordHasher, PasswordHasherError};

/// Cost parameter used in production (N = 2^14).
pub const DEFAULT_LOG_N: u8 = 14;
const BLOCK_SIZE: u32 = 8;
const PARALLELISM: u32 = 1;
const SALT_LEN: usize = 16;
const KEY_LEN: usize = 64;

/// [`PasswordHasher`] using scrypt with a configurable cost.
#[derive(Debug, Clone)]
pub struct ScryptPasswordHasher {
    params: Params,
}

impl ScryptPasswordHasher {
    /// Hasher with cost `2^log_n`. Tests use a small `log_n` to stay fast.
    ///
    /// # Errors
    ///
    /// Returns [`PasswordHasherError::Hashing`] for an unsupported cost.
    pub fn new(log_n: u8) -> Result<Self, PasswordHasherError> {
        let params = Params::new(log_n, BLOCK_SIZE, PARALLELISM, KEY_LEN)
            .map_err(|err| PasswordHasherError::hashing(err.to_string()))?;
        Ok(Self { params })
    }
}

fn derive(
    password: &[u8],
    salt: &[u8],
    params: &Params,
) -> Result<Zeroizing<Vec<u8>>, PasswordHasherError> {
    let mut key = Zeroizing::new(vec![0_u8; KEY_LEN]);
    scrypt(password, salt, params, key.as_mut_slice())
        .map_err(|err| PasswordHasherError::hashing(err.to_string()))?;
    Ok(key)
}

fn split_hash(hash: &PasswordHash) -> Result<(Vec<u8>, Vec<u8>), PasswordHasherError> {
    let (salt, key) = hash
        .as_str()
        .split_once(':')
        .ok_or_else(PasswordHasherError::malformed_hash)?;
    let salt = hex::decode(salt).map_err(|_| PasswordHasherError::malformed_hash())?;
    let key = hex::decode(key).map_err(|_| PasswordHasherError::malformed_hash())?;
    if salt.is_empty() || key.len() != KEY_LEN {
        return Err(PasswordHasherError::malformed_hash());
    }
    Ok((salt, key))
}

async fn blocking<T: Send + 'static>(
    work: impl FnOnce() -> Result<T, PasswordHasherError> + Send + 'static,
) -> Result<T, PasswordHasherError> {
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| PasswordHasherError::hashing(format!("hashing task failed: {err}")))?
}

#[async_trait]
impl PasswordHasher for ScryptPasswordHasher {
    async fn hash(&self, password: &str) -> Result<PasswordHash, PasswordHasherError> {
        let password = Zeroizing::new(password.as_bytes().to_vec());
        let params = self.params.clone();
        blocking(move || {
            let mut salt = [0_u8; SALT_LEN];
            rand::thread_rng().fill_bytes(&mut salt);
            let key = derive(&password, &salt, &params)?;
            Ok(PasswordHash::new(format!(
                "{}:{}",
                hex::encode(salt),
                hex::encode(key.as_slice())
            )))
        })
        .await
    }

    async fn verify(
        &self,
        password: &str,
        hash: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        let (salt, expected) = split_hash(hash)?;
        let password = Zeroizing::new(password.as_bytes().to_vec());
        let params = self.params.clone();
        blocking(move || {
            let key = derive(&password, &salt, &params)?;
            Ok(bool::from(key.as_slice().ct_eq(&expected)))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn hasher() -> ScryptPasswordHasher {
        ScryptPasswordHasher::new(4).expect("cheap params")
    }

    #[rstest]
    #[tokio::test]
    async fn verifies_the_original_password_only(hasher: ScryptPasswordHasher) {
        let hash = hasher.hash("correct horse").await.expect("hashed");

        assert!(hasher.verify("correct horse", &hash).await.expect("verify"));
        assert!(!hasher.verify("correct horsf", &hash).await.expect("verify"));
    }

    #[rstest]
    #[tokio::test]
    async fn salts_make_hashes_unique(hasher: ScryptPasswordHasher) {
        let first = hasher.hash("same").await.expect("hashed");
        let second = hasher.hash("same").await.expect("hashed");

        assert_ne!(first, second);
        let (salt, key) = first.as_str().split_once(':').expect("two parts");
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert_eq!(key.len(), KEY_LEN * 2);
    }

    #[rstest]
    #[case::no_separator("deadbeef")]
    #[case::not_hex("zz:zz")]
    #[case::short_key("00ff:00ff")]
    #[tokio::test]
    async fn malformed_hashes_are_errors(hasher: ScryptPasswordHasher, #[case] stored: &str) {
        let error = hasher
            .verify("anything", &PasswordHash::new(stored))
            .await
            .expect_err("malformed");

        assert_eq!(error, PasswordHasherError::MalformedHash);
    }

    #[test]
    fn rejects_unsupported_cost() {
        assert!(ScryptPasswordHasher::new(200).is_err());
    }
}
