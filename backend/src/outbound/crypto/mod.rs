//! Password hashing adapters.

mod scrypt_hasher;

pub use scrypt_hasher::{DEFAULT_LOG_N, ScryptPasswordHasher};
