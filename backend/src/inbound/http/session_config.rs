//! Session cookie configuration read from the process environment.
//!
//! Reads go through [`mockable::Env`]. Debug builds tolerate missing or bad
//! values and log what they substituted; release builds refuse to start.
//!
//! | Variable                  | Meaning                               |
//! |---------------------------|---------------------------------------|
//! | `SESSION_KEY_FILE`        | path to at least 64 bytes of key data |
//! | `SESSION_COOKIE_SECURE`   | mark the cookie `Secure`              |
//! | `SESSION_SAMESITE`        | `Strict`, `Lax` or `None`             |
//! | `SESSION_ALLOW_EPHEMERAL` | accept a generated key (debug only)   |

use std::fmt::Display;
use std::path::PathBuf;

use actix_session::config::{CookieContentSecurity, PersistentSession};
use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Key, SameSite, time::Duration};
use mockable::Env;
use sha2::{Digest, Sha256};
use tracing::warn;
use zeroize::Zeroize;

/// Name of the cookie holding the encrypted session.
pub const SESSION_COOKIE_NAME: &str = "session";
const SESSION_TTL: Duration = Duration::days(7);

const KEY_FILE_VAR: &str = "SESSION_KEY_FILE";
const COOKIE_SECURE_VAR: &str = "SESSION_COOKIE_SECURE";
const SAME_SITE_VAR: &str = "SESSION_SAMESITE";
const ALLOW_EPHEMERAL_VAR: &str = "SESSION_ALLOW_EPHEMERAL";
const DEFAULT_KEY_FILE: &str = "/var/run/secrets/session_key";

/// Key bytes required in release builds.
const RELEASE_KEY_LEN: usize = 64;
/// `Key::derive_from` panics below this length.
const DERIVABLE_KEY_LEN: usize = 32;
const FINGERPRINT_LEN: usize = 8;

/// Strictness applied to the environment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildMode {
    Debug,
    Release,
}

impl BuildMode {
    /// `Debug` exactly when `debug_assertions` are on.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use backend::inbound::http::session_config::BuildMode;
    ///
    /// let mode = BuildMode::from_debug_assertions();
    /// assert_eq!(mode == BuildMode::Debug, cfg!(debug_assertions));
    /// ```
    #[must_use]
    pub fn from_debug_assertions() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Release
        }
    }

    fn key_len(self) -> usize {
        match self {
            Self::Debug => DERIVABLE_KEY_LEN,
            Self::Release => RELEASE_KEY_LEN,
        }
    }
}

/// Validated cookie settings.
#[derive(Clone)]
pub struct SessionSettings {
    pub key: Key,
    pub cookie_secure: bool,
    pub same_site: SameSite,
}

impl SessionSettings {
    /// First bytes of the SHA-256 of the signing key, hex encoded, for logs.
    #[must_use]
    pub fn key_fingerprint(&self) -> String {
        hex::encode(&Sha256::digest(self.key.signing())[..FINGERPRINT_LEN])
    }

    /// Private (encrypted) cookie sessions that live for seven days.
    #[must_use]
    pub fn middleware(&self) -> SessionMiddleware<CookieSessionStore> {
        SessionMiddleware::builder(CookieSessionStore::default(), self.key.clone())
            .cookie_name(SESSION_COOKIE_NAME.to_owned())
            .cookie_path("/".to_owned())
            .cookie_http_only(true)
            .cookie_secure(self.cookie_secure)
            .cookie_same_site(self.same_site)
            .cookie_content_security(CookieContentSecurity::Private)
            .session_lifecycle(PersistentSession::default().session_ttl(SESSION_TTL))
            .build()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SessionConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },
    #[error("{name}='{value}' is invalid; expected {expected}")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("cannot read session key {path}: {source}")]
    KeyUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("session key {path} holds {length} bytes; at least {required} are required")]
    KeyTooShort {
        path: PathBuf,
        length: usize,
        required: usize,
    },
    #[error("SESSION_SAMESITE=None needs SESSION_COOKIE_SECURE=1")]
    SameSiteNoneNeedsSecure,
    #[error("SESSION_ALLOW_EPHEMERAL cannot be enabled in release builds")]
    EphemeralKeyInRelease,
}

/// Read and validate the session variables.
///
/// # Errors
/// Any [`SessionConfigError`] in release builds. Debug builds only fail on a
/// key file that exists but is too short.
///
/// # Examples
///
/// ```rust
/// use backend::inbound::http::session_config::{BuildMode, session_settings_from_env};
/// use mockable::MockEnv;
///
/// let mut env = MockEnv::new();
/// env.expect_string().returning(|name| match name {
///     "SESSION_KEY_FILE" => Some("/nonexistent/session_key".to_owned()),
///     _ => None,
/// });
///
/// let settings = session_settings_from_env(&env, BuildMode::Debug).expect("debug defaults");
/// assert!(settings.cookie_secure);
/// ```
pub fn session_settings_from_env<E: Env>(
    env: &E,
    mode: BuildMode,
) -> Result<SessionSettings, SessionConfigError> {
    let reader = EnvReader { env, mode };
    let cookie_secure = reader.value(COOKIE_SECURE_VAR, BOOL_FORMS, true, parse_bool)?;
    let same_site =
        reader.value(SAME_SITE_VAR, "Strict|Lax|None", SameSite::Lax, parse_same_site)?;
    if same_site == SameSite::None && !cookie_secure {
        if mode == BuildMode::Release {
            return Err(SessionConfigError::SameSiteNoneNeedsSecure);
        }
        warn!("SameSite=None without Secure; browsers may drop the cookie");
    }
    if reader.value(ALLOW_EPHEMERAL_VAR, BOOL_FORMS, false, parse_bool)?
        && mode == BuildMode::Release
    {
        return Err(SessionConfigError::EphemeralKeyInRelease);
    }

    Ok(SessionSettings {
        key: reader.key()?,
        cookie_secure,
        same_site,
    })
}

const BOOL_FORMS: &str = "1|0|true|false|yes|no|y|n";

struct EnvReader<'a, E> {
    env: &'a E,
    mode: BuildMode,
}

impl<E: Env> EnvReader<'_, E> {
    /// Parse `name`, substituting `debug_default` in debug builds when the
    /// variable is absent or malformed.
    fn value<T: Copy + Display>(
        &self,
        name: &'static str,
        expected: &'static str,
        debug_default: T,
        parse: fn(&str) -> Option<T>,
    ) -> Result<T, SessionConfigError> {
        let raw = self.env.string(name);
        let parsed = raw.as_deref().map(parse);
        let error = match parsed {
            Some(Some(value)) => return Ok(value),
            Some(None) => SessionConfigError::Invalid {
                name,
                value: raw.unwrap_or_default(),
                expected,
            },
            None => SessionConfigError::Missing { name },
        };
        match self.mode {
            BuildMode::Release => Err(error),
            BuildMode::Debug => {
                warn!(%error, default = %debug_default, "using default session setting");
                Ok(debug_default)
            }
        }
    }

    fn key(&self) -> Result<Key, SessionConfigError> {
        let path = PathBuf::from(
            self.env
                .string(KEY_FILE_VAR)
                .unwrap_or_else(|| DEFAULT_KEY_FILE.to_owned()),
        );
        let mut bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) if self.mode == BuildMode::Debug => {
                warn!(path = %path.display(), %error, "generated a throwaway session key");
                return Ok(Key::generate());
            }
            Err(source) => return Err(SessionConfigError::KeyUnreadable { path, source }),
        };
        let required = self.mode.key_len();
        let key = if bytes.len() < required {
            Err(SessionConfigError::KeyTooShort {
                length: bytes.len(),
                path,
                required,
            })
        } else {
            Ok(Key::derive_from(&bytes))
        };
        bytes.zeroize();
        key
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_same_site(raw: &str) -> Option<SameSite> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "strict" => Some(SameSite::Strict),
        "lax" => Some(SameSite::Lax),
        "none" => Some(SameSite::None),
        _ => None,
    }
}
