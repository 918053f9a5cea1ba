//! Signed-in state carried by the session cookie.
//!
//! The cookie stores one key, the account id. Handlers extract
//! [`SessionContext`] and call [`SessionContext::current_user`]; a missing or
//! unreadable id surfaces as `401 Unauthorized`.

use actix_session::Session;
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use tracing::warn;

use crate::domain::{Error, UserId};

pub(crate) const USER_ID_KEY: &str = "user_id";

/// Extractor over the Actix session.
#[derive(Clone)]
pub struct SessionContext(Session);

impl SessionContext {
    /// Bind the session to `user_id`.
    ///
    /// The session id is rotated first, so whatever the client held before
    /// signing in is not reused.
    ///
    /// # Errors
    /// Internal error when the value cannot be serialised into the cookie.
    pub fn sign_in(&self, user_id: &UserId) -> Result<(), Error> {
        self.0.renew();
        self.0
            .insert(USER_ID_KEY, user_id.to_string())
            .map_err(|err| Error::internal(format!("could not write session: {err}")))
    }

    /// The signed-in account.
    ///
    /// # Errors
    /// `401` when nobody is signed in or the stored id is not a UUID.
    pub fn current_user(&self) -> Result<UserId, Error> {
        let stored = self
            .0
            .get::<String>(USER_ID_KEY)
            .map_err(|err| Error::internal(format!("could not read session: {err}")))?;
        let Some(raw) = stored else {
            return Err(Error::unauthorized("sign in required"));
        };
        UserId::new(&raw).map_err(|err| {
            warn!(error = %err, "discarding session with malformed user id");
            self.0.purge();
            Error::unauthorized("sign in required")
        })
    }

    /// Forget the signed-in account; the response expires the cookie.
    pub fn sign_out(&self) {
        self.0.purge();
    }
}

impl FromRequest for SessionContext {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let session = Session::from_request(req, payload);
        Box::pin(async move { Ok(Self(session.await?)) })
    }
}
