//! HTTP inbound adapter exposing the REST API under `/api`.

pub mod analyze;
pub mod auth;
pub mod error;
pub mod health;
pub mod saved_answers;
pub mod session;
pub mod session_config;
pub mod state;
pub mod stripe;
pub mod subscription;
#[cfg(test)]
pub mod test_utils;
pub mod tokens;
pub(crate) mod validation;

use actix_web::web;

pub use error::ApiResult;
use error::{json_error_handler, path_error_handler};

/// Largest JSON body accepted; inline images arrive base64-encoded.
pub const JSON_BODY_LIMIT: usize = 12 * 1024 * 1024;

/// Register every `/api` handler and the extractor configuration they share.
///
/// Mount inside a scope that carries the session middleware.
///
/// # Examples
/// ```
/// use actix_web::{App, web};
/// use backend::inbound::http::configure_api;
///
/// let app = App::new().service(web::scope("/api").configure(configure_api));
/// ```
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_BODY_LIMIT)
            .error_handler(json_error_handler),
    )
    .app_data(web::PathConfig::default().error_handler(path_error_handler))
    .service(auth::register)
    .service(auth::login)
    .service(auth::logout)
    .service(auth::current_user)
    .service(auth::update_profile)
    .service(auth::delete_account)
    .service(auth::forgot_password)
    .service(auth::reset_password)
    .service(tokens::balance)
    .service(tokens::purchases)
    .service(tokens::packages)
    .service(tokens::deduct)
    .service(subscription::current)
    .service(subscription::check_premium)
    .service(saved_answers::list)
    .service(saved_answers::create)
    .service(saved_answers::get_one)
    .service(saved_answers::delete_one)
    .service(analyze::analyze)
    .service(stripe::create_token_checkout)
    .service(stripe::create_subscription_checkout)
    .service(stripe::webhook);
}
