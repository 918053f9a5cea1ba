//! Assembly of the Actix server: state, middleware and routes.

mod config;
#[cfg(feature = "metrics")]
mod metrics;
mod state_builders;

pub use config::ServerConfig;

#[cfg(feature = "metrics")]
use metrics::MetricsLayer;
use state_builders::build_http_state;

use actix_web::dev::{Server, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};

use backend::Trace;
#[cfg(debug_assertions)]
use backend::doc::ApiDoc;
use backend::inbound::http::configure_api;
use backend::inbound::http::health::{HealthState, live, ready};
use backend::inbound::http::session_config::SessionSettings;
use backend::inbound::http::state::HttpState;
#[cfg(debug_assertions)]
use utoipa::OpenApi;
#[cfg(debug_assertions)]
use utoipa_swagger_ui::SwaggerUi;

/// Shared pieces each worker's `App` is assembled from.
#[derive(Clone)]
struct Wiring {
    health: web::Data<HealthState>,
    state: web::Data<HttpState>,
    session: SessionSettings,
}

impl Wiring {
    /// Probes at the root, the session-guarded API under `/api`, and the
    /// Swagger UI at `/docs` in debug builds.
    fn into_app(
        self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let app = App::new()
            .wrap(Trace)
            .app_data(self.health)
            .app_data(self.state)
            .service(ready)
            .service(live)
            .service(
                web::scope("/api")
                    .wrap(self.session.middleware())
                    .configure(configure_api),
            );

        #[cfg(debug_assertions)]
        let app = app.service(
            SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );

        app
    }
}

/// Bind the listener for `config` and return the running server.
///
/// `health` flips to ready once the socket is bound.
///
/// # Errors
/// An adapter cannot be configured, metrics registration fails, or the
/// address cannot be bound.
pub fn create_server(
    health: web::Data<HealthState>,
    config: ServerConfig,
) -> std::io::Result<Server> {
    let wiring = Wiring {
        health: health.clone(),
        state: build_http_state(&config)?,
        session: config.session,
    };
    #[cfg(feature = "metrics")]
    let metrics = MetricsLayer::from_option(config.prometheus);

    let server = HttpServer::new(move || {
        let app = wiring.clone().into_app();
        #[cfg(feature = "metrics")]
        let app = app.wrap(metrics.clone());
        app
    })
    .bind(config.bind_addr)?
    .run();

    health.mark_ready();
    Ok(server)
}
