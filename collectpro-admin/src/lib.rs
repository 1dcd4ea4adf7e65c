//! # CollectPro admin function
//!
//! A small HTTP service that revokes every session of a user ("global
//! sign-out"). It accepts `POST /` (or `POST /sign-out`) with a JSON body
//! `{ "userId": "..." }` and answers `{ "success": true }`, or
//! `{ "error": "..." }` with status 400.
//!
//! Every response carries CORS headers. `OPTIONS` requests are answered
//! with an empty 200 by the CORS layer and never reach the handler.
//!
//! ## Configuration
//!
//! | Variable | Default |
//! |---|---|
//! | `ADMIN_PORT` | `8787` |
//! | `BACKEND_URL` | required |
//! | `BACKEND_SERVICE_ROLE_KEY` | required (env or `/run/secrets`) |
//! | `CORS_ALLOWED_ORIGINS` | `*` |
//! | `CORS_ALLOW_CREDENTIALS` | `true` |

use std::sync::Arc;

use axum::{Router, routing::post};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

pub mod auth_admin;
pub mod config;
pub mod cors;
pub mod error;
pub mod handlers;

pub use auth_admin::{AuthAdmin, HttpAuthAdmin};
pub use config::{AdminConfig, AllowedOrigins, CorsConfig};
pub use error::{AdminError, AdminResult};
pub use handlers::{SignOutRequest, SignOutResponse};

use cors::cors_layer;
use handlers::{SharedAdmin, sign_out_handler};

pub fn router(admin: SharedAdmin, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/", post(sign_out_handler))
        .route("/sign-out", post(sign_out_handler))
        .layer(cors_layer(cors))
        .with_state(admin)
}

/// Binds the configured port and serves until Ctrl+C or SIGTERM.
pub async fn serve(config: AdminConfig) -> AdminResult<()> {
    let admin: SharedAdmin = Arc::new(HttpAuthAdmin::new(
        &config.backend_url,
        &config.service_role_key,
    )?);
    let app = router(admin, &config.cors);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("admin function listening on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("admin function stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(e) => {
                error!("failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
