//! Documentation of a shared grocery cart for roommates.
//!
//!
//!
//! # General Infrastructure
//! - One axum server renders every page as HTML, no separate frontend
//! - SQLite holds users, the catalog, carts and sessions (see `bank`)
//! - Product images are served from `STATIC_DIR` under `/static`
//! - The catalog is loaded ahead of time with the `process` CLI
//!
//!
//!
//! # Carts
//!
//! **Goal**: Everyone in the flat adds to the same cart, then one person checks out.
//!
//! - A user belongs to the carts listed in `cart_users`
//! - The lowest-id cart is *the* cart for that user
//! - A user with no cart joins the one named `SHARED_CART_NAME`, created on first use
//! - Items remember who added them, so checkout can split the bill per person
//! - Changes to an item outside the user's cart are refused with a flash message
//!
//!
//!
//! # Sessions
//!
//! Server-side, keyed by the `sessionid` cookie. See [`session`].
//! Expired rows are purged hourly.
//!
//!
//!
//! # Environment
//!
//! | Variable           | Default         |
//! |--------------------|-----------------|
//! | `RUST_PORT`        | `8000`          |
//! | `DATABASE_PATH`    | `sharedcart.db` |
//! | `STATIC_DIR`       | `static`        |
//! | `SESSION_TTL_SECS` | `1209600`       |
//! | `SHARED_CART_NAME` | `Shared Cart`   |
//! | `RUST_LOG`         | unset           |
//!
//!
//!
//! # Setup
//!
//! Load a catalog.
//! ```sh
//! cargo run -p process -- catalog.json --database sharedcart.db
//! ```
//!
//! Run the server.
//! ```sh
//! RUST_LOG=info cargo run -p sharedcart
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{future::pending, sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use chrono::Utc;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::{net::TcpListener, signal::ctrl_c, time::interval};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod forms;
pub mod pages;
pub mod routes;
pub mod session;
pub mod state;
pub mod utils;

use error::AppError;
use routes::{
    add_to_cart_handler, checkout_handler, home_handler, login_handler, login_page_handler,
    logout_handler, remove_from_cart_handler, shared_cart_handler, signup_handler,
    signup_page_handler, signup_step2_handler, signup_step2_page_handler, supermarkets_handler,
    update_quantity_handler,
};
use state::State;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub fn app(state: Arc<State>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(home_handler))
        .route("/login/", get(login_page_handler).post(login_handler))
        .route("/logout/", get(logout_handler).post(logout_handler))
        .route("/signup/", get(signup_page_handler).post(signup_handler))
        .route(
            "/signup/step2/",
            get(signup_step2_page_handler).post(signup_step2_handler),
        )
        .route("/supermarkets/", get(supermarkets_handler))
        .route("/cart/", get(shared_cart_handler))
        .route("/cart/add/{product_id}/", post(add_to_cart_handler))
        .route("/cart/remove/{item_id}/", post(remove_from_cart_handler))
        .route("/cart/update/{item_id}/", post(update_quantity_handler))
        .route("/checkout/", get(checkout_handler))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server() -> Result<(), AppError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await?;

    tokio::spawn(purge_sessions(state.clone()));

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| AppError::InternalError(Box::new(e)))?;
    info!("Server running on {address}");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::InternalError(Box::new(e)))?;

    info!("Server shut down");
    Ok(())
}

async fn purge_sessions(state: Arc<State>) {
    let mut ticker = interval(SESSION_PURGE_INTERVAL);

    loop {
        ticker.tick().await;

        let now = Utc::now().timestamp();
        match state
            .db
            .call(move |conn| bank::sessions::purge_expired(conn, now))
            .await
        {
            Ok(0) => {}
            Ok(purged) => info!("Purged {purged} expired sessions"),
            Err(e) => warn!("Session purge failed: {e}"),
        }
    }
}

async fn shutdown_signal() {
    tokio::select! {
        () = interrupted() => info!("Received Ctrl+C, shutting down"),
        () = terminated() => info!("Received terminate signal, shutting down"),
    }
}

async fn interrupted() {
    if let Err(e) = ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {e}");
        pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminated() {
    let mut stream = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to install signal handler: {e}");
            return pending().await;
        }
    };

    stream.recv().await;
}

#[cfg(not(unix))]
async fn terminated() {
    pending::<()>().await;
}
