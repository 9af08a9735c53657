use axum::{
    Router,
    extract::{DefaultBodyLimit, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post, put},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Basic},
};

use std::sync::Arc;

use crate::{accounts, auth, labels, ledger, listings, orders, pricing, products};
use engine::{Engine, EngineError};

/// Largest accepted request body (uploads included).
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

/// Basic auth with the account email as username.
///
/// The authenticated `engine::Account` is stored in the request extensions.
async fn authenticate(
    auth_header: TypedHeader<Authorization<Basic>>,
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth_header.username().is_empty() || auth_header.password().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let account = match state
        .engine
        .authenticate(auth_header.username(), auth_header.password())
        .await
    {
        Ok(account) => account,
        Err(EngineError::EmailNotVerified) => return Err(StatusCode::FORBIDDEN),
        Err(EngineError::Database(err)) => {
            tracing::error!("authentication failed: {err}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Err(_) => return Err(StatusCode::UNAUTHORIZED),
    };

    request.extensions_mut().insert(account);
    Ok(next.run(request).await)
}

pub fn router(engine: Arc<Engine>) -> Router {
    let state = ServerState { engine };

    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/verify", post(auth::verify_email))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/listing-removal", post(accounts::listing_removal));

    let protected = Router::new()
        .route("/me", get(accounts::me))
        .route("/me/password", post(auth::change_password))
        .route("/me/avatar", put(accounts::set_avatar))
        .route("/me/ledger", get(ledger::my_history))
        .route("/accounts", get(accounts::list))
        .route("/accounts/{id}/flags", patch(accounts::update_flags))
        .route("/accounts/{id}/balance", get(ledger::balance))
        .route("/accounts/{id}/ledger", get(ledger::history))
        .route("/accounts/{id}/audit", get(ledger::audit))
        .route("/payments", post(ledger::record_payment))
        .route("/listings", get(listings::mine).post(listings::submit))
        .route("/listings/{id}/file", get(listings::file))
        .route("/listings/{id}/review", post(listings::review))
        .route("/admin/listings", get(listings::all))
        .route("/products", get(products::page))
        .route("/products/proposals", post(listings::propose))
        .route("/products/restock", post(listings::restock))
        .route("/products/sku/{sku}", patch(products::update_details))
        .route("/products/{id}/image", put(products::set_image))
        .route("/admin/products/{id}", patch(products::admin_update))
        .route("/orders", get(orders::mine).post(orders::upload))
        .route("/orders/{id}", get(orders::detail))
        .route("/orders/{id}/lines", get(orders::lines))
        .route("/orders/{id}/export", get(orders::export))
        .route("/orders/{id}/tracking", post(orders::import_tracking))
        .route("/orders/{id}/status", patch(orders::set_status))
        .route("/orders/{id}/invoice-preview", get(orders::invoice_preview))
        .route(
            "/orders/{id}/invoice",
            get(orders::invoice).put(orders::attach_invoice),
        )
        .route("/order-lines/{id}/tracking", patch(orders::update_tracking))
        .route("/admin/orders/pending", get(orders::pending))
        .route("/admin/accounts/{email}/orders", get(orders::by_email))
        .route(
            "/price-bands/{kind}",
            get(pricing::list).put(pricing::upsert),
        )
        .route("/price-bands/{kind}/quote", get(pricing::quote))
        .route("/label-orders", get(labels::mine).post(labels::create))
        .route("/label-orders/{id}/output", put(labels::deliver))
        .route("/label-orders/{id}/file", get(labels::file))
        .route("/admin/label-orders", get(labels::all))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate));

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

pub async fn run(engine: Engine, addr: &str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener on {addr}: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(Arc::new(engine))).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
