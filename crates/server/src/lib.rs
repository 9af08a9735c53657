use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::{Account, EngineError, Role};

use serde::Serialize;
pub use server::{router, run, run_with_listener, spawn_with_listener};

mod accounts;
mod auth;
mod labels;
mod ledger;
mod listings;
mod orders;
mod pricing;
mod products;
mod server;
mod views;

pub mod types {
    pub use api_types::{AccountRole, Outcome, Page, PageQuery, UploadQuery};

    pub mod auth {
        pub use api_types::auth::{
            ChangePassword, ForgotPassword, Login, Register, ResetPassword, VerifyEmail,
        };
    }

    pub mod account {
        pub use api_types::account::{AccountFlags, AccountView, ListingRemoval, Profile};
    }

    pub mod ledger {
        pub use api_types::ledger::{
            Audit, Balance, EntryType, HistoryQuery, LedgerEntryView, PaymentNew,
        };
    }

    pub mod listing {
        pub use api_types::listing::{
            Decision, ListingAdminView, ListingStatus, ListingView, ListingsQuery,
            ProductProposal, Restock, Review,
        };
    }

    pub mod product {
        pub use api_types::product::{AdminUpdate, DetailsUpdate, ProductView};
    }

    pub mod order {
        pub use api_types::order::{
            InvoiceLineView, InvoicePreviewView, InvoiceQuery, OrderDetailView, OrderLineView,
            OrderView, StatusUpdate, TrackingImported, TrackingUpdate,
        };
    }

    pub mod pricing {
        pub use api_types::pricing::{BandKind, PriceBandUpsert, PriceBandView, WeightQuery};
    }

    pub mod label {
        pub use api_types::label::{FileQuery, LabelOrderNew, LabelOrderView, LabelOrdersQuery};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::Forbidden(_) | EngineError::EmailNotVerified => StatusCode::FORBIDDEN,
        EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
        EngineError::KeyNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) | EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::Database(_) | EngineError::Storage(_) | EngineError::Hashing(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        EngineError::InvalidAmount(_)
        | EngineError::InvalidInput(_)
        | EngineError::InvalidCsv(_)
        | EngineError::InsufficientStock(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::Storage(reason) => {
            tracing::error!("storage error: {reason}");
            "internal server error".to_string()
        }
        EngineError::Hashing(reason) => {
            tracing::error!("password hashing error: {reason}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

pub(crate) fn require_admin(account: &Account) -> Result<(), ServerError> {
    if account.is_admin() {
        return Ok(());
    }
    Err(EngineError::Forbidden("admin only".to_string()).into())
}

pub(crate) fn require_client(account: &Account) -> Result<(), ServerError> {
    if account.role == Role::Client {
        return Ok(());
    }
    Err(EngineError::Forbidden("client accounts only".to_string()).into())
}

/// Admins may act on any account, everybody else only on their own.
pub(crate) fn require_self_or_admin(account: &Account, account_id: i64) -> Result<(), ServerError> {
    if account.is_admin() || account.id == account_id {
        return Ok(());
    }
    Err(EngineError::Forbidden("account belongs to somebody else".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_forbidden_maps_to_403() {
        let res = ServerError::from(EngineError::Forbidden("forbidden".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let res = ServerError::from(EngineError::EmailNotVerified).into_response();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn engine_unauthorized_maps_to_401() {
        let res = ServerError::from(EngineError::Unauthorized).into_response();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::KeyNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflicts_map_to_409() {
        let res = ServerError::from(EngineError::ExistingKey("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
        let res = ServerError::from(EngineError::Conflict("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_422() {
        for err in [
            EngineError::InvalidAmount("x".to_string()),
            EngineError::InvalidInput("x".to_string()),
            EngineError::InvalidCsv("x".to_string()),
            EngineError::InsufficientStock("x".to_string()),
        ] {
            let res = ServerError::from(err).into_response();
            assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn storage_maps_to_500() {
        let res = ServerError::from(EngineError::Storage("disk full".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let res = ServerError::from(EngineError::Hashing("bad salt".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
