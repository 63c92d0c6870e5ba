use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use validator::{Validate, ValidationErrors};

use crate::api::requests::{DeductRequest, ListLedgerEntriesQuery, PurchaseRequest, RechargeRequest};
use crate::api::responses::{
    ApiResponse, ErrorResponse, HealthResponse, LedgerEntryResponse, LedgerReceiptResponse,
    NotifyResponse, PaginatedResponse, PurchaseResponse, ReconciliationResponse,
    ValidationErrorDetail, WalletResponse,
};
use crate::error::AppError;
use crate::gateway::NotificationHeaders;
use crate::models::OwnershipRecord;

use super::routes::AppState;

type ApiError = (StatusCode, Json<ApiResponse<()>>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Maps a service error onto an HTTP status and body. Infrastructure faults
/// are logged and replaced with a generic message.
pub fn error_response(err: AppError) -> ApiError {
    let status = match &err {
        AppError::WalletNotFound(_) | AppError::ItemNotFound(_) | AppError::OrderNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        AppError::IntegrityError { .. } | AppError::WalletFrozen(_) => StatusCode::CONFLICT,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(code = err.code(), "Request failed: {}", err);
        ErrorResponse::new(err.code(), "An internal error occurred")
    } else {
        ErrorResponse::new(err.code(), err.to_string())
    };

    (status, Json(ApiResponse::<()>::error(body)))
}

fn validation_response(errors: ValidationErrors) -> ApiError {
    let details: Vec<ValidationErrorDetail> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |e| ValidationErrorDetail {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();

    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error(
            ErrorResponse::new("VALIDATION_ERROR", "Request validation failed")
                .with_details(details),
        )),
    )
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let database = match &state.pool {
        Some(pool) => Some(sqlx::query("SELECT 1").fetch_one(pool).await.is_ok()),
        None => None,
    };

    let response = HealthResponse {
        status: if database == Some(false) {
            "degraded".to_string()
        } else {
            "healthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        database,
    };

    Json(ApiResponse::success(response))
}

/// Readiness check endpoint.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    let Some(pool) = &state.pool else {
        return StatusCode::OK;
    };

    if sqlx::query("SELECT 1").fetch_one(pool).await.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Liveness check endpoint.
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus scrape endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed".to_string(),
        ),
    }
}

// ============================================================================
// Wallet Handlers
// ============================================================================

/// Current wallet state. An owner without a wallet reads as balance 0.
pub async fn get_wallet(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
) -> ApiResult<WalletResponse> {
    let wallet = state.ledger.wallet(owner_id).await.map_err(error_response)?;
    let response = wallet
        .map(WalletResponse::from)
        .unwrap_or_else(|| WalletResponse::empty(owner_id));
    Ok(Json(ApiResponse::success(response)))
}

/// Ledger history, newest first.
pub async fn get_wallet_ledger(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
    Query(query): Query<ListLedgerEntriesQuery>,
) -> ApiResult<PaginatedResponse<LedgerEntryResponse>> {
    let (limit, offset) = query.page();
    let entries = state
        .ledger
        .ledger_entries(owner_id, limit, offset)
        .await
        .map_err(error_response)?;

    let items = entries.into_iter().map(LedgerEntryResponse::from).collect();
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, limit, offset,
    ))))
}

pub async fn get_owned_items(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
) -> ApiResult<Vec<OwnershipRecord>> {
    let items = state
        .ledger
        .owned_items(owner_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(items)))
}

pub async fn recharge_wallet(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
    Json(request): Json<RechargeRequest>,
) -> ApiResult<LedgerReceiptResponse> {
    request.validate().map_err(validation_response)?;

    let receipt = state
        .ledger
        .recharge(owner_id, request.amount, request.reason.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(receipt.into())))
}

pub async fn deduct_wallet(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
    Json(request): Json<DeductRequest>,
) -> ApiResult<LedgerReceiptResponse> {
    request.validate().map_err(validation_response)?;

    let receipt = state
        .ledger
        .deduct(owner_id, request.amount, request.reason.as_deref(), None)
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(receipt.into())))
}

pub async fn purchase_item(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
    Json(request): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PurchaseResponse>>), ApiError> {
    request.validate().map_err(validation_response)?;

    let purchase = state
        .ledger
        .purchase_item(owner_id, request.item_id)
        .await
        .map_err(error_response)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(purchase.into())),
    ))
}

pub async fn reconcile_wallet(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
) -> ApiResult<ReconciliationResponse> {
    let report = state
        .ledger
        .reconcile(owner_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(report.into())))
}

/// Operator endpoint clearing the frozen flag of a repaired wallet.
pub async fn unfreeze_wallet(
    State(state): State<AppState>,
    Path(owner_id): Path<i64>,
) -> ApiResult<ReconciliationResponse> {
    let report = state
        .ledger
        .unfreeze_wallet(owner_id)
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(report.into())))
}

// ============================================================================
// Payment Notification Handler
// ============================================================================

/// Gateway webhook. Always answers 200; the body tells the gateway whether
/// to stop retrying.
pub async fn payment_notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<NotifyResponse>) {
    let headers = NotificationHeaders::from_header_map(&headers);
    let outcome = state.settlement.settle(&body, &headers).await;

    let response = if outcome.ack {
        NotifyResponse::success()
    } else {
        NotifyResponse::fail()
    };
    (StatusCode::OK, Json(response))
}
