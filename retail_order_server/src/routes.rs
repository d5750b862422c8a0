//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the storage backend traits; the server registers them against [`SqliteDatabase`] and
//! the endpoint tests register them against mockall mocks. Registration happens with explicit turbofish types in
//! [`crate::server`], since actix cannot infer generics in handlers.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use log::*;
use retail_order_engine::{
    db_types::{BuyerId, OrderId},
    order_objects::{OrderQueryFilter, Pagination},
    traits::{CheckoutDatabase, OrderFlowDatabase, OrderManagement},
    CheckoutApi,
    CheckoutRequest,
    OrderFlowApi,
    OrderQueryApi,
};
use serde::Deserialize;

use crate::{
    config::{ServerConfig, ADMIN_API_KEY_HEADER, BUYER_ID_HEADER},
    data_objects::{CheckoutResponse, CheckoutSubmission, MarkPaidRequest, StatusUpdateRequest},
    errors::ServerError,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------  Checkout  ---------------------------------------------------
/// Route handler for checkout submissions.
///
/// The buyer identity arrives in the `X-Buyer-Id` header, installed by the upstream auth collaborator; requests
/// without one are rejected before anything is read from the body. Promotion failures do not fail the request: the
/// response carries the created order plus a warning describing why the code was not applied.
pub async fn checkout<B: CheckoutDatabase>(
    req: HttpRequest,
    body: web::Json<CheckoutSubmission>,
    api: web::Data<CheckoutApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let customer_id = buyer_from_headers(&req)?;
    let submission = body.into_inner();
    trace!("💻️ Received checkout request from {customer_id}");
    let expected_total = submission.expected_total;
    let request = CheckoutRequest {
        customer_id,
        shipping: submission.shipping,
        promotion_code: submission.promotion_code,
        payment_method: submission.payment_method,
    };
    let receipt = api.checkout(request).await?;
    let total_mismatch = expected_total.is_some_and(|t| t != receipt.order.total);
    if total_mismatch {
        info!(
            "💻️ Client-declared total {} disagrees with computed total {} for order [{}]",
            expected_total.unwrap_or_default(),
            receipt.order.total,
            receipt.order.order_id
        );
    }
    Ok(HttpResponse::Ok().json(CheckoutResponse {
        order: receipt.order,
        discount_warning: receipt.discount_warning,
        total_mismatch,
    }))
}

// -----------------------------------------------  Cancel  ----------------------------------------------------
/// Buyer- or admin-initiated cancellation. A matching admin API key acts as the system override; otherwise the
/// caller must be the buyer the order belongs to.
pub async fn cancel_order<B: OrderFlowDatabase>(
    req: HttpRequest,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let actor = actor_from_headers(&req, &config)?;
    let order = api.cancel_order(&order_id, &actor).await?;
    Ok(HttpResponse::Ok().json(order))
}

// ---------------------------------------------  Admin: read  -------------------------------------------------
pub async fn order_by_id<B: OrderManagement>(
    path: web::Path<String>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let details = api
        .order_details(&order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    Ok(HttpResponse::Ok().json(details))
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderSearchParams {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: Option<retail_order_engine::db_types::OrderStatusType>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn search_orders<B: OrderManagement>(
    params: web::Query<OrderSearchParams>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = params.into_inner();
    let mut filter = OrderQueryFilter::default();
    if let Some(customer_id) = params.customer_id {
        filter = filter.with_customer_id(customer_id);
    }
    if let Some(status) = params.status {
        filter = filter.with_status(status);
    }
    let mut pagination = Pagination::default();
    if let Some(offset) = params.offset {
        pagination.offset = offset;
    }
    if let Some(limit) = params.limit {
        pagination.limit = limit;
    }
    trace!("💻️ Order search: {filter}");
    let orders = api.search_orders(filter, pagination).await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub async fn order_stats<B: OrderManagement>(
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let stats = api.statistics().await?;
    Ok(HttpResponse::Ok().json(stats))
}

pub async fn unattributed_payments<B: OrderManagement>(
    pagination: web::Query<Pagination>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let events = api.unattributed_events(pagination.into_inner()).await?;
    Ok(HttpResponse::Ok().json(events))
}

// --------------------------------------------  Admin: write  -------------------------------------------------
pub async fn update_order_status<B: OrderFlowDatabase>(
    path: web::Path<String>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let new_status = body.into_inner().status;
    debug!("💻️ Admin status override for order [{order_id}]: {new_status}");
    let changed = api.modify_status_for_order(&order_id, new_status).await?;
    Ok(HttpResponse::Ok().json(changed.order))
}

pub async fn mark_order_paid<B: OrderFlowDatabase>(
    path: web::Path<String>,
    body: web::Json<MarkPaidRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId(path.into_inner());
    let reason = body.into_inner().reason;
    debug!("💻️ Admin manual settlement for order [{order_id}]");
    let outcome = api.mark_order_paid(&order_id, &reason).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

// -----------------------------------------------  helpers  ---------------------------------------------------
fn buyer_from_headers(req: &HttpRequest) -> Result<String, ServerError> {
    req.headers()
        .get(BUYER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::InsufficientPermissions("No buyer identity on the request.".to_string()))
}

/// Resolves the acting identity for mutations that both buyers and admins may perform.
fn actor_from_headers(req: &HttpRequest, config: &ServerConfig) -> Result<BuyerId, ServerError> {
    let admin_key = config.admin_api_key.reveal();
    let supplied = req.headers().get(ADMIN_API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if let Some(key) = supplied {
        if !admin_key.is_empty() && key == admin_key {
            return Ok(BuyerId::SystemAdminOverride);
        }
        return Err(ServerError::InsufficientPermissions("Invalid API key.".to_string()));
    }
    buyer_from_headers(req).map(BuyerId::Registered)
}
