use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::wholesale::{PlaceWholesaleOrderRequest, WholesaleOrderList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::WholesaleOrder,
    response::ApiResponse,
    routes::params::Pagination,
    services::wholesale_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(place_order))
        .route("/orders/{id}/accept", post(accept_order))
        .route("/orders/{id}/complete", post(complete_order))
}

#[utoipa::path(
    get,
    path = "/api/wholesale/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Bulk orders for the caller: placed for retailers, received for wholesalers", body = ApiResponse<WholesaleOrderList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Wholesale"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<WholesaleOrderList>>> {
    let resp = wholesale_service::list_orders(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/wholesale/orders",
    request_body = PlaceWholesaleOrderRequest,
    responses(
        (status = 200, description = "Retailer places a bulk order with a wholesaler", body = ApiResponse<WholesaleOrder>),
        (status = 400, description = "Bad quantity or not a wholesale listing"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Wholesale"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PlaceWholesaleOrderRequest>,
) -> AppResult<Json<ApiResponse<WholesaleOrder>>> {
    let resp = wholesale_service::place_order(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/wholesale/orders/{id}/accept",
    params(
        ("id" = Uuid, Path, description = "Wholesale order ID")
    ),
    responses(
        (status = 200, description = "pending -> processing", body = ApiResponse<WholesaleOrder>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Order is not pending"),
    ),
    security(("bearer_auth" = [])),
    tag = "Wholesale"
)]
pub async fn accept_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<WholesaleOrder>>> {
    let resp = wholesale_service::accept_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/wholesale/orders/{id}/complete",
    params(
        ("id" = Uuid, Path, description = "Wholesale order ID")
    ),
    responses(
        (status = 200, description = "processing -> completed", body = ApiResponse<WholesaleOrder>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Order is not processing"),
    ),
    security(("bearer_auth" = [])),
    tag = "Wholesale"
)]
pub async fn complete_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<WholesaleOrder>>> {
    let resp = wholesale_service::complete_order(&state, &user, id).await?;
    Ok(Json(resp))
}
