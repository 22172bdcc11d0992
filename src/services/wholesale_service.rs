use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::wholesale::{PlaceWholesaleOrderRequest, WholesaleOrderList},
    entity::{
        products::Entity as Products,
        wholesale_orders::{
            ActiveModel as WholesaleActive, Column as WholesaleCol, Entity as WholesaleOrders,
            Model as WholesaleModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_retailer, ensure_wholesaler},
    models::{ROLE_RETAILER, ROLE_WHOLESALER, WholesaleOrder, WholesaleStatus},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::notification_service,
    state::AppState,
};

/// Retailer places a bulk order against a wholesaler's listing. Wholesaler
/// stock is not decremented here; bulk fulfilment is settled off-platform
/// when the wholesaler completes the order.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceWholesaleOrderRequest,
) -> AppResult<ApiResponse<WholesaleOrder>> {
    ensure_retailer(user)?;

    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("product not found".to_string())),
    };
    if product.seller_role != ROLE_WHOLESALER {
        return Err(AppError::BadRequest(
            "product is not a wholesale listing".to_string(),
        ));
    }

    let order = WholesaleActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        product_name: Set(product.name.clone()),
        quantity: Set(payload.quantity),
        wholesaler_id: Set(product.seller_id),
        retailer_id: Set(user.user_id),
        status: Set(WholesaleStatus::Pending.as_str().into()),
        total_price: Set(product.price * payload.quantity as i64),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = notification_service::notify(
        &state.pool,
        order.wholesaler_id,
        "New bulk order received",
        &format!(
            "Bulk order {} for {} x {}",
            order.id, order.quantity, order.product_name
        ),
        "wholesale_order",
        Some(order.id),
    )
    .await
    {
        tracing::warn!(error = %err, "notification failed");
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "wholesale_order_place",
        Some("wholesale_orders"),
        Some(serde_json::json!({ "order_id": order.id, "quantity": order.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order placed",
        wholesale_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<WholesaleOrderList>> {
    let (page, limit, offset) = pagination.normalize();

    let mut condition = Condition::all();
    condition = match user.role.as_str() {
        ROLE_RETAILER => condition.add(WholesaleCol::RetailerId.eq(user.user_id)),
        ROLE_WHOLESALER => condition.add(WholesaleCol::WholesalerId.eq(user.user_id)),
        _ => return Err(AppError::Forbidden),
    };

    let finder = WholesaleOrders::find()
        .filter(condition)
        .order_by_desc(WholesaleCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(wholesale_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        WholesaleOrderList { items },
        Some(meta),
    ))
}

pub async fn accept_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<WholesaleOrder>> {
    advance_order(
        state,
        user,
        id,
        WholesaleStatus::Pending,
        WholesaleStatus::Processing,
        "wholesale_order_accept",
    )
    .await
}

pub async fn complete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<WholesaleOrder>> {
    advance_order(
        state,
        user,
        id,
        WholesaleStatus::Processing,
        WholesaleStatus::Completed,
        "wholesale_order_complete",
    )
    .await
}

/// Same guarded write as the customer-order machine: row lock plus an
/// expected-prior-status check, so concurrent advances cannot both apply.
async fn advance_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    from: WholesaleStatus,
    to: WholesaleStatus,
    action: &str,
) -> AppResult<ApiResponse<WholesaleOrder>> {
    ensure_wholesaler(user)?;
    debug_assert!(from.can_advance_to(to));

    let txn = state.orm.begin().await?;

    let order = WholesaleOrders::find()
        .filter(
            Condition::all()
                .add(WholesaleCol::Id.eq(id))
                .add(WholesaleCol::WholesalerId.eq(user.user_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.status != from.as_str() {
        return Err(AppError::InvalidTransition {
            from: order.status.clone(),
            to: to.as_str().into(),
        });
    }

    let retailer_id = order.retailer_id;
    let mut active: WholesaleActive = order.into();
    active.status = Set(to.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = notification_service::notify(
        &state.pool,
        retailer_id,
        "Bulk order status updated",
        &format!("Bulk order {} is now {}", order.id, order.status),
        "wholesale_order",
        Some(order.id),
    )
    .await
    {
        tracing::warn!(error = %err, "notification failed");
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        action,
        Some("wholesale_orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        wholesale_from_entity(order),
        Some(Meta::empty()),
    ))
}

fn wholesale_from_entity(model: WholesaleModel) -> WholesaleOrder {
    WholesaleOrder {
        id: model.id,
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        wholesaler_id: model.wholesaler_id,
        retailer_id: model.retailer_id,
        status: model.status,
        total_price: model.total_price,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
