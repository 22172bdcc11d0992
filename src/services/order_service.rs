use chrono::{Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CheckoutRequest, CheckoutResponse, OrderList, OrderWithItems},
    entity::{
        cart_items::{self, Column as CartCol, Entity as CartItems},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer, ensure_retailer},
    models::{Order, OrderItem, OrderStatus, ROLE_CUSTOMER, ROLE_RETAILER},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::notification_service,
    state::AppState,
};

const PAYMENT_METHODS: [&str; 2] = ["online", "cod"];

/// Partition cart lines by seller, keeping the order in which each seller
/// first appears in the cart. One group becomes one order.
pub fn group_by_seller(lines: &[cart_items::Model]) -> Vec<(Uuid, Vec<&cart_items::Model>)> {
    let mut groups: Vec<(Uuid, Vec<&cart_items::Model>)> = Vec::new();
    for line in lines {
        match groups.iter_mut().find(|(seller, _)| *seller == line.seller_id) {
            Some((_, group)) => group.push(line),
            None => groups.push((line.seller_id, vec![line])),
        }
    }
    groups
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    condition = match user.role.as_str() {
        ROLE_CUSTOMER => condition.add(OrderCol::CustomerId.eq(user.user_id)),
        ROLE_RETAILER => condition.add(OrderCol::RetailerId.eq(user.user_id)),
        _ => return Err(AppError::Forbidden),
    };
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::BadRequest("Unknown order status".into()))?;
        condition = condition.add(OrderCol::Status.eq(status.as_str()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let mut condition = Condition::all().add(OrderCol::Id.eq(id));
    condition = match user.role.as_str() {
        ROLE_CUSTOMER => condition.add(OrderCol::CustomerId.eq(user.user_id)),
        ROLE_RETAILER => condition.add(OrderCol::RetailerId.eq(user.user_id)),
        _ => return Err(AppError::Forbidden),
    };

    let order = Orders::find().filter(condition).one(&state.orm).await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Turn the caller's cart into one order per retailer, decrementing stock
/// per line. The whole checkout runs in a single transaction: a line that
/// cannot be covered by remaining stock aborts every group, so a failed
/// checkout leaves no partial orders behind.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<CheckoutResponse>> {
    ensure_customer(user)?;

    if !PAYMENT_METHODS.contains(&payload.payment_method.as_str()) {
        return Err(AppError::BadRequest(
            "payment_method must be online or cod".into(),
        ));
    }
    let delivery_address = payload.delivery_address.trim();
    if delivery_address.is_empty() {
        return Err(AppError::BadRequest("Delivery address is required".into()));
    }

    let txn = state.orm.begin().await?;

    let lines = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::CreatedAt)
        .lock(LockType::Update)
        .all(&txn)
        .await?;

    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    let estimated_delivery = Utc::now() + Duration::days(3);
    let mut created: Vec<OrderWithItems> = Vec::new();

    for (retailer_id, group) in group_by_seller(&lines) {
        let total_amount: i64 = group
            .iter()
            .map(|line| line.unit_price * line.quantity as i64)
            .sum();

        let order = OrderActive {
            id: Set(Uuid::new_v4()),
            customer_id: Set(user.user_id),
            retailer_id: Set(retailer_id),
            total_amount: Set(total_amount),
            delivery_address: Set(delivery_address.to_string()),
            payment_method: Set(payload.payment_method.clone()),
            status: Set(OrderStatus::Pending.as_str().into()),
            estimated_delivery: Set(estimated_delivery.into()),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await?;

        let mut items: Vec<OrderItem> = Vec::new();
        for line in group {
            let item = OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                product_id: Set(line.product_id),
                product_name: Set(line.product_name.clone()),
                unit_price: Set(line.unit_price),
                quantity: Set(line.quantity),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;

            items.push(order_item_from_entity(item));

            // Guarded decrement: zero rows affected means another checkout
            // took the remaining units first. The error rolls back the
            // whole transaction, orders included.
            let result = Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
                .filter(ProdCol::Id.eq(line.product_id))
                .filter(ProdCol::Stock.gte(line.quantity))
                .exec(&txn)
                .await?;
            if result.rows_affected == 0 {
                return Err(AppError::OutOfStock(line.product_id));
            }
        }

        created.push(OrderWithItems {
            order: order_from_entity(order),
            items,
        });
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    for placed in &created {
        if let Err(err) = notification_service::notify(
            &state.pool,
            placed.order.retailer_id,
            "New order received",
            &format!(
                "Order {} with {} item(s), total {}",
                placed.order.id,
                placed.items.len(),
                placed.order.total_amount
            ),
            "order_received",
            Some(placed.order.id),
        )
        .await
        {
            tracing::warn!(error = %err, "notification failed");
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({
            "orders": created.iter().map(|o| o.order.id).collect::<Vec<_>>()
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Checkout success",
        CheckoutResponse { orders: created },
        Some(Meta::empty()),
    ))
}

pub async fn accept_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    advance_order(state, user, id, OrderStatus::Pending, OrderStatus::Processing, "order_accept").await
}

pub async fn ship_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    advance_order(state, user, id, OrderStatus::Processing, OrderStatus::Shipped, "order_ship").await
}

pub async fn deliver_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    advance_order(state, user, id, OrderStatus::Shipped, OrderStatus::Delivered, "order_deliver").await
}

/// Single forward step of the order machine, performed by the owning
/// retailer. The row is locked and the current status compared against the
/// expected one, so two concurrent advances cannot both win: the loser sees
/// the moved status and gets `InvalidTransition`.
async fn advance_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
    action: &str,
) -> AppResult<ApiResponse<Order>> {
    ensure_retailer(user)?;
    debug_assert!(from.can_advance_to(to));

    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(id))
                .add(OrderCol::RetailerId.eq(user.user_id)),
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

    let customer_id = order.customer_id;
    let mut active: OrderActive = order.into();
    active.status = Set(to.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = notification_service::notify(
        &state.pool,
        customer_id,
        "Order status updated",
        &format!("Order {} is now {}", order.id, order.status),
        "order_status",
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
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "status": order.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

/// Customers may cancel an order that the retailer has not accepted yet.
/// Whether the cancelled quantities go back into stock is a deployment
/// choice (`RESTOCK_ON_CANCEL`).
pub async fn cancel_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    ensure_customer(user)?;

    let txn = state.orm.begin().await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(id))
                .add(OrderCol::CustomerId.eq(user.user_id)),
        )
        .lock(LockType::Update)
        .one(&txn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.status != OrderStatus::Pending.as_str() {
        return Err(AppError::InvalidTransition {
            from: order.status.clone(),
            to: OrderStatus::Cancelled.as_str().into(),
        });
    }

    if state.config.restock_on_cancel {
        let items = OrderItems::find()
            .filter(OrderItemCol::OrderId.eq(order.id))
            .all(&txn)
            .await?;
        for item in items {
            Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
                .filter(ProdCol::Id.eq(item.product_id))
                .exec(&txn)
                .await?;
        }
    }

    let retailer_id = order.retailer_id;
    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Cancelled.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = notification_service::notify(
        &state.pool,
        retailer_id,
        "Order cancelled",
        &format!("Order {} was cancelled by the customer", order.id),
        "order_status",
        Some(order.id),
    )
    .await
    {
        tracing::warn!(error = %err, "notification failed");
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_cancel",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order cancelled",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        customer_id: model.customer_id,
        retailer_id: model.retailer_id,
        total_amount: model.total_amount,
        delivery_address: model.delivery_address,
        payment_method: model.payment_method,
        status: model.status,
        estimated_delivery: model.estimated_delivery.with_timezone(&Utc),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        unit_price: model.unit_price,
        quantity: model.quantity,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
