use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartList, SetQuantityRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::{CartLine, ROLE_RETAILER},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let items = sqlx::query_as::<_, CartLine>(
        "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at ASC",
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(unit_price * quantity), 0)::BIGINT FROM cart_items WHERE user_id = $1",
    )
    .bind(user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        CartList {
            items,
            total: total.0,
        },
        Some(Meta::empty()),
    ))
}

/// Add one unit of a product. A line already in the cart gets its quantity
/// bumped by one; a new line snapshots the product's name, price and seller
/// so later catalog edits leave the cart untouched.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartLine>> {
    ensure_customer(user)?;

    let product: Option<(Uuid, String, i64, Uuid, String)> = sqlx::query_as(
        "SELECT id, name, price, seller_id, seller_role FROM products WHERE id = $1",
    )
    .bind(payload.product_id)
    .fetch_optional(&state.pool)
    .await?;

    let (product_id, name, price, seller_id, seller_role) = match product {
        Some(p) => p,
        None => return Err(AppError::BadRequest("product not found".to_string())),
    };
    if seller_role != ROLE_RETAILER {
        return Err(AppError::BadRequest(
            "product is not sold by a retailer".to_string(),
        ));
    }

    let line = sqlx::query_as::<_, CartLine>(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, product_name, seller_id, unit_price, quantity)
        VALUES ($1, $2, $3, $4, $5, $6, 1)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = cart_items.quantity + 1
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(product_id)
    .bind(name)
    .bind(seller_id)
    .bind(price)
    .fetch_one(&state.pool)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id, "quantity": line.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", line, None))
}

pub async fn set_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: SetQuantityRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_customer(user)?;

    if payload.quantity <= 0 {
        return remove_from_cart(state, user, product_id).await;
    }

    let line = sqlx::query_as::<_, CartLine>(
        r#"
        UPDATE cart_items
        SET quantity = $3
        WHERE user_id = $1 AND product_id = $2
        RETURNING *
        "#,
    )
    .bind(user.user_id)
    .bind(product_id)
    .bind(payload.quantity)
    .fetch_optional(&state.pool)
    .await?;

    let line = match line {
        Some(l) => l,
        None => return Err(AppError::NotFound),
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id, "quantity": line.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "OK",
        serde_json::to_value(line).map_err(|e| AppError::Internal(e.into()))?,
        None,
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}
