use uuid::Uuid;

use crate::{
    db::DbPool,
    dto::notifications::NotificationList,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Notification,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Best-effort insert; callers log and continue when this fails.
pub async fn notify(
    pool: &DbPool,
    user_id: Uuid,
    title: &str,
    message: &str,
    kind: &str,
    order_id: Option<Uuid>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, title, message, kind, order_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(title)
    .bind(message)
    .bind(kind)
    .bind(order_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_notifications(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<NotificationList>> {
    let (page, limit, offset) = pagination.normalize();

    let items = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
        .bind(user.user_id)
        .fetch_one(&state.pool)
        .await?;

    let meta = Meta::new(page, limit, total.0);
    Ok(ApiResponse::success(
        "OK",
        NotificationList { items },
        Some(meta),
    ))
}

pub async fn mark_read(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Notification>> {
    let updated = sqlx::query_as::<_, Notification>(
        r#"
        UPDATE notifications
        SET read = TRUE
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user.user_id)
    .fetch_optional(&state.pool)
    .await?;

    let updated = match updated {
        Some(n) => n,
        None => return Err(AppError::NotFound),
    };

    Ok(ApiResponse::success("OK", updated, Some(Meta::empty())))
}
