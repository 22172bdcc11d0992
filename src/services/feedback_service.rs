use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::feedback::{ProductFeedback, SubmitFeedbackRequest},
    entity::{
        feedback::{ActiveModel as FeedbackActive, Column as FeedbackCol, Model as FeedbackModel},
        orders::{Column as OrderCol, Entity as Orders},
        Feedbacks,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_customer},
    models::{Feedback, OrderStatus},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// One feedback per delivered order, submitted by the order's customer.
pub async fn submit_feedback(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: SubmitFeedbackRequest,
) -> AppResult<ApiResponse<Feedback>> {
    ensure_customer(user)?;

    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest(
            "rating must be an integer between 1 and 5".into(),
        ));
    }
    let comment = payload.comment.trim();
    if comment.is_empty() {
        return Err(AppError::BadRequest("comment must not be empty".into()));
    }

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::Id.eq(order_id))
                .add(OrderCol::CustomerId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    if order.status != OrderStatus::Delivered.as_str() {
        return Err(AppError::BadRequest(
            "feedback is only accepted for delivered orders".into(),
        ));
    }

    let existing = Feedbacks::find()
        .filter(FeedbackCol::OrderId.eq(order_id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::BadRequest(
            "feedback was already submitted for this order".into(),
        ));
    }

    let record = FeedbackActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order_id),
        customer_id: Set(user.user_id),
        rating: Set(payload.rating),
        comment: Set(comment.to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "feedback_submit",
        Some("feedback"),
        Some(serde_json::json!({ "order_id": order_id, "rating": payload.rating })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Feedback submitted",
        feedback_from_entity(record),
        Some(Meta::empty()),
    ))
}

/// Feedback reaches a product through its order items: every feedback row
/// belongs to an order, and the order's items name the products it covered.
pub async fn product_feedback(
    state: &AppState,
    product_id: Uuid,
) -> AppResult<ApiResponse<ProductFeedback>> {
    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&state.pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound);
    }

    let items = sqlx::query_as::<_, Feedback>(
        r#"
        SELECT f.id, f.order_id, f.customer_id, f.rating, f.comment, f.created_at
        FROM feedback f
        JOIN order_items oi ON oi.order_id = f.order_id
        WHERE oi.product_id = $1
        ORDER BY f.created_at DESC
        "#,
    )
    .bind(product_id)
    .fetch_all(&state.pool)
    .await?;

    // Mean rating rounded to one decimal; 0 with a zero count when nothing
    // has been rated yet.
    let (average_rating, total_reviews): (f64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(ROUND(AVG(f.rating), 1)::FLOAT8, 0::FLOAT8), COUNT(f.id)
        FROM feedback f
        JOIN order_items oi ON oi.order_id = f.order_id
        WHERE oi.product_id = $1
        "#,
    )
    .bind(product_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "OK",
        ProductFeedback {
            items,
            average_rating,
            total_reviews,
        },
        Some(Meta::empty()),
    ))
}

fn feedback_from_entity(model: FeedbackModel) -> Feedback {
    Feedback {
        id: model.id,
        order_id: model.order_id,
        customer_id: model.customer_id,
        rating: model.rating,
        comment: model.comment,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
