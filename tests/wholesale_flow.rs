use axum_marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::wholesale::PlaceWholesaleOrderRequest,
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    error::AppError,
    middleware::auth::AuthUser,
    routes::params::Pagination,
    services::wholesale_service,
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// Retailer restocks from a wholesaler: place -> accept -> complete, with the
// same no-skipping rule as the customer order machine. Wholesaler stock is
// not touched by placement.
#[tokio::test]
async fn wholesale_order_lifecycle() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let retailer_id = create_user(&state, "retailer", "retailer@example.com").await?;
    let wholesaler_id = create_user(&state, "wholesaler", "wholesaler@example.com").await?;
    let other_wholesaler_id =
        create_user(&state, "wholesaler", "other.wholesaler@example.com").await?;

    let bulk_product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set("Rice 25kg Sack".into()),
        description: Set(Some("Bulk sack".into())),
        price: Set(2400),
        stock: Set(200),
        category: Set("Groceries".into()),
        seller_id: Set(wholesaler_id),
        seller_role: Set("wholesaler".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let retailer = AuthUser {
        user_id: retailer_id,
        role: "retailer".into(),
    };
    let wholesaler = AuthUser {
        user_id: wholesaler_id,
        role: "wholesaler".into(),
    };
    let other_wholesaler = AuthUser {
        user_id: other_wholesaler_id,
        role: "wholesaler".into(),
    };

    // Only retailers may place bulk orders, and only with positive quantities.
    let err = wholesale_service::place_order(
        &state,
        &wholesaler,
        PlaceWholesaleOrderRequest {
            product_id: bulk_product.id,
            quantity: 10,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let err = wholesale_service::place_order(
        &state,
        &retailer,
        PlaceWholesaleOrderRequest {
            product_id: bulk_product.id,
            quantity: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let order = wholesale_service::place_order(
        &state,
        &retailer,
        PlaceWholesaleOrderRequest {
            product_id: bulk_product.id,
            quantity: 10,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(order.status, "pending");
    assert_eq!(order.total_price, 24_000);
    assert_eq!(order.wholesaler_id, wholesaler_id);

    // Placement does not reserve wholesaler stock.
    let stock: (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(bulk_product.id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(stock.0, 200);

    // Completing a pending order skips a step and is rejected; a different
    // wholesaler cannot see the order at all.
    let err = wholesale_service::complete_order(&state, &wholesaler, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let err = wholesale_service::accept_order(&state, &other_wholesaler, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let accepted = wholesale_service::accept_order(&state, &wholesaler, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(accepted.status, "processing");

    let completed = wholesale_service::complete_order(&state, &wholesaler, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(completed.status, "completed");

    // Both parties see the order in their role-scoped listings.
    let pagination = || Pagination {
        page: None,
        per_page: None,
    };
    let for_retailer = wholesale_service::list_orders(&state, &retailer, pagination())
        .await?
        .data
        .unwrap();
    assert_eq!(for_retailer.items.len(), 1);

    let for_wholesaler = wholesale_service::list_orders(&state, &wholesaler, pagination())
        .await?
        .data
        .unwrap();
    assert_eq!(for_wholesaler.items.len(), 1);

    let for_other = wholesale_service::list_orders(&state, &other_wholesaler, pagination())
        .await?
        .data
        .unwrap();
    assert!(for_other.items.is_empty());

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE feedback, order_items, orders, wholesale_orders, cart_items, notifications, audit_logs, products, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        config: AppConfig {
            database_url: database_url.to_string(),
            host: "127.0.0.1".into(),
            port: 0,
            restock_on_cancel: true,
        },
    })
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}
