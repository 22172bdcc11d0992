use axum_marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{cart::AddToCartRequest, orders::CheckoutRequest},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    error::AppError,
    middleware::auth::AuthUser,
    services::{cart_service, order_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// Two customers race for the last unit of stock. The guarded decrement lets
// exactly one checkout commit; the other fails and its order never exists.
#[tokio::test]
async fn concurrent_checkouts_cannot_oversell_the_last_unit() -> anyhow::Result<()> {
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
    let first_id = create_user(&state, "customer", "first@example.com").await?;
    let second_id = create_user(&state, "customer", "second@example.com").await?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set("Last Widget".into()),
        description: Set(None),
        price: Set(990),
        stock: Set(1),
        category: Set("General".into()),
        seller_id: Set(retailer_id),
        seller_role: Set("retailer".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let first = AuthUser {
        user_id: first_id,
        role: "customer".into(),
    };
    let second = AuthUser {
        user_id: second_id,
        role: "customer".into(),
    };

    cart_service::add_to_cart(&state, &first, AddToCartRequest { product_id: product.id }).await?;
    cart_service::add_to_cart(&state, &second, AddToCartRequest { product_id: product.id }).await?;

    let request = || CheckoutRequest {
        delivery_address: "1 Dockside Road".into(),
        payment_method: "online".into(),
    };
    let (left, right) = tokio::join!(
        order_service::checkout(&state, &first, request()),
        order_service::checkout(&state, &second, request()),
    );

    let results = [left, right];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one checkout should take the last unit");

    let loser = results
        .iter()
        .find_map(|r| r.as_ref().err())
        .expect("one checkout should fail");
    assert!(matches!(loser, AppError::OutOfStock(id) if *id == product.id));

    let stock: (i32,) = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product.id)
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(stock.0, 0);

    // The losing checkout rolled back wholesale: no half-created order rows.
    let orders: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;
    assert_eq!(orders.0, 1);

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
