use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum_marketplace_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let customer_id = ensure_user(&pool, "customer@example.com", "customer123", "customer").await?;
    let retailer_id = ensure_user(&pool, "retailer@example.com", "retailer123", "retailer").await?;
    let wholesaler_id =
        ensure_user(&pool, "wholesaler@example.com", "wholesaler123", "wholesaler").await?;

    seed_products(&pool, retailer_id, "retailer").await?;
    seed_products(&pool, wholesaler_id, "wholesaler").await?;

    println!(
        "Seed completed. Customer: {customer_id}, Retailer: {retailer_id}, Wholesaler: {wholesaler_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn seed_products(
    pool: &sqlx::PgPool,
    seller_id: Uuid,
    seller_role: &str,
) -> anyhow::Result<()> {
    let products: Vec<(&str, &str, i64, i32, &str)> = match seller_role {
        "retailer" => vec![
            ("Basmati Rice 5kg", "Long-grain aged basmati", 65000, 40, "Groceries"),
            ("LED Desk Lamp", "Adjustable warm-white lamp", 120000, 25, "Electronics"),
            ("Cotton T-Shirt", "Plain crew neck, medium", 35000, 60, "Clothing"),
        ],
        _ => vec![
            ("Basmati Rice 25kg Sack", "Bulk sack for resale", 240000, 200, "Groceries"),
            ("LED Desk Lamp (box of 10)", "Wholesale carton", 900000, 80, "Electronics"),
        ],
    };

    for (name, desc, price, stock, category) in products {
        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM products WHERE seller_id = $1 AND name = $2")
                .bind(seller_id)
                .bind(name)
                .fetch_optional(pool)
                .await?;
        if exists.is_some() {
            continue;
        }

        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, stock, category, seller_id, seller_role)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(price)
        .bind(stock)
        .bind(category)
        .bind(seller_id)
        .bind(seller_role)
        .execute(pool)
        .await?;
    }

    println!("Seeded {seller_role} products");
    Ok(())
}
