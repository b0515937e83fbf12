//! Integration tests for the infrastructure components
//!
//! These tests verify that PostgreSQL is reachable and that the embedded
//! migrations produce the expected schema. They only run when
//! `TEST_DATABASE_URL` points at a disposable database.

use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use sqlx::Row;

fn test_database_config() -> Option<DatabaseConfig> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
    Some(DatabaseConfig {
        database_url,
        max_connections: 5,
        min_connections: 1,
        connection_timeout: 10,
    })
}

#[tokio::test]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let Some(db_config) = test_database_config() else {
        eprintln!("TEST_DATABASE_URL not set, skipping PostgreSQL integration test");
        return Ok(());
    };

    let pool = init_pool(&db_config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    run_migrations(&pool).await?;
    // Running twice must be a no-op
    run_migrations(&pool).await?;

    let row = sqlx::query("SELECT COUNT(*) AS roles FROM roles")
        .fetch_one(&pool)
        .await?;
    let roles: i64 = row.get("roles");
    assert_eq!(roles, 3, "role catalog should be seeded by migrations");

    let admin: Option<String> =
        sqlx::query_scalar("SELECT display_name FROM roles WHERE name = 'admin'")
        .fetch_optional(&pool)
        .await?;
    assert_eq!(admin.as_deref(), Some("Admin"));

    Ok(())
}
