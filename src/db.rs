//! Database module
//!
//! Database connection and schema checks.

use sqlx::PgPool;

/// Tables created by migrations/0001_registration.sql
pub const REQUIRED_TABLES: [&str; 5] = [
    "students",
    "instructors",
    "courses",
    "sections",
    "enrollments",
];

/// Partial unique index backing the one-active-enrollment rule
const ACTIVE_ENROLLMENT_INDEX: &str = "enrollments_active_student_section";

/// Verify database connectivity
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Check if required tables and constraints exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    let index_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM pg_indexes WHERE schemaname = 'public' AND indexname = $1)",
    )
    .bind(ACTIVE_ENROLLMENT_INDEX)
    .fetch_one(pool)
    .await?;

    if !index_exists {
        tracing::error!(
            "Required index '{}' does not exist. Please run migrations.",
            ACTIVE_ENROLLMENT_INDEX
        );
        return Ok(false);
    }

    tracing::info!("Registration schema verified");
    Ok(true)
}
