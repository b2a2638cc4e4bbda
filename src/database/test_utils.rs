use sea_orm::DatabaseConnection;

pub async fn setup_test_db() -> DatabaseConnection {
    // Single-connection in-memory SQLite database
    let db = super::establish_connection("sqlite::memory:")
        .await
        .expect("Failed to connect to test database");

    super::setup_database(&db)
        .await
        .expect("Failed to run migrations");

    db
}
