//! Application state container shared across Axum route handlers.
//!
//! Wraps the resources every handler needs, currently just the database
//! connection. Cloned into each route via Axum's `State<T>` extractor.

use sea_orm::DatabaseConnection;

/// Central application state shared across the server.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
}

impl AppState {
    /// Creates a new `AppState` with the given database connection.
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Returns a cloned copy of the database connection, for contexts that
    /// need ownership (spawned tasks).
    pub fn db_clone(&self) -> DatabaseConnection {
        self.db.clone()
    }
}
