use sqlx::PgPool;

use crate::app_error::AppError;

const MAX_JSON_LOG_LEN: usize = 200;

/// Parse a JSON column into the target type, logging a warning and
/// returning the default on corruption. SQL NULL is a valid empty state
/// and produces no warning.
pub fn parse_json_column<T: serde::de::DeserializeOwned + Default>(
    json: &serde_json::Value,
    field_name: &str,
    entity_type: &str,
    entity_id: &str,
) -> T {
    if json.is_null() {
        return T::default();
    }

    serde_json::from_value(json.clone()).unwrap_or_else(|err| {
        let raw = json.to_string();
        let truncated = if raw.len() > MAX_JSON_LOG_LEN {
            format!("{}...", &raw[..MAX_JSON_LOG_LEN])
        } else {
            raw
        };
        tracing::warn!(
            field = field_name,
            entity_type = entity_type,
            entity_id = entity_id,
            raw_json = %truncated,
            error = %err,
            "Failed to parse JSON column, using default value"
        );
        T::default()
    })
}

/// Like [`parse_json_column`] for optional payloads: NULL and corruption
/// both map to `None` (corruption with a warning).
pub fn parse_json_opt<T: serde::de::DeserializeOwned>(
    json: &serde_json::Value,
    field_name: &str,
    entity_type: &str,
    entity_id: &str,
) -> Option<T> {
    if json.is_null() {
        return None;
    }
    match serde_json::from_value(json.clone()) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                field = field_name,
                entity_type = entity_type,
                entity_id = entity_id,
                error = %err,
                "Failed to parse optional JSON column, treating as absent"
            );
            None
        }
    }
}

pub mod cart;
pub mod membership;
pub mod order;
pub mod payment_intent;
pub mod provider;
pub mod subscription;
pub mod voucher;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                // PostgreSQL unique violation
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    AppError::Conflict("a record with this value already exists".into())
                }
                // PostgreSQL foreign key violation
                else if msg.contains("foreign key") || msg.contains("violates foreign key") {
                    AppError::Validation("referenced record not found".into())
                }
                // PostgreSQL not-null violation
                else if msg.contains("null value") && msg.contains("violates not-null") {
                    AppError::Validation("required field is missing".into())
                } else {
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("database operation failed".into())
                }
            }
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("database operation failed".into())
            }
        }
    }
}
