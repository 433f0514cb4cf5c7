use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{parse_json_column, PostgresPersistence},
    app_error::{AppError, AppResult},
    application::use_cases::orders::CartRepo,
    domain::entities::{
        cart::{Cart, CartItem},
        payment_intent::Actor,
    },
};

fn row_to_cart(row: &sqlx::postgres::PgRow) -> AppResult<Cart> {
    let id: Uuid = row.get("id");
    let actor = Actor::from_columns(row.get("user_id"), row.get("session_id"))
        .ok_or_else(|| AppError::Database(format!("cart {} has inconsistent actor columns", id)))?;
    let items: Vec<CartItem> =
        parse_json_column(&row.get::<serde_json::Value, _>("items"), "items", "cart", &id.to_string());
    Ok(Cart { id, actor, items })
}

fn actor_clause(actor: &Actor) -> &'static str {
    match actor {
        Actor::User(_) => "user_id = $1",
        Actor::Session(_) => "session_id = $1",
    }
}

fn bind_actor<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    actor: &'q Actor,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    match actor {
        Actor::User(user_id) => query.bind(user_id),
        Actor::Session(session_id) => query.bind(session_id.as_str()),
    }
}

#[async_trait]
impl CartRepo for PostgresPersistence {
    async fn get_for_actor(&self, actor: &Actor) -> AppResult<Option<Cart>> {
        let sql = format!(
            "SELECT id, user_id, session_id, items FROM carts WHERE {}",
            actor_clause(actor)
        );
        let row = bind_actor(sqlx::query(&sql), actor)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        row.as_ref().map(row_to_cart).transpose()
    }

    async fn clear_for_actor(&self, actor: &Actor) -> AppResult<()> {
        let sql = format!(
            "UPDATE carts SET items = '[]'::jsonb, updated_at = CURRENT_TIMESTAMP WHERE {}",
            actor_clause(actor)
        );
        bind_actor(sqlx::query(&sql), actor)
            .execute(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}
