use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::payment_intent::Actor;

/// Cart line, hydrated with the product snapshot fields the order will
/// copy at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub image_url: String,
    pub price_cents: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: Uuid,
    pub actor: Actor,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_cents(&self) -> i64 {
        self.items
            .iter()
            .map(|item| item.price_cents * item.quantity as i64)
            .sum()
    }

    /// Provider the cart belongs to; carts are single-provider, so the
    /// first line decides.
    pub fn provider_id(&self) -> Option<Uuid> {
        self.items.first().map(|item| item.provider_id)
    }
}
