//! Builders for fully-populated test entities.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    application::ports::payment_gateway::GatewayNotification,
    domain::entities::{
        cart::CartItem,
        gateway::{Gateway, NotificationOutcome},
        membership::MembershipPlan,
        order::{Order, OrderItem, OrderStatus, PaymentLink},
        payment_intent::Actor,
        provider::ProviderProfile,
        voucher::{Voucher, VoucherStatus},
    },
};

pub fn provider(voucher_discount_percent: Option<i32>) -> ProviderProfile {
    ProviderProfile {
        id: Uuid::new_v4(),
        name: "Cafe Najd".into(),
        logo_url: "https://cdn.example/najd.png".into(),
        voucher_discount_percent,
        is_active: true,
    }
}

pub fn plan(monthly_price_cents: i64, yearly_price_cents: i64) -> MembershipPlan {
    MembershipPlan {
        id: Uuid::new_v4(),
        name: "Gold".into(),
        image_url: String::new(),
        monthly_price_cents,
        yearly_price_cents,
        is_active: true,
    }
}

pub fn cart_item(provider_id: Uuid, price_cents: i64, quantity: i32) -> CartItem {
    CartItem {
        product_id: Uuid::new_v4(),
        provider_id,
        name: "Karak tea".into(),
        image_url: String::new(),
        price_cents,
        quantity,
    }
}

pub fn order(provider_id: Uuid) -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        actor: Actor::User(Uuid::new_v4()),
        provider_id,
        items: vec![OrderItem {
            product_id: Uuid::new_v4(),
            name: "Karak tea".into(),
            image_url: String::new(),
            price_cents: 700,
            quantity: 2,
        }],
        total_cents: 1400,
        payment: PaymentLink {
            gateway: Gateway::Tap,
            payment_intent_id: Uuid::new_v4(),
            paid_at: now,
        },
        status: OrderStatus::Pending,
        cancel_reason: None,
        expires_at: Order::default_expiry(now),
        created_at: now,
    }
}

pub fn unused_voucher() -> Voucher {
    Voucher {
        id: Uuid::new_v4(),
        provider_id: Uuid::new_v4(),
        owner_user_id: Uuid::new_v4(),
        name: "Cafe Najd SAR500 voucher".into(),
        provider_name: "Cafe Najd".into(),
        logo_url: String::new(),
        currency: "SAR".into(),
        face_value_cents: 50_000,
        price_cents: 45_000,
        status: VoucherStatus::Unused,
        valid_until: None,
        code: None,
        code_issued_at: None,
        code_expires_at: None,
        redeemed_at: None,
        purchased_at: Utc::now(),
    }
}

pub fn success_notification(external_reference: &str) -> GatewayNotification {
    GatewayNotification {
        external_reference: external_reference.to_string(),
        outcome: NotificationOutcome::Success,
        idempotency_key: format!("{}:success", external_reference),
    }
}

pub fn failure_notification(external_reference: &str) -> GatewayNotification {
    GatewayNotification {
        external_reference: external_reference.to_string(),
        outcome: NotificationOutcome::Failure,
        idempotency_key: format!("{}:failure", external_reference),
    }
}
