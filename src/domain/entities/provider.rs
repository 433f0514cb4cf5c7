use serde::Serialize;
use uuid::Uuid;

/// The provider fields the payment core actually reads. Everything else
/// about providers (catalog, offers, scan history) lives outside this
/// subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderProfile {
    pub id: Uuid,
    pub name: String,
    pub logo_url: String,
    /// Discount applied when a customer buys a voucher at this provider.
    /// `None` means the provider does not sell vouchers.
    pub voucher_discount_percent: Option<i32>,
    pub is_active: bool,
}

impl ProviderProfile {
    pub fn sells_vouchers(&self) -> bool {
        self.is_active && self.voucher_discount_percent.is_some()
    }
}
