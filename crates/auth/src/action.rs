use serde::{Deserialize, Serialize};

/// Store-scoped operation being authorized.
///
/// Carried into `AuthzError` so a denial names what was attempted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    RecordSale,
    RefundSale,
    RequestTransfer,
    ShipTransfer,
    ReceiveTransfer,
    RejectTransfer,
    RequestReplenishment,
    ApproveReplenishment,
    RejectReplenishment,
    AdjustStock,
    RecordActualStock,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::RecordSale => "sales.record",
            Action::RefundSale => "sales.refund",
            Action::RequestTransfer => "transfers.request",
            Action::ShipTransfer => "transfers.ship",
            Action::ReceiveTransfer => "transfers.receive",
            Action::RejectTransfer => "transfers.reject",
            Action::RequestReplenishment => "replenishment.request",
            Action::ApproveReplenishment => "replenishment.approve",
            Action::RejectReplenishment => "replenishment.reject",
            Action::AdjustStock => "stock.adjust",
            Action::RecordActualStock => "stock.actual_count",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
