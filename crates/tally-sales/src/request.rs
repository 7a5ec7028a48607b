//! Request and outcome types of the engine's entry points.

use serde::{Deserialize, Serialize};

use tally_core::{
    CartLine, PaymentMethod, ReturnLine, ReturnRequest, Sale, SaleItem, SalePayment, SaleStatus,
    StockMovement, TenderSplit,
};

/// A normalized checkout request.
///
/// Client price and tax hints on the cart lines are accepted but ignored;
/// the catalog is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleRequest {
    pub cashier_id: String,
    pub items: Vec<CartLine>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub amount_paid_cents: i64,
    /// Split tenders; when non-empty they replace `payment_method`/`amount_paid_cents`.
    #[serde(default)]
    pub payments: Vec<TenderSplit>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub manual_discount_cents: i64,
    #[serde(default)]
    pub approval_code: Option<String>,
    #[serde(default)]
    pub manager_id: Option<String>,
    /// `completed` (default) or `draft`.
    #[serde(default)]
    pub status: SaleStatus,
}

impl SaleRequest {
    pub fn new(
        cashier_id: impl Into<String>,
        items: Vec<CartLine>,
        payment_method: PaymentMethod,
        amount_paid_cents: i64,
    ) -> Self {
        SaleRequest {
            cashier_id: cashier_id.into(),
            items,
            payment_method,
            amount_paid_cents,
            payments: Vec::new(),
            customer_id: None,
            promo_code: None,
            manual_discount_cents: 0,
            approval_code: None,
            manager_id: None,
            status: SaleStatus::Completed,
        }
    }

    pub fn with_payments(mut self, payments: Vec<TenderSplit>) -> Self {
        self.payments = payments;
        self
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_promo_code(mut self, code: impl Into<String>) -> Self {
        self.promo_code = Some(code.into());
        self
    }

    pub fn with_manual_discount(mut self, cents: i64) -> Self {
        self.manual_discount_cents = cents;
        self
    }

    pub fn with_manager_approval(mut self, manager_id: impl Into<String>) -> Self {
        self.manager_id = Some(manager_id.into());
        self
    }

    pub fn with_approval_code(mut self, code: impl Into<String>) -> Self {
        self.approval_code = Some(code.into());
        self
    }

    pub fn as_draft(mut self) -> Self {
        self.status = SaleStatus::Draft;
        self
    }

    /// Promo code with surrounding whitespace removed; blank means none.
    pub fn promo(&self) -> Option<&str> {
        self.promo_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// A committed sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleOutcome {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<SalePayment>,
    /// Non-fatal problems, e.g. a loyalty adjustment that did not apply.
    pub warnings: Vec<String>,
}

/// One line of a partial return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLineRequest {
    pub sale_item_id: String,
    pub quantity: i64,
}

impl ReturnLineRequest {
    pub fn new(sale_item_id: impl Into<String>, quantity: i64) -> Self {
        ReturnLineRequest {
            sale_item_id: sale_item_id.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnOutcome {
    pub request: ReturnRequest,
    pub lines: Vec<ReturnLine>,
    pub movements: Vec<StockMovement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub sale: Sale,
    /// One `return` movement per restored product.
    pub movements: Vec<StockMovement>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_request() {
        let json = r#"{
            "cashierId": "cashier-1",
            "items": [{"productId": "P1", "quantity": 2, "clientPriceHintCents": 1}],
            "paymentMethod": "cash",
            "amountPaidCents": 2200
        }"#;
        let request: SaleRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.status, SaleStatus::Completed);
        assert!(request.payments.is_empty());
        assert_eq!(request.items[0].client_price_hint_cents, Some(1));
        assert_eq!(request.promo(), None);
    }

    #[test]
    fn test_blank_promo_is_none() {
        let request = SaleRequest::new("c1", vec![], PaymentMethod::Cash, 0).with_promo_code("  ");
        assert_eq!(request.promo(), None);
        let request = request.with_promo_code(" SPRING ");
        assert_eq!(request.promo(), Some("SPRING"));
    }
}
