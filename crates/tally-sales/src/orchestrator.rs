//! # Sale Orchestrator
//!
//! Turns a [`SaleRequest`] into a committed sale, or into a voided header
//! with every partial mutation undone.
//!
//! ## Saga
//! ```text
//! Init ──► Validated ──► HeaderPersisted ──► ItemsAndPaymentsPersisted
//!  │  shift, pricing,        │                        │
//!  │  promotion, tender,     │                        ▼
//!  │  FIFO plan              │                 StockCommitted ──► LoyaltyApplied ──► Done
//!  │  (no writes)            │                        │                (best effort)
//!  ▼                         └───── failure ──────────┤
//! error                                               ▼
//!                                              Compensating ──► Voided
//! ```
//!
//! The saga runs on its own task: a caller that stops waiting cannot cut
//! compensation short.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use tally_core::allocation::{aggregate_requirements, plan_product};
use tally_core::pricing::price_items;
use tally_core::promotion::{check_discount_gate, evaluate_promotion, DiscountApproval};
use tally_core::tender::{check_loyalty_tender, normalize_tender};
use tally_core::validation::{validate_id, validate_manual_discount};
use tally_core::{
    Customer, Money, NormalizedTender, PricedCart, Product, ProductAllocation, Sale, SaleItem,
    SalePayment, SaleStatus, ShiftSession, StockMovement, ValidationError,
};
use tally_db::repository::sale::generate_sale_id;

use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::compensation::{CompensationLog, UndoStep};
use crate::config::SalesConfig;
use crate::error::{SaleError, SaleResult, StoreError};
use crate::loyalty::{sale_points_delta, LoyaltyLedger};
use crate::receipt::ReceiptSequencer;
use crate::request::{RefundOutcome, ReturnLineRequest, ReturnOutcome, SaleOutcome, SaleRequest};
use crate::returns::ReturnReversal;
use crate::shift_guard;
use crate::stock::StockMutator;
use crate::store::PosStore;

// =============================================================================
// Saga State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SagaState {
    #[default]
    Init,
    Validated,
    HeaderPersisted,
    ItemsAndPaymentsPersisted,
    StockCommitted,
    LoyaltyApplied,
    Done,
    Compensating,
    Voided,
}

impl SagaState {
    /// True once a header exists that a failure must void.
    pub fn needs_compensation(&self) -> bool {
        matches!(
            self,
            SagaState::HeaderPersisted
                | SagaState::ItemsAndPaymentsPersisted
                | SagaState::StockCommitted
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Done | SagaState::Voided)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::Init => "Init",
            SagaState::Validated => "Validated",
            SagaState::HeaderPersisted => "HeaderPersisted",
            SagaState::ItemsAndPaymentsPersisted => "ItemsAndPaymentsPersisted",
            SagaState::StockCommitted => "StockCommitted",
            SagaState::LoyaltyApplied => "LoyaltyApplied",
            SagaState::Done => "Done",
            SagaState::Compensating => "Compensating",
            SagaState::Voided => "Voided",
        }
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Entry point of the engine.
///
/// ```rust,ignore
/// let engine = SaleOrchestrator::new(Arc::new(store), SalesConfig::from_env()?);
/// let outcome = engine.process_sale(request).await?;
/// println!("{}", outcome.sale.receipt_number);
/// ```
pub struct SaleOrchestrator<S: ?Sized> {
    store: Arc<S>,
    audit: Arc<dyn AuditSink>,
    config: SalesConfig,
}

impl<S: ?Sized> Clone for SaleOrchestrator<S> {
    fn clone(&self) -> Self {
        SaleOrchestrator {
            store: Arc::clone(&self.store),
            audit: Arc::clone(&self.audit),
            config: self.config.clone(),
        }
    }
}

impl<S> SaleOrchestrator<S>
where
    S: PosStore + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, config: SalesConfig) -> Self {
        SaleOrchestrator {
            store,
            audit: Arc::new(TracingAuditSink),
            config,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SalesConfig {
        &self.config
    }

    /// Validates, persists and commits a sale.
    ///
    /// ## Errors
    /// Business-rule errors are raised before anything is written. Errors
    /// after the header exists void it; if undoing fails too the error is
    /// [`SaleError::RollbackIncomplete`].
    #[instrument(skip_all, fields(cashier_id = %request.cashier_id, items = request.items.len()))]
    pub async fn process_sale(&self, request: SaleRequest) -> SaleResult<SaleOutcome> {
        let saga = self.clone();
        tokio::spawn(async move { saga.run(request).await })
            .await
            .map_err(|e| StoreError::Unavailable(format!("sale task aborted: {}", e)))?
    }

    /// Refunds a completed sale in full.
    #[instrument(skip(self))]
    pub async fn refund_sale(&self, sale_id: &str, actor: &str) -> SaleResult<RefundOutcome> {
        self.reversal().refund_sale(sale_id, actor).await
    }

    /// Returns part of a completed sale.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn return_items(
        &self,
        sale_id: &str,
        lines: &[ReturnLineRequest],
        actor: &str,
        reason: Option<&str>,
    ) -> SaleResult<ReturnOutcome> {
        self.reversal().return_items(sale_id, lines, actor, reason).await
    }

    /// Reconciles and closes the cashier's open shift.
    #[instrument(skip(self))]
    pub async fn close_shift(&self, cashier_id: &str, counted_cash_cents: i64) -> SaleResult<ShiftSession> {
        shift_guard::close_shift(self.store.as_ref(), self.audit.as_ref(), cashier_id, counted_cash_cents).await
    }

    pub async fn next_receipt_number(&self) -> SaleResult<String> {
        self.sequencer().next_receipt_number().await
    }

    fn reversal(&self) -> ReturnReversal<'_, S> {
        ReturnReversal::new(self.store.as_ref(), self.audit.as_ref(), self.config.cas_max_attempts)
    }

    fn sequencer(&self) -> ReceiptSequencer<'_, S> {
        ReceiptSequencer::new(
            self.store.as_ref(),
            &self.config.receipt_prefix,
            self.config.cas_max_attempts,
        )
    }

    // =========================================================================
    // Saga
    // =========================================================================

    async fn run(&self, request: SaleRequest) -> SaleResult<SaleOutcome> {
        let store = self.store.as_ref();
        let mut state = SagaState::Init;

        let plan = self.prepare(&request).await?;
        state = advance(state, SagaState::Validated);

        let receipt_number = self.sequencer().next_receipt_number().await?;
        let sale = plan.header(&request, receipt_number);

        store.insert_sale(&sale).await?;
        let mut log = CompensationLog::new();
        log.push(UndoStep::VoidSale {
            sale_id: sale.id.clone(),
            from: sale.status,
        });
        state = advance(state, SagaState::HeaderPersisted);

        let committed = self.commit(&plan, &sale, &mut log, &mut state).await;
        let (items, payments) = match committed {
            Ok(committed) => committed,
            Err(err) => {
                warn!(
                    sale_id = %sale.id,
                    failed_after = %state,
                    compensate = state.needs_compensation(),
                    error = %err,
                    "Sale failed"
                );
                let state = advance(state, SagaState::Compensating);
                let reason = err.to_string();
                let failures = log
                    .unwind(store, &reason, self.config.cas_max_attempts)
                    .await;
                advance(state, SagaState::Voided);

                self.audit.record(AuditEvent::SaleVoided {
                    sale_id: sale.id.clone(),
                    reason,
                    rollback_failures: failures.clone(),
                });
                return Err(err.with_rollback_failures(failures));
            }
        };

        let mut warnings = Vec::new();
        if let Some(customer) = &plan.customer {
            let delta = sale_points_delta(plan.grand_total, self.config.loyalty_earn_unit(), &plan.tender);
            let ledger = LoyaltyLedger::new(store, self.config.cas_max_attempts);
            if let Err(e) = ledger.apply(&customer.id, delta).await {
                warn!(
                    sale_id = %sale.id,
                    customer_id = %customer.id,
                    delta,
                    error = %e,
                    "Loyalty points not applied"
                );
                warnings.push(format!("loyalty points not applied for customer {}: {}", customer.id, e));
                self.audit.record(AuditEvent::LoyaltyAdjustmentFailed {
                    sale_id: sale.id.clone(),
                    customer_id: customer.id.clone(),
                    delta,
                    reason: e.to_string(),
                });
            }
        }
        state = advance(state, SagaState::LoyaltyApplied);

        advance(state, SagaState::Done);

        info!(
            sale_id = %sale.id,
            receipt_number = %sale.receipt_number,
            grand_total = %sale.grand_total(),
            status = sale.status.as_str(),
            warnings = warnings.len(),
            "Sale committed"
        );
        self.audit.record(AuditEvent::SaleCompleted {
            sale_id: sale.id.clone(),
            receipt_number: sale.receipt_number.clone(),
            cashier_id: sale.cashier_id.clone(),
            grand_total_cents: sale.grand_total_cents,
        });

        Ok(SaleOutcome {
            sale,
            items,
            payments,
            warnings,
        })
    }

    /// Every decision of the sale, made before the first write.
    async fn prepare(&self, request: &SaleRequest) -> SaleResult<SalePlan> {
        let store = self.store.as_ref();

        validate_id("cashier_id", &request.cashier_id)?;
        if !matches!(request.status, SaleStatus::Completed | SaleStatus::Draft) {
            return Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec!["completed".to_string(), "draft".to_string()],
            }
            .into());
        }
        validate_manual_discount(request.manual_discount_cents)?;

        let shift = shift_guard::require_open_shift(store, &request.cashier_id).await?;

        // pricing
        let mut ids: Vec<String> = Vec::new();
        for line in &request.items {
            if !ids.contains(&line.product_id) {
                ids.push(line.product_id.clone());
            }
        }
        let catalog: HashMap<String, Product> = store
            .products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        let cart = price_items(&request.items, &catalog)?;

        // promotion and discount gate
        let promo_discount = match request.promo() {
            Some(code) => {
                let promotion = store.promotion(code).await?;
                evaluate_promotion(code, promotion.as_ref(), cart.sub_total, Utc::now())?
            }
            None => Money::zero(),
        };
        let manual_discount = Money::from_cents(request.manual_discount_cents);
        check_discount_gate(
            cart.line_discount_total,
            manual_discount,
            cart.sub_total,
            self.config.discount_approval_threshold_bps,
            DiscountApproval {
                approval_code: request.approval_code.as_deref(),
                manager_id: request.manager_id.as_deref(),
            },
        )?;
        let discount_total = cart
            .line_discount_total
            .saturating_add(manual_discount)
            .saturating_add(promo_discount)
            .min(cart.sub_total);
        let grand_total = cart.sub_total + cart.tax_total - discount_total;

        // tender
        let tender = normalize_tender(request.payment_method, request.amount_paid_cents, &request.payments)?;
        let customer = match &request.customer_id {
            Some(id) => Some(
                store
                    .customer(id)
                    .await?
                    .ok_or_else(|| SaleError::not_found("Customer", id))?,
            ),
            None => None,
        };
        check_loyalty_tender(&tender, customer.as_ref())?;
        let change_given = tender.settle(grand_total, request.status)?;

        // FIFO plan
        let today = Utc::now().date_naive();
        let mut allocations = Vec::new();
        for (product_id, quantity) in aggregate_requirements(&cart.lines) {
            let batches = store.batches_for(&product_id).await?;
            allocations.push(plan_product(&product_id, quantity, &batches, today)?);
        }

        debug!(
            shift_id = %shift.id,
            sub_total = %cart.sub_total,
            tax_total = %cart.tax_total,
            discount_total = %discount_total,
            grand_total = %grand_total,
            payment_method = ?tender.payment_method,
            "Sale validated"
        );

        Ok(SalePlan {
            shift,
            cart,
            discount_total,
            grand_total,
            tender,
            change_given,
            customer,
            allocations,
            promo_code: request.promo().map(str::to_string),
        })
    }

    async fn commit(
        &self,
        plan: &SalePlan,
        sale: &Sale,
        log: &mut CompensationLog,
        state: &mut SagaState,
    ) -> SaleResult<(Vec<SaleItem>, Vec<SalePayment>)> {
        let store = self.store.as_ref();

        let items = plan.items(&sale.id);
        let payments = plan.payments(&sale.id);
        store.insert_lines(&items, &payments).await?;
        *state = advance(*state, SagaState::ItemsAndPaymentsPersisted);

        let mutator = StockMutator::new(store, &sale.cashier_id, self.config.cas_max_attempts);
        let mut movements: Vec<StockMovement> = Vec::new();
        for allocation in &plan.allocations {
            movements.extend(mutator.deduct(allocation, &sale.id, log).await?);
        }
        *state = advance(*state, SagaState::StockCommitted);

        debug!(sale_id = %sale.id, movements = movements.len(), "Stock committed");
        Ok((items, payments))
    }
}

fn advance(from: SagaState, to: SagaState) -> SagaState {
    debug!(from = %from, to = %to, "Saga transition");
    to
}

// =============================================================================
// Sale Plan
// =============================================================================

struct SalePlan {
    shift: ShiftSession,
    cart: PricedCart,
    discount_total: Money,
    grand_total: Money,
    tender: NormalizedTender,
    change_given: Money,
    customer: Option<Customer>,
    allocations: Vec<ProductAllocation>,
    promo_code: Option<String>,
}

impl SalePlan {
    fn header(&self, request: &SaleRequest, receipt_number: String) -> Sale {
        let now = Utc::now();
        Sale {
            id: generate_sale_id(),
            receipt_number,
            cashier_id: request.cashier_id.clone(),
            shift_id: self.shift.id.clone(),
            customer_id: self.customer.as_ref().map(|c| c.id.clone()),
            sub_total_cents: self.cart.sub_total.cents(),
            tax_total_cents: self.cart.tax_total.cents(),
            discount_total_cents: self.discount_total.cents(),
            grand_total_cents: self.grand_total.cents(),
            payment_method: self.tender.payment_method,
            amount_paid_cents: self.tender.amount_paid.cents(),
            change_given_cents: self.change_given.cents(),
            points_redeemed: self.tender.points_redeemed,
            promo_code: self.promo_code.clone(),
            status: request.status,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn items(&self, sale_id: &str) -> Vec<SaleItem> {
        let now = Utc::now();
        self.cart
            .lines
            .iter()
            .map(|line| SaleItem {
                id: generate_sale_id(),
                sale_id: sale_id.to_string(),
                product_id: line.product_id.clone(),
                name_snapshot: line.name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                sub_total_cents: line.sub_total.cents(),
                discount_cents: line.discount.cents(),
                tax_amount_cents: line.tax.cents(),
                created_at: now,
            })
            .collect()
    }

    fn payments(&self, sale_id: &str) -> Vec<SalePayment> {
        let now = Utc::now();
        self.tender
            .payments
            .iter()
            .map(|split| SalePayment {
                id: generate_sale_id(),
                sale_id: sale_id.to_string(),
                method: split.method,
                amount_cents: split.amount_cents,
                reference_id: split.reference_id.clone(),
                created_at: now,
            })
            .collect()
    }
}
