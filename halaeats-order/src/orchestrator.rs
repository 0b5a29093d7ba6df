use halaeats_core::payment::{PaymentAdapter, PaymentDetails, PaymentIntent, PaymentMethod, PaymentStatus};
use halaeats_core::{CoreError, CoreResult};
use std::sync::Arc;
use uuid::Uuid;

pub struct PaymentOrchestrator {
    adapter: Arc<dyn PaymentAdapter>,
    currency: String,
}

impl PaymentOrchestrator {
    pub fn new(adapter: Arc<dyn PaymentAdapter>) -> Self {
        Self {
            adapter,
            currency: "USD".to_string(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Create an intent for the order total and charge it.
    ///
    /// Returns the intent with its final status; callers decide what a
    /// non-success status means for the order.
    pub async fn charge(
        &self,
        order_id: Uuid,
        amount_cents: i32,
        method: &PaymentMethod,
    ) -> CoreResult<PaymentIntent> {
        if amount_cents <= 0 {
            return Err(CoreError::ValidationError(format!(
                "cannot charge a non-positive amount ({})",
                amount_cents
            )));
        }

        let mut intent = self
            .adapter
            .create_intent(order_id, amount_cents, &self.currency, method)
            .await?;
        intent.status = self.adapter.process_payment(&intent).await?;

        tracing::info!(
            "Payment {} for order {} finished as {:?}",
            intent.id,
            order_id,
            intent.status
        );
        Ok(intent)
    }
}

/// Test double for a card processor.
///
/// Cards ending in `0002` are declined and cards ending in `0119` make the
/// gateway itself fail, which is what trips the circuit breaker.
pub struct MockPaymentAdapter;

#[async_trait::async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_intent(
        &self,
        order_id: Uuid,
        amount_cents: i32,
        currency: &str,
        method: &PaymentMethod,
    ) -> CoreResult<PaymentIntent> {
        let reference = match &method.details {
            PaymentDetails::Card { last4, .. } => last4.clone(),
            _ => None,
        };
        Ok(PaymentIntent {
            id: format!("mock_pi_{}", order_id.simple()),
            order_id,
            amount_cents,
            currency: currency.to_string(),
            method_kind: method.kind().to_string(),
            status: PaymentStatus::RequiresPaymentMethod,
            reference,
            created_at: chrono::Utc::now(),
        })
    }

    async fn process_payment(&self, intent: &PaymentIntent) -> CoreResult<PaymentStatus> {
        match intent.reference.as_deref() {
            Some("0119") => Err(CoreError::Unavailable(
                "Simulated payment gateway failure".to_string(),
            )),
            Some("0002") => Ok(PaymentStatus::Declined),
            _ => Ok(PaymentStatus::Succeeded),
        }
    }
}
