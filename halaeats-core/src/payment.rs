use async_trait::async_trait;
use chrono::{DateTime, Utc};
use halaeats_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreResult;

/// Variant-specific display fields of a saved payment method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentDetails {
    Card {
        #[serde(default)]
        last4: Option<String>,
        #[serde(default)]
        brand: Option<String>,
    },
    Paypal {
        #[serde(default)]
        email: Option<Masked<String>>,
    },
    BankTransfer {
        #[serde(default)]
        bank_name: Option<String>,
    },
    ApplePay,
    GooglePay,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentMethod {
    pub id: Uuid,
    #[serde(flatten)]
    pub details: PaymentDetails,
    #[serde(default)]
    pub is_default: bool,
}

impl PaymentMethod {
    pub fn new(details: PaymentDetails) -> Self {
        Self {
            id: Uuid::new_v4(),
            details,
            is_default: false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.details {
            PaymentDetails::Card { .. } => "card",
            PaymentDetails::Paypal { .. } => "paypal",
            PaymentDetails::BankTransfer { .. } => "bank_transfer",
            PaymentDetails::ApplePay => "apple_pay",
            PaymentDetails::GooglePay => "google_pay",
        }
    }

    /// Short label for the review step, e.g. "Visa •••• 4242".
    pub fn display_label(&self) -> String {
        match &self.details {
            PaymentDetails::Card { last4, brand } => {
                let brand = brand.as_deref().unwrap_or("Card");
                match last4 {
                    Some(last4) => format!("{} •••• {}", brand, last4),
                    None => brand.to_string(),
                }
            }
            PaymentDetails::Paypal { email } => match email {
                Some(email) => format!("PayPal ({})", email.expose()),
                None => "PayPal".to_string(),
            },
            PaymentDetails::BankTransfer { bank_name } => match bank_name {
                Some(bank) => format!("Bank transfer ({})", bank),
                None => "Bank transfer".to_string(),
            },
            PaymentDetails::ApplePay => "Apple Pay".to_string(),
            PaymentDetails::GooglePay => "Google Pay".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    Processing,
    Succeeded,
    Declined,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID (e.g., pi_123)
    pub order_id: Uuid,
    pub amount_cents: i32,
    pub currency: String,
    pub method_kind: String,
    pub status: PaymentStatus,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a payment intent with the provider
    async fn create_intent(
        &self,
        order_id: Uuid,
        amount_cents: i32,
        currency: &str,
        method: &PaymentMethod,
    ) -> CoreResult<PaymentIntent>;

    /// Charge a previously created intent
    async fn process_payment(&self, intent: &PaymentIntent) -> CoreResult<PaymentStatus>;
}
