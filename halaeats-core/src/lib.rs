pub mod address;
pub mod delivery;
pub mod notice;
pub mod order;
pub mod payment;
pub mod repository;

pub use address::{Address, AddressDraft, AddressService};
pub use delivery::{DeliveryBatch, DeliveryQuote, DeliveryService, QuoteService};
pub use notice::{MemoryNotifier, Notice, NoticeLevel, Notifier, TracingNotifier};
pub use order::{Order, OrderLine, OrderStatus, OrderType};
pub use payment::{PaymentAdapter, PaymentDetails, PaymentIntent, PaymentMethod, PaymentStatus};
pub use repository::OrderRepository;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    /// Wrap a backend failure (database, cache, network) as an internal error.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        CoreError::InternalError(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
