//! Core domain types for the booking service.

mod booking;
mod date_range;
mod event;
mod gateway;
mod money;
mod pricing;
mod space;
mod user;

pub use booking::{Booking, BookingId, ConfirmationCode, PaymentState};
pub use date_range::DateRange;
pub use event::{EventData, EventEnvelope, EventStatus, GatewayEventKind, StoredEvent};
pub use gateway::{
    CardDetails, Charge, Customer, IntentStatus, PaymentIntent, PaymentSource, Refund,
};
pub use money::{Currency, Money};
pub use pricing::{FeePolicy, Quote, ZeroFees, quote};
pub use space::{Space, SpaceId};
pub use user::{User, UserId, UserRole};
