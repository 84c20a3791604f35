//! Port traits - the boundary between domain logic and the outside world.

mod gateway;
mod notifier;
mod repository;

pub use gateway::{CreateIntentRequest, GatewayError, PaymentGateway};
pub use notifier::{Notifier, NotifyError};
pub use repository::BookingRepository;
