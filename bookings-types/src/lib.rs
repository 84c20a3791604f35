//! # Bookings Types
//!
//! Domain types and port traits for the space booking service.
//! This crate has ZERO external IO dependencies - only data structures,
//! business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, DateRange, Booking, payment state machine)
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    Booking, BookingId, CardDetails, Charge, ConfirmationCode, Currency, Customer, DateRange,
    EventEnvelope, EventStatus, FeePolicy, GatewayEventKind, IntentStatus, Money, PaymentIntent,
    PaymentSource, PaymentState, Quote, Refund, Space, SpaceId, StoredEvent, User, UserId,
    UserRole, ZeroFees, quote,
};
pub use dto::*;
pub use error::{AppError, DomainError, RepoError};
pub use ports::{BookingRepository, CreateIntentRequest, GatewayError, Notifier, NotifyError, PaymentGateway};
