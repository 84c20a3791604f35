//! # Bookings Hex
//!
//! Application service layer, gateway event worker and HTTP adapter for the
//! booking service.
//!
//! ## Architecture
//!
//! - `service/` - Application service (orchestrates domain operations)
//! - `worker/` - Queue consumer applying gateway events to bookings
//! - `inbound/` - HTTP adapter (Axum server)
//!
//! The service is generic over `R: BookingRepository` and `G: PaymentGateway`,
//! allowing different adapter implementations to be injected.

pub mod inbound;
mod openapi;
pub mod service;
pub mod worker;

#[cfg(test)]
mod service_tests;

pub use service::BookingService;
pub use worker::EventWorker;
