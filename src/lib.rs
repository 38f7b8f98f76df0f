// Main library file for the slot reservation orchestrator

pub mod client;
pub mod config;
pub mod error;
pub mod mock_service;
pub mod reconcile;
pub mod retry;
pub mod session;
pub mod slot;

// Re-export key types for convenience
pub use client::{ClientConfig, ClientStats, ReservationApi, ReservationClient, StatsSnapshot};
pub use crate::config::AppConfig;
pub use error::{ClientError, ReservationError};
pub use reconcile::{clear_existing_bookings, BookingOutcome, EngineConfig, Reconciler};
pub use retry::RetryConfig;
pub use slot::{common_slot_ids, Slot, SlotId};
