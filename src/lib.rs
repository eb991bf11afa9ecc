//! # Rusty I2C Master
//!
//! A cycle-stepped two-wire master engine for single-byte random-address
//! reads and writes against 4 KB serial EEPROMs (24C32 class, 16-bit offset).
//!
//! This library provides:
//! - A four-phase bit clock derived from a reference clock by a configurable divisor
//! - A tri-state line model with pull-ups, named drivers and wired-AND resolution
//! - The 16-state master protocol engine with ACK/NACK handling and abort-to-STOP
//! - A transaction controller exposing busy/done/error and the read result
//! - Read-only introspection snapshots for external tracing
//! - A serial EEPROM peer model, a passive bus decoder and a bench that wires them up
//! - JSON configuration of the bench and its transaction list

pub mod bus;
pub mod component;
pub mod components;
pub mod error;
pub mod pin;
pub mod system_config;
pub mod systems;
pub mod types;

// Re-export commonly used items for easier importing
pub use bus::{BusLineDriver, DriveMode, TwoWireBus};
pub use component::{BaseComponent, Component};
pub use components::master::controller::{Status, TransactionController};
pub use components::master::debug::{DebugSnapshot, Introspect};
pub use components::master::state::ProtocolState;
pub use error::EngineError;
pub use pin::{Pin, PinValue};
pub use types::{OperationKind, TransactionRequest, U7};
