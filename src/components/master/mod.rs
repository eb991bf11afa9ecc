//! The two-wire master: phase-driven protocol engine, the controller that
//! fronts it, and its diagnostic snapshot.

pub mod controller;
pub mod debug;
pub mod state;
pub mod state_machine;
