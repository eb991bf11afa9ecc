pub mod clock;
pub mod master;
pub mod memory;
pub mod monitor;
