//! # JSON Configuration System
//!
//! Bench configuration stored as JSON: timing of the phase clock, how the
//! master drives SDA, the EEPROM on the bus, and a list of transactions to run.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rusty_i2c_master::system_config::EngineConfig;
//!
//! let config = EngineConfig::load("configs/eeprom_24c32.json").expect("Could not load config!");
//! println!("{}: bus at {} Hz", config.name, config.bus_frequency_hz());
//! ```
//!
//! ## Configuration File Format
//!
//! ```json
//! {
//!   "name": "bench",
//!   "reference_frequency_hz": 50000000,
//!   "divisor": 125,
//!   "max_bus_frequency_hz": 400000,
//!   "drive_mode": "push_pull",
//!   "eeprom": { "device_address": 80, "write_protect": false },
//!   "transactions": [
//!     { "op": "write", "device_address": 80, "offset": 16, "data": 85 },
//!     { "op": "read", "device_address": 80, "offset": 16 }
//!   ]
//! }
//! ```
//!
//! Every field is optional; missing fields take the values of
//! [`EngineConfig::default`].

use log::debug;
use serde::{Deserialize, Serialize};

use crate::bus::DriveMode;
use crate::components::memory::serial_eeprom::{DEFAULT_DEVICE_ADDRESS, EEPROM_SIZE};
use crate::error::EngineError;
use crate::types::{TransactionRequest, U7};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub name: String,
    pub description: String,
    pub reference_frequency_hz: f64,
    /// Reference cycles per phase tick
    pub divisor: u32,
    /// Fastest bus rate the target device is rated for
    pub max_bus_frequency_hz: f64,
    pub drive_mode: DriveMode,
    pub eeprom: EepromConfig,
    pub transactions: Vec<TransactionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EepromConfig {
    pub device_address: u8,
    pub write_protect: bool,
    /// Loaded at `initial_offset` before the bench starts
    pub initial_contents: Vec<u8>,
    pub initial_offset: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransactionConfig {
    Write { device_address: u8, offset: u16, data: u8 },
    Read { device_address: u8, offset: u16 },
}

impl TransactionConfig {
    pub fn to_request(&self) -> TransactionRequest {
        match *self {
            TransactionConfig::Write {
                device_address,
                offset,
                data,
            } => TransactionRequest::write(U7::new(device_address), offset, data),
            TransactionConfig::Read {
                device_address,
                offset,
            } => TransactionRequest::read(U7::new(device_address), offset),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            name: "eeprom_bench".to_string(),
            description: "Two-wire master with a 24C32 serial EEPROM".to_string(),
            reference_frequency_hz: 50_000_000.0,
            divisor: 125,
            max_bus_frequency_hz: 400_000.0,
            drive_mode: DriveMode::PushPull,
            eeprom: EepromConfig::default(),
            transactions: Vec::new(),
        }
    }
}

impl Default for EepromConfig {
    fn default() -> Self {
        EepromConfig {
            device_address: DEFAULT_DEVICE_ADDRESS,
            write_protect: false,
            initial_contents: Vec::new(),
            initial_offset: 0,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &str) -> Result<Self, EngineError> {
        let content = std::fs::read_to_string(path)?;
        debug!("Loaded config file '{}' ({} bytes)", path, content.len());
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Effective SCL frequency: one bit spans four phase ticks
    pub fn bus_frequency_hz(&self) -> f64 {
        self.reference_frequency_hz / (4.0 * self.divisor.max(1) as f64)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.divisor == 0 {
            return Err(EngineError::Config("divisor must be at least 1".to_string()));
        }
        if self.reference_frequency_hz.is_nan() || self.reference_frequency_hz <= 0.0 {
            return Err(EngineError::Config(format!(
                "reference frequency must be positive, got {}",
                self.reference_frequency_hz
            )));
        }
        if self.max_bus_frequency_hz.is_nan() || self.max_bus_frequency_hz <= 0.0 {
            return Err(EngineError::Config(format!(
                "maximum bus frequency must be positive, got {}",
                self.max_bus_frequency_hz
            )));
        }
        if self.bus_frequency_hz() > self.max_bus_frequency_hz {
            return Err(EngineError::Config(format!(
                "bus frequency {} Hz exceeds device maximum {} Hz; raise the divisor",
                self.bus_frequency_hz(),
                self.max_bus_frequency_hz
            )));
        }
        if self.eeprom.device_address > 0x7F {
            return Err(EngineError::Config(format!(
                "device address 0x{:02X} does not fit in 7 bits",
                self.eeprom.device_address
            )));
        }
        let end = self.eeprom.initial_offset as usize + self.eeprom.initial_contents.len();
        if end > EEPROM_SIZE {
            return Err(EngineError::Config(format!(
                "initial contents end at 0x{:X}, past the {} byte array",
                end, EEPROM_SIZE
            )));
        }
        Ok(())
    }

    pub fn requests(&self) -> Vec<TransactionRequest> {
        self.transactions.iter().map(|t| t.to_request()).collect()
    }
}
