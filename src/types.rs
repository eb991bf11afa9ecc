use serde::{Deserialize, Serialize};
use std::fmt;

/// 7-bit unsigned integer for two-wire device addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct U7(u8);

impl U7 {
    pub fn new(value: u8) -> Self {
        U7(value & 0x7F)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Address byte with the direction bit clear (master writes)
    pub fn write_byte(&self) -> u8 {
        self.0 << 1
    }

    /// Address byte with the direction bit set (master reads)
    pub fn read_byte(&self) -> u8 {
        (self.0 << 1) | 1
    }

    /// Splits an address byte as seen on the bus into address and read flag
    pub fn from_address_byte(byte: u8) -> (Self, bool) {
        (U7::new(byte >> 1), byte & 1 == 1)
    }
}

impl fmt::Display for U7 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl From<u8> for U7 {
    fn from(value: u8) -> Self {
        U7::new(value)
    }
}

impl From<U7> for u8 {
    fn from(value: U7) -> Self {
        value.value()
    }
}

/// Direction of a transaction, recorded when the engine is armed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Write,
    Read,
}

/// A single-byte random-access request, applied atomically or not at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionRequest {
    pub operation: OperationKind,
    pub device_address: U7,
    pub memory_offset: u16,
    /// Ignored for reads
    pub data: u8,
}

impl TransactionRequest {
    pub fn write(device_address: U7, memory_offset: u16, data: u8) -> Self {
        TransactionRequest {
            operation: OperationKind::Write,
            device_address,
            memory_offset,
            data,
        }
    }

    pub fn read(device_address: U7, memory_offset: u16) -> Self {
        TransactionRequest {
            operation: OperationKind::Read,
            device_address,
            memory_offset,
            data: 0,
        }
    }

    pub fn offset_high(&self) -> u8 {
        (self.memory_offset >> 8) as u8
    }

    pub fn offset_low(&self) -> u8 {
        (self.memory_offset & 0xFF) as u8
    }
}

impl fmt::Display for TransactionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            OperationKind::Write => write!(
                f,
                "write {} @{:04X} <- {:02X}",
                self.device_address, self.memory_offset, self.data
            ),
            OperationKind::Read => {
                write!(f, "read {} @{:04X}", self.device_address, self.memory_offset)
            }
        }
    }
}
