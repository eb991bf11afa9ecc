use std::fmt;

/// Acknowledgment slot that observed a NACK
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AckPhase {
    /// After the device address with the write bit
    AddressWrite,
    OffsetHigh,
    OffsetLow,
    Data,
    /// After the device address with the read bit (repeated START)
    AddressRead,
}

impl fmt::Display for AckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AckPhase::AddressWrite => "address (write)",
            AckPhase::OffsetHigh => "offset high byte",
            AckPhase::OffsetLow => "offset low byte",
            AckPhase::Data => "data byte",
            AckPhase::AddressRead => "address (read)",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The peer left SDA high during an acknowledgment slot
    #[error("no acknowledgment after {0}")]
    AcknowledgmentFailure(AckPhase),
    /// The controller was busy and rejected the request
    #[error("transaction already in progress")]
    Busy,
    /// A bench loop gave up after this many reference cycles
    #[error("transaction did not finish within {cycles} cycles")]
    Timeout { cycles: u64 },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EngineError::AcknowledgmentFailure(a), EngineError::AcknowledgmentFailure(b)) => {
                a == b
            }
            (EngineError::Busy, EngineError::Busy) => true,
            (EngineError::Timeout { cycles: a }, EngineError::Timeout { cycles: b }) => a == b,
            (EngineError::Config(a), EngineError::Config(b)) => a == b,
            _ => false,
        }
    }
}
