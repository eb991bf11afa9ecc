use serde::Serialize;

use crate::error::AckPhase;

// Master protocol states, one bit period (four phase ticks) each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProtocolState {
    Idle,
    StartCondition,
    SendAddressWrite,
    Ack1,
    SendOffsetHigh,
    Ack2,
    SendOffsetLow,
    Ack3,
    SendData,
    Ack4,
    RepeatedStart,
    SendAddressRead,
    Ack5,
    ReceiveData,
    SendNack,
    StopCondition,
}

impl ProtocolState {
    pub const ALL: [ProtocolState; 16] = [
        ProtocolState::Idle,
        ProtocolState::StartCondition,
        ProtocolState::SendAddressWrite,
        ProtocolState::Ack1,
        ProtocolState::SendOffsetHigh,
        ProtocolState::Ack2,
        ProtocolState::SendOffsetLow,
        ProtocolState::Ack3,
        ProtocolState::SendData,
        ProtocolState::Ack4,
        ProtocolState::RepeatedStart,
        ProtocolState::SendAddressRead,
        ProtocolState::Ack5,
        ProtocolState::ReceiveData,
        ProtocolState::SendNack,
        ProtocolState::StopCondition,
    ];

    pub fn is_idle(&self) -> bool {
        matches!(self, ProtocolState::Idle)
    }

    /// Eight-bit transmit states
    pub fn is_transmitting(&self) -> bool {
        matches!(
            self,
            ProtocolState::SendAddressWrite
                | ProtocolState::SendOffsetHigh
                | ProtocolState::SendOffsetLow
                | ProtocolState::SendData
                | ProtocolState::SendAddressRead
        )
    }

    pub fn is_receiving(&self) -> bool {
        matches!(self, ProtocolState::ReceiveData)
    }

    pub fn is_acknowledge(&self) -> bool {
        self.ack_phase().is_some()
    }

    /// Which acknowledgment slot this state samples
    pub fn ack_phase(&self) -> Option<AckPhase> {
        match self {
            ProtocolState::Ack1 => Some(AckPhase::AddressWrite),
            ProtocolState::Ack2 => Some(AckPhase::OffsetHigh),
            ProtocolState::Ack3 => Some(AckPhase::OffsetLow),
            ProtocolState::Ack4 => Some(AckPhase::Data),
            ProtocolState::Ack5 => Some(AckPhase::AddressRead),
            _ => None,
        }
    }

    /// Acknowledgment state that follows a transmit state
    pub fn paired_ack(&self) -> Option<ProtocolState> {
        match self {
            ProtocolState::SendAddressWrite => Some(ProtocolState::Ack1),
            ProtocolState::SendOffsetHigh => Some(ProtocolState::Ack2),
            ProtocolState::SendOffsetLow => Some(ProtocolState::Ack3),
            ProtocolState::SendData => Some(ProtocolState::Ack4),
            ProtocolState::SendAddressRead => Some(ProtocolState::Ack5),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
