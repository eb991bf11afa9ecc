//! The master protocol engine.
//!
//! Every state spans one bit period made of four phase ticks:
//!
//! | phase | action for a bit transfer                         |
//! |-------|---------------------------------------------------|
//! | P0    | put the next bit on SDA while SCL is low          |
//! | P1    | raise SCL                                         |
//! | P2    | hold SCL high, sample SDA when receiving or ACKing |
//! | P3    | lower SCL, shift, count down, change state        |
//!
//! SDA therefore only changes while SCL is low, except for the START and
//! STOP conditions, and is only sampled while SCL is high.

use log::{debug, trace};

use crate::bus::BusLineDriver;
use crate::components::clock::phase_clock::Phase;
use crate::components::master::state::ProtocolState;
use crate::error::AckPhase;
use crate::types::{OperationKind, TransactionRequest};

pub const BITS_PER_BYTE: u8 = 8;

/// What happened on one phase tick, for the controller to fold into its registers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// An acknowledgment slot sampled SDA high
    pub nack: Option<AckPhase>,
    /// Reception finished with this byte
    pub received: Option<u8>,
    /// STOP is on the bus and the engine is back in Idle
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct ProtocolStateMachine {
    state: ProtocolState,
    shift_register: u8,
    bit_counter: u8,
    nack_pending: bool,
}

impl ProtocolStateMachine {
    pub fn new() -> Self {
        ProtocolStateMachine {
            state: ProtocolState::Idle,
            shift_register: 0,
            bit_counter: 0,
            nack_pending: false,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn shift_register(&self) -> u8 {
        self.shift_register
    }

    pub fn bit_counter(&self) -> u8 {
        self.bit_counter
    }

    /// Number of bit periods a transaction occupies on the bus
    pub fn phase_groups_for(kind: OperationKind) -> u32 {
        let byte_with_ack = BITS_PER_BYTE as u32 + 1;
        match kind {
            // START, address, offset high, offset low, data, STOP
            OperationKind::Write => 1 + 4 * byte_with_ack + 1,
            // ..., repeated START, address, 8 data bits, NACK, STOP
            OperationKind::Read => 1 + 3 * byte_with_ack + 1 + byte_with_ack + 8 + 1 + 1,
        }
    }

    /// Leaves Idle for StartCondition. Refused in any other state.
    pub fn arm(&mut self) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        self.shift_register = 0;
        self.bit_counter = 0;
        self.nack_pending = false;
        self.enter(ProtocolState::StartCondition);
        true
    }

    /// External reset; the caller is responsible for the lines
    pub fn force_idle(&mut self) {
        self.shift_register = 0;
        self.bit_counter = 0;
        self.nack_pending = false;
        self.enter(ProtocolState::Idle);
    }

    pub fn advance(
        &mut self,
        phase: Phase,
        lines: &mut BusLineDriver,
        latched: &TransactionRequest,
    ) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        trace!("{} {:?}", self.state, phase);

        match self.state {
            ProtocolState::Idle => {}

            ProtocolState::StartCondition => match phase {
                Phase::P0 => {
                    lines.drive_data_bit(true);
                    lines.drive_clock_high();
                }
                // SDA falls while SCL is high
                Phase::P1 => lines.drive_data_bit(false),
                Phase::P2 => lines.drive_clock_low(),
                Phase::P3 => {
                    self.load_byte(latched.device_address.write_byte());
                    self.enter(ProtocolState::SendAddressWrite);
                }
            },

            ProtocolState::SendAddressWrite
            | ProtocolState::SendOffsetHigh
            | ProtocolState::SendOffsetLow
            | ProtocolState::SendData
            | ProtocolState::SendAddressRead => match phase {
                Phase::P0 => lines.drive_data_bit(self.shift_register & 0x80 != 0),
                Phase::P1 => lines.drive_clock_high(),
                Phase::P2 => {}
                Phase::P3 => {
                    lines.drive_clock_low();
                    self.shift_register <<= 1;
                    self.bit_counter = self.bit_counter.saturating_sub(1);
                    if self.bit_counter == 0 {
                        // The receiver pulls SDA low on this same falling edge
                        lines.release_data();
                        if let Some(ack) = self.state.paired_ack() {
                            self.enter(ack);
                        }
                    }
                }
            },

            ProtocolState::Ack1
            | ProtocolState::Ack2
            | ProtocolState::Ack3
            | ProtocolState::Ack4
            | ProtocolState::Ack5 => match phase {
                Phase::P0 => lines.release_data(),
                Phase::P1 => lines.drive_clock_high(),
                Phase::P2 => {
                    if lines.sample_data() {
                        self.nack_pending = true;
                        outcome.nack = self.state.ack_phase();
                    }
                }
                Phase::P3 => {
                    lines.drive_clock_low();
                    let next = if self.nack_pending {
                        ProtocolState::StopCondition
                    } else {
                        self.after_ack(latched)
                    };
                    self.nack_pending = false;
                    self.enter(next);
                }
            },

            ProtocolState::RepeatedStart => match phase {
                Phase::P0 => lines.release_data(),
                Phase::P1 => lines.drive_clock_high(),
                // SDA falls while SCL is high, without a STOP in between
                Phase::P2 => lines.drive_data_bit(false),
                Phase::P3 => {
                    lines.drive_clock_low();
                    self.load_byte(latched.device_address.read_byte());
                    self.enter(ProtocolState::SendAddressRead);
                }
            },

            ProtocolState::ReceiveData => match phase {
                Phase::P0 => lines.release_data(),
                Phase::P1 => lines.drive_clock_high(),
                Phase::P2 => {
                    let bit = lines.sample_data() as u8;
                    self.shift_register = (self.shift_register << 1) | bit;
                }
                Phase::P3 => {
                    lines.drive_clock_low();
                    self.bit_counter = self.bit_counter.saturating_sub(1);
                    if self.bit_counter == 0 {
                        outcome.received = Some(self.shift_register);
                        self.enter(ProtocolState::SendNack);
                    }
                }
            },

            // Exactly one byte is read, so the master never acknowledges it
            ProtocolState::SendNack => match phase {
                Phase::P0 => lines.drive_data_bit(true),
                Phase::P1 => lines.drive_clock_high(),
                Phase::P2 => {}
                Phase::P3 => {
                    lines.drive_clock_low();
                    self.enter(ProtocolState::StopCondition);
                }
            },

            ProtocolState::StopCondition => match phase {
                Phase::P0 => {
                    lines.drive_clock_low();
                    lines.drive_data_bit(false);
                }
                Phase::P1 => lines.drive_clock_high(),
                // SDA rises while SCL is high
                Phase::P2 => lines.release_data(),
                Phase::P3 => {
                    outcome.completed = true;
                    self.enter(ProtocolState::Idle);
                }
            },
        }

        outcome
    }

    fn after_ack(&mut self, latched: &TransactionRequest) -> ProtocolState {
        match self.state {
            ProtocolState::Ack1 => {
                self.load_byte(latched.offset_high());
                ProtocolState::SendOffsetHigh
            }
            ProtocolState::Ack2 => {
                self.load_byte(latched.offset_low());
                ProtocolState::SendOffsetLow
            }
            ProtocolState::Ack3 => match latched.operation {
                OperationKind::Read => ProtocolState::RepeatedStart,
                OperationKind::Write => {
                    self.load_byte(latched.data);
                    ProtocolState::SendData
                }
            },
            ProtocolState::Ack5 => {
                self.load_byte(0);
                ProtocolState::ReceiveData
            }
            // Ack4: the single data byte is out, either way the bus is closed
            _ => ProtocolState::StopCondition,
        }
    }

    fn load_byte(&mut self, byte: u8) {
        self.shift_register = byte;
        self.bit_counter = BITS_PER_BYTE;
    }

    fn enter(&mut self, next: ProtocolState) {
        if next != self.state {
            debug!("{} -> {}", self.state, next);
        }
        self.state = next;
    }
}

impl Default for ProtocolStateMachine {
    fn default() -> Self {
        ProtocolStateMachine::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{DriveMode, TwoWireBus};
    use crate::component::lock_pin;
    use crate::pin::PinValue;
    use crate::types::U7;

    fn setup() -> (TwoWireBus, BusLineDriver, ProtocolStateMachine) {
        let bus = TwoWireBus::new("BUS".to_string());
        let lines = BusLineDriver::new("MASTER".to_string(), &bus, DriveMode::PushPull);
        (bus, lines, ProtocolStateMachine::new())
    }

    /// Runs one full bit period and returns the combined outcome
    fn bit_period(
        machine: &mut ProtocolStateMachine,
        lines: &mut BusLineDriver,
        latched: &TransactionRequest,
    ) -> StepOutcome {
        let mut combined = StepOutcome::default();
        for phase in [Phase::P0, Phase::P1, Phase::P2, Phase::P3] {
            let outcome = machine.advance(phase, lines, latched);
            combined.nack = combined.nack.or(outcome.nack);
            combined.received = combined.received.or(outcome.received);
            combined.completed |= outcome.completed;
        }
        combined
    }

    fn hold_sda_low(bus: &TwoWireBus, low: bool) {
        let sda = bus.sda();
        let mut pin = lock_pin(&sda);
        if low {
            pin.set_driver(Some("PEER".to_string()), PinValue::Low);
        } else {
            pin.remove_driver("PEER");
        }
    }

    #[test]
    fn test_phase_group_counts() {
        assert_eq!(ProtocolStateMachine::phase_groups_for(OperationKind::Write), 38);
        assert_eq!(ProtocolStateMachine::phase_groups_for(OperationKind::Read), 48);
    }

    #[test]
    fn test_arm_only_from_idle() {
        let mut machine = ProtocolStateMachine::new();
        assert!(machine.arm());
        assert_eq!(machine.state(), ProtocolState::StartCondition);
        assert!(!machine.arm());

        machine.force_idle();
        assert!(machine.state().is_idle());
        assert!(machine.arm());
    }

    #[test]
    fn test_idle_ignores_ticks() {
        let (bus, mut lines, mut machine) = setup();
        let latched = TransactionRequest::write(U7::new(0x50), 0, 0);
        let outcome = bit_period(&mut machine, &mut lines, &latched);
        assert_eq!(outcome, StepOutcome::default());
        assert!(bus.is_idle());
    }

    #[test]
    fn test_start_condition_sequence() {
        let (bus, mut lines, mut machine) = setup();
        let latched = TransactionRequest::write(U7::new(0x50), 0x0010, 0x55);
        machine.arm();

        machine.advance(Phase::P0, &mut lines, &latched);
        assert_eq!(bus.levels(), (true, true));
        machine.advance(Phase::P1, &mut lines, &latched);
        assert_eq!(bus.levels(), (true, false));
        machine.advance(Phase::P2, &mut lines, &latched);
        assert_eq!(bus.levels(), (false, false));
        machine.advance(Phase::P3, &mut lines, &latched);

        assert_eq!(machine.state(), ProtocolState::SendAddressWrite);
        assert_eq!(machine.shift_register(), 0xA0);
        assert_eq!(machine.bit_counter(), 8);
    }

    #[test]
    fn test_transmit_shifts_msb_first() {
        let (bus, mut lines, mut machine) = setup();
        let latched = TransactionRequest::write(U7::new(0x50), 0x0010, 0x55);
        machine.arm();
        bit_period(&mut machine, &mut lines, &latched);

        let mut sent = 0u8;
        for _ in 0..8 {
            machine.advance(Phase::P0, &mut lines, &latched);
            machine.advance(Phase::P1, &mut lines, &latched);
            let (scl, sda) = bus.levels();
            assert!(scl);
            sent = (sent << 1) | sda as u8;
            machine.advance(Phase::P2, &mut lines, &latched);
            machine.advance(Phase::P3, &mut lines, &latched);
        }

        assert_eq!(sent, 0xA0);
        assert_eq!(machine.state(), ProtocolState::Ack1);
        assert_eq!(machine.bit_counter(), 0);
    }

    #[test]
    fn test_sda_released_on_last_falling_edge() {
        let (bus, mut lines, mut machine) = setup();
        // 0xA3 ends in a one, which push-pull would otherwise keep driving
        let latched = TransactionRequest::write(U7::new(0x51), 0x0010, 0x55);
        machine.arm();
        for _ in 0..8 {
            bit_period(&mut machine, &mut lines, &latched);
        }
        assert_eq!(machine.state(), ProtocolState::SendAddressWrite);
        assert!(lines.line_state().sda_output_enable);

        bit_period(&mut machine, &mut lines, &latched);
        assert_eq!(machine.state(), ProtocolState::Ack1);
        assert!(!lines.line_state().sda_output_enable);
        assert!(lock_pin(&bus.sda()).driver_value("MASTER").is_none());

        // A peer acknowledging on that edge has the line to itself
        hold_sda_low(&bus, true);
        assert!(bus.check_contention().is_ok());
        assert_eq!(bus.levels(), (false, false));
    }

    #[test]
    fn test_nack_on_address_aborts_to_stop() {
        let (bus, mut lines, mut machine) = setup();
        let latched = TransactionRequest::write(U7::new(0x50), 0x0010, 0x55);
        machine.arm();
        for _ in 0..9 {
            bit_period(&mut machine, &mut lines, &latched);
        }
        assert_eq!(machine.state(), ProtocolState::Ack1);

        // Nobody answers: the pull-up leaves SDA high
        machine.advance(Phase::P0, &mut lines, &latched);
        machine.advance(Phase::P1, &mut lines, &latched);
        let outcome = machine.advance(Phase::P2, &mut lines, &latched);
        assert_eq!(outcome.nack, Some(AckPhase::AddressWrite));
        machine.advance(Phase::P3, &mut lines, &latched);
        assert_eq!(machine.state(), ProtocolState::StopCondition);

        let outcome = bit_period(&mut machine, &mut lines, &latched);
        assert!(outcome.completed);
        assert!(machine.state().is_idle());
        assert!(bus.is_idle());
    }

    #[test]
    fn test_ack_branches_on_operation() {
        for (kind, expected) in [
            (OperationKind::Write, ProtocolState::SendData),
            (OperationKind::Read, ProtocolState::RepeatedStart),
        ] {
            let (bus, mut lines, mut machine) = setup();
            let latched = TransactionRequest {
                operation: kind,
                device_address: U7::new(0x50),
                memory_offset: 0x0010,
                data: 0x55,
            };
            machine.arm();
            // START + three bytes, each followed by an ACK the peer drives low
            bit_period(&mut machine, &mut lines, &latched);
            for _ in 0..3 {
                for _ in 0..8 {
                    bit_period(&mut machine, &mut lines, &latched);
                }
                hold_sda_low(&bus, true);
                let outcome = bit_period(&mut machine, &mut lines, &latched);
                hold_sda_low(&bus, false);
                assert_eq!(outcome.nack, None);
            }
            assert_eq!(machine.state(), expected);
        }
    }

    #[test]
    fn test_receive_assembles_msb_first() {
        let (bus, mut lines, mut machine) = setup();
        let latched = TransactionRequest::read(U7::new(0x50), 0x0010);
        machine.arm();
        bit_period(&mut machine, &mut lines, &latched);
        for _ in 0..3 {
            for _ in 0..8 {
                bit_period(&mut machine, &mut lines, &latched);
            }
            hold_sda_low(&bus, true);
            bit_period(&mut machine, &mut lines, &latched);
            hold_sda_low(&bus, false);
        }
        assert_eq!(machine.state(), ProtocolState::RepeatedStart);
        bit_period(&mut machine, &mut lines, &latched);
        assert_eq!(machine.state(), ProtocolState::SendAddressRead);
        assert_eq!(machine.shift_register(), 0xA1);
        for _ in 0..8 {
            bit_period(&mut machine, &mut lines, &latched);
        }
        hold_sda_low(&bus, true);
        bit_period(&mut machine, &mut lines, &latched);
        hold_sda_low(&bus, false);
        assert_eq!(machine.state(), ProtocolState::ReceiveData);

        let byte = 0x55u8;
        let mut received = None;
        for i in 0..8 {
            hold_sda_low(&bus, byte & (0x80 >> i) == 0);
            let outcome = bit_period(&mut machine, &mut lines, &latched);
            received = received.or(outcome.received);
        }
        hold_sda_low(&bus, false);
        assert_eq!(received, Some(0x55));
        assert_eq!(machine.state(), ProtocolState::SendNack);

        // Master leaves SDA high during the ninth clock
        machine.advance(Phase::P0, &mut lines, &latched);
        machine.advance(Phase::P1, &mut lines, &latched);
        assert_eq!(bus.levels(), (true, true));
        machine.advance(Phase::P2, &mut lines, &latched);
        machine.advance(Phase::P3, &mut lines, &latched);
        assert_eq!(machine.state(), ProtocolState::StopCondition);
    }

    #[test]
    fn test_stop_condition_sequence() {
        let (bus, mut lines, mut machine) = setup();
        let latched = TransactionRequest::write(U7::new(0x50), 0, 0);
        machine.arm();
        // START then abort on Ack1 to reach StopCondition quickly
        for _ in 0..10 {
            bit_period(&mut machine, &mut lines, &latched);
        }
        assert_eq!(machine.state(), ProtocolState::StopCondition);

        machine.advance(Phase::P0, &mut lines, &latched);
        assert_eq!(bus.levels(), (false, false));
        machine.advance(Phase::P1, &mut lines, &latched);
        assert_eq!(bus.levels(), (true, false));
        machine.advance(Phase::P2, &mut lines, &latched);
        assert_eq!(bus.levels(), (true, true));
        let outcome = machine.advance(Phase::P3, &mut lines, &latched);
        assert!(outcome.completed);
        assert!(!lines.line_state().sda_output_enable);
    }
}
