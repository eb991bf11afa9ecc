use log::{debug, info, warn};
use std::collections::HashMap;

use crate::bus::{BusLineDriver, DriveMode, TwoWireBus, SCL, SDA};
use crate::component::{BaseComponent, Component, PinRef};
use crate::components::clock::phase_clock::{Phase, PhaseClock};
use crate::components::master::debug::{DebugSnapshot, Introspect};
use crate::components::master::state::ProtocolState;
use crate::components::master::state_machine::ProtocolStateMachine;
use crate::error::{AckPhase, EngineError};
use crate::types::{TransactionRequest, U7};

/// Externally visible status lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status {
    pub busy: bool,
    /// High for exactly one `update` after STOP
    pub done: bool,
    /// Sticky until the next request is accepted
    pub error: bool,
}

/// Public face of the master: takes requests, runs the engine one reference
/// cycle per `update`, and reports busy/done/error and the read result.
pub struct TransactionController {
    base: BaseComponent,
    clock: PhaseClock,
    machine: ProtocolStateMachine,
    lines: BusLineDriver,
    latched: TransactionRequest,
    last_phase: Option<Phase>,
    ticked: bool,
    busy: bool,
    done: bool,
    error: Option<AckPhase>,
    read_result: u8,
}

impl TransactionController {
    pub fn new(name: String, bus: &TwoWireBus, divisor: u32, mode: DriveMode) -> Self {
        let mut base = BaseComponent::new(name.clone());
        base.attach_pin(SCL, bus.scl());
        base.attach_pin(SDA, bus.sda());

        TransactionController {
            lines: BusLineDriver::new(name, bus, mode),
            base,
            clock: PhaseClock::new(divisor),
            machine: ProtocolStateMachine::new(),
            latched: TransactionRequest::read(U7::new(0), 0),
            last_phase: None,
            ticked: false,
            busy: false,
            done: false,
            error: None,
            read_result: 0,
        }
    }

    pub fn request_write(&mut self, device_address: U7, memory_offset: u16, data: u8) -> bool {
        self.request(TransactionRequest::write(device_address, memory_offset, data))
    }

    pub fn request_read(&mut self, device_address: U7, memory_offset: u16) -> bool {
        self.request(TransactionRequest::read(device_address, memory_offset))
    }

    /// Latches `request` and arms the engine. Ignored while a transaction is in flight.
    pub fn request(&mut self, request: TransactionRequest) -> bool {
        if self.busy || !self.machine.arm() {
            warn!("{}: busy, ignoring {}", self.base.get_name(), request);
            return false;
        }

        self.latched = request;
        self.error = None;
        self.busy = true;
        self.done = false;
        debug!("{}: accepted {}", self.base.get_name(), request);
        true
    }

    pub fn poll_status(&self) -> Status {
        Status {
            busy: self.busy,
            done: self.done,
            error: self.error.is_some(),
        }
    }

    /// Byte received by the last read; only meaningful if it finished without error
    pub fn read_result(&self) -> u8 {
        self.read_result
    }

    pub fn last_error(&self) -> Option<EngineError> {
        self.error.map(EngineError::AcknowledgmentFailure)
    }

    pub fn latched(&self) -> &TransactionRequest {
        &self.latched
    }

    pub fn state(&self) -> ProtocolState {
        self.machine.state()
    }

    /// The last `update` carried a phase tick
    pub fn ticked(&self) -> bool {
        self.ticked
    }

    pub fn drive_mode(&self) -> DriveMode {
        self.lines.mode()
    }

    pub fn divisor(&self) -> u32 {
        self.clock.divisor()
    }

    /// Reference cycles a transaction of the latched kind takes, arming to done
    pub fn cycles_per_transaction(&self, request: &TransactionRequest) -> u64 {
        ProtocolStateMachine::phase_groups_for(request.operation) as u64
            * 4
            * self.clock.divisor() as u64
    }

    fn finish(&mut self) {
        self.busy = false;
        self.done = true;
        self.clock.hold();
        match self.error {
            Some(phase) => warn!(
                "{}: {} aborted, no acknowledgment after {}",
                self.base.get_name(),
                self.latched,
                phase
            ),
            None => info!("{}: {} done", self.base.get_name(), self.latched),
        }
    }
}

impl Component for TransactionController {
    fn name(&self) -> &str {
        self.base.get_name()
    }

    fn pins(&self) -> &HashMap<String, PinRef> {
        self.base.pins()
    }

    fn get_pin(&self, name: &str) -> Result<PinRef, String> {
        self.base.get_pin(name)
    }

    fn update(&mut self) {
        self.done = false;
        self.ticked = false;

        let phase = match self.clock.step(self.busy) {
            Some(phase) => phase,
            None => return,
        };
        self.ticked = true;
        self.last_phase = Some(phase);

        let outcome = self.machine.advance(phase, &mut self.lines, &self.latched);
        if let Some(ack) = outcome.nack {
            self.error = Some(ack);
        }
        if let Some(byte) = outcome.received {
            self.read_result = byte;
        }
        if outcome.completed {
            self.finish();
        }
    }

    /// Watchdog-style abort: back to Idle with the bus released.
    /// The error flag keeps its last value.
    fn reset(&mut self) {
        self.machine.force_idle();
        self.clock.hold();
        self.lines.release_data();
        self.lines.drive_clock_high();
        self.busy = false;
        self.done = false;
        self.ticked = false;
        self.last_phase = None;
    }
}

impl Introspect for TransactionController {
    fn snapshot(&self) -> DebugSnapshot {
        DebugSnapshot {
            state: self.machine.state(),
            bit_counter: self.machine.bit_counter(),
            shift_register: self.machine.shift_register(),
            phase: self.last_phase,
            lines: self.lines.line_state(),
            busy: self.busy,
            error: self.error.is_some(),
        }
    }
}
