use log::{debug, info, warn};
use serde::Serialize;

use crate::bus::{DriveMode, TwoWireBus};
use crate::component::Component;
use crate::components::master::controller::TransactionController;
use crate::components::master::debug::{DebugSnapshot, Introspect};
use crate::components::memory::serial_eeprom::SerialEeprom;
use crate::components::monitor::bus_monitor::BusMonitor;
use crate::error::EngineError;
use crate::system_config::EngineConfig;
use crate::types::{OperationKind, TransactionRequest, U7};

/// Extra cycles granted on top of the nominal transaction length
const SLACK_CYCLES: u64 = 64;

/// Master, EEPROM and monitor sharing one two-wire bus.
///
/// Every `step` is one reference clock cycle. Components update in a fixed
/// order: master first, then the peers, then the monitor, so peers and
/// monitor see the lines as the master left them in the same cycle.
pub struct EepromBench {
    bus: TwoWireBus,
    master: TransactionController,
    eeprom: SerialEeprom,
    peers: Vec<Box<dyn Component>>,
    monitor: BusMonitor,
    cycles: u64,
    tracing: bool,
    trace: Vec<DebugSnapshot>,
    name: String,
    description: String,
}

impl EepromBench {
    pub fn new(divisor: u32, mode: DriveMode) -> Self {
        let bus = TwoWireBus::new("I2C".to_string());
        let master = TransactionController::new("MASTER".to_string(), &bus, divisor, mode);
        let eeprom = SerialEeprom::new("EEPROM".to_string(), &bus, U7::new(0x50));
        let monitor = BusMonitor::new("MONITOR".to_string(), &bus);

        EepromBench {
            bus,
            master,
            eeprom,
            peers: Vec::new(),
            monitor,
            cycles: 0,
            tracing: false,
            trace: Vec::new(),
            name: "eeprom_bench".to_string(),
            description: String::new(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let bus = TwoWireBus::new("I2C".to_string());
        let master =
            TransactionController::new("MASTER".to_string(), &bus, config.divisor, config.drive_mode);
        let mut eeprom = SerialEeprom::new(
            "EEPROM".to_string(),
            &bus,
            U7::new(config.eeprom.device_address),
        );
        eeprom.set_write_protect(config.eeprom.write_protect);
        eeprom
            .load(config.eeprom.initial_offset, &config.eeprom.initial_contents)
            .map_err(EngineError::Config)?;
        let monitor = BusMonitor::new("MONITOR".to_string(), &bus);

        info!(
            "Bench '{}': divisor {}, bus {:.0} Hz, {:?}, EEPROM at {}",
            config.name,
            config.divisor,
            config.bus_frequency_hz(),
            config.drive_mode,
            eeprom.device_address()
        );

        Ok(EepromBench {
            bus,
            master,
            eeprom,
            peers: Vec::new(),
            monitor,
            cycles: 0,
            tracing: false,
            trace: Vec::new(),
            name: config.name.clone(),
            description: config.description.clone(),
        })
    }

    /// Adds another device to the bus. It is updated after the EEPROM.
    pub fn attach(&mut self, peer: Box<dyn Component>) {
        debug!("Attaching {} to {}", peer.name(), self.bus.name());
        self.peers.push(peer);
    }

    pub fn bus(&self) -> &TwoWireBus {
        &self.bus
    }

    pub fn master(&self) -> &TransactionController {
        &self.master
    }

    pub fn master_mut(&mut self) -> &mut TransactionController {
        &mut self.master
    }

    pub fn eeprom(&self) -> &SerialEeprom {
        &self.eeprom
    }

    pub fn eeprom_mut(&mut self) -> &mut SerialEeprom {
        &mut self.eeprom
    }

    pub fn monitor(&self) -> &BusMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut BusMonitor {
        &mut self.monitor
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Record a snapshot on every phase tick from now on
    pub fn enable_trace(&mut self, enabled: bool) {
        self.tracing = enabled;
    }

    pub fn trace(&self) -> &[DebugSnapshot] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<DebugSnapshot> {
        std::mem::take(&mut self.trace)
    }

    /// One reference clock cycle
    pub fn step(&mut self) {
        self.master.update();
        self.eeprom.update();
        for peer in self.peers.iter_mut() {
            peer.update();
        }
        self.monitor.update();

        if self.tracing && self.master.ticked() {
            self.trace.push(self.master.snapshot());
        }
        self.cycles += 1;
    }

    /// Steps until the master drops busy. On timeout the master is reset,
    /// which leaves the bus released.
    pub fn run_until_idle(&mut self, max_cycles: u64) -> Result<u64, EngineError> {
        let mut elapsed = 0;
        while self.master.poll_status().busy {
            if elapsed >= max_cycles {
                warn!("{}: still busy after {} cycles, resetting master", self.name, elapsed);
                self.master.reset();
                return Err(EngineError::Timeout { cycles: elapsed });
            }
            self.step();
            elapsed += 1;
        }
        Ok(elapsed)
    }

    pub fn submit(&mut self, request: TransactionRequest) -> Result<(), EngineError> {
        if self.master.request(request) {
            Ok(())
        } else {
            Err(EngineError::Busy)
        }
    }

    /// Runs one transaction to completion. Reads return the received byte.
    pub fn execute(&mut self, request: TransactionRequest) -> Result<Option<u8>, EngineError> {
        self.submit(request)?;
        let budget = self.master.cycles_per_transaction(&request) + SLACK_CYCLES;
        self.run_until_idle(budget)?;

        if let Some(err) = self.master.last_error() {
            return Err(err);
        }
        Ok(match request.operation {
            OperationKind::Write => None,
            OperationKind::Read => Some(self.master.read_result()),
        })
    }

    pub fn write_byte(&mut self, device_address: U7, offset: u16, data: u8) -> Result<(), EngineError> {
        self.execute(TransactionRequest::write(device_address, offset, data))
            .map(|_| ())
    }

    pub fn read_byte(&mut self, device_address: U7, offset: u16) -> Result<u8, EngineError> {
        let byte = self.execute(TransactionRequest::read(device_address, offset))?;
        Ok(byte.unwrap_or_default())
    }

    /// Repeats a write that was not acknowledged, up to `attempts` times in total.
    /// Any other error is returned at once.
    pub fn write_with_retry(
        &mut self,
        device_address: U7,
        offset: u16,
        data: u8,
        attempts: u32,
    ) -> Result<u32, EngineError> {
        let mut last = EngineError::Busy;
        for attempt in 1..=attempts.max(1) {
            match self.write_byte(device_address, offset, data) {
                Ok(()) => return Ok(attempt),
                Err(err @ EngineError::AcknowledgmentFailure(_)) => {
                    debug!("{}: attempt {} failed: {}", self.name, attempt, err);
                    last = err;
                }
                Err(err) => return Err(err),
            }
        }
        Err(last)
    }

    /// Master watchdog reset plus a fresh monitor log; memory contents are kept
    pub fn reset(&mut self) {
        self.master.reset();
        self.eeprom.reset();
        for peer in self.peers.iter_mut() {
            peer.reset();
        }
        self.monitor.reset();
        self.trace.clear();
    }

    pub fn system_info(&self) -> SystemInfo {
        SystemInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            component_count: 3 + self.peers.len(),
            divisor: self.master.divisor(),
            drive_mode: self.master.drive_mode(),
            eeprom_address: self.eeprom.device_address().value(),
            eeprom_size: self.eeprom.size(),
            cycles: self.cycles,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub name: String,
    pub description: String,
    pub component_count: usize,
    pub divisor: u32,
    pub drive_mode: DriveMode,
    pub eeprom_address: u8,
    pub eeprom_size: usize,
    pub cycles: u64,
}
