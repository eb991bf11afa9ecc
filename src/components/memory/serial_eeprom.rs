use log::{debug, trace};
use serde::Serialize;
use std::collections::HashMap;

use crate::bus::{TwoWireBus, SCL, SDA};
use crate::component::{lock_pin, BaseComponent, Component, PinRef};
use crate::pin::PinValue;
use crate::types::U7;

/// 32 Kbit part: 4096 bytes, 12 significant offset bits
pub const EEPROM_SIZE: usize = 4096;
pub const PAGE_SIZE: usize = 32;
pub const DEFAULT_DEVICE_ADDRESS: u8 = 0x50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EepromState {
    StandBy,
    DeviceAddress,
    AddressHigh,
    AddressLow,
    WriteData,
    ReadData,
    /// Finished or refused; ignore everything until STOP or START
    WaitStop,
}

impl EepromState {
    fn is_receiving(&self) -> bool {
        matches!(
            self,
            EepromState::DeviceAddress
                | EepromState::AddressHigh
                | EepromState::AddressLow
                | EepromState::WriteData
        )
    }
}

/// Two-wire serial EEPROM (24C32 class) with 16-bit word addressing.
///
/// Reacts to line edges only: START/STOP from SDA changing while SCL is high,
/// input bits on SCL rising, output changes on SCL falling. It never drives
/// SDA high; a one is produced by releasing the line. Written bytes are
/// buffered and committed to the array on STOP, with page rollover inside a
/// 32-byte page like the real part.
pub struct SerialEeprom {
    base: BaseComponent,
    memory: Vec<u8>,
    device_address: U7,
    write_protect: bool,
    state: EepromState,
    old_scl: bool,
    old_sda: bool,
    bit_count: u8,
    shift: u8,
    /// Inside the acknowledgment clock we are driving
    acking: bool,
    /// Master acknowledged the byte we just sent
    master_acked: bool,
    word_address: u16,
    page_buffer: Vec<(u16, u8)>,
    committed_writes: u64,
}

impl SerialEeprom {
    pub fn new(name: String, bus: &TwoWireBus, device_address: U7) -> Self {
        let mut base = BaseComponent::new(name);
        base.attach_pin(SCL, bus.scl());
        base.attach_pin(SDA, bus.sda());
        let (old_scl, old_sda) = bus.levels();

        SerialEeprom {
            base,
            memory: vec![0xFF; EEPROM_SIZE],
            device_address,
            write_protect: false,
            state: EepromState::StandBy,
            old_scl,
            old_sda,
            bit_count: 0,
            shift: 0,
            acking: false,
            master_acked: false,
            word_address: 0,
            page_buffer: Vec::new(),
            committed_writes: 0,
        }
    }

    pub fn device_address(&self) -> U7 {
        self.device_address
    }

    pub fn state(&self) -> EepromState {
        self.state
    }

    /// Internal address counter, as left by the last access
    pub fn word_address(&self) -> u16 {
        self.word_address
    }

    pub fn set_write_protect(&mut self, enabled: bool) {
        self.write_protect = enabled;
    }

    pub fn write_protect(&self) -> bool {
        self.write_protect
    }

    /// Bytes written over the bus and committed by a STOP
    pub fn committed_writes(&self) -> u64 {
        self.committed_writes
    }

    pub fn size(&self) -> usize {
        self.memory.len()
    }

    /// Backdoor load, bypassing the bus
    pub fn load(&mut self, offset: u16, data: &[u8]) -> Result<(), String> {
        let start = offset as usize;
        if start + data.len() > self.memory.len() {
            return Err(format!(
                "Data exceeds EEPROM capacity ({} bytes at 0x{:04X})",
                data.len(),
                offset
            ));
        }
        self.memory[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn peek(&self, offset: u16) -> u8 {
        self.memory[self.mask(offset) as usize]
    }

    pub fn poke(&mut self, offset: u16, data: u8) {
        let index = self.mask(offset) as usize;
        self.memory[index] = data;
    }

    pub fn contents(&self) -> &[u8] {
        &self.memory
    }

    fn mask(&self, offset: u16) -> u16 {
        offset & (EEPROM_SIZE as u16 - 1)
    }

    fn next_in_page(&self, address: u16) -> u16 {
        let page_mask = PAGE_SIZE as u16 - 1;
        (address & !page_mask) | (address.wrapping_add(1) & page_mask)
    }

    fn read_lines(&self) -> (bool, bool) {
        let scl = self
            .base
            .get_pin(SCL)
            .map(|pin| lock_pin(&pin).is_high())
            .unwrap_or(true);
        let sda = self
            .base
            .get_pin(SDA)
            .map(|pin| lock_pin(&pin).is_high())
            .unwrap_or(true);
        (scl, sda)
    }

    fn drive_sda_low(&self) {
        if let Ok(pin) = self.base.get_pin(SDA) {
            lock_pin(&pin).set_driver(Some(self.base.get_name().to_string()), PinValue::Low);
        }
    }

    fn release_sda(&self) {
        if let Ok(pin) = self.base.get_pin(SDA) {
            lock_pin(&pin).remove_driver(self.base.get_name());
        }
    }

    fn put_bit(&self, bit: bool) {
        if bit {
            self.release_sda();
        } else {
            self.drive_sda_low();
        }
    }

    fn on_start(&mut self) {
        if !self.page_buffer.is_empty() {
            debug!("{}: START discards {} buffered bytes", self.base.get_name(), self.page_buffer.len());
            self.page_buffer.clear();
        }
        self.release_sda();
        self.state = EepromState::DeviceAddress;
        self.bit_count = 0;
        self.shift = 0;
        self.acking = false;
    }

    fn on_stop(&mut self) {
        self.release_sda();
        for (address, data) in self.page_buffer.drain(..) {
            self.memory[address as usize] = data;
            self.committed_writes += 1;
        }
        self.state = EepromState::StandBy;
        self.acking = false;
    }

    fn on_clock_rise(&mut self, sda: bool) {
        if self.state.is_receiving() {
            if !self.acking && self.bit_count < 8 {
                self.shift = (self.shift << 1) | sda as u8;
                self.bit_count += 1;
            }
        } else if self.state == EepromState::ReadData && !self.acking && self.bit_count == 8 {
            // Master's acknowledgment of the byte we sent
            self.word_address = self.mask(self.word_address.wrapping_add(1));
            if sda {
                trace!("{}: master NACK, read finished", self.base.get_name());
                self.state = EepromState::WaitStop;
            } else {
                self.master_acked = true;
            }
        }
    }

    fn on_clock_fall(&mut self) {
        if self.acking {
            self.release_sda();
            self.acking = false;
            self.bit_count = 0;
            if self.state == EepromState::ReadData {
                self.start_read_byte();
            }
            return;
        }

        match self.state {
            s if s.is_receiving() && self.bit_count == 8 => {
                if self.accept_byte() {
                    self.drive_sda_low();
                    self.acking = true;
                }
            }
            EepromState::ReadData => {
                self.bit_count += 1;
                if self.bit_count < 8 {
                    self.put_bit(self.shift & (0x80 >> self.bit_count) != 0);
                } else if self.bit_count == 8 {
                    // Let the master acknowledge
                    self.release_sda();
                } else if self.master_acked {
                    self.start_read_byte();
                }
            }
            _ => {}
        }
    }

    fn start_read_byte(&mut self) {
        self.shift = self.memory[self.word_address as usize];
        self.bit_count = 0;
        self.master_acked = false;
        trace!("{}: sending {:02X} from {:04X}", self.base.get_name(), self.shift, self.word_address);
        self.put_bit(self.shift & 0x80 != 0);
    }

    /// Handles a complete byte from the master; returns whether to ACK it
    fn accept_byte(&mut self) -> bool {
        let byte = self.shift;
        match self.state {
            EepromState::DeviceAddress => {
                let (address, read) = U7::from_address_byte(byte);
                if address != self.device_address {
                    self.state = EepromState::StandBy;
                    return false;
                }
                self.state = if read {
                    EepromState::ReadData
                } else {
                    EepromState::AddressHigh
                };
                true
            }
            EepromState::AddressHigh => {
                self.word_address = self.mask((byte as u16) << 8);
                self.state = EepromState::AddressLow;
                true
            }
            EepromState::AddressLow => {
                self.word_address = self.mask((self.word_address & 0xFF00) | byte as u16);
                self.state = EepromState::WriteData;
                true
            }
            EepromState::WriteData => {
                if self.write_protect {
                    debug!("{}: write protected, refusing {:02X}", self.base.get_name(), byte);
                    self.state = EepromState::WaitStop;
                    return false;
                }
                self.page_buffer.retain(|(address, _)| *address != self.word_address);
                self.page_buffer.push((self.word_address, byte));
                self.word_address = self.next_in_page(self.word_address);
                true
            }
            _ => false,
        }
    }
}

impl Component for SerialEeprom {
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
        let (scl, sda) = self.read_lines();

        if scl && self.old_scl && sda != self.old_sda {
            if sda {
                self.on_stop();
            } else {
                self.on_start();
            }
        } else if scl && !self.old_scl {
            self.on_clock_rise(sda);
        } else if !scl && self.old_scl {
            self.on_clock_fall();
        }

        // Our own output may have changed SDA
        let (scl, sda) = self.read_lines();
        self.old_scl = scl;
        self.old_sda = sda;
    }

    /// Power cycle: the array keeps its contents
    fn reset(&mut self) {
        self.release_sda();
        self.page_buffer.clear();
        self.state = EepromState::StandBy;
        self.bit_count = 0;
        self.shift = 0;
        self.acking = false;
        self.master_acked = false;
        let (scl, sda) = self.read_lines();
        self.old_scl = scl;
        self.old_sda = sda;
    }
}
