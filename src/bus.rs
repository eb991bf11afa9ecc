//! Two-wire bus lines and the master's line driver.
//!
//! Both lines are shared [`Pin`]s with weak pull-ups. Every participant owns a
//! named driver on them; the master's drivers are only ever touched through
//! [`BusLineDriver`].

use log::trace;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::component::{lock_pin, PinRef};
use crate::pin::{Pin, PinValue};

pub const SCL: &str = "SCL";
pub const SDA: &str = "SDA";

/// How the master produces a logical one on SDA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    /// Actively drive the line high
    PushPull,
    /// Let go of the line and rely on the pull-up
    OpenDrain,
}

impl Default for DriveMode {
    fn default() -> Self {
        DriveMode::PushPull
    }
}

/// The clock and data lines shared by the master and its peers
#[derive(Clone)]
pub struct TwoWireBus {
    name: String,
    scl: PinRef,
    sda: PinRef,
}

impl TwoWireBus {
    pub fn new(name: String) -> Self {
        TwoWireBus {
            scl: Arc::new(Mutex::new(Pin::with_pull_up(format!("{}_{}", name, SCL)))),
            sda: Arc::new(Mutex::new(Pin::with_pull_up(format!("{}_{}", name, SDA)))),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scl(&self) -> PinRef {
        self.scl.clone()
    }

    pub fn sda(&self) -> PinRef {
        self.sda.clone()
    }

    /// Current (SCL, SDA) logic levels
    pub fn levels(&self) -> (bool, bool) {
        (lock_pin(&self.scl).is_high(), lock_pin(&self.sda).is_high())
    }

    /// Both lines released high
    pub fn is_idle(&self) -> bool {
        self.levels() == (true, true)
    }

    pub fn check_contention(&self) -> Result<(), String> {
        for line in [&self.scl, &self.sda] {
            let pin = lock_pin(line);
            if pin.is_contended() {
                return Err(format!("Bus contention on {}", pin));
            }
        }
        Ok(())
    }
}

/// Electrical state of the master's side of the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineState {
    pub scl_driven: bool,
    /// Master currently owns SDA
    pub sda_output_enable: bool,
    /// Bit the master puts on SDA while it owns the line
    pub sda_driven: bool,
    /// Value returned by the most recent `sample_data`
    pub sda_sampled: bool,
    /// Level of SDA right now, whoever is driving it
    pub sda_level: bool,
}

pub struct BusLineDriver {
    driver_name: String,
    scl: PinRef,
    sda: PinRef,
    mode: DriveMode,
    scl_driven: bool,
    sda_output_enable: bool,
    sda_driven: bool,
    sda_sampled: bool,
}

impl BusLineDriver {
    /// Takes control of SCL (driven high, bus idle) and leaves SDA released
    pub fn new(driver_name: String, bus: &TwoWireBus, mode: DriveMode) -> Self {
        let mut driver = BusLineDriver {
            driver_name,
            scl: bus.scl(),
            sda: bus.sda(),
            mode,
            scl_driven: true,
            sda_output_enable: false,
            sda_driven: true,
            sda_sampled: true,
        };
        driver.drive_clock_high();
        driver.release_data();
        driver
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn drive_clock_high(&mut self) {
        self.set_clock(true);
    }

    pub fn drive_clock_low(&mut self) {
        self.set_clock(false);
    }

    fn set_clock(&mut self, level: bool) {
        self.scl_driven = level;
        lock_pin(&self.scl).set_driver(Some(self.driver_name.clone()), PinValue::from_bool(level));
        trace!("{}: SCL <- {}", self.driver_name, level as u8);
    }

    /// Puts SDA under master control and forces `bit` onto it
    pub fn drive_data_bit(&mut self, bit: bool) {
        self.sda_output_enable = true;
        self.sda_driven = bit;

        let mut sda = lock_pin(&self.sda);
        match (self.mode, bit) {
            (DriveMode::OpenDrain, true) => sda.remove_driver(&self.driver_name),
            _ => sda.set_driver(Some(self.driver_name.clone()), PinValue::from_bool(bit)),
        }
        trace!("{}: SDA <- {}", self.driver_name, bit as u8);
    }

    /// Relinquishes SDA so the pull-up or the peer sets its level
    pub fn release_data(&mut self) {
        self.sda_output_enable = false;
        lock_pin(&self.sda).remove_driver(&self.driver_name);
        trace!("{}: SDA released", self.driver_name);
    }

    pub fn sample_data(&mut self) -> bool {
        self.sda_sampled = lock_pin(&self.sda).is_high();
        trace!("{}: SDA sampled {}", self.driver_name, self.sda_sampled as u8);
        self.sda_sampled
    }

    pub fn line_state(&self) -> LineState {
        LineState {
            scl_driven: self.scl_driven,
            sda_output_enable: self.sda_output_enable,
            sda_driven: self.sda_driven,
            sda_sampled: self.sda_sampled,
            sda_level: lock_pin(&self.sda).is_high(),
        }
    }
}
