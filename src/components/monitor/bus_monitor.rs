use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::bus::{TwoWireBus, SCL, SDA};
use crate::component::{lock_pin, BaseComponent, Component, PinRef};

/// A protocol-level event decoded from the two lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BusEvent {
    Start,
    RepeatedStart,
    /// Eight data bits followed by the receiver's acknowledgment bit
    Byte { value: u8, acked: bool },
    Stop,
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusEvent::Start => write!(f, "S"),
            BusEvent::RepeatedStart => write!(f, "Sr"),
            BusEvent::Byte { value, acked } => {
                write!(f, "{:02X}{}", value, if *acked { "+" } else { "-" })
            }
            BusEvent::Stop => write!(f, "P"),
        }
    }
}

/// Passive listener that never drives a line. Samples data on SCL rising
/// edges and recognises START/STOP from SDA edges while SCL is high.
pub struct BusMonitor {
    base: BaseComponent,
    old_scl: bool,
    old_sda: bool,
    in_transfer: bool,
    shift: u8,
    bit_count: u8,
    cycle: u64,
    events: Vec<(u64, BusEvent)>,
}

impl BusMonitor {
    pub fn new(name: String, bus: &TwoWireBus) -> Self {
        let mut base = BaseComponent::new(name);
        base.attach_pin(SCL, bus.scl());
        base.attach_pin(SDA, bus.sda());
        let (old_scl, old_sda) = bus.levels();

        BusMonitor {
            base,
            old_scl,
            old_sda,
            in_transfer: false,
            shift: 0,
            bit_count: 0,
            cycle: 0,
            events: Vec::new(),
        }
    }

    /// Events with the monitor cycle they were seen on
    pub fn timed_events(&self) -> &[(u64, BusEvent)] {
        &self.events
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.events.iter().map(|(_, event)| *event).collect()
    }

    /// Data bytes seen on the bus, in order
    pub fn bytes(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter_map(|(_, event)| match event {
                BusEvent::Byte { value, .. } => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Events rendered like "S A0+ 00+ 10+ 55+ P"
    pub fn transcript(&self) -> String {
        self.events
            .iter()
            .map(|(_, event)| event.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn read_lines(&self) -> (bool, bool) {
        let level = |name: &str| {
            self.base
                .get_pin(name)
                .map(|pin| lock_pin(&pin).is_high())
                .unwrap_or(true)
        };
        (level(SCL), level(SDA))
    }

    fn push(&mut self, event: BusEvent) {
        self.events.push((self.cycle, event));
    }
}

impl Component for BusMonitor {
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
                self.push(BusEvent::Stop);
                self.in_transfer = false;
            } else {
                let event = if self.in_transfer {
                    BusEvent::RepeatedStart
                } else {
                    BusEvent::Start
                };
                self.push(event);
                self.in_transfer = true;
            }
            self.bit_count = 0;
            self.shift = 0;
        } else if scl && !self.old_scl && self.in_transfer {
            if self.bit_count < 8 {
                self.shift = (self.shift << 1) | sda as u8;
                self.bit_count += 1;
            } else {
                let event = BusEvent::Byte {
                    value: self.shift,
                    acked: !sda,
                };
                self.push(event);
                self.bit_count = 0;
                self.shift = 0;
            }
        }

        self.old_scl = scl;
        self.old_sda = sda;
        self.cycle += 1;
    }

    fn reset(&mut self) {
        self.in_transfer = false;
        self.bit_count = 0;
        self.shift = 0;
        self.events.clear();
        let (scl, sda) = self.read_lines();
        self.old_scl = scl;
        self.old_sda = sda;
    }
}
