use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PinValue {
    Low,
    High,
    /// Not driving
    HighZ,
}

impl PinValue {
    pub fn to_char(&self) -> char {
        match self {
            PinValue::Low => '0',
            PinValue::High => '1',
            PinValue::HighZ => 'Z',
        }
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            PinValue::High
        } else {
            PinValue::Low
        }
    }

    pub fn to_bool(&self) -> Option<bool> {
        match self {
            PinValue::Low => Some(false),
            PinValue::High => Some(true),
            PinValue::HighZ => None,
        }
    }
}

/// Ordered weakest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DriveStrength {
    HighImpedance,
    /// Pull-up resistors
    Weak,
    /// Any device output
    Standard,
}

/// Driver name used for line pull-up resistors
pub const PULL_UP: &str = "PULL_UP";

/// A single wire shared by every participant that registers a driver on it.
///
/// Resolution follows wired-AND rules: the strongest drivers win, and among
/// equally strong drivers Low dominates High. Drivers that are not driving
/// (HighZ) are ignored, so a released line falls back to its pull-up.
#[derive(Debug, Clone)]
pub struct Pin {
    name: String,
    drivers: HashMap<String, (PinValue, DriveStrength)>,
    settled_value: PinValue,
    edges: u64,
}

impl Pin {
    pub fn new(name: String) -> Self {
        Pin {
            name,
            drivers: HashMap::new(),
            settled_value: PinValue::HighZ,
            edges: 0,
        }
    }

    /// A line with a weak pull-up, idle high
    pub fn with_pull_up(name: String) -> Self {
        let mut pin = Pin::new(name);
        pin.set_driver_with_strength(Some(PULL_UP.to_string()), PinValue::High, DriveStrength::Weak);
        pin.edges = 0;
        pin
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_driver(&mut self, driver_name: Option<String>, value: PinValue) {
        self.set_driver_with_strength(driver_name, value, DriveStrength::Standard);
    }

    pub fn set_driver_with_strength(
        &mut self,
        driver_name: Option<String>,
        value: PinValue,
        strength: DriveStrength,
    ) {
        let driver_id = driver_name.unwrap_or_else(|| "anonymous".to_string());

        if value == PinValue::HighZ || strength == DriveStrength::HighImpedance {
            self.drivers.remove(&driver_id);
        } else {
            self.drivers.insert(driver_id, (value, strength));
        }

        self.recalculate_value();
    }

    pub fn remove_driver(&mut self, driver_name: &str) {
        if self.drivers.remove(driver_name).is_some() {
            self.recalculate_value();
        }
    }

    pub fn read(&self) -> PinValue {
        self.settled_value
    }

    /// Logic level as a receiver sees it; a floating line reads high
    pub fn is_high(&self) -> bool {
        self.settled_value.to_bool().unwrap_or(true)
    }

    pub fn driver_value(&self, driver_name: &str) -> Option<PinValue> {
        self.drivers.get(driver_name).map(|(value, _)| *value)
    }

    /// Number of level changes since the pin was created
    pub fn edge_count(&self) -> u64 {
        self.edges
    }

    /// True when drivers of the winning strength disagree
    pub fn is_contended(&self) -> bool {
        let max_strength = match self.drivers.values().map(|(_, s)| *s).max() {
            Some(s) => s,
            None => return false,
        };
        let mut strongest = self
            .drivers
            .values()
            .filter(|(_, strength)| *strength == max_strength)
            .map(|(value, _)| *value);
        let has_low = strongest.clone().any(|v| v == PinValue::Low);
        has_low && strongest.any(|v| v == PinValue::High)
    }

    fn recalculate_value(&mut self) {
        let previous = self.settled_value;

        let max_strength = self
            .drivers
            .values()
            .map(|(_, strength)| *strength)
            .max()
            .unwrap_or(DriveStrength::HighImpedance);

        self.settled_value = if max_strength == DriveStrength::HighImpedance {
            PinValue::HighZ
        } else {
            let strong_drivers = self
                .drivers
                .values()
                .filter(|(_, strength)| *strength == max_strength)
                .map(|(value, _)| *value);

            // Resolve conflicts: Low dominates
            let mut resolved = PinValue::HighZ;
            for value in strong_drivers {
                match value {
                    PinValue::Low => {
                        resolved = PinValue::Low;
                        break;
                    }
                    PinValue::High => resolved = PinValue::High,
                    PinValue::HighZ => {}
                }
            }
            resolved
        };

        if self.settled_value.to_bool() != previous.to_bool() {
            self.edges += 1;
        }
    }
}

impl fmt::Display for PinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// `SCL: Low [PULL_UP=1w, master=0]`, drivers sorted by name
impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.settled_value)?;
        if self.drivers.is_empty() {
            return Ok(());
        }

        let mut names: Vec<&String> = self.drivers.keys().collect();
        names.sort();
        let listed: Vec<String> = names
            .into_iter()
            .map(|driver| {
                let (value, strength) = self.drivers[driver];
                let weak = if strength == DriveStrength::Weak { "w" } else { "" };
                format!("{}={}{}", driver, value.to_char(), weak)
            })
            .collect();
        write!(f, " [{}]", listed.join(", "))
    }
}
