use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::pin::Pin;

/// Shared handle to a bus line
pub type PinRef = Arc<Mutex<Pin>>;

// Component trait
pub trait Component: Send {
    fn name(&self) -> &str;
    fn pins(&self) -> &HashMap<String, PinRef>;
    fn get_pin(&self, name: &str) -> Result<PinRef, String>;
    /// Advance by one reference-clock cycle
    fn update(&mut self);
    /// Return to power-on state and let go of every line
    fn reset(&mut self);
}

/// Locks a line, recovering the guard if another holder panicked.
/// Pin state is plain data, so a poisoned lock is still consistent.
pub fn lock_pin(pin: &PinRef) -> MutexGuard<'_, Pin> {
    pin.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct BaseComponent {
    name: String,
    pins: HashMap<String, PinRef>,
}

impl BaseComponent {
    pub fn new(name: String) -> Self {
        Self {
            name,
            pins: HashMap::new(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Attaches the component to an existing line under a local pin name
    pub fn attach_pin(&mut self, pin_name: &str, line: PinRef) -> PinRef {
        self.pins.insert(pin_name.to_string(), line.clone());
        line
    }

    pub fn pins(&self) -> &HashMap<String, PinRef> {
        &self.pins
    }

    pub fn get_pin(&self, name: &str) -> Result<PinRef, String> {
        self.pins
            .get(name)
            .cloned()
            .ok_or_else(|| format!("Pin {} not found on {}", name, self.name))
    }
}
