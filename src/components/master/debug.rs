use serde::Serialize;

use crate::bus::LineState;
use crate::components::clock::phase_clock::Phase;
use crate::components::master::state::ProtocolState;

/// Point-in-time copy of the engine's registers and the master's line state
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DebugSnapshot {
    pub state: ProtocolState,
    pub bit_counter: u8,
    pub shift_register: u8,
    /// Phase of the most recent tick, if any tick happened yet
    pub phase: Option<Phase>,
    #[serde(flatten)]
    pub lines: LineState,
    pub busy: bool,
    pub error: bool,
}

impl DebugSnapshot {
    /// One fixed-width line for textual traces
    pub fn format_line(&self) -> String {
        let phase = self
            .phase
            .map(|p| p.index().to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{:<16} ph={} cnt={} sr={:02X} scl={} sda={}{} smp={} busy={} err={}",
            self.state.to_string(),
            phase,
            self.bit_counter,
            self.shift_register,
            self.lines.scl_driven as u8,
            if self.lines.sda_output_enable {
                (self.lines.sda_driven as u8).to_string()
            } else {
                "Z".to_string()
            },
            if self.lines.sda_level { "(1)" } else { "(0)" },
            self.lines.sda_sampled as u8,
            self.busy as u8,
            self.error as u8,
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Read-only view into a component's internals for tracing tools.
/// Taking `&self` keeps diagnostics from feeding back into behaviour.
pub trait Introspect {
    fn snapshot(&self) -> DebugSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DebugSnapshot {
        DebugSnapshot {
            state: ProtocolState::SendData,
            bit_counter: 5,
            shift_register: 0xA8,
            phase: Some(Phase::P2),
            lines: LineState {
                scl_driven: true,
                sda_output_enable: true,
                sda_driven: true,
                sda_sampled: false,
                sda_level: true,
            },
            busy: true,
            error: false,
        }
    }

    #[test]
    fn test_format_line() {
        assert_eq!(
            sample().format_line(),
            "SendData         ph=2 cnt=5 sr=A8 scl=1 sda=1(1) smp=0 busy=1 err=0"
        );
    }

    #[test]
    fn test_json_flattens_line_state() {
        let value: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
        assert_eq!(value["state"], "SendData");
        assert_eq!(value["shift_register"], 0xA8);
        assert_eq!(value["phase"], "P2");
        assert_eq!(value["sda_output_enable"], true);
        assert!(value.get("lines").is_none());
    }
}
