pub mod phase_clock;
