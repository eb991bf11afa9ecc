//! Property-based tests for the master engine
//!
//! These use proptest to check that whole transactions behave the same for
//! any offset, data byte, clock divisor and drive mode.


use mocks::*;
use proptest::prelude::*;
use rusty_i2c_master::components::monitor::bus_monitor::BusEvent;
use rusty_i2c_master::error::AckPhase;
use rusty_i2c_master::systems::eeprom_bench::EepromBench;
use rusty_i2c_master::{DriveMode, EngineError, OperationKind, TransactionRequest, U7};

const EEPROM: u8 = 0x50;

fn arb_drive_mode() -> impl Strategy<Value = DriveMode> {
    prop_oneof![Just(DriveMode::PushPull), Just(DriveMode::OpenDrain)]
}

fn arb_operation() -> impl Strategy<Value = OperationKind> {
    prop_oneof![Just(OperationKind::Write), Just(OperationKind::Read)]
}

#[cfg(test)]
mod transaction_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn test_write_then_read_returns_data(
            offset in 0u16..4096,
            data in any::<u8>(),
            divisor in 1u32..4,
            mode in arb_drive_mode()
        ) {
            let mut bench = EepromBench::new(divisor, mode);
            prop_assert!(bench.write_byte(U7::new(EEPROM), offset, data).is_ok());
            prop_assert_eq!(bench.read_byte(U7::new(EEPROM), offset).unwrap(), data);

            let expected = format!(
                "S A0+ {:02X}+ {:02X}+ {:02X}+ P S A0+ {:02X}+ {:02X}+ Sr A1+ {:02X}- P",
                offset >> 8, offset & 0xFF, data, offset >> 8, offset & 0xFF, data
            );
            prop_assert_eq!(bench.monitor().transcript(), expected);
        }

        #[test]
        fn test_upper_offset_bits_are_ignored(
            offset in 0u16..4096,
            upper in 1u16..16,
            data in any::<u8>()
        ) {
            let mut bench = EepromBench::new(1, DriveMode::PushPull);
            bench.write_byte(U7::new(EEPROM), offset | (upper << 12), data).unwrap();
            prop_assert_eq!(bench.eeprom().peek(offset), data);
            prop_assert_eq!(bench.read_byte(U7::new(EEPROM), offset).unwrap(), data);
        }

        #[test]
        fn test_duration_is_fixed_per_kind(
            kind in arb_operation(),
            divisor in 1u32..6,
            offset in any::<u16>()
        ) {
            let mut bench = EepromBench::new(divisor, DriveMode::PushPull);
            let request = match kind {
                OperationKind::Write => TransactionRequest::write(U7::new(EEPROM), offset, 0xA5),
                OperationKind::Read => TransactionRequest::read(U7::new(EEPROM), offset),
            };
            let bit_periods: u64 = match kind {
                OperationKind::Write => 38,
                OperationKind::Read => 48,
            };
            bench.submit(request).unwrap();
            let cycles = bench.run_until_idle(100_000).unwrap();
            prop_assert_eq!(cycles, bit_periods * 4 * divisor as u64);
        }

        #[test]
        fn test_requests_while_busy_never_change_the_transaction(
            delay in 1u64..150,
            other_offset in any::<u16>(),
            other_data in any::<u8>()
        ) {
            let mut bench = EepromBench::new(1, DriveMode::PushPull);
            bench.submit(TransactionRequest::write(U7::new(EEPROM), 0x0010, 0x55)).unwrap();
            for _ in 0..delay {
                bench.step();
            }
            let other = TransactionRequest::write(U7::new(EEPROM), other_offset, other_data);
            prop_assert_eq!(bench.submit(other).unwrap_err(), EngineError::Busy);

            bench.run_until_idle(1_000).unwrap();
            prop_assert_eq!(bench.monitor().transcript(), "S A0+ 00+ 10+ 55+ P");
            prop_assert_eq!(bench.eeprom().committed_writes(), 1);
        }

        #[test]
        fn test_any_nack_aborts_with_stop(
            nack_index in 0usize..4,
            kind in arb_operation(),
            divisor in 1u32..3
        ) {
            let mut bench = bench_with_peer(divisor, DriveMode::OpenDrain, ScriptedPeer::nack_at(nack_index), 0x0F);
            let request = match kind {
                OperationKind::Write => TransactionRequest::write(U7::new(PEER_ADDRESS), 0x0123, 0x45),
                OperationKind::Read => TransactionRequest::read(U7::new(PEER_ADDRESS), 0x0123),
            };
            let expected = match (nack_index, kind) {
                (0, _) => AckPhase::AddressWrite,
                (1, _) => AckPhase::OffsetHigh,
                (2, _) => AckPhase::OffsetLow,
                (_, OperationKind::Write) => AckPhase::Data,
                (_, OperationKind::Read) => AckPhase::AddressRead,
            };

            prop_assert_eq!(
                bench.execute(request).unwrap_err(),
                EngineError::AcknowledgmentFailure(expected)
            );
            let events = bench.monitor().events();
            prop_assert_eq!(events.last(), Some(&BusEvent::Stop));
            prop_assert!(bench.bus().is_idle());
        }
    }
}
