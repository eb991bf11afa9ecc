pub mod eeprom_bench;
