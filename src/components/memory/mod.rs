pub mod serial_eeprom;
