pub mod bus_monitor;
