#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use rusty_i2c_master::system_config::EngineConfig;
use rusty_i2c_master::systems::eeprom_bench::EepromBench;
use rusty_i2c_master::{EngineError, OperationKind};

use std::process::exit;

fn main_app() -> Result<(), EngineError> {
    let matches = clap_app!(@app (app_from_crate!())
        (@arg config: -c --config +takes_value "JSON bench configuration (defaults built in)")
        (@arg trace: -t --trace "Print a snapshot of the engine on every phase tick")
        (@arg json: --json "Print trace snapshots as JSON lines")
    )
    .get_matches();

    let config = match matches.value_of("config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let trace = matches.is_present("trace") || matches.is_present("json");
    let json = matches.is_present("json");

    println!("{}", config.name);
    if !config.description.is_empty() {
        println!("{}", config.description);
    }
    println!(
        "divisor {} -> bus {:.0} Hz ({:?})",
        config.divisor,
        config.bus_frequency_hz(),
        config.drive_mode
    );

    let mut bench = EepromBench::from_config(&config)?;
    bench.enable_trace(trace);

    let requests = config.requests();
    if requests.is_empty() {
        warn!("No transactions configured");
    }

    let mut failures = 0;
    for request in requests {
        let outcome = bench.execute(request);

        for snapshot in bench.take_trace() {
            if json {
                println!("{}", snapshot.to_json()?);
            } else {
                println!("  {}", snapshot.format_line());
            }
        }

        match (outcome, request.operation) {
            (Ok(Some(byte)), OperationKind::Read) => println!("{} -> {:02X}", request, byte),
            (Ok(_), _) => println!("{} ok", request),
            (Err(e), _) => {
                failures += 1;
                println!("{} failed: {}", request, e);
            }
        }
        println!("  bus: {}", bench.monitor().transcript());
        if trace {
            for (cycle, event) in bench.monitor().timed_events() {
                println!("    @{:<8} {}", cycle, event);
            }
        }
        bench.monitor_mut().clear();
    }

    let info = bench.system_info();
    println!("{} cycles, {} failed transactions", info.cycles, failures);
    Ok(())
}

fn main() {
    env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = main_app() {
        error!("Error: {}", e);
        exit(1);
    }
}
