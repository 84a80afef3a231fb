use std::time::Duration;

use anyhow::{Context, bail};
use env_logger::Builder;
use log::{LevelFilter, info};

use csma_sim::config::RunConfig;
use csma_sim::runner::AutoRunner;
use csma_sim::scenario::Scenario;
use csma_sim::{EventRecord, StepDriver};

fn print_record(record: &EventRecord) {
    println!("--- tick {} ---", record.tick);
    if record.is_idle() {
        println!("(idle)");
    } else {
        println!("{}", record.log.trim_end());
    }
}

fn run_once(mut driver: StepDriver, max_ticks: u64) -> anyhow::Result<()> {
    for _ in 0..max_ticks {
        let record = driver.step().context("simulation step failed")?;
        print_record(&record);
    }
    Ok(())
}

fn run_continuous(driver: StepDriver, config: &RunConfig) -> anyhow::Result<()> {
    let mut runner = AutoRunner::new(driver);
    let rx = runner.start(Duration::from_millis(config.tick_interval_ms));
    let mut received = 0;
    while received < config.max_ticks {
        match rx.recv() {
            Ok(record) => {
                print_record(&record);
                received += 1;
            }
            // The runner thread halts on an engine error after logging it.
            Err(_) => bail!("continuous run ended early after {} ticks", received),
        }
    }
    runner.stop();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("csma_sim"), LevelFilter::Debug)
        .init();

    let mut scenario_path = None;
    let mut auto = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--auto" => auto = true,
            _ if scenario_path.is_none() => scenario_path = Some(arg),
            other => bail!("unexpected argument: {}", other),
        }
    }
    let Some(scenario_path) = scenario_path else {
        bail!("usage: csma-sim <scenario.json> [--auto]");
    };

    let scenario = Scenario::load(std::path::Path::new(&scenario_path))
        .with_context(|| format!("failed to load scenario {}", scenario_path))?;
    let config = RunConfig::load_or_default(&RunConfig::config_path_from_scenario(&scenario_path))
        .context("failed to load run configuration")?;

    let driver = scenario.build().context("failed to build simulation")?;
    info!(
        "Starting {} run with {} devices for {} ticks",
        driver.protocol().label(),
        driver.devices().len(),
        config.max_ticks
    );

    if auto {
        run_continuous(driver, &config)
    } else {
        run_once(driver, config.max_ticks)
    }
}
