//! Hill Rush headless runner
//!
//! Drives one run with a simple autopilot and prints the final stats as
//! JSON. Useful for checking seeds and tuning files without a frontend.
//!
//! Usage: `hill-rush [seed] [config.json] [--tape out.json]`

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use hill_rush::consts::FRAME_DT;
    use hill_rush::sim::{InputTape, SimEvent};
    use hill_rush::{SimConfig, Simulation};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut seed: u32 = 1;
    let mut config_path: Option<String> = None;
    let mut tape_path: Option<String> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--tape" {
            tape_path = args.next();
        } else if let Ok(n) = arg.parse::<u32>() {
            seed = n;
        } else {
            config_path = Some(arg);
        }
    }

    let config = match config_path {
        Some(path) => match SimConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SimConfig::default(),
    };

    log::info!("Hill Rush (headless) seed={} stage={}", seed, config.stage.as_str());
    let mut sim = Simulation::new(seed, config.clone());
    let mut tape = InputTape::new(seed, config);
    sim.start_run();

    // Two minutes of simulated time
    for _ in 0..(120 * 60) {
        let input = autopilot(&sim);
        tape.step(&mut sim, FRAME_DT, input);
        for event in sim.drain_events() {
            match event {
                SimEvent::Trick(trick) => {
                    log::info!("{} +{}", trick.kind.as_str(), trick.value)
                }
                SimEvent::ComboEnded(combo) => {
                    log::info!("Combo x{} banked {} points", combo.multiplier, combo.points)
                }
                SimEvent::OutOfFuel => log::info!("Tank empty"),
                other => log::debug!("{:?}", other),
            }
        }
        if sim.status().is_over() {
            break;
        }
    }
    if !sim.status().is_over() {
        sim.end_run();
    }

    match serde_json::to_string_pretty(&sim.stats()) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to encode stats: {}", e),
    }

    if let Some(path) = tape_path {
        let written = tape
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(&path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => log::info!("Tape written to {} ({} frames)", path, tape.len()),
            Err(e) => log::error!("Failed to write tape {}: {}", path, e),
        }
    }
}

/// Hold the gas, ease off when the nose pitches up too far, boost on flat
/// ground whenever the meter allows.
#[cfg(not(target_arch = "wasm32"))]
fn autopilot(sim: &hill_rush::Simulation) -> hill_rush::sim::TickInput {
    let Some(vehicle) = sim.vehicle_snapshot() else {
        return Default::default();
    };
    let tilt = hill_rush::normalize_angle(vehicle.rotation);
    let gas = tilt < 0.7;
    hill_rush::sim::TickInput {
        gas,
        brake: tilt > 1.1 && vehicle.grounded,
        boost: gas && vehicle.grounded && tilt.abs() < 0.2 && sim.boost().can_boost(),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}
