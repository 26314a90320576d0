//! Thin demonstration binary exercising the public engine API end to end:
//! build an NVT argon run, step it to completion while printing
//! observables, then tear it down.

use noble_md::boundary::BoundaryKind;
use noble_md::config::Ensemble;
use noble_md::potential::PotentialKind;
use noble_md::{Engine, SimConfig, Species};

fn main() {
    env_logger::init();

    let mut cfg = SimConfig::new(
        Species::Ar,
        64,
        PotentialKind::LennardJones,
        BoundaryKind::Periodic,
        Ensemble::Nvt,
        300.0,
        5000.0,
        0.001,
        500,
    );
    cfg.report_interval = 50;
    cfg.seed = Some(2019);

    let mut engine = Engine::new();
    engine.on_sample(|obs| {
        println!(
            "T={:7.2} K  P={:8.4} atm  E_tot={:10.4}",
            obs.temperature, obs.pressure, obs.total_energy
        );
    });

    engine.build(cfg).expect("valid configuration");
    engine.start_run().expect("engine was Built");
    engine.run_to_completion().expect("no numeric failure");
    engine.dispose();
}
