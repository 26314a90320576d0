//! The Engine Driver: the state machine that owns a run end-to-end
//! (spec.md 4.11) and the external-collaborator interfaces exposed to a
//! host (spec.md 2.12, 6).

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::barostat::MttkBarostat;
use crate::boundary::{BoundaryKind, SimulationBox};
use crate::config::{Ensemble, SimConfig};
use crate::error::{EngineError, EngineState};
use crate::forces::evaluate_forces;
use crate::integrator::{adaptive_dt, integrate_reported_step};
use crate::observables::{compute_observables, kinetic_energy, ObservableHistory, Observables};
use crate::placement::place_atoms;
use crate::potential::{cutoff_radius, PotentialParams};
use crate::state::{AtomState, TimeData};
use crate::thermostat::NoseHooverChain;
use crate::velocities::{degrees_of_freedom, initialize_velocities};

/// A read-only borrow of the engine's current atoms and box, valid only
/// for the duration of the callback or call that produced it (spec.md 3, 5).
pub struct Snapshot<'a> {
    pub positions: &'a [Vector3<f64>],
    pub velocities: &'a [Vector3<f64>],
    pub half_side: f64,
    pub step_counter: usize,
}

struct RuntimeState {
    mass: f64,
    potential_params: PotentialParams,
    sim_box: SimulationBox,
    atoms: AtomState,
    thermostat: Option<NoseHooverChain>,
    barostat: Option<MttkBarostat>,
    history: ObservableHistory,
    time: TimeData,
    step_counter: usize,
    rng: StdRng,
    last_observables: Observables,
    /// Virial from the most recent force evaluation, carried across
    /// substeps so the barostat's piston kick has a pressure to react to
    /// before this substep's own force evaluation has run.
    last_virial: f64,
    numeric_recovery_used: bool,
}

#[derive(Default)]
struct Callbacks {
    on_sample: Option<Box<dyn FnMut(&Observables)>>,
    on_time: Option<Box<dyn FnMut(&TimeData)>>,
    on_complete: Option<Box<dyn FnMut()>>,
}

/// Owns all per-run state and exposes the `build`/`start_run`/`step`/
/// `stop_run`/`dispose` lifecycle from spec.md 4.11.
pub struct Engine {
    state: EngineState,
    config: Option<SimConfig>,
    runtime: Option<RuntimeState>,
    stop_requested: bool,
    callbacks: Callbacks,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            state: EngineState::Unbuilt,
            config: None,
            runtime: None,
            stop_requested: false,
            callbacks: Callbacks::default(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Register the per-sample observable callback (spec.md 6).
    pub fn on_sample(&mut self, callback: impl FnMut(&Observables) + 'static) {
        self.callbacks.on_sample = Some(Box::new(callback));
    }

    /// Register the per-step time callback (spec.md 6).
    pub fn on_time(&mut self, callback: impl FnMut(&TimeData) + 'static) {
        self.callbacks.on_time = Some(Box::new(callback));
    }

    /// Register the run-completion callback (spec.md 6).
    pub fn on_complete(&mut self, callback: impl FnMut() + 'static) {
        self.callbacks.on_complete = Some(Box::new(callback));
    }

    fn require_state(&self, expected: EngineState) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::state_invalid(expected, self.state))
        }
    }

    /// Build the engine from `cfg`: validates, allocates positions,
    /// velocities and forces (spec.md 4.5, 4.6), and zeroes history.
    /// Callable from `Unbuilt` or `Built`; leaves the engine `Unbuilt` on
    /// failure.
    pub fn build(&mut self, cfg: SimConfig) -> Result<(), EngineError> {
        if self.state != EngineState::Unbuilt && self.state != EngineState::Built {
            return Err(EngineError::state_invalid(EngineState::Built, self.state));
        }
        cfg.validate()?;

        let (sigma, epsilon, mass) = cfg.resolve_species_params()?;
        let volume = crate::constants::box_volume_from_molar(cfg.v_init, cfg.atom_count);
        let half_side = 0.5 * volume.cbrt();
        let sim_box = SimulationBox::new(half_side, cfg.boundary);

        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let atom_radius = sigma / 2.0;
        let positions = place_atoms(cfg.atom_count, half_side, atom_radius, &mut rng);
        let seed_temperature = cfg.t_init.unwrap_or(cfg.t_target);
        let velocities = initialize_velocities(cfg.atom_count, mass, seed_temperature, &mut rng);

        let mut atoms = AtomState::new(cfg.atom_count);
        atoms.positions = positions;
        atoms.velocities = velocities;

        let mut time = TimeData::default();
        time.reset_for_run(cfg.dt * cfg.n_steps as f64);

        self.runtime = Some(RuntimeState {
            mass,
            potential_params: PotentialParams::new(sigma, epsilon),
            sim_box,
            atoms,
            thermostat: None,
            barostat: None,
            history: ObservableHistory::new(),
            time,
            step_counter: 0,
            rng,
            last_observables: Observables::default(),
            last_virial: 0.0,
            numeric_recovery_used: false,
        });
        self.config = Some(cfg);
        self.state = EngineState::Built;
        Ok(())
    }

    /// Start a run: creates the thermostat (and, for NPT, the barostat),
    /// performs the initial force evaluation, and moves to `Running`.
    pub fn start_run(&mut self) -> Result<(), EngineError> {
        self.require_state(EngineState::Built)?;
        let cfg = self.config.as_ref().expect("Built implies config is set").clone();
        let runtime = self.runtime.as_mut().expect("Built implies runtime is set");

        let dof = degrees_of_freedom(cfg.atom_count);
        runtime.thermostat = Some(NoseHooverChain::new(cfg.nhc_length, dof, cfg.t_target, cfg.tau_t));
        runtime.barostat = match cfg.ensemble {
            Ensemble::Npt => Some(MttkBarostat::new(
                dof,
                cfg.t_target,
                cfg.p_target.unwrap_or(1.0),
                cfg.tau_p,
                cfg.nhc_length,
            )),
            Ensemble::Nvt => None,
        };

        let eval = evaluate_forces(
            &runtime.atoms.positions,
            &runtime.sim_box,
            cfg.potential,
            runtime.potential_params,
        );
        runtime.atoms.forces.copy_from_slice(&eval.forces);
        runtime.last_virial = eval.virial;

        runtime.step_counter = 0;
        runtime.time.reset_for_run(cfg.dt * cfg.n_steps as f64);
        runtime.numeric_recovery_used = false;
        self.stop_requested = false;
        self.state = EngineState::Running;
        log::info!("engine started run: {} atoms, {:?} ensemble", cfg.atom_count, cfg.ensemble);
        Ok(())
    }

    /// Request cancellation. Observed at the start of the next reported
    /// step; any in-progress step completes (spec.md 5).
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Advance one reported step: `n_sub` velocity-Verlet substeps, the
    /// thermostat/barostat operator split (spec.md 4.7-4.9), observable
    /// computation and callback dispatch (spec.md 4.10, 6).
    pub fn step(&mut self) -> Result<(), EngineError> {
        self.require_state(EngineState::Running)?;

        if self.stop_requested {
            self.stop_run()?;
            return Ok(());
        }

        let cfg = self.config.as_ref().expect("Running implies config is set").clone();
        let runtime = self.runtime.as_mut().expect("Running implies runtime is set");
        runtime.numeric_recovery_used = false;

        let step_started_at = std::time::Instant::now();
        let backup = runtime.atoms.clone();

        let last_t = runtime.last_observables.temperature.max(1.0);
        let dt = adaptive_dt(cfg.dt, cfg.atom_count, cfg.potential, last_t);

        Self::advance_substeps(runtime, &cfg, dt);

        if !runtime.atoms.is_finite() {
            log::warn!("non-finite state detected after reported step; attempting recovery");
            runtime.atoms = backup.clone();
            if let Some(chain) = runtime.thermostat.as_mut() {
                chain.reset();
            }
            if let Some(barostat) = runtime.barostat.as_mut() {
                barostat.chain.reset();
            }
            Self::advance_substeps(runtime, &cfg, dt);

            if !runtime.atoms.is_finite() {
                runtime.atoms = backup;
                self.state = EngineState::Built;
                return Err(EngineError::numeric_failure(
                    "velocity/position/force remained non-finite after one recovery attempt",
                ));
            }
            runtime.numeric_recovery_used = true;
        }

        runtime.step_counter += 1;
        let wall_dt = step_started_at.elapsed().as_secs_f64();
        runtime.time.advance(dt, wall_dt);

        let dof = degrees_of_freedom(cfg.atom_count);
        let ke = kinetic_energy(&runtime.atoms.velocities, runtime.mass);
        let eval = evaluate_forces(
            &runtime.atoms.positions,
            &runtime.sim_box,
            cfg.potential,
            runtime.potential_params,
        );
        runtime.last_virial = eval.virial;
        let volume = runtime.sim_box.volume();
        let cutoff = cutoff_radius(cfg.potential, runtime.potential_params.sigma);

        let observables = compute_observables(
            ke,
            eval.potential_energy,
            eval.virial,
            volume,
            dof,
            cfg.atom_count,
            cfg.potential,
            runtime.potential_params.sigma,
            runtime.potential_params.epsilon,
            cutoff,
        );

        if runtime.step_counter % cfg.report_interval == 0 {
            runtime.history.push(observables);
            runtime.last_observables = observables;
            if let Some(cb) = self.callbacks.on_sample.as_mut() {
                cb(&observables);
            }
            if let Some(cb) = self.callbacks.on_time.as_mut() {
                cb(&runtime.time);
            }
        }

        if runtime.step_counter >= cfg.n_steps {
            self.stop_run()?;
        }

        Ok(())
    }

    fn advance_substeps(runtime: &mut RuntimeState, cfg: &SimConfig, dt: f64) {
        match cfg.ensemble {
            Ensemble::Nvt => {
                integrate_reported_step(
                    &mut runtime.atoms,
                    &runtime.sim_box,
                    runtime.mass,
                    cfg.potential,
                    runtime.potential_params,
                    dt,
                    cfg.substeps,
                    runtime.thermostat.as_mut(),
                );
            }
            Ensemble::Npt => {
                Self::advance_substeps_npt(runtime, cfg, dt);
            }
        }
    }

    /// NPT operator split (spec.md 4.9): thermostat half, barostat half,
    /// velocity half-kick, drift, force eval, velocity half-kick, barostat
    /// half, thermostat half -- repeated for each inner substep.
    fn advance_substeps_npt(runtime: &mut RuntimeState, cfg: &SimConfig, dt: f64) {
        let dt_sub = dt / cfg.substeps.max(1) as f64;

        for _ in 0..cfg.substeps.max(1) {
            if let Some(thermostat) = runtime.thermostat.as_mut() {
                crate::thermostat::apply_half_step(
                    thermostat,
                    &mut runtime.atoms.velocities,
                    runtime.mass,
                    dt_sub,
                );
            }

            let ke = kinetic_energy(&runtime.atoms.velocities, runtime.mass);
            let volume_before = runtime.sim_box.volume();
            let pressure_before =
                MttkBarostat::instantaneous_pressure(ke, runtime.last_virial, volume_before, None);

            if let Some(barostat) = runtime.barostat.as_mut() {
                barostat.update_chain_half_step(dt_sub);
                barostat.update_piston_momentum(pressure_before, volume_before, dt_sub);
                barostat.apply_velocity_half_kick(
                    &mut runtime.atoms.velocities,
                    &runtime.atoms.forces,
                    runtime.mass,
                    dt_sub,
                );
                barostat.drift(
                    &mut runtime.atoms.positions,
                    &runtime.atoms.velocities,
                    dt_sub,
                );
                runtime.sim_box.scale_volume(barostat.volume_factor());
                barostat.epsilon = 0.0; // folded into sim_box.half_side already
            }

            for r in runtime.atoms.positions.iter_mut() {
                *r = runtime.sim_box.wrap(*r);
            }

            let eval = evaluate_forces(
                &runtime.atoms.positions,
                &runtime.sim_box,
                cfg.potential,
                runtime.potential_params,
            );
            runtime.atoms.forces.copy_from_slice(&eval.forces);
            runtime.last_virial = eval.virial;

            if let Some(barostat) = runtime.barostat.as_mut() {
                barostat.apply_velocity_half_kick(
                    &mut runtime.atoms.velocities,
                    &runtime.atoms.forces,
                    runtime.mass,
                    dt_sub,
                );
                let ke_after = kinetic_energy(&runtime.atoms.velocities, runtime.mass);
                let volume_after = runtime.sim_box.volume();
                let pressure_after =
                    MttkBarostat::instantaneous_pressure(ke_after, eval.virial, volume_after, None);
                barostat.record_pressure(pressure_after);
                barostat.update_piston_momentum(pressure_after, volume_after, dt_sub);
                barostat.update_chain_half_step(dt_sub);
            }

            if let Some(thermostat) = runtime.thermostat.as_mut() {
                crate::thermostat::apply_half_step(
                    thermostat,
                    &mut runtime.atoms.velocities,
                    runtime.mass,
                    dt_sub,
                );
            }
        }
    }

    /// Stop the current run: finalises timing, emits `on_complete` if the
    /// run reached `n_steps`, and transitions to `Built`.
    pub fn stop_run(&mut self) -> Result<Observables, EngineError> {
        self.require_state(EngineState::Running)?;
        let cfg = self.config.as_ref().expect("Running implies config is set");
        let runtime = self.runtime.as_mut().expect("Running implies runtime is set");

        let final_observables = runtime.last_observables;
        if runtime.step_counter >= cfg.n_steps {
            if let Some(cb) = self.callbacks.on_complete.as_mut() {
                cb();
            }
        }
        self.state = EngineState::Built;
        self.stop_requested = false;
        Ok(final_observables)
    }

    /// Run reported steps until completion or cancellation (spec.md 6).
    pub fn run_to_completion(&mut self) -> Result<Observables, EngineError> {
        loop {
            match self.state {
                EngineState::Running => self.step()?,
                _ => break,
            }
        }
        Ok(self
            .runtime
            .as_ref()
            .map(|r| r.last_observables)
            .unwrap_or_default())
    }

    /// A read-only snapshot of the current atoms and box (spec.md 6).
    /// Valid only for the borrow's lifetime; the caller must not retain it.
    pub fn snapshot(&self) -> Result<Snapshot<'_>, EngineError> {
        let runtime = self.runtime.as_ref().ok_or_else(|| {
            EngineError::state_invalid(EngineState::Built, self.state)
        })?;
        Ok(Snapshot {
            positions: &runtime.atoms.positions,
            velocities: &runtime.atoms.velocities,
            half_side: runtime.sim_box.half_side,
            step_counter: runtime.step_counter,
        })
    }

    pub fn step_counter(&self) -> usize {
        self.runtime.as_ref().map(|r| r.step_counter).unwrap_or(0)
    }

    /// The rolling observable history accumulated so far (spec.md 3).
    pub fn history(&self) -> Option<&ObservableHistory> {
        self.runtime.as_ref().map(|r| &r.history)
    }

    pub fn boundary_kind(&self) -> Option<BoundaryKind> {
        self.runtime.as_ref().map(|r| r.sim_box.kind)
    }

    /// Whether the most recent reported step required the one-shot
    /// numeric-failure recovery path (spec.md 4.11).
    pub fn last_step_used_recovery(&self) -> bool {
        self.runtime.as_ref().map(|r| r.numeric_recovery_used).unwrap_or(false)
    }

    /// Release all per-run resources. Callable from any state.
    pub fn dispose(&mut self) {
        self.runtime = None;
        self.config = None;
        self.callbacks = Callbacks::default();
        self.stop_requested = false;
        self.state = EngineState::Disposed;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
