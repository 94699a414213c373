use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use faer::prelude::*;
use faer::sparse::SparseColMat;
use indicatif::ProgressBar;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::config::{ProcessParams, SimulationConfig};
use crate::error::WeldSimError;
use crate::history::{self, MonitorPoint};
use crate::material::MaterialLayout;
use crate::mesh::Mesh;
use crate::source::{
    GaussianSource, HeatSource, PlasmaArcSource, ResistanceWeldSource, WeldPath,
};

/// Immutable operators and models of one simulation run.
///
/// The mesh, Laplacian, material layout and heat source are fixed at
/// construction; all mutable data lives in `SolverState`, which `step`
/// advances by exactly one `dt`.
pub struct Solver {
    mesh: Mesh,
    layout: MaterialLayout,
    source: Box<dyn HeatSource>,
    path: WeldPath,
    dt: f64,
    theta: f64,
    t_ambient: f64,
    t_end: f64,
}

/// Mutable state of the time integration.
///
/// Fields are flattened row-major (`j * nx + i`), matching the Laplacian
/// ordering. `peak` is the elementwise running maximum of `temperature`;
/// the solver maintains `peak >= temperature >= T_ambient` everywhere.
/// Serializable so a run can be checkpointed and replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverState {
    pub temperature: DVector<f64>,
    pub peak: DVector<f64>,
    pub time: f64,
    pub step: usize,
    pub monitors: Vec<MonitorPoint>,
}

/// Immutable copy of the field handed to snapshot consumers. Plain
/// vectors so external writers need no linear-algebra types.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub step: usize,
    pub time: f64,
    pub nx: usize,
    pub ny: usize,
    pub temperature: Vec<f64>,
    pub peak: Vec<f64>,
}

/// Knobs for `run_to`. Snapshots go out through an mpsc sender so the
/// consumer never blocks or races the next step; cancellation is checked
/// only at step boundaries.
#[derive(Default)]
pub struct RunOptions {
    pub progress: bool,
    pub cancel: Option<Arc<AtomicBool>>,
    pub snapshot_every: usize,
    pub sink: Option<Sender<Snapshot>>,
}

fn build_source(config: &SimulationConfig) -> Result<Box<dyn HeatSource>, WeldSimError> {
    match &config.process {
        ProcessParams::Gaussian {
            power,
            efficiency,
            sigma,
            penetration_depth,
        } => Ok(Box::new(GaussianSource {
            power: *power,
            efficiency: *efficiency,
            sigma: *sigma,
            penetration_depth: *penetration_depth,
        })),
        ProcessParams::PlasmaArc {
            power,
            radius,
            arc_length,
            efficiency,
        } => Ok(Box::new(PlasmaArcSource {
            power: *power,
            radius: *radius,
            arc_length: *arc_length,
            efficiency: *efficiency,
        })),
        ProcessParams::Resistance {
            current_density,
            contact_width,
            efficiency,
            frequency: _,
        } => {
            let contact = config.contact.ok_or_else(|| {
                WeldSimError::Config(
                    "Resistance welding requires a contact_model section".to_owned(),
                )
            })?;
            Ok(Box::new(ResistanceWeldSource {
                current_density: *current_density,
                contact_width: *contact_width,
                efficiency: *efficiency,
                contact,
                material: config.material_1.clone(),
            }))
        }
    }
}

impl Solver {
    /// Builds the solver and its initial state from a validated
    /// configuration.
    pub fn new(config: &SimulationConfig) -> Result<(Solver, SolverState), WeldSimError> {
        let mesh = Mesh::new(config.lx, config.ly, config.nx, config.ny)?;
        let layout = MaterialLayout::new(
            config.material_1.clone(),
            config.material_2.clone(),
            config.lx / 2.0,
        );
        let source = build_source(config)?;

        let monitors = history::clamp_monitors(
            &history::default_monitors(config.nx, config.ny),
            config.nx,
            config.ny,
        );

        let n = mesh.n();
        let state = SolverState {
            temperature: DVector::from_element(n, config.t0),
            peak: DVector::from_element(n, config.t0),
            time: 0.0,
            step: 0,
            monitors,
        };

        let solver = Solver {
            mesh,
            layout,
            source,
            path: config.weld_path(),
            dt: config.dt,
            theta: config.theta,
            t_ambient: config.t0,
            t_end: config.end_time(),
        };

        Ok((solver, state))
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn layout(&self) -> &MaterialLayout {
        &self.layout
    }

    /// Configured end of the simulated interval.
    pub fn end_time(&self) -> f64 {
        self.t_end
    }

    /// Advances the state by exactly one time step of the theta-scheme.
    ///
    /// Assembles A = I - theta*dt*diag(alpha)*L with identity rows on the
    /// Dirichlet boundary, eliminates the fixed-node columns from the free
    /// block, refactors the free-by-free system with a sparse LU (the
    /// diffusivity field changed with the temperature, so the factors
    /// cannot be reused), and solves for the interior nodes.
    pub fn step(&self, state: &mut SolverState) -> Result<(), WeldSimError> {
        let n = self.mesh.n();
        let t_next = state.time + self.dt;

        let q = self
            .source
            .volumetric(&self.mesh, &self.path, t_next, self.dt, &state.temperature);
        let props = self.layout.evaluate(&self.mesh, &state.temperature);

        // Explicit half of the theta scheme: B*T = T + (1-theta)*dt*alpha.*(L*T)
        let lt = &self.mesh.laplacian * &state.temperature;
        let mut rhs = DVector::zeros(n);
        for r in 0..n {
            rhs[r] = state.temperature[r]
                + (1.0 - self.theta) * self.dt * props.alpha[r] * lt[r]
                + self.dt * q[r] / (props.rho[r] * props.cp[r]);
        }
        for &f in &self.mesh.fixed {
            rhs[f] = self.t_ambient;
        }

        // Free-by-free block of A, with fixed-column contributions moved
        // to the right-hand side.
        let nf = self.mesh.free.len();
        let mut triplets: Vec<(usize, usize, f64)> = Vec::with_capacity(6 * nf);
        let mut rhs_free = vec![0.0; nf];

        for (fr, &g) in self.mesh.free.iter().enumerate() {
            triplets.push((fr, fr, 1.0));
            rhs_free[fr] = rhs[g];
        }
        for (r, c, v) in self.mesh.laplacian.triplet_iter() {
            let fr = match self.mesh.free_index(r) {
                Some(fr) => fr,
                None => continue,
            };
            let coef = -self.theta * self.dt * props.alpha[r] * *v;
            match self.mesh.free_index(c) {
                Some(fc) => triplets.push((fr, fc, coef)),
                None => rhs_free[fr] -= coef * self.t_ambient,
            }
        }

        let a_ff = match SparseColMat::<usize, f64>::try_new_from_triplets(nf, nf, &triplets) {
            Ok(m) => m,
            Err(err) => {
                return Err(WeldSimError::Solver(format!(
                    "Failed to assemble free-node system at step {} (t={:.4} s): {:?}",
                    state.step + 1,
                    t_next,
                    err
                )))
            }
        };

        let lu = match a_ff.sp_lu() {
            Ok(lu) => lu,
            Err(err) => {
                return Err(WeldSimError::Solver(format!(
                    "Sparse LU factorization failed at step {} (t={:.4} s): {:?}",
                    state.step + 1,
                    t_next,
                    err
                )))
            }
        };

        let rhs_mat = faer::Mat::from_fn(nf, 1, |r, _| rhs_free[r]);
        let solution = lu.solve(rhs_mat.as_ref());

        for (fr, &g) in self.mesh.free.iter().enumerate() {
            let value = solution.read(fr, 0);
            if !value.is_finite() {
                return Err(WeldSimError::Solver(format!(
                    "Free-node system is singular or ill-conditioned at step {} (t={:.4} s)",
                    state.step + 1,
                    t_next
                )));
            }
            state.temperature[g] = value;
        }
        for &f in &self.mesh.fixed {
            state.temperature[f] = self.t_ambient;
        }

        for r in 0..n {
            if state.temperature[r] > state.peak[r] {
                state.peak[r] = state.temperature[r];
            }
        }

        state.time = t_next;
        state.step += 1;

        for monitor in &mut state.monitors {
            let ind = self.mesh.idx(monitor.i, monitor.j);
            monitor.record(state.time, state.temperature[ind]);
        }

        Ok(())
    }

    /// Runs steps until the simulated time reaches `t_end`.
    ///
    /// Progress reads solver state but never mutates it; snapshot copies
    /// are sent through the sink without waiting on the consumer. A raised
    /// cancel flag stops the loop at the next step boundary.
    pub fn run_to(
        &self,
        state: &mut SolverState,
        t_end: f64,
        opts: &RunOptions,
    ) -> Result<(), WeldSimError> {
        let remaining = t_end - state.time;
        if remaining <= 0.0 {
            return Ok(());
        }
        let steps = (remaining / self.dt).ceil() as usize;

        let bar = if opts.progress {
            Some(ProgressBar::new(steps as u64))
        } else {
            None
        };
        let print_interval = (steps / 20).max(1);

        for s in 0..steps {
            if let Some(cancel) = &opts.cancel {
                if cancel.load(Ordering::Relaxed) {
                    println!(
                        "info: cancelled at step {} (t={:.3} s)",
                        state.step, state.time
                    );
                    break;
                }
            }

            self.step(state)?;

            if let Some(bar) = &bar {
                bar.inc(1);
            }

            if opts.progress && (s + 1) % print_interval == 0 {
                let arc = self.path.position(state.time);
                println!(
                    "info: step {}/{} | t={:.2} s | peak T={:.1} K | arc at ({:.1}, {:.1}) mm",
                    s + 1,
                    steps,
                    state.time,
                    state.peak.max(),
                    arc.0 * 1000.0,
                    arc.1 * 1000.0
                );
            }

            if opts.snapshot_every > 0 && (state.step % opts.snapshot_every == 0 || s + 1 == steps)
            {
                if let Some(sink) = &opts.sink {
                    // A dropped receiver only stops frame capture
                    let _ = sink.send(self.snapshot(state));
                }
            }
        }

        if let Some(bar) = &bar {
            bar.finish_with_message("info: time integration finished");
        }

        Ok(())
    }

    /// Immutable copy of the current fields for external consumers.
    pub fn snapshot(&self, state: &SolverState) -> Snapshot {
        Snapshot {
            step: state.step,
            time: state.time,
            nx: self.mesh.nx,
            ny: self.mesh.ny,
            temperature: state.temperature.iter().copied().collect(),
            peak: state.peak.iter().copied().collect(),
        }
    }
}
