use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crate::error::WeldSimError;
use crate::solver::{Snapshot, Solver, SolverState};
use crate::zones::{self, ZoneMap};

/// Writes the final fields as CSV: one row per node with coordinates,
/// final and peak temperature, and the zone label.
///
/// # Arguments
/// * `path` - Output CSV path
/// * `solver` - The solver holding mesh and material layout
/// * `state` - Final state of the run
/// * `zone_map` - Zone classification of the peak field
pub fn write_field_csv(
    path: &str,
    solver: &Solver,
    state: &SolverState,
    zone_map: &ZoneMap,
) -> Result<(), WeldSimError> {
    let file = File::create(path).map_err(|err| {
        WeldSimError::PostProcessor(format!("Unable to create {}: {}", path, err))
    })?;
    let mut out = BufWriter::new(file);
    let mesh = solver.mesh();

    let mut write = || -> std::io::Result<()> {
        writeln!(out, "x,y,T,T_peak,zone")?;
        for j in 0..mesh.ny {
            for i in 0..mesh.nx {
                let ind = mesh.idx(i, j);
                writeln!(
                    out,
                    "{},{},{},{},{}",
                    mesh.x[i],
                    mesh.y[j],
                    state.temperature[ind],
                    state.peak[ind],
                    zone_map.zone(i, j).label()
                )?;
            }
        }
        out.flush()
    };
    write().map_err(|err| {
        WeldSimError::PostProcessor(format!("Failed writing field output {}: {}", path, err))
    })?;

    println!("info: wrote field output to {}", path);
    Ok(())
}

/// Writes the monitor-point histories as CSV, one time column and one
/// temperature column per monitor.
pub fn write_history_csv(path: &str, state: &SolverState) -> Result<(), WeldSimError> {
    let file = File::create(path).map_err(|err| {
        WeldSimError::PostProcessor(format!("Unable to create {}: {}", path, err))
    })?;
    let mut out = BufWriter::new(file);

    let steps = state
        .monitors
        .iter()
        .map(|m| m.len())
        .max()
        .unwrap_or(0);

    let mut write = || -> std::io::Result<()> {
        let mut header = String::from("time");
        for m in &state.monitors {
            header.push_str(&format!(",T_{}_{}", m.i, m.j));
        }
        writeln!(out, "{}", header)?;

        for s in 0..steps {
            // Monitors all record once per step, so any one carries the
            // time axis
            let time = state
                .monitors
                .iter()
                .find(|m| s < m.len())
                .map(|m| m.times[s])
                .unwrap_or(0.0);
            let mut row = format!("{}", time);
            for m in &state.monitors {
                if s < m.len() {
                    row.push_str(&format!(",{}", m.temperatures[s]));
                } else {
                    row.push(',');
                }
            }
            writeln!(out, "{}", row)?;
        }
        out.flush()
    };
    write().map_err(|err| {
        WeldSimError::PostProcessor(format!("Failed writing history output {}: {}", path, err))
    })?;

    println!("info: wrote monitor histories to {}", path);
    Ok(())
}

/// Prints the run summary: peak temperature, fused and heat-affected
/// areas, weld width, and the martensite estimate per monitor when
/// kinetics are configured.
pub fn print_summary(
    solver: &Solver,
    state: &SolverState,
    zone_map: &ZoneMap,
    kinetics: Option<&zones::PhaseKinetics>,
) {
    let mesh = solver.mesh();

    println!("info: simulated {:.3} s in {} steps", state.time, state.step);
    println!("info: peak temperature {:.1} K", state.peak.max());
    println!(
        "info: fusion zone {:.3} mm^2 ({} nodes), HAZ {:.3} mm^2 ({} nodes)",
        zone_map.fusion_area(mesh) * 1.0e6,
        zone_map.fusion_count(),
        zone_map.haz_area(mesh) * 1.0e6,
        zone_map.haz_count()
    );

    match zones::weld_width(mesh, zone_map) {
        Some(stats) => println!(
            "info: weld width {:.3} mm mean ({:.3} min, {:.3} max over {} columns)",
            stats.mean * 1000.0,
            stats.min * 1000.0,
            stats.max * 1000.0,
            stats.columns
        ),
        None => println!("warning: no through-fusion; weld width unavailable"),
    }

    for monitor in &state.monitors {
        let (i, j) = (monitor.i, monitor.j);
        if monitor.is_empty() {
            continue;
        }
        match kinetics {
            Some(k) => println!(
                "info: monitor ({}, {}): peak {:.1} K, max cooling {:.1} K/s, martensite {:.3}",
                i,
                j,
                monitor.peak(),
                monitor.max_cooling_rate(),
                zones::martensite_at_monitor(monitor, k)
            ),
            None => println!(
                "info: monitor ({}, {}): peak {:.1} K, max cooling {:.1} K/s",
                i,
                j,
                monitor.peak(),
                monitor.max_cooling_rate()
            ),
        }
    }
}

/// Background writer draining snapshots into a JSON-lines file.
///
/// Runs on its own thread so frame serialization never stalls the time
/// loop; dropping the sender ends the stream and `finish` joins the
/// thread and reports any write failure.
pub struct FrameWriter {
    handle: thread::JoinHandle<Result<usize, String>>,
}

impl FrameWriter {
    pub fn spawn(path: &str) -> Result<(Sender<Snapshot>, FrameWriter), WeldSimError> {
        let file = File::create(path).map_err(|err| {
            WeldSimError::PostProcessor(format!("Unable to create {}: {}", path, err))
        })?;
        let (tx, rx): (Sender<Snapshot>, Receiver<Snapshot>) = mpsc::channel();

        let path_owned = path.to_owned();
        let handle = thread::spawn(move || {
            let mut out = BufWriter::new(file);
            let mut frames = 0usize;
            for snapshot in rx {
                let line = serde_json::to_string(&snapshot)
                    .map_err(|err| format!("Failed serializing frame: {}", err))?;
                writeln!(out, "{}", line)
                    .map_err(|err| format!("Failed writing {}: {}", path_owned, err))?;
                frames += 1;
            }
            out.flush()
                .map_err(|err| format!("Failed writing {}: {}", path_owned, err))?;
            Ok(frames)
        });

        Ok((tx, FrameWriter { handle }))
    }

    /// Waits for the stream to drain and returns the frame count.
    pub fn finish(self) -> Result<usize, WeldSimError> {
        match self.handle.join() {
            Ok(Ok(frames)) => {
                println!("info: captured {} animation frames", frames);
                Ok(frames)
            }
            Ok(Err(message)) => Err(WeldSimError::PostProcessor(message)),
            Err(_) => Err(WeldSimError::PostProcessor(
                "Frame writer thread panicked".to_owned(),
            )),
        }
    }
}
