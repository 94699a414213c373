use json::JsonValue;

use crate::error::WeldSimError;
use crate::material::Material;
use crate::source::{ContactModel, WeldAxis, WeldPath};
use crate::zones::PhaseKinetics;

/// Default cooldown added after the arc leaves the domain when no explicit
/// snapshot time is configured.
const DEFAULT_COOLDOWN_MARGIN: f64 = 5.0;

/// Process-specific heat source parameters.
#[derive(Debug, Clone)]
pub enum ProcessParams {
    /// Generic moving Gaussian surface source.
    Gaussian {
        power: f64,
        efficiency: f64,
        sigma: f64,
        penetration_depth: f64,
    },
    /// Plasma arc column.
    PlasmaArc {
        power: f64,
        radius: f64,
        arc_length: f64,
        efficiency: f64,
    },
    /// Electric resistance welding at a seam.
    Resistance {
        current_density: f64,
        contact_width: f64,
        efficiency: f64,
        frequency: f64,
    },
}

impl ProcessParams {
    pub fn name(&self) -> &'static str {
        match self {
            ProcessParams::Gaussian { .. } => "gaussian",
            ProcessParams::PlasmaArc { .. } => "plasma_arc",
            ProcessParams::Resistance { .. } => "resistance",
        }
    }
}

/// Full, validated simulation configuration. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub lx: f64,
    pub ly: f64,
    pub thickness: f64,
    pub nx: usize,
    pub ny: usize,

    pub dt: f64,
    pub theta: f64,
    pub snapshot_time: f64,
    pub cooldown_margin: f64,

    pub t0: f64,
    pub h_conv: f64,

    pub v_weld: f64,
    pub x_start: f64,
    pub y_start: f64,
    pub weld_axis: WeldAxis,

    pub process: ProcessParams,
    pub material_1: Material,
    pub material_2: Option<Material>,
    pub contact: Option<ContactModel>,
    pub phase: Option<PhaseKinetics>,
}

impl SimulationConfig {
    /// Arc trajectory described by the process parameters.
    pub fn weld_path(&self) -> WeldPath {
        WeldPath {
            x_start: self.x_start,
            y_start: self.y_start,
            speed: self.v_weld,
            axis: self.weld_axis,
        }
    }

    /// End of the simulated interval: the explicit snapshot time when one
    /// is configured, otherwise domain-traversal time plus the cooldown
    /// margin.
    pub fn end_time(&self) -> f64 {
        if self.snapshot_time > 0.0 {
            return self.snapshot_time;
        }
        match self.weld_path().exit_time(self.lx, self.ly) {
            Some(exit) => exit + self.cooldown_margin,
            // validate() rejects this combination; keep a sane fallback
            None => self.cooldown_margin,
        }
    }

    /// Prints the run header.
    pub fn summary(&self) {
        println!("info: process: {}", self.process.name());
        println!(
            "info: grid: {} x {} = {} nodes over {:.1} mm x {:.1} mm",
            self.nx,
            self.ny,
            self.nx * self.ny,
            self.lx * 1000.0,
            self.ly * 1000.0
        );
        println!(
            "info: plate thickness {:.2} mm, T0={} K, h_conv={} W/m^2K",
            self.thickness * 1000.0,
            self.t0,
            self.h_conv
        );
        match &self.material_2 {
            Some(second) => println!(
                "info: materials: {} | {} (midline joint)",
                self.material_1.name, second.name
            ),
            None => println!(
                "info: material: {} (alpha={:.3e} m^2/s)",
                self.material_1.name,
                self.material_1.diffusivity()
            ),
        }
        println!(
            "info: dt={} s, theta={}, welding speed {:.2} mm/s",
            self.dt,
            self.theta,
            self.v_weld * 1000.0
        );
        if let Some(contact) = &self.contact {
            println!(
                "info: contact model: R_c_base={:.3e}, pressure_ref={:.3e}, temp_melt_factor={}, asperity_reduction={}",
                contact.r_c_base,
                contact.pressure_ref,
                contact.temp_melt_factor,
                contact.asperity_reduction
            );
        }
        if let Some(phase) = &self.phase {
            println!(
                "info: phase kinetics: Ms={} K, alpha_KM={} (JMAK K0={:.3e}, n={}, Ea={:.3e} loaded, unused)",
                phase.ms_martensite, phase.alpha_km, phase.k0_jmak, phase.n_jmak, phase.ea_jmak
            );
        }
    }

    fn validate(&self) -> Result<(), WeldSimError> {
        if self.nx < 3 || self.ny < 3 {
            return Err(WeldSimError::Config(format!(
                "nx and ny must both be >= 3, got {}x{}",
                self.nx, self.ny
            )));
        }
        if !(self.lx > 0.0) || !(self.ly > 0.0) {
            return Err(WeldSimError::Config(
                "Lx and Ly must be positive".to_owned(),
            ));
        }
        if !(self.dt > 0.0) {
            return Err(WeldSimError::Config(format!(
                "dt must be positive, got {}",
                self.dt
            )));
        }
        if !(0.0..=1.0).contains(&self.theta) {
            return Err(WeldSimError::Config(format!(
                "theta must lie in [0, 1], got {}",
                self.theta
            )));
        }
        if self.v_weld < 0.0 {
            return Err(WeldSimError::Config(
                "v_weld must be non-negative".to_owned(),
            ));
        }
        if self.v_weld == 0.0 && self.snapshot_time <= 0.0 {
            return Err(WeldSimError::Config(
                "snapshot_time is required for a stationary arc (v_weld = 0)".to_owned(),
            ));
        }

        for mat in std::iter::once(&self.material_1).chain(self.material_2.iter()) {
            if !(mat.rho > 0.0) || !(mat.cp > 0.0) || !(mat.k > 0.0) {
                return Err(WeldSimError::Config(format!(
                    "Material {} needs positive rho, cp and k",
                    mat.name
                )));
            }
            if mat.t_melt <= mat.t_crit {
                return Err(WeldSimError::Config(format!(
                    "Material {} has T_melt <= T_crit",
                    mat.name
                )));
            }
        }

        if let ProcessParams::Resistance { .. } = self.process {
            if self.contact.is_none() {
                return Err(WeldSimError::Config(
                    "Resistance welding requires a contact_model section".to_owned(),
                ));
            }
            if !(self.material_1.sigma_e > 0.0) {
                return Err(WeldSimError::Config(
                    "Resistance welding requires a positive sigma_electrical".to_owned(),
                ));
            }
        }

        Ok(())
    }
}

fn section<'a>(root: &'a JsonValue, name: &str) -> Result<&'a JsonValue, WeldSimError> {
    if !root.has_key(name) {
        return Err(WeldSimError::Config(format!(
            "Config missing {} section",
            name
        )));
    }
    Ok(&root[name])
}

fn require_f64(obj: &JsonValue, section: &str, key: &str) -> Result<f64, WeldSimError> {
    match obj[key].as_f64() {
        Some(v) => Ok(v),
        None => Err(WeldSimError::Config(format!(
            "Missing or non-numeric {} in {} section",
            key, section
        ))),
    }
}

fn optional_f64(obj: &JsonValue, section: &str, key: &str, default: f64) -> Result<f64, WeldSimError> {
    if !obj.has_key(key) {
        return Ok(default);
    }
    require_f64(obj, section, key)
}

fn require_usize(obj: &JsonValue, section: &str, key: &str) -> Result<usize, WeldSimError> {
    match obj[key].as_usize() {
        Some(v) => Ok(v),
        None => Err(WeldSimError::Config(format!(
            "Missing or non-integer {} in {} section",
            key, section
        ))),
    }
}

fn require_str<'a>(obj: &'a JsonValue, section: &str, key: &str) -> Result<&'a str, WeldSimError> {
    match obj[key].as_str() {
        Some(v) => Ok(v),
        None => Err(WeldSimError::Config(format!(
            "Missing or non-string {} in {} section",
            key, section
        ))),
    }
}

fn parse_material(obj: &JsonValue, section: &str) -> Result<Material, WeldSimError> {
    Ok(Material {
        name: require_str(obj, section, "name")?.to_owned(),
        rho: require_f64(obj, section, "rho")?,
        cp: require_f64(obj, section, "cp")?,
        k: require_f64(obj, section, "k")?,
        sigma_e: optional_f64(obj, section, "sigma_electrical", 0.0)?,
        t_melt: require_f64(obj, section, "T_melt")?,
        t_crit: require_f64(obj, section, "T_crit")?,
        resistivity: optional_f64(obj, section, "resistivity", 0.0)?,
    })
}

fn parse_process(sim: &JsonValue) -> Result<ProcessParams, WeldSimError> {
    let kind = require_str(sim, "simulation_parameters", "process")?;

    match kind {
        "gaussian" => Ok(ProcessParams::Gaussian {
            power: require_f64(sim, "simulation_parameters", "Q_power")?,
            efficiency: optional_f64(sim, "simulation_parameters", "eta", 1.0)?,
            sigma: require_f64(sim, "simulation_parameters", "sigma")?,
            penetration_depth: require_f64(sim, "simulation_parameters", "d_p")?,
        }),
        "plasma_arc" => Ok(ProcessParams::PlasmaArc {
            power: require_f64(sim, "simulation_parameters", "Q_paw")?,
            radius: require_f64(sim, "simulation_parameters", "R_paw")?,
            arc_length: require_f64(sim, "simulation_parameters", "H_paw")?,
            efficiency: optional_f64(sim, "simulation_parameters", "eta", 1.0)?,
        }),
        "resistance" => Ok(ProcessParams::Resistance {
            current_density: require_f64(sim, "simulation_parameters", "current_density")?,
            contact_width: require_f64(sim, "simulation_parameters", "contact_width")?,
            efficiency: optional_f64(sim, "simulation_parameters", "eta_erw", 1.0)?,
            frequency: optional_f64(sim, "simulation_parameters", "frequency", 0.0)?,
        }),
        other => Err(WeldSimError::Config(format!(
            "Unknown process '{}'; expected gaussian, plasma_arc, or resistance",
            other
        ))),
    }
}

/// Builds a validated configuration from a parsed JSON document.
///
/// # Arguments
/// * `root` - The configuration file as a JsonValue object
///
/// # Returns
/// A SimulationConfig instance
pub fn from_json(root: &JsonValue) -> Result<SimulationConfig, WeldSimError> {
    let sim = section(root, "simulation_parameters")?;

    // Single-material runs may use either key; ERW configs call it
    // material_pipe.
    let material_1 = if root.has_key("material_1") {
        parse_material(&root["material_1"], "material_1")?
    } else if root.has_key("material_pipe") {
        parse_material(&root["material_pipe"], "material_pipe")?
    } else {
        return Err(WeldSimError::Config(
            "Config missing material_1 (or material_pipe) section".to_owned(),
        ));
    };

    let material_2 = if root.has_key("material_2") {
        Some(parse_material(&root["material_2"], "material_2")?)
    } else {
        None
    };

    let contact = if root.has_key("contact_model") {
        let c = &root["contact_model"];
        Some(ContactModel {
            r_c_base: require_f64(c, "contact_model", "R_c_base")?,
            pressure_ref: require_f64(c, "contact_model", "pressure_ref")?,
            temp_melt_factor: require_f64(c, "contact_model", "temp_melt_factor")?,
            asperity_reduction: optional_f64(c, "contact_model", "asperity_reduction", 1.0)?,
        })
    } else {
        None
    };

    let phase = if root.has_key("phase_kinetics") {
        let p = &root["phase_kinetics"];
        Some(PhaseKinetics {
            ms_martensite: require_f64(p, "phase_kinetics", "Ms_martensite")?,
            alpha_km: require_f64(p, "phase_kinetics", "alpha_KM")?,
            k0_jmak: optional_f64(p, "phase_kinetics", "K0_JMAK", 0.0)?,
            n_jmak: optional_f64(p, "phase_kinetics", "n_JMAK", 0.0)?,
            ea_jmak: optional_f64(p, "phase_kinetics", "Ea_JMAK", 0.0)?,
        })
    } else {
        None
    };

    let lx = require_f64(sim, "simulation_parameters", "Lx")?;
    let ly = require_f64(sim, "simulation_parameters", "Ly")?;

    let weld_axis = match optional_str(sim, "simulation_parameters", "weld_axis")? {
        None | Some("y") => WeldAxis::Y,
        Some("x") => WeldAxis::X,
        Some(other) => {
            return Err(WeldSimError::Config(format!(
                "weld_axis must be \"x\" or \"y\", got \"{}\"",
                other
            )))
        }
    };

    let config = SimulationConfig {
        lx,
        ly,
        thickness: require_f64(sim, "simulation_parameters", "thickness")?,
        nx: require_usize(sim, "simulation_parameters", "nx")?,
        ny: require_usize(sim, "simulation_parameters", "ny")?,
        dt: require_f64(sim, "simulation_parameters", "dt")?,
        theta: require_f64(sim, "simulation_parameters", "theta")?,
        snapshot_time: optional_f64(sim, "simulation_parameters", "snapshot_time", 0.0)?,
        cooldown_margin: optional_f64(
            sim,
            "simulation_parameters",
            "cooldown_margin",
            DEFAULT_COOLDOWN_MARGIN,
        )?,
        t0: require_f64(sim, "simulation_parameters", "T0")?,
        h_conv: optional_f64(sim, "simulation_parameters", "h_conv", 0.0)?,
        v_weld: require_f64(sim, "simulation_parameters", "v_weld")?,
        x_start: optional_f64(sim, "simulation_parameters", "x_start", lx / 2.0)?,
        y_start: optional_f64(sim, "simulation_parameters", "y_start", -ly / 2.0)?,
        weld_axis,
        process: parse_process(sim)?,
        material_1,
        material_2,
        contact,
        phase,
    };

    config.validate()?;
    Ok(config)
}

fn optional_str<'a>(
    obj: &'a JsonValue,
    section: &str,
    key: &str,
) -> Result<Option<&'a str>, WeldSimError> {
    if !obj.has_key(key) {
        return Ok(None);
    }
    match obj[key].as_str() {
        Some(s) => Ok(Some(s)),
        None => Err(WeldSimError::Config(format!(
            "Missing or non-string {} in {} section",
            key, section
        ))),
    }
}

/// Loads and validates a configuration file.
///
/// # Arguments
/// * `config_file` - Path to the JSON configuration
///
/// # Returns
/// A SimulationConfig instance
pub fn load(config_file: &str) -> Result<SimulationConfig, WeldSimError> {
    let contents = match std::fs::read_to_string(config_file) {
        Ok(c) => c,
        Err(_err) => {
            return Err(WeldSimError::Config(format!(
                "Unable to open config file {}",
                config_file
            )))
        }
    };

    let root = match json::parse(&contents) {
        Ok(v) => v,
        Err(err) => {
            return Err(WeldSimError::Config(format!(
                "Error in config file json: {}",
                err
            )))
        }
    };

    from_json(&root)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config_json() -> String {
        r#"{
            "simulation_parameters": {
                "Lx": 0.02, "Ly": 0.02, "thickness": 0.003,
                "nx": 21, "ny": 21,
                "dt": 0.01, "theta": 0.5, "snapshot_time": 0.5,
                "T0": 293.0, "h_conv": 10.0,
                "process": "gaussian",
                "Q_power": 1000.0, "eta": 1.0, "sigma": 0.002, "d_p": 0.001,
                "v_weld": 0.0, "x_start": 0.01, "y_start": 0.0
            },
            "material_1": {
                "name": "X52 steel",
                "rho": 7850.0, "cp": 500.0, "k": 45.0,
                "sigma_electrical": 5800000.0,
                "T_melt": 1767.0, "T_crit": 1000.0,
                "resistivity": 1.7e-7
            }
        }"#
        .to_owned()
    }

    fn parse(config: &str) -> Result<SimulationConfig, WeldSimError> {
        from_json(&json::parse(config).unwrap())
    }

    #[test]
    fn loads_gaussian_config() {
        let config = parse(&base_config_json()).unwrap();
        assert_eq!(config.nx, 21);
        assert_eq!(config.process.name(), "gaussian");
        assert_eq!(config.weld_axis, WeldAxis::Y);
        assert!((config.end_time() - 0.5).abs() < 1e-12);
        assert!(config.material_2.is_none());
    }

    #[test]
    fn rejects_bad_numerics() {
        let small_grid = base_config_json().replace("\"nx\": 21", "\"nx\": 2");
        assert!(parse(&small_grid).is_err());

        let bad_dt = base_config_json().replace("\"dt\": 0.01", "\"dt\": 0.0");
        assert!(parse(&bad_dt).is_err());

        let bad_theta = base_config_json().replace("\"theta\": 0.5", "\"theta\": 1.5");
        assert!(parse(&bad_theta).is_err());
    }

    #[test]
    fn stationary_arc_needs_snapshot_time() {
        let no_snapshot =
            base_config_json().replace("\"snapshot_time\": 0.5", "\"snapshot_time\": 0.0");
        let err = parse(&no_snapshot).unwrap_err();
        assert!(format!("{}", err).contains("stationary"));
    }

    #[test]
    fn end_time_from_traversal_and_cooldown() {
        let moving = base_config_json()
            .replace("\"snapshot_time\": 0.5", "\"snapshot_time\": 0.0")
            .replace("\"v_weld\": 0.0", "\"v_weld\": 0.005");
        let config = parse(&moving).unwrap();
        // y from 0 to +Ly/2 = 0.01 m at 5 mm/s, plus the 5 s default margin
        assert!((config.end_time() - 7.0).abs() < 1e-9);
    }

    #[test]
    fn resistance_requires_contact_model() {
        let resistance = base_config_json().replace(
            "\"process\": \"gaussian\",",
            "\"process\": \"resistance\", \"current_density\": 5.0e7, \"contact_width\": 0.002, \"eta_erw\": 0.8,",
        );
        let err = parse(&resistance).unwrap_err();
        assert!(format!("{}", err).contains("contact_model"));
    }

    #[test]
    fn non_string_weld_axis_reports_its_section() {
        let broken = base_config_json()
            .replace("\"v_weld\": 0.0,", "\"v_weld\": 0.0, \"weld_axis\": 5,");
        let err = parse(&broken).unwrap_err();
        assert!(format!("{}", err).contains("weld_axis in simulation_parameters"));
    }

    #[test]
    fn missing_material_field_is_fatal() {
        let broken = base_config_json().replace("\"rho\": 7850.0,", "");
        let err = parse(&broken).unwrap_err();
        assert!(format!("{}", err).contains("rho"));
    }
}
