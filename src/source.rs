use std::f64::consts::PI;

use nalgebra::DVector;

use crate::material::{self, Material};
use crate::mesh::Mesh;

/// Axis the torch travels along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeldAxis {
    X,
    Y,
}

/// Linear arc trajectory: start point, travel axis, and weld speed.
#[derive(Debug, Clone, Copy)]
pub struct WeldPath {
    pub x_start: f64,
    pub y_start: f64,
    pub speed: f64,
    pub axis: WeldAxis,
}

impl WeldPath {
    /// Arc position at simulated time `t`.
    pub fn position(&self, t: f64) -> (f64, f64) {
        match self.axis {
            WeldAxis::X => (self.x_start + self.speed * t, self.y_start),
            WeldAxis::Y => (self.x_start, self.y_start + self.speed * t),
        }
    }

    /// Whether a position lies inside the domain `[0, lx] x [-ly/2, ly/2]`.
    pub fn in_domain(pos: (f64, f64), lx: f64, ly: f64) -> bool {
        pos.0 >= 0.0 && pos.0 <= lx && pos.1 >= -ly / 2.0 && pos.1 <= ly / 2.0
    }

    /// Time at which the arc leaves the domain, or None for a stationary
    /// arc.
    pub fn exit_time(&self, lx: f64, ly: f64) -> Option<f64> {
        if self.speed <= 0.0 {
            return None;
        }
        let travel = match self.axis {
            WeldAxis::X => lx - self.x_start,
            WeldAxis::Y => ly / 2.0 - self.y_start,
        };
        Some(travel.max(0.0) / self.speed)
    }
}

/// A welding process heat source.
///
/// Maps the grid, the arc trajectory, and the current temperature field to
/// a volumetric power-density field in W/m^3 (flattened row-major, same
/// ordering as the solution vector). New processes implement this contract
/// instead of copying the solver.
pub trait HeatSource {
    fn volumetric(
        &self,
        mesh: &Mesh,
        path: &WeldPath,
        t: f64,
        dt: f64,
        temperature: &DVector<f64>,
    ) -> DVector<f64>;
}

/// Generic moving Gaussian surface source converted to a volumetric one.
///
/// Q = (eta * P) / (2 pi sigma^2 d_p) * exp(-r^2 / (2 sigma^2)), where
/// `d_p` is the effective penetration depth. The field is averaged between
/// the previous and current arc positions for better energy accounting.
pub struct GaussianSource {
    pub power: f64,
    pub efficiency: f64,
    pub sigma: f64,
    pub penetration_depth: f64,
}

impl GaussianSource {
    fn surface_flux(&self, x: f64, y: f64, arc: (f64, f64)) -> f64 {
        let q_tot = self.efficiency * self.power;
        let r_sq = (x - arc.0).powi(2) + (y - arc.1).powi(2);
        q_tot / (2.0 * PI * self.sigma * self.sigma) * (-r_sq / (2.0 * self.sigma * self.sigma)).exp()
    }
}

impl HeatSource for GaussianSource {
    fn volumetric(
        &self,
        mesh: &Mesh,
        path: &WeldPath,
        t: f64,
        dt: f64,
        _temperature: &DVector<f64>,
    ) -> DVector<f64> {
        let lx = mesh.x[mesh.nx - 1];
        let ly = mesh.y[mesh.ny - 1] - mesh.y[0];

        let arc = path.position(t);
        if !WeldPath::in_domain(arc, lx, ly) {
            return DVector::zeros(mesh.n());
        }
        let arc_prev = path.position((t - dt).max(0.0));

        let mut q = DVector::zeros(mesh.n());
        for j in 0..mesh.ny {
            for i in 0..mesh.nx {
                let (x, y) = (mesh.x[i], mesh.y[j]);
                let flux =
                    0.5 * (self.surface_flux(x, y, arc_prev) + self.surface_flux(x, y, arc));
                q[mesh.idx(i, j)] = flux / self.penetration_depth;
            }
        }
        q
    }
}

/// Plasma arc column source: Q = eta * 3 Q0 / (pi R^2 H) * exp(-3 r^2 / R^2).
pub struct PlasmaArcSource {
    pub power: f64,
    pub radius: f64,
    pub arc_length: f64,
    pub efficiency: f64,
}

impl HeatSource for PlasmaArcSource {
    fn volumetric(
        &self,
        mesh: &Mesh,
        path: &WeldPath,
        t: f64,
        _dt: f64,
        _temperature: &DVector<f64>,
    ) -> DVector<f64> {
        let lx = mesh.x[mesh.nx - 1];
        let ly = mesh.y[mesh.ny - 1] - mesh.y[0];

        let arc = path.position(t);
        if !WeldPath::in_domain(arc, lx, ly) {
            return DVector::zeros(mesh.n());
        }

        let peak =
            self.efficiency * 3.0 * self.power / (PI * self.radius * self.radius * self.arc_length);
        let mut q = DVector::zeros(mesh.n());
        for j in 0..mesh.ny {
            for i in 0..mesh.nx {
                let r_sq = (mesh.x[i] - arc.0).powi(2) + (mesh.y[j] - arc.1).powi(2);
                q[mesh.idx(i, j)] = peak * (-3.0 * r_sq / (self.radius * self.radius)).exp();
            }
        }
        q
    }
}

/// Contact-resistance model parameters for the resistance-welding seam.
///
/// `asperity_reduction` is carried from the configuration for reporting but
/// is not consumed by the heating formulas.
#[derive(Debug, Clone, Copy)]
pub struct ContactModel {
    pub r_c_base: f64,
    pub pressure_ref: f64,
    pub temp_melt_factor: f64,
    pub asperity_reduction: f64,
}

/// Temperature/pressure-dependent contact resistance at the seam.
///
/// Higher pressure reduces resistance; resistance collapses toward
/// `temp_melt_factor` as the interface approaches the melting point.
pub fn contact_resistance(t: f64, pressure: f64, model: &ContactModel, t_melt: f64) -> f64 {
    let pressure_factor = (model.pressure_ref / pressure.max(1e6)).sqrt();

    let temp_ratio = t / t_melt;
    let temp_factor = if temp_ratio < 0.8 {
        1.0
    } else if temp_ratio < 1.0 {
        1.0 - (temp_ratio - 0.8) / 0.2 * (1.0 - model.temp_melt_factor)
    } else {
        model.temp_melt_factor
    };

    model.r_c_base * pressure_factor * temp_factor
}

/// Joule heating at an electric-resistance-welded seam.
///
/// A Gaussian current-density profile J = J0 * exp(-r^2 / w^2) concentrates
/// at the seam; heating combines bulk Joule losses J^2 / sigma_e(T) with
/// contact-resistance losses J^2 * R_c / d_c, where the contact depth d_c
/// is w/3. The contact resistance is evaluated over the field and averaged
/// to a scalar each step.
pub struct ResistanceWeldSource {
    pub current_density: f64,
    pub contact_width: f64,
    pub efficiency: f64,
    pub contact: ContactModel,
    pub material: Material,
}

impl HeatSource for ResistanceWeldSource {
    fn volumetric(
        &self,
        mesh: &Mesh,
        path: &WeldPath,
        t: f64,
        _dt: f64,
        temperature: &DVector<f64>,
    ) -> DVector<f64> {
        let lx = mesh.x[mesh.nx - 1];
        let ly = mesh.y[mesh.ny - 1] - mesh.y[0];

        let arc = path.position(t);
        if !WeldPath::in_domain(arc, lx, ly) {
            return DVector::zeros(mesh.n());
        }

        // Uniform clamp pressure at the reference value; the contact
        // resistance still tracks the temperature field.
        let pressure = self.contact.pressure_ref;
        let n = mesh.n();
        let mut r_mean = 0.0;
        for ind in 0..n {
            r_mean += contact_resistance(
                temperature[ind],
                pressure,
                &self.contact,
                self.material.t_melt,
            );
        }
        r_mean /= n as f64;

        let w_sq = self.contact_width * self.contact_width;
        let d_contact = self.contact_width / 3.0;

        let mut q = DVector::zeros(n);
        for j in 0..mesh.ny {
            for i in 0..mesh.nx {
                let ind = mesh.idx(i, j);
                let r_sq = (mesh.x[i] - arc.0).powi(2) + (mesh.y[j] - arc.1).powi(2);
                let j_local = self.current_density * (-r_sq / w_sq).exp();

                let sigma_e = material::electrical_conductivity(
                    temperature[ind],
                    self.material.sigma_e,
                    self.material.t_crit,
                    self.material.t_melt,
                );

                let q_bulk = j_local * j_local / (sigma_e + 1e-10);
                let q_contact = j_local * j_local * r_mean / d_contact;
                q[ind] = self.efficiency * (q_bulk + q_contact);
            }
        }
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steel() -> Material {
        Material {
            name: "X52 steel".to_owned(),
            rho: 7850.0,
            cp: 500.0,
            k: 45.0,
            sigma_e: 5.8e6,
            t_melt: 1767.0,
            t_crit: 1000.0,
            resistivity: 1.7e-7,
        }
    }

    fn centered_path() -> WeldPath {
        WeldPath {
            x_start: 0.01,
            y_start: 0.0,
            speed: 0.0,
            axis: WeldAxis::Y,
        }
    }

    #[test]
    fn path_advances_along_axis() {
        let path = WeldPath {
            x_start: 0.01,
            y_start: -0.02,
            speed: 0.005,
            axis: WeldAxis::Y,
        };
        let (x, y) = path.position(2.0);
        assert!((x - 0.01).abs() < 1e-12);
        assert!((y - (-0.01)).abs() < 1e-12);

        // Exit at the +y edge of a 0.06 m wide domain
        let exit = path.exit_time(0.05, 0.06).unwrap();
        assert!((exit - 10.0).abs() < 1e-9);

        let stationary = centered_path();
        assert!(stationary.exit_time(0.02, 0.02).is_none());
    }

    #[test]
    fn gaussian_deposits_expected_total_power() {
        // Domain much wider than sigma so the tails are captured
        let mesh = Mesh::new(0.1, 0.1, 101, 101).unwrap();
        let source = GaussianSource {
            power: 1000.0,
            efficiency: 0.8,
            sigma: 0.005,
            penetration_depth: 0.002,
        };
        let path = WeldPath {
            x_start: 0.05,
            y_start: 0.0,
            speed: 0.0,
            axis: WeldAxis::Y,
        };
        let t = DVector::from_element(mesh.n(), 293.0);
        let q = source.volumetric(&mesh, &path, 1.0, 0.1, &t);

        // Integrate Q * d_p over the surface: should recover eta * P
        let mut total = 0.0;
        for v in q.iter() {
            total += v * source.penetration_depth * mesh.dx * mesh.dy;
        }
        assert!(
            (total - 800.0).abs() / 800.0 < 0.02,
            "deposited {} W, expected 800 W",
            total
        );
    }

    #[test]
    fn source_is_zero_once_arc_exits_domain() {
        let mesh = Mesh::new(0.02, 0.02, 11, 11).unwrap();
        let path = WeldPath {
            x_start: 0.01,
            y_start: 0.0,
            speed: 0.01,
            axis: WeldAxis::Y,
        };
        let source = PlasmaArcSource {
            power: 2500.0,
            radius: 0.002,
            arc_length: 0.005,
            efficiency: 1.0,
        };
        let t = DVector::from_element(mesh.n(), 293.0);

        let q_inside = source.volumetric(&mesh, &path, 0.5, 0.01, &t);
        assert!(q_inside.max() > 0.0);

        // At t=2s the arc sits at y=0.02, outside [-0.01, 0.01]
        let q_outside = source.volumetric(&mesh, &path, 2.0, 0.01, &t);
        assert_eq!(q_outside.max(), 0.0);
    }

    #[test]
    fn plasma_arc_peak_matches_formula() {
        let mesh = Mesh::new(0.02, 0.02, 21, 21).unwrap();
        let source = PlasmaArcSource {
            power: 2500.0,
            radius: 0.002,
            arc_length: 0.005,
            efficiency: 1.0,
        };
        let t = DVector::from_element(mesh.n(), 293.0);
        let q = source.volumetric(&mesh, &centered_path(), 0.0, 0.01, &t);

        let expected = 3.0 * 2500.0 / (PI * 0.002f64.powi(2) * 0.005);
        let center = q[mesh.idx(10, 10)];
        assert!((center - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn contact_resistance_collapses_near_melt() {
        let model = ContactModel {
            r_c_base: 1e-4,
            pressure_ref: 50e6,
            temp_melt_factor: 0.1,
            asperity_reduction: 0.5,
        };
        let t_melt = 1767.0;
        let p = model.pressure_ref;

        let cold = contact_resistance(300.0, p, &model, t_melt);
        assert!((cold - model.r_c_base).abs() < 1e-12);

        let warm = contact_resistance(0.9 * t_melt, p, &model, t_melt);
        assert!(warm < cold && warm > model.r_c_base * model.temp_melt_factor);

        let molten = contact_resistance(2.0 * t_melt, p, &model, t_melt);
        assert!((molten - model.r_c_base * model.temp_melt_factor).abs() < 1e-12);
    }

    #[test]
    fn resistance_source_concentrates_at_seam_and_scales_with_efficiency() {
        let mesh = Mesh::new(0.02, 0.02, 21, 21).unwrap();
        let t = DVector::from_element(mesh.n(), 293.0);
        let base = ResistanceWeldSource {
            current_density: 5e7,
            contact_width: 0.002,
            efficiency: 0.5,
            contact: ContactModel {
                r_c_base: 1e-4,
                pressure_ref: 50e6,
                temp_melt_factor: 0.1,
                asperity_reduction: 0.5,
            },
            material: steel(),
        };
        let q = base.volumetric(&mesh, &centered_path(), 0.0, 0.01, &t);

        let seam = q[mesh.idx(10, 10)];
        let far = q[mesh.idx(0, 0)];
        assert!(seam > 0.0);
        assert!(seam > far * 1e3);

        let double = ResistanceWeldSource {
            efficiency: 1.0,
            material: steel(),
            ..base
        };
        let q2 = double.volumetric(&mesh, &centered_path(), 0.0, 0.01, &t);
        assert!((q2[mesh.idx(10, 10)] - 2.0 * seam).abs() / seam < 1e-9);
    }
}
