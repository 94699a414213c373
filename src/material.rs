use nalgebra::DVector;

use crate::mesh::Mesh;

// Property ramps between T_crit and T_melt, and the molten plateaus they
// end on.
const K_MOLTEN_FACTOR: f64 = 1.15;
const CP_MOLTEN_FACTOR: f64 = 1.30;
const RHO_MOLTEN_FACTOR: f64 = 0.97;

/// Base (room-temperature) properties of one parent metal.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub rho: f64,
    pub cp: f64,
    pub k: f64,
    pub sigma_e: f64,
    pub t_melt: f64,
    pub t_crit: f64,
    pub resistivity: f64,
}

impl Material {
    /// Room-temperature thermal diffusivity k / (rho * cp).
    pub fn diffusivity(&self) -> f64 {
        self.k / (self.rho * self.cp)
    }
}

/// Fractional position of `t` inside the [t_crit, t_melt) ramp, clamped to
/// [0, 1].
fn ramp(t: f64, t_crit: f64, t_melt: f64) -> f64 {
    ((t - t_crit) / (t_melt - t_crit)).clamp(0.0, 1.0)
}

/// Temperature-dependent thermal conductivity.
///
/// Base value below T_crit, linear ramp to +15% across the HAZ range, and a
/// constant molten plateau at +15%.
pub fn conductivity(t: f64, base: f64, t_crit: f64, t_melt: f64) -> f64 {
    if t < t_crit {
        base
    } else {
        base * (1.0 + ramp(t, t_crit, t_melt) * (K_MOLTEN_FACTOR - 1.0))
    }
}

/// Temperature-dependent specific heat. Ramps to +30% across the HAZ range
/// (phase transformation), constant in the melt.
pub fn heat_capacity(t: f64, base: f64, t_crit: f64, t_melt: f64) -> f64 {
    if t < t_crit {
        base
    } else {
        base * (1.0 + ramp(t, t_crit, t_melt) * (CP_MOLTEN_FACTOR - 1.0))
    }
}

/// Temperature-dependent density. Drops 3% across the HAZ range, constant
/// in the melt.
pub fn density(t: f64, base: f64, t_crit: f64, t_melt: f64) -> f64 {
    if t < t_crit {
        base
    } else {
        base * (1.0 - ramp(t, t_crit, t_melt) * (1.0 - RHO_MOLTEN_FACTOR))
    }
}

/// Temperature-dependent electrical conductivity for resistance welding.
///
/// Unlike the thermal properties this decreases with temperature: linearly
/// down to 70% of base at T_crit, then down to 42% at T_melt, constant in
/// the melt.
pub fn electrical_conductivity(t: f64, base: f64, t_crit: f64, t_melt: f64) -> f64 {
    if t < t_crit {
        base * (1.0 - (t - 300.0) / (t_crit - 300.0) * 0.3)
    } else if t < t_melt {
        base * 0.7 * (1.0 - (t - t_crit) / (t_melt - t_crit) * 0.4)
    } else {
        base * 0.42
    }
}

/// Field-valued material properties evaluated at the current temperature.
pub struct PropertyFields {
    pub k: DVector<f64>,
    pub cp: DVector<f64>,
    pub rho: DVector<f64>,
    pub alpha: DVector<f64>,
}

/// Spatial assignment of parent metals over the domain.
///
/// A single-material run uses `primary` everywhere. A dissimilar-metal
/// joint assigns `primary` to `x < midline` and `secondary` to the other
/// side; the assignment is by position, never by field value.
pub struct MaterialLayout {
    primary: Material,
    secondary: Option<Material>,
    midline: f64,
}

impl MaterialLayout {
    pub fn new(primary: Material, secondary: Option<Material>, midline: f64) -> MaterialLayout {
        MaterialLayout {
            primary,
            secondary,
            midline,
        }
    }

    /// The parent metal at a given x position.
    pub fn material_at(&self, x: f64) -> &Material {
        match &self.secondary {
            Some(second) if x >= self.midline => second,
            _ => &self.primary,
        }
    }

    pub fn primary(&self) -> &Material {
        &self.primary
    }

    /// Evaluates k, cp, rho and the derived diffusivity alpha = k/(rho*cp)
    /// over the whole field. Called every step; the alpha field feeding the
    /// system matrix is what forces re-assembly and re-factorization.
    pub fn evaluate(&self, mesh: &Mesh, temperature: &DVector<f64>) -> PropertyFields {
        let n = mesh.n();
        let mut k = DVector::zeros(n);
        let mut cp = DVector::zeros(n);
        let mut rho = DVector::zeros(n);
        let mut alpha = DVector::zeros(n);

        for j in 0..mesh.ny {
            for i in 0..mesh.nx {
                let ind = mesh.idx(i, j);
                let mat = self.material_at(mesh.x[i]);
                let t = temperature[ind];

                let kv = conductivity(t, mat.k, mat.t_crit, mat.t_melt);
                let cv = heat_capacity(t, mat.cp, mat.t_crit, mat.t_melt);
                let rv = density(t, mat.rho, mat.t_crit, mat.t_melt);

                k[ind] = kv;
                cp[ind] = cv;
                rho[ind] = rv;
                alpha[ind] = kv / (rv * cv);
            }
        }

        PropertyFields { k, cp, rho, alpha }
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

    #[test]
    fn conductivity_ramp_and_plateau() {
        let m = steel();
        assert_eq!(conductivity(300.0, m.k, m.t_crit, m.t_melt), m.k);
        // Midpoint of the ramp sits halfway to +15%
        let mid = (m.t_crit + m.t_melt) / 2.0;
        let expected = m.k * 1.075;
        assert!((conductivity(mid, m.k, m.t_crit, m.t_melt) - expected).abs() < 1e-9);
        assert!((conductivity(2500.0, m.k, m.t_crit, m.t_melt) - m.k * 1.15).abs() < 1e-9);
    }

    #[test]
    fn density_decreases_heat_capacity_increases() {
        let m = steel();
        let mid = (m.t_crit + m.t_melt) / 2.0;
        assert!(density(mid, m.rho, m.t_crit, m.t_melt) < m.rho);
        assert!((density(3000.0, m.rho, m.t_crit, m.t_melt) - m.rho * 0.97).abs() < 1e-9);
        assert!(heat_capacity(mid, m.cp, m.t_crit, m.t_melt) > m.cp);
        assert!((heat_capacity(3000.0, m.cp, m.t_crit, m.t_melt) - m.cp * 1.3).abs() < 1e-9);
    }

    #[test]
    fn electrical_conductivity_is_decreasing() {
        let m = steel();
        let samples = [300.0, 600.0, 999.0, 1200.0, 1500.0, 1766.0, 2000.0];
        let mut last = f64::INFINITY;
        for t in samples {
            let s = electrical_conductivity(t, m.sigma_e, m.t_crit, m.t_melt);
            assert!(s <= last, "sigma_e not decreasing at T={}", t);
            last = s;
        }
        assert!(
            (electrical_conductivity(2000.0, m.sigma_e, m.t_crit, m.t_melt) - m.sigma_e * 0.42)
                .abs()
                < 1e-3
        );
    }

    #[test]
    fn bimetal_selects_by_midline_not_temperature() {
        let mut copper = steel();
        copper.name = "copper".to_owned();
        copper.k = 400.0;

        let layout = MaterialLayout::new(steel(), Some(copper), 0.01);
        assert_eq!(layout.material_at(0.004).name, "X52 steel");
        assert_eq!(layout.material_at(0.015).name, "copper");

        let mesh = Mesh::new(0.02, 0.02, 5, 5).unwrap();
        // Uniform hot field: property split still follows position
        let t = DVector::from_element(mesh.n(), 400.0);
        let props = layout.evaluate(&mesh, &t);
        assert!((props.k[mesh.idx(0, 2)] - 45.0).abs() < 1e-12);
        assert!((props.k[mesh.idx(4, 2)] - 400.0).abs() < 1e-12);
    }

    #[test]
    fn diffusivity_matches_definition() {
        let m = steel();
        assert!((m.diffusivity() - 45.0 / (7850.0 * 500.0)).abs() < 1e-15);
    }
}
