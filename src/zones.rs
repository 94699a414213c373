use nalgebra::DVector;

use crate::history::MonitorPoint;
use crate::material::MaterialLayout;
use crate::mesh::Mesh;

/// Classification of one node after the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Unaffected,
    Haz,
    Fusion,
}

impl Zone {
    pub fn label(&self) -> &'static str {
        match self {
            Zone::Unaffected => "unaffected",
            Zone::Haz => "haz",
            Zone::Fusion => "fusion",
        }
    }
}

/// Fusion and HAZ masks derived from the peak-temperature field.
///
/// The two masks are disjoint by construction; together with the
/// unaffected remainder they partition the domain exactly.
pub struct ZoneMap {
    nx: usize,
    fusion: Vec<bool>,
    haz: Vec<bool>,
}

impl ZoneMap {
    pub fn zone(&self, i: usize, j: usize) -> Zone {
        let ind = j * self.nx + i;
        if self.fusion[ind] {
            Zone::Fusion
        } else if self.haz[ind] {
            Zone::Haz
        } else {
            Zone::Unaffected
        }
    }

    pub fn is_fusion(&self, i: usize, j: usize) -> bool {
        self.fusion[j * self.nx + i]
    }

    pub fn is_haz(&self, i: usize, j: usize) -> bool {
        self.haz[j * self.nx + i]
    }

    pub fn fusion_count(&self) -> usize {
        self.fusion.iter().filter(|&&b| b).count()
    }

    pub fn haz_count(&self) -> usize {
        self.haz.iter().filter(|&&b| b).count()
    }

    /// Fusion-zone area in m^2 (cell count times cell area).
    pub fn fusion_area(&self, mesh: &Mesh) -> f64 {
        self.fusion_count() as f64 * mesh.dx * mesh.dy
    }

    pub fn haz_area(&self, mesh: &Mesh) -> f64 {
        self.haz_count() as f64 * mesh.dx * mesh.dy
    }
}

/// Classifies every node against the per-material thresholds:
/// fusion where peak >= T_melt, HAZ where T_crit <= peak < T_melt. For
/// dissimilar joints the thresholds follow the material on each side of
/// the midline.
pub fn classify(mesh: &Mesh, layout: &MaterialLayout, peak: &DVector<f64>) -> ZoneMap {
    let n = mesh.n();
    let mut fusion = vec![false; n];
    let mut haz = vec![false; n];

    for j in 0..mesh.ny {
        for i in 0..mesh.nx {
            let ind = mesh.idx(i, j);
            let mat = layout.material_at(mesh.x[i]);
            let t = peak[ind];
            if t >= mat.t_melt {
                fusion[ind] = true;
            } else if t >= mat.t_crit {
                haz[ind] = true;
            }
        }
    }

    ZoneMap {
        nx: mesh.nx,
        fusion,
        haz,
    }
}

/// Weld width statistics over the fusion zone, in meters.
#[derive(Debug, Clone, Copy)]
pub struct WeldWidthStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub columns: usize,
}

/// Measures the fused row span of every grid column that melted and
/// reports mean/extrema. None if the fusion zone never spans two rows.
pub fn weld_width(mesh: &Mesh, zones: &ZoneMap) -> Option<WeldWidthStats> {
    let mut widths: Vec<f64> = Vec::new();

    for i in 0..mesh.nx {
        let mut first: Option<usize> = None;
        let mut last: Option<usize> = None;
        for j in 0..mesh.ny {
            if zones.is_fusion(i, j) {
                if first.is_none() {
                    first = Some(j);
                }
                last = Some(j);
            }
        }
        if let (Some(a), Some(b)) = (first, last) {
            if b > a {
                widths.push(mesh.y[b] - mesh.y[a]);
            }
        }
    }

    if widths.is_empty() {
        return None;
    }

    let mean = widths.iter().sum::<f64>() / widths.len() as f64;
    let min = widths.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = widths.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    Some(WeldWidthStats {
        mean,
        min,
        max,
        columns: widths.len(),
    })
}

/// Phase-transformation kinetics parameters.
///
/// Only the Koistinen-Marburger pair (Ms, alpha_KM) feeds the martensite
/// estimate; the JMAK constants are accepted from the configuration and
/// reported, nothing more.
#[derive(Debug, Clone, Copy)]
pub struct PhaseKinetics {
    pub ms_martensite: f64,
    pub alpha_km: f64,
    pub k0_jmak: f64,
    pub n_jmak: f64,
    pub ea_jmak: f64,
}

/// Koistinen-Marburger martensite fraction estimate.
///
/// The cooling rate shifts the effective quench temperature:
/// T_eff = Ms - 50 * log10(max(rate, 1)); points that never reached Ms
/// form no martensite.
pub fn martensite_fraction(t_peak: f64, cooling_rate: f64, ms: f64, alpha_km: f64) -> f64 {
    if t_peak < ms {
        return 0.0;
    }
    let t_eff = ms - 50.0 * cooling_rate.max(1.0).log10();
    (1.0 - (-alpha_km * (ms - t_eff)).exp()).clamp(0.0, 1.0)
}

/// Martensite estimate for one monitor point from its recorded history.
pub fn martensite_at_monitor(monitor: &MonitorPoint, kinetics: &PhaseKinetics) -> f64 {
    if monitor.is_empty() {
        return 0.0;
    }
    martensite_fraction(
        monitor.peak(),
        monitor.max_cooling_rate(),
        kinetics.ms_martensite,
        kinetics.alpha_km,
    )
}
