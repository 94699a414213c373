use serde::{Deserialize, Serialize};

/// Thermal history at one fixed grid coordinate.
///
/// Samples are appended once per time step, in order; the record lives for
/// the whole simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorPoint {
    pub i: usize,
    pub j: usize,
    pub times: Vec<f64>,
    pub temperatures: Vec<f64>,
}

impl MonitorPoint {
    pub fn new(i: usize, j: usize) -> MonitorPoint {
        MonitorPoint {
            i,
            j,
            times: Vec::new(),
            temperatures: Vec::new(),
        }
    }

    pub fn record(&mut self, t: f64, temperature: f64) {
        self.times.push(t);
        self.temperatures.push(temperature);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Highest temperature seen by this point.
    pub fn peak(&self) -> f64 {
        self.temperatures
            .iter()
            .fold(f64::NEG_INFINITY, |a, &b| a.max(b))
    }

    /// Numerical time-derivative of the history (K/s), central differences
    /// with one-sided ends. Empty for fewer than two samples.
    pub fn rate(&self) -> Vec<f64> {
        let n = self.len();
        if n < 2 {
            return Vec::new();
        }
        let mut out = vec![0.0; n];
        out[0] = (self.temperatures[1] - self.temperatures[0]) / (self.times[1] - self.times[0]);
        out[n - 1] = (self.temperatures[n - 1] - self.temperatures[n - 2])
            / (self.times[n - 1] - self.times[n - 2]);
        for m in 1..n - 1 {
            out[m] = (self.temperatures[m + 1] - self.temperatures[m - 1])
                / (self.times[m + 1] - self.times[m - 1]);
        }
        out
    }

    /// Peak cooling rate (K/s, positive) over the recorded history.
    pub fn max_cooling_rate(&self) -> f64 {
        self.rate()
            .iter()
            .fold(0.0f64, |acc, &r| acc.max(-r))
    }
}

/// Default monitor layout: left of the seam, at the seam, right of it, and
/// ahead of it along the weld line.
pub fn default_monitors(nx: usize, ny: usize) -> Vec<(usize, usize)> {
    vec![
        (nx / 4, ny / 2),
        (nx / 2, ny / 2),
        (3 * nx / 4, ny / 2),
        (nx / 2, 3 * ny / 4),
    ]
}

/// Clamps requested monitor coordinates into the grid, warning on any that
/// had to move. Out-of-range monitors are a non-fatal condition.
pub fn clamp_monitors(requested: &[(usize, usize)], nx: usize, ny: usize) -> Vec<MonitorPoint> {
    let mut monitors = Vec::with_capacity(requested.len());
    for &(i, j) in requested {
        let ci = i.min(nx - 1);
        let cj = j.min(ny - 1);
        if ci != i || cj != j {
            println!(
                "warning: monitor point ({}, {}) outside {}x{} grid, clamped to ({}, {})",
                i, j, nx, ny, ci, cj
            );
        }
        monitors.push(MonitorPoint::new(ci, cj));
    }
    monitors
}
