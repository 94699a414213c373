use nalgebra_sparse::{coo::CooMatrix, csc::CscMatrix};

use crate::error::WeldSimError;

/// Uniform 2D finite-difference grid with its discrete Laplacian.
///
/// The domain spans `x ∈ [0, lx]`, `y ∈ [-ly/2, ly/2]`. Node `(i, j)` maps
/// to the flattened index `j * nx + i` (row-major); the same ordering is
/// used for the Laplacian, the source field, and the solution vector.
///
/// Border nodes carry Dirichlet conditions and form the `fixed` set; the
/// interior forms the `free` set. Both partitions and the operator are
/// built once and reused every time step.
pub struct Mesh {
    pub nx: usize,
    pub ny: usize,
    pub dx: f64,
    pub dy: f64,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub laplacian: CscMatrix<f64>,
    pub fixed: Vec<usize>,
    pub free: Vec<usize>,
    free_of: Vec<Option<usize>>,
}

impl Mesh {
    /// Builds the grid and the sparse Laplacian operator.
    ///
    /// # Arguments
    /// * `lx` - Domain length in x (m)
    /// * `ly` - Domain width in y (m)
    /// * `nx` - Node count in x (>= 3)
    /// * `ny` - Node count in y (>= 3)
    ///
    /// # Returns
    /// A Mesh instance, or a Config error for a degenerate grid
    pub fn new(lx: f64, ly: f64, nx: usize, ny: usize) -> Result<Mesh, WeldSimError> {
        if nx < 3 || ny < 3 {
            return Err(WeldSimError::Config(format!(
                "Grid must be at least 3x3, got {}x{}",
                nx, ny
            )));
        }
        if !(lx > 0.0) || !(ly > 0.0) {
            return Err(WeldSimError::Config(format!(
                "Domain lengths must be positive, got Lx={} Ly={}",
                lx, ly
            )));
        }

        let dx = lx / (nx - 1) as f64;
        let dy = ly / (ny - 1) as f64;

        let x: Vec<f64> = (0..nx).map(|i| i as f64 * dx).collect();
        let y: Vec<f64> = (0..ny).map(|j| -ly / 2.0 + j as f64 * dy).collect();

        let n = nx * ny;
        let laplacian = build_laplacian(nx, ny, dx, dy);

        // Partition border vs interior nodes
        let mut fixed: Vec<usize> = Vec::new();
        let mut free: Vec<usize> = Vec::new();
        let mut free_of: Vec<Option<usize>> = vec![None; n];

        for j in 0..ny {
            for i in 0..nx {
                let ind = j * nx + i;
                if i == 0 || i == nx - 1 || j == 0 || j == ny - 1 {
                    fixed.push(ind);
                } else {
                    free_of[ind] = Some(free.len());
                    free.push(ind);
                }
            }
        }

        Ok(Mesh {
            nx,
            ny,
            dx,
            dy,
            x,
            y,
            laplacian,
            fixed,
            free,
            free_of,
        })
    }

    /// Total node count of the flattened index space.
    pub fn n(&self) -> usize {
        self.nx * self.ny
    }

    /// Maps grid coordinates to the flattened row-major index.
    pub fn idx(&self, i: usize, j: usize) -> usize {
        j * self.nx + i
    }

    /// Position of the free-set block row for a global node index, or None
    /// for a fixed (boundary) node.
    pub fn free_index(&self, global: usize) -> Option<usize> {
        self.free_of[global]
    }
}

/// Assembles the 2D Laplacian as the Kronecker sum of the 1D tridiagonal
/// second-difference operators, scaled by 1/dx^2 and 1/dy^2. The sum
/// collapses to the familiar 5-point stencil, which is what gets pushed
/// into the triplet buffer here.
fn build_laplacian(nx: usize, ny: usize, dx: f64, dy: f64) -> CscMatrix<f64> {
    let n = nx * ny;
    let inv_dx2 = 1.0 / (dx * dx);
    let inv_dy2 = 1.0 / (dy * dy);

    let mut coo = CooMatrix::new(n, n);

    for j in 0..ny {
        for i in 0..nx {
            let row = j * nx + i;

            coo.push(row, row, -2.0 * inv_dx2 - 2.0 * inv_dy2);

            if i > 0 {
                coo.push(row, row - 1, inv_dx2);
            }
            if i < nx - 1 {
                coo.push(row, row + 1, inv_dx2);
            }
            if j > 0 {
                coo.push(row, row - nx, inv_dy2);
            }
            if j < ny - 1 {
                coo.push(row, row + nx, inv_dy2);
            }
        }
    }

    CscMatrix::from(&coo)
}
