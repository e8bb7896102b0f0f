use crate::config::TreeConfig;

/// Maps coordinates onto the periodic grid of root boxes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootGrid {
    pub root_size: f64,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub box_size: [f64; 3],
}

impl RootGrid {
    pub fn from_config(config: &TreeConfig) -> Self {
        Self {
            root_size: config.root_size,
            nx: config.root_nx,
            ny: config.root_ny,
            nz: config.root_nz,
            box_size: config.box_size,
        }
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Floors into the grid and wraps periodically. rem_euclid keeps negative
    // cell indices (coordinates below -box/2) inside 0..n.
    fn cell(&self, coord: f64, extent: f64, n: usize) -> usize {
        let cell = ((coord + extent / 2.0) / self.root_size).floor() as i64;
        cell.rem_euclid(n as i64) as usize
    }

    /// Grid indices `(i, j, k)` of the root box containing a point.
    pub fn cell_of(&self, x: f64, y: f64, z: f64) -> (usize, usize, usize) {
        (
            self.cell(x, self.box_size[0], self.nx),
            self.cell(y, self.box_size[1], self.ny),
            self.cell(z, self.box_size[2], self.nz),
        )
    }

    /// Flat index of a root box.
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        (k * self.ny + j) * self.nx + i
    }

    /// Flat index of the root box containing a point.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_gravity_tree::config::TreeConfig;
    /// use rs_gravity_tree::tree::RootGrid;
    ///
    /// let grid = RootGrid::from_config(&TreeConfig::new(Some(1.0), Some((2, 2, 1)), None, None));
    /// assert_eq!(grid.root_index_of(-0.5, -0.5, 0.0), 0);
    /// assert_eq!(grid.root_index_of(0.5, 0.5, 0.0), 3);
    /// // Wraps periodically.
    /// assert_eq!(grid.root_index_of(1.5, -0.5, 0.0), 0);
    /// ```
    pub fn root_index_of(&self, x: f64, y: f64, z: f64) -> usize {
        let (i, j, k) = self.cell_of(x, y, z);
        self.index(i, j, k)
    }

    /// Center of the root box at grid indices `(i, j, k)`.
    pub fn center(&self, i: usize, j: usize, k: usize) -> (f64, f64, f64) {
        (
            -self.box_size[0] / 2.0 + self.root_size * (0.5 + i as f64),
            -self.box_size[1] / 2.0 + self.root_size * (0.5 + j as f64),
            -self.box_size[2] / 2.0 + self.root_size * (0.5 + k as f64),
        )
    }

    /// Center of the root box with the given flat index.
    pub fn center_of_index(&self, index: usize) -> (f64, f64, f64) {
        let i = index % self.nx;
        let j = (index / self.nx) % self.ny;
        let k = index / (self.nx * self.ny);
        self.center(i, j, k)
    }
}
