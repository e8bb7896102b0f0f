// src/config.rs

use crate::errors::TreeError;

/// Default bound on the number of levels below a root box.
///
/// A double can be halved about 1075 times before it underflows, but two
/// distinct particles inside one root box separate after at most ~60 levels.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Geometry of the periodic root grid and the tree's capability flags.
///
/// The domain is a box centered on the origin made of
/// `root_nx * root_ny * root_nz` cubic root boxes of width `root_size`.
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Width of a single root box.
    pub root_size: f64,
    pub root_nx: usize,
    pub root_ny: usize,
    pub root_nz: usize,
    /// Extent of the whole domain along each axis.
    pub box_size: [f64; 3],
    /// Particles with an index below this threshold keep their index when evicted.
    pub n_tree_fixed: usize,
    /// Aggregate quadrupole tensors in addition to monopoles.
    pub quadrupole: bool,
    /// Maximum depth of a leaf below its root box.
    pub max_depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            root_size: 1.0,
            root_nx: 1,
            root_ny: 1,
            root_nz: 1,
            box_size: [1.0, 1.0, 1.0],
            n_tree_fixed: 0,
            quadrupole: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl TreeConfig {
    /// Creates a configuration, falling back to the defaults for every `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rs_gravity_tree::config::TreeConfig;
    ///
    /// let config = TreeConfig::new(Some(2.0), Some((2, 1, 1)), None, Some(true));
    /// assert_eq!(config.box_size, [4.0, 2.0, 2.0]);
    /// assert_eq!(config.root_n(), 2);
    /// assert!(config.quadrupole);
    /// ```
    pub fn new(
        root_size: Option<f64>,
        root_grid: Option<(usize, usize, usize)>,
        n_tree_fixed: Option<usize>,
        quadrupole: Option<bool>,
    ) -> Self {
        let default = TreeConfig::default();
        let (nx, ny, nz) = root_grid.unwrap_or((default.root_nx, default.root_ny, default.root_nz));
        let mut config = Self {
            n_tree_fixed: n_tree_fixed.unwrap_or(default.n_tree_fixed),
            quadrupole: quadrupole.unwrap_or(default.quadrupole),
            ..default
        };
        config.configure_box(root_size.unwrap_or(config.root_size), nx, ny, nz);
        config
    }

    /// Sets the root grid and derives the domain extent from it.
    pub fn configure_box(&mut self, root_size: f64, nx: usize, ny: usize, nz: usize) {
        self.root_size = root_size;
        self.root_nx = nx;
        self.root_ny = ny;
        self.root_nz = nz;
        self.box_size = [
            root_size * nx as f64,
            root_size * ny as f64,
            root_size * nz as f64,
        ];
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Number of root boxes in the grid.
    pub fn root_n(&self) -> usize {
        self.root_nx * self.root_ny * self.root_nz
    }

    /// Checks that the grid can hold a tree.
    pub fn validate(&self) -> Result<(), TreeError> {
        if self.root_nx == 0 || self.root_ny == 0 || self.root_nz == 0 {
            return Err(TreeError::InvalidConfig(
                "Number of root boxes in each dimension must be positive".to_string(),
            ));
        }
        if !self.root_size.is_finite() || self.root_size <= 0.0 {
            return Err(TreeError::InvalidConfig(format!(
                "Root box size must be positive and finite, got {}",
                self.root_size
            )));
        }
        if self.max_depth == 0 {
            return Err(TreeError::InvalidConfig("max_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}
