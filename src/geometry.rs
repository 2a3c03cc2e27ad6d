//! Positions and deployment-volume helpers.
//!
//! The simulation space is a right-handed box: `x`/`y` span the surface
//! plane and `depth` grows downward from the surface. Distances are plain
//! 3-D Euclidean; world units are meters, matching the channel models.

use crate::sim::rng::SimRng;

/// A point in the deployment volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub depth: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, depth: f64) -> Self {
        Self { x, y, depth }
    }

    /// Euclidean distance to `other`, in meters.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.depth - other.depth;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Scatter node positions over a boxed deployment volume.
///
/// The volume is cut into `num_clusters`^3 equal cubic sectors. Each cluster
/// claims one distinct sector chosen at random and receives
/// `nodes_per_cluster` positions uniform within it. Sinks float on the
/// surface (depth 0) inside the first sector's footprint.
///
/// Placement is scenario tooling: the protocol core never calls this.
pub fn scatter_nodes(
    x_max: f64,
    y_max: f64,
    depth_max: f64,
    num_clusters: usize,
    nodes_per_cluster: usize,
    num_sinks: usize,
    rng: &SimRng,
) -> Vec<Position> {
    let x_size = x_max / num_clusters as f64;
    let y_size = y_max / num_clusters as f64;
    let d_size = depth_max / num_clusters as f64;
    let mut sectors: Vec<usize> = (0..num_clusters * num_clusters * num_clusters).collect();

    let mut nodes = Vec::with_capacity(num_sinks + num_clusters * nodes_per_cluster);
    for _ in 0..num_sinks {
        let nx = rng.next_f64() * x_size;
        let ny = rng.next_f64() * y_size;
        nodes.push(Position::new(nx, ny, 0.0));
    }

    for _ in 0..num_clusters {
        let index = rng.next_usize(sectors.len());
        let sector = sectors.swap_remove(index);
        let d = sector / (num_clusters * num_clusters);
        let yx = sector % (num_clusters * num_clusters);
        let y = yx / num_clusters;
        let x = yx % num_clusters;

        let x0 = x as f64 * x_size;
        let y0 = y as f64 * y_size;
        let d0 = d as f64 * d_size;

        for _ in 0..nodes_per_cluster {
            let nx = x0 + rng.next_f64() * x_size;
            let ny = y0 + rng.next_f64() * y_size;
            let nd = d0 + rng.next_f64() * d_size;
            nodes.push(Position::new(nx, ny, nd));
        }
    }

    nodes
}
