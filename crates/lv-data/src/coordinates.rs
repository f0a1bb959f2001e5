//! Pixel to world transforms attached to datasets

use std::fmt::Debug;

use ndarray::{ArrayD, IxDyn};

/// Maps pixel grids onto world coordinates
pub trait Coordinates: Send + Sync + Debug {
    /// World coordinate along `axis` for every pixel. `pixel` holds one grid
    /// per dimension, all with the same shape.
    fn pixel_to_world_axis(&self, axis: usize, pixel: &[ArrayD<f64>]) -> ArrayD<f64>;

    /// Label of the world axis
    fn world_axis_label(&self, axis: usize) -> String {
        format!("World {}", axis)
    }
}

/// World coordinates equal to pixel coordinates
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCoordinates;

impl Coordinates for IdentityCoordinates {
    fn pixel_to_world_axis(&self, axis: usize, pixel: &[ArrayD<f64>]) -> ArrayD<f64> {
        pixel[axis].clone()
    }
}

/// Independent linear transform per axis: `world = offset + scale * pixel`
#[derive(Debug, Clone)]
pub struct AffineCoordinates {
    scale: Vec<f64>,
    offset: Vec<f64>,
    labels: Vec<String>,
}

impl AffineCoordinates {
    pub fn new(scale: Vec<f64>, offset: Vec<f64>) -> Self {
        Self {
            scale,
            offset,
            labels: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

impl Coordinates for AffineCoordinates {
    fn pixel_to_world_axis(&self, axis: usize, pixel: &[ArrayD<f64>]) -> ArrayD<f64> {
        let scale = self.scale.get(axis).copied().unwrap_or(1.0);
        let offset = self.offset.get(axis).copied().unwrap_or(0.0);
        pixel[axis].mapv(|p| offset + scale * p)
    }

    fn world_axis_label(&self, axis: usize) -> String {
        self.labels
            .get(axis)
            .cloned()
            .unwrap_or_else(|| format!("World {}", axis))
    }
}

/// Index grid along `axis` for an array of `shape`
pub fn pixel_grid(shape: &[usize], axis: usize) -> ArrayD<f64> {
    ArrayD::from_shape_fn(IxDyn(shape), |idx| idx[axis] as f64)
}

/// All index grids for an array of `shape`
pub fn pixel_grids(shape: &[usize]) -> Vec<ArrayD<f64>> {
    (0..shape.len()).map(|axis| pixel_grid(shape, axis)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_grid() {
        let grid = pixel_grid(&[2, 3], 1);
        assert_eq!(grid.iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_affine_axis() {
        let coords = AffineCoordinates::new(vec![2.0, 0.5], vec![10.0, 0.0])
            .with_labels(vec!["Velocity".into()]);
        let grids = pixel_grids(&[2, 2]);

        let world = coords.pixel_to_world_axis(0, &grids);
        assert_eq!(world.iter().copied().collect::<Vec<_>>(), vec![10.0, 10.0, 12.0, 12.0]);
        assert_eq!(coords.world_axis_label(0), "Velocity");
        assert_eq!(coords.world_axis_label(1), "World 1");
    }
}
