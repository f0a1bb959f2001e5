//! Geometric regions of interest used to build selections

use std::fmt::Debug;

use ndarray::{ArrayD, Zip};

/// A region in a two-dimensional plane
pub trait Roi: Send + Sync + Debug {
    /// Whether the point lies inside the region
    fn contains(&self, x: f64, y: f64) -> bool;

    /// Whether the region has been fully specified
    fn defined(&self) -> bool {
        true
    }

    /// Element-wise containment. Both arrays must have the same shape.
    fn contains_array(&self, x: &ArrayD<f64>, y: &ArrayD<f64>) -> ArrayD<bool> {
        Zip::from(x).and(y).map_collect(|&x, &y| self.contains(x, y))
    }
}

/// Axis-aligned rectangle, bounds exclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectangularRoi {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl RectangularRoi {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self {
            xmin: xmin.min(xmax),
            xmax: xmin.max(xmax),
            ymin: ymin.min(ymax),
            ymax: ymin.max(ymax),
        }
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }
}

impl Roi for RectangularRoi {
    fn contains(&self, x: f64, y: f64) -> bool {
        x > self.xmin && x < self.xmax && y > self.ymin && y < self.ymax
    }
}

/// Circle, boundary exclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularRoi {
    pub xc: f64,
    pub yc: f64,
    pub radius: f64,
}

impl CircularRoi {
    pub fn new(xc: f64, yc: f64, radius: f64) -> Self {
        Self { xc, yc, radius }
    }
}

impl Roi for CircularRoi {
    fn contains(&self, x: f64, y: f64) -> bool {
        let dx = x - self.xc;
        let dy = y - self.yc;
        dx * dx + dy * dy < self.radius * self.radius
    }

    fn defined(&self) -> bool {
        self.radius > 0.0
    }
}

/// Closed polygon, even-odd fill rule
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonalRoi {
    vertices: Vec<(f64, f64)>,
}

impl PolygonalRoi {
    pub fn new(vertices: Vec<(f64, f64)>) -> Self {
        Self { vertices }
    }

    pub fn add_point(&mut self, x: f64, y: f64) {
        self.vertices.push((x, y));
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }
}

impl Roi for PolygonalRoi {
    fn contains(&self, x: f64, y: f64) -> bool {
        if !self.defined() {
            return false;
        }
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    fn defined(&self) -> bool {
        self.vertices.len() >= 3
    }
}

/// Band over the x axis, y unconstrained
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XRangeRoi {
    pub min: f64,
    pub max: f64,
}

impl Roi for XRangeRoi {
    fn contains(&self, x: f64, _y: f64) -> bool {
        x > self.min && x < self.max
    }
}

/// Band over the y axis, x unconstrained
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YRangeRoi {
    pub min: f64,
    pub max: f64,
}

impl Roi for YRangeRoi {
    fn contains(&self, _x: f64, y: f64) -> bool {
        y > self.min && y < self.max
    }
}
