use serde::{Deserialize, Serialize};

/// Centroid of the tracked subject in scaled-frame pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub x: f64,
    pub y: f64,
}

impl Measurement {
    pub const ORIGIN: Measurement = Measurement { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(&self, other: &Measurement) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// True when the point is closer than `margin` to any edge of a `width`×`height` frame.
    pub fn near_edge(&self, width: u32, height: u32, margin: f64) -> bool {
        self.x < margin
            || self.x > width as f64 - margin
            || self.y < margin
            || self.y > height as f64 - margin
    }
}

/// Axis-aligned rectangle enclosing a contour. Only built from a non-empty point set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingExtent {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl BoundingExtent {
    pub fn from_points(points: &[[i32; 2]]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut extent = BoundingExtent {
            min_x: first[0],
            min_y: first[1],
            max_x: first[0],
            max_y: first[1],
        };
        for &[x, y] in rest {
            extent.min_x = extent.min_x.min(x);
            extent.min_y = extent.min_y.min(y);
            extent.max_x = extent.max_x.max(x);
            extent.max_y = extent.max_y.max(y);
        }
        Some(extent)
    }

    pub fn is_valid(&self) -> bool {
        self.max_x >= self.min_x && self.max_y >= self.min_y
    }

    pub fn width(&self) -> i32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> i32 {
        self.max_y - self.min_y
    }
}

/// Closed boundary of one segmented blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<[i32; 2]>,
}

impl Contour {
    pub fn new(points: Vec<[i32; 2]>) -> Self {
        Self { points }
    }

    /// Shoelace area of the boundary polygon.
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0.0;
        for i in 0..n {
            let [x0, y0] = self.points[i];
            let [x1, y1] = self.points[(i + 1) % n];
            twice += x0 as f64 * y1 as f64 - x1 as f64 * y0 as f64;
        }
        twice / 2.0
    }

    /// Polygon centroid (first-order moments). Falls back to the point mean for
    /// degenerate polygons.
    pub fn centroid(&self) -> Option<Measurement> {
        if self.points.is_empty() {
            return None;
        }
        let area = self.signed_area();
        if area.abs() < f64::EPSILON {
            let n = self.points.len() as f64;
            let (sx, sy) = self
                .points
                .iter()
                .fold((0.0, 0.0), |(sx, sy), &[x, y]| (sx + x as f64, sy + y as f64));
            return Some(Measurement::new(sx / n, sy / n));
        }

        let n = self.points.len();
        let (mut cx, mut cy) = (0.0, 0.0);
        for i in 0..n {
            let [x0, y0] = self.points[i];
            let [x1, y1] = self.points[(i + 1) % n];
            let cross = x0 as f64 * y1 as f64 - x1 as f64 * y0 as f64;
            cx += (x0 + x1) as f64 * cross;
            cy += (y0 + y1) as f64 * cross;
        }
        Some(Measurement::new(cx / (6.0 * area), cy / (6.0 * area)))
    }

    /// `None` for boundaries that cannot form a polygon.
    pub fn extent(&self) -> Option<BoundingExtent> {
        if self.points.len() < 3 {
            return None;
        }
        BoundingExtent::from_points(&self.points).filter(BoundingExtent::is_valid)
    }
}

/// Blobs found in one frame.
pub type ContourBundle = Vec<Contour>;
