//! Result records produced by algorithms.
//!
//! Records are plain descriptive values: they are built once per frame,
//! published alongside the annotated image and replaced wholesale on the
//! next frame. Derived quantities (lengths, areas, directions) are computed
//! on demand rather than stored.

use serde::Serialize;

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Sub-pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &PointF) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<Point> for PointF {
    fn from(p: Point) -> Self {
        PointF::new(p.x as f32, p.y as f32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultRecord {
    Box(BoxRecord),
    RotatedBox(RotatedBox),
    Circle(Circle),
    Ellipse(Ellipse),
    Contour(Contour),
    Segment(Segment),
    KeyPoint(KeyPoint),
    Text(TextRecord),
}

impl ResultRecord {
    pub fn kind(&self) -> &'static str {
        match self {
            ResultRecord::Box(_) => "box",
            ResultRecord::RotatedBox(_) => "rotated_box",
            ResultRecord::Circle(_) => "circle",
            ResultRecord::Ellipse(_) => "ellipse",
            ResultRecord::Contour(_) => "contour",
            ResultRecord::Segment(_) => "segment",
            ResultRecord::KeyPoint(_) => "key_point",
            ResultRecord::Text(_) => "text",
        }
    }
}

/// Upright bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoxRecord {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoxRecord {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Smallest box containing every point, `None` for an empty set.
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self::new(
            min_x,
            min_y,
            (max_x - min_x + 1) as u32,
            (max_y - min_y + 1) as u32,
        ))
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Rotated rectangle described by its four corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotatedBox {
    pub center: PointF,
    pub width: f32,
    pub height: f32,
    /// Angle of the first edge in degrees.
    pub angle: f32,
    pub vertices: [PointF; 4],
}

impl RotatedBox {
    pub fn from_vertices(vertices: [PointF; 4]) -> Self {
        let center = PointF::new(
            vertices.iter().map(|v| v.x).sum::<f32>() / 4.0,
            vertices.iter().map(|v| v.y).sum::<f32>() / 4.0,
        );
        let width = vertices[0].distance(&vertices[1]);
        let height = vertices[1].distance(&vertices[2]);
        let angle = (vertices[1].y - vertices[0].y)
            .atan2(vertices[1].x - vertices[0].x)
            .to_degrees();
        Self {
            center,
            width,
            height,
            angle,
            vertices,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Circle {
    pub center: PointF,
    pub radius: f32,
}

impl Circle {
    pub fn area(&self) -> f64 {
        std::f64::consts::PI * (self.radius as f64).powi(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ellipse {
    pub center: PointF,
    pub width: f32,
    pub height: f32,
    pub angle: f32,
}

/// Closed border traced around a connected region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn count(&self) -> usize {
        self.points.len()
    }

    pub fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Perimeter of the closed polyline through all points.
    pub fn length(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let closing = [self.points[self.points.len() - 1], self.points[0]];
        self.points
            .windows(2)
            .chain(std::iter::once(&closing[..]))
            .map(|pair| {
                let dx = (pair[1].x - pair[0].x) as f64;
                let dy = (pair[1].y - pair[0].y) as f64;
                (dx * dx + dy * dy).sqrt()
            })
            .sum()
    }

    pub fn bounding_box(&self) -> Option<BoxRecord> {
        BoxRecord::enclosing(&self.points)
    }
}

/// Line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    pub p1: PointF,
    pub p2: PointF,
}

impl Segment {
    pub fn length(&self) -> f32 {
        self.p1.distance(&self.p2)
    }

    /// Unit direction from `p1` to `p2`; zero for a degenerate segment.
    pub fn direction(&self) -> PointF {
        let length = self.length();
        if length == 0.0 {
            return PointF::new(0.0, 0.0);
        }
        PointF::new((self.p2.x - self.p1.x) / length, (self.p2.y - self.p1.y) / length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub angle: f32,
    pub response: f32,
    pub octave: i32,
    pub class_id: i32,
}

/// Recognized text, optionally located in the frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRecord {
    pub text: String,
    pub region: Option<BoxRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contour_length_closes_the_loop() {
        let square = Contour::new(vec![
            Point::new(0, 0),
            Point::new(3, 0),
            Point::new(3, 3),
            Point::new(0, 3),
        ]);
        assert_eq!(square.count(), 4);
        assert!((square.length() - 12.0).abs() < 1e-9);
        assert_eq!(square.start(), Some(Point::new(0, 0)));
        assert_eq!(square.end(), Some(Point::new(0, 3)));
        assert_eq!(square.bounding_box(), Some(BoxRecord::new(0, 0, 4, 4)));
    }

    #[test]
    fn empty_contour_has_no_extent() {
        let empty = Contour::new(Vec::new());
        assert_eq!(empty.length(), 0.0);
        assert_eq!(empty.start(), None);
        assert_eq!(empty.bounding_box(), None);
    }

    #[test]
    fn segment_direction_is_normalized() {
        let segment = Segment {
            p1: PointF::new(1.0, 1.0),
            p2: PointF::new(4.0, 5.0),
        };
        assert!((segment.length() - 5.0).abs() < 1e-6);
        let dir = segment.direction();
        assert!((dir.x - 0.6).abs() < 1e-6);
        assert!((dir.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn rotated_box_from_axis_aligned_corners() {
        let rotated = RotatedBox::from_vertices([
            PointF::new(0.0, 0.0),
            PointF::new(4.0, 0.0),
            PointF::new(4.0, 2.0),
            PointF::new(0.0, 2.0),
        ]);
        assert_eq!(rotated.center, PointF::new(2.0, 1.0));
        assert_eq!(rotated.width, 4.0);
        assert_eq!(rotated.height, 2.0);
        assert_eq!(rotated.angle, 0.0);
    }

    #[test]
    fn records_serialize_with_kind_tag() {
        let record = ResultRecord::Box(BoxRecord::new(1, 2, 3, 4));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["kind"], "box");
        assert_eq!(json["width"], 3);
        assert_eq!(record.kind(), "box");
    }
}
