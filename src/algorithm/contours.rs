//! Contour-based shape algorithms.
//!
//! All of them trace borders of non-zero regions in the gray-scale frame, so
//! they are normally preceded by a `Threshold` or `Canny` processor.

use anyhow::Result;
use image::RgbImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{convex_hull, min_area_rect};

use super::{as_pointf, Algorithm, AlgorithmOutput};
use crate::annotate::{draw_polyline, draw_records, Annotation};
use crate::processor::to_gray;
use crate::records::{BoxRecord, Circle, Contour, Ellipse, Point, PointF, ResultRecord, RotatedBox};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    /// Every border, outer and hole.
    #[default]
    List,
    /// Outermost borders only.
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Approximation {
    /// Every border pixel.
    #[default]
    None,
    /// Straight horizontal, vertical and diagonal runs reduced to endpoints.
    Simple,
}

fn trace(frame: &RgbImage, mode: RetrievalMode) -> Vec<Vec<Point>> {
    let gray = to_gray(frame);
    find_contours::<i32>(&gray)
        .into_iter()
        .filter(|c| match mode {
            RetrievalMode::List => true,
            RetrievalMode::External => c.border_type == BorderType::Outer && c.parent.is_none(),
        })
        .map(|c| c.points.into_iter().map(|p| Point::new(p.x, p.y)).collect())
        .collect()
}

fn to_imageproc(points: &[Point]) -> Vec<imageproc::point::Point<i32>> {
    points
        .iter()
        .map(|p| imageproc::point::Point::new(p.x, p.y))
        .collect()
}

fn min_area_box(points: &[Point]) -> Option<RotatedBox> {
    if points.is_empty() {
        return None;
    }
    let corners = min_area_rect(&to_imageproc(points)).map(|p| PointF::new(p.x as f32, p.y as f32));
    Some(RotatedBox::from_vertices(corners))
}

/// Drop every point that continues the previous step's direction.
fn compress_chain(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let n = points.len();
    let step = |a: Point, b: Point| ((b.x - a.x).signum(), (b.y - a.y).signum());
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            step(prev, points[i]) != step(points[i], next)
        })
        .map(|i| points[i])
        .collect()
}

/// Trace region borders and report each as a contour record.
#[derive(Debug, Clone)]
pub struct FindContours {
    pub mode: RetrievalMode,
    pub approximation: Approximation,
    pub annotation: Annotation,
}

impl Default for FindContours {
    fn default() -> Self {
        Self {
            mode: RetrievalMode::List,
            approximation: Approximation::None,
            annotation: Annotation::new(image::Rgb([0, 255, 0]), 1),
        }
    }
}

impl Algorithm for FindContours {
    fn name(&self) -> &'static str {
        "Find Contours"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        let records: Vec<ResultRecord> = trace(frame, self.mode)
            .into_iter()
            .map(|points| match self.approximation {
                Approximation::None => points,
                Approximation::Simple => compress_chain(&points),
            })
            .map(|points| ResultRecord::Contour(Contour::new(points)))
            .collect();

        let mut annotated = frame.clone();
        draw_records(&mut annotated, &records, self.annotation);
        Ok(AlgorithmOutput { annotated, records })
    }

    fn annotation(&self) -> Annotation {
        self.annotation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RectType {
    #[default]
    Upright,
    /// Minimum-area rectangle at any orientation.
    Rotated,
}

/// Bounding rectangles around traced contours.
#[derive(Debug, Clone)]
pub struct BoundingRectangle {
    pub rect_type: RectType,
    /// One rectangle per contour; otherwise one around all of them.
    pub foreach_contour: bool,
    pub show_contours: bool,
    pub annotation: Annotation,
}

impl Default for BoundingRectangle {
    fn default() -> Self {
        Self {
            rect_type: RectType::Upright,
            foreach_contour: true,
            show_contours: false,
            annotation: Annotation::default(),
        }
    }
}

impl BoundingRectangle {
    fn bound(&self, points: &[Point]) -> Option<ResultRecord> {
        match self.rect_type {
            RectType::Upright => BoxRecord::enclosing(points).map(ResultRecord::Box),
            RectType::Rotated => min_area_box(points).map(ResultRecord::RotatedBox),
        }
    }
}

impl Algorithm for BoundingRectangle {
    fn name(&self) -> &'static str {
        "Bounding Rectangle"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        let contours = trace(frame, RetrievalMode::External);

        let records: Vec<ResultRecord> = if self.foreach_contour {
            contours.iter().filter_map(|points| self.bound(points)).collect()
        } else {
            let all: Vec<Point> = contours.iter().flatten().copied().collect();
            self.bound(&all).into_iter().collect()
        };

        let mut annotated = frame.clone();
        if self.show_contours {
            let outline = Annotation::new(image::Rgb([0, 255, 0]), 1);
            for points in &contours {
                draw_polyline(&mut annotated, &as_pointf(points), true, outline);
            }
        }
        draw_records(&mut annotated, &records, self.annotation);
        Ok(AlgorithmOutput { annotated, records })
    }

    fn annotation(&self) -> Annotation {
        self.annotation
    }
}

/// Convex hull of each outer contour.
#[derive(Debug, Clone)]
pub struct ConvexHull {
    pub annotation: Annotation,
}

impl Default for ConvexHull {
    fn default() -> Self {
        Self {
            annotation: Annotation::new(image::Rgb([255, 255, 0]), 2),
        }
    }
}

impl Algorithm for ConvexHull {
    fn name(&self) -> &'static str {
        "Convex Hull"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        let records: Vec<ResultRecord> = trace(frame, RetrievalMode::External)
            .into_iter()
            .map(|points| {
                let hull = convex_hull(to_imageproc(&points))
                    .into_iter()
                    .map(|p| Point::new(p.x, p.y))
                    .collect();
                ResultRecord::Contour(Contour::new(hull))
            })
            .collect();

        let mut annotated = frame.clone();
        draw_records(&mut annotated, &records, self.annotation);
        Ok(AlgorithmOutput { annotated, records })
    }

    fn annotation(&self) -> Annotation {
        self.annotation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CircleType {
    /// Smallest circle containing every point.
    #[default]
    Circle,
    /// Ellipse inscribed in the minimum-area rectangle.
    Ellipse,
}

type Disc = ((f64, f64), f64);

fn disc_contains(disc: Disc, p: (f64, f64)) -> bool {
    let ((cx, cy), r) = disc;
    (p.0 - cx).hypot(p.1 - cy) <= r + 1e-7
}

fn disc_from_pair(a: (f64, f64), b: (f64, f64)) -> Disc {
    let center = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
    (center, (a.0 - b.0).hypot(a.1 - b.1) / 2.0)
}

fn disc_from_triple(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Disc {
    let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
    if d.abs() < 1e-12 {
        // Collinear: the widest pair spans all three.
        return [disc_from_pair(a, b), disc_from_pair(a, c), disc_from_pair(b, c)]
            .into_iter()
            .fold(disc_from_pair(a, b), |best, disc| if disc.1 > best.1 { disc } else { best });
    }
    let sq = |p: (f64, f64)| p.0 * p.0 + p.1 * p.1;
    let ux = (sq(a) * (b.1 - c.1) + sq(b) * (c.1 - a.1) + sq(c) * (a.1 - b.1)) / d;
    let uy = (sq(a) * (c.0 - b.0) + sq(b) * (a.0 - c.0) + sq(c) * (b.0 - a.0)) / d;
    ((ux, uy), (a.0 - ux).hypot(a.1 - uy))
}

/// Minimum enclosing circle of the convex hull, built incrementally.
fn min_enclosing_circle(points: &[Point]) -> Option<Circle> {
    let hull: Vec<(f64, f64)> = convex_hull(to_imageproc(points))
        .into_iter()
        .map(|p| (p.x as f64, p.y as f64))
        .collect();
    let mut disc = (*hull.first()?, 0.0);
    for i in 1..hull.len() {
        if disc_contains(disc, hull[i]) {
            continue;
        }
        disc = (hull[i], 0.0);
        for j in 0..i {
            if disc_contains(disc, hull[j]) {
                continue;
            }
            disc = disc_from_pair(hull[i], hull[j]);
            for k in 0..j {
                if !disc_contains(disc, hull[k]) {
                    disc = disc_from_triple(hull[i], hull[j], hull[k]);
                }
            }
        }
    }
    let ((x, y), radius) = disc;
    Some(Circle {
        center: PointF::new(x as f32, y as f32),
        radius: radius as f32,
    })
}

/// Bounding circles or ellipses around traced contours.
#[derive(Debug, Clone)]
pub struct BoundingCircle {
    pub circle_type: CircleType,
    /// One shape per contour; otherwise one around all of them.
    pub foreach_contour: bool,
    pub show_contours: bool,
    pub annotation: Annotation,
}

impl Default for BoundingCircle {
    fn default() -> Self {
        Self {
            circle_type: CircleType::Circle,
            foreach_contour: false,
            show_contours: false,
            annotation: Annotation::new(image::Rgb([255, 128, 0]), 2),
        }
    }
}

impl BoundingCircle {
    fn bound(&self, points: &[Point]) -> Option<ResultRecord> {
        match self.circle_type {
            CircleType::Circle => min_enclosing_circle(points).map(ResultRecord::Circle),
            CircleType::Ellipse => min_area_box(points).map(|rect| {
                ResultRecord::Ellipse(Ellipse {
                    center: rect.center,
                    width: rect.width,
                    height: rect.height,
                    angle: rect.angle,
                })
            }),
        }
    }
}

impl Algorithm for BoundingCircle {
    fn name(&self) -> &'static str {
        "Bounding Circle"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        let contours: Vec<Vec<Point>> = trace(frame, RetrievalMode::List)
            .iter()
            .map(|points| compress_chain(points))
            .collect();

        let records: Vec<ResultRecord> = if self.foreach_contour {
            contours.iter().filter_map(|points| self.bound(points)).collect()
        } else {
            let all: Vec<Point> = contours.iter().flatten().copied().collect();
            self.bound(&all).into_iter().collect()
        };

        let mut annotated = frame.clone();
        if self.show_contours {
            let outline = Annotation::new(image::Rgb([0, 255, 0]), 1);
            for points in &contours {
                draw_polyline(&mut annotated, &as_pointf(points), true, outline);
            }
        }
        draw_records(&mut annotated, &records, self.annotation);
        Ok(AlgorithmOutput { annotated, records })
    }

    fn annotation(&self) -> Annotation {
        self.annotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn square(side: u32) -> RgbImage {
        let mut frame = RgbImage::new(40, 40);
        for y in 10..10 + side {
            for x in 10..10 + side {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        frame
    }

    #[test]
    fn filled_square_yields_one_perimeter_contour() {
        let side = 12;
        let output = FindContours::default().process(&square(side)).unwrap();

        assert_eq!(output.records.len(), 1);
        let ResultRecord::Contour(contour) = &output.records[0] else {
            panic!("expected a contour record");
        };
        let perimeter = 4 * (side as usize - 1);
        assert_eq!(contour.count(), perimeter);
        assert!((contour.length() - perimeter as f64).abs() < 1e-9);
        assert_eq!(contour.bounding_box(), Some(BoxRecord::new(10, 10, side, side)));
    }

    #[test]
    fn simple_approximation_keeps_corners() {
        let mut algorithm = FindContours {
            approximation: Approximation::Simple,
            ..FindContours::default()
        };
        let output = algorithm.process(&square(12)).unwrap();
        let ResultRecord::Contour(contour) = &output.records[0] else {
            panic!("expected a contour record");
        };
        assert_eq!(contour.count(), 4);
    }

    #[test]
    fn external_mode_skips_holes() {
        let mut frame = square(20);
        for y in 15..25 {
            for x in 15..25 {
                frame.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let mut list = FindContours::default();
        let mut external = FindContours {
            mode: RetrievalMode::External,
            ..FindContours::default()
        };
        assert_eq!(list.process(&frame).unwrap().records.len(), 2);
        assert_eq!(external.process(&frame).unwrap().records.len(), 1);
    }

    #[test]
    fn empty_frame_has_no_contours() {
        let output = FindContours::default().process(&RgbImage::new(16, 16)).unwrap();
        assert!(output.records.is_empty());
    }

    #[test]
    fn upright_box_matches_square() {
        let output = BoundingRectangle::default().process(&square(8)).unwrap();
        assert_eq!(output.records, vec![ResultRecord::Box(BoxRecord::new(10, 10, 8, 8))]);
    }

    #[test]
    fn single_box_around_all_contours() {
        let mut frame = square(4);
        for y in 30..34 {
            for x in 30..34 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let mut algorithm = BoundingRectangle {
            foreach_contour: false,
            ..BoundingRectangle::default()
        };
        let output = algorithm.process(&frame).unwrap();
        assert_eq!(output.records, vec![ResultRecord::Box(BoxRecord::new(10, 10, 24, 24))]);
    }

    #[test]
    fn hull_of_square_spans_the_square() {
        let output = ConvexHull::default().process(&square(8)).unwrap();
        assert_eq!(output.records.len(), 1);
        let ResultRecord::Contour(hull) = &output.records[0] else {
            panic!("expected a contour record");
        };
        assert!(hull.count() >= 4 && hull.count() < 28);
        assert_eq!(hull.bounding_box(), Some(BoxRecord::new(10, 10, 8, 8)));
    }

    #[test]
    fn enclosing_circle_of_square_passes_through_corners() {
        let output = BoundingCircle::default().process(&square(9)).unwrap();
        let [ResultRecord::Circle(circle)] = output.records.as_slice() else {
            panic!("expected one circle, got {:?}", output.records);
        };
        // Border pixels run from 10 to 18 on both axes.
        assert!((circle.center.x - 14.0).abs() < 1e-4);
        assert!((circle.center.y - 14.0).abs() < 1e-4);
        assert!((circle.radius - 32f32.sqrt()).abs() < 1e-4);
        assert!(output.annotated.pixels().any(|p| *p == Rgb([255, 128, 0])));
    }

    #[test]
    fn one_circle_per_contour_or_around_all() {
        let mut frame = square(4);
        for y in 30..34 {
            for x in 30..34 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let mut each = BoundingCircle {
            foreach_contour: true,
            ..BoundingCircle::default()
        };
        assert_eq!(each.process(&frame).unwrap().records.len(), 2);

        let output = BoundingCircle::default().process(&frame).unwrap();
        let [ResultRecord::Circle(circle)] = output.records.as_slice() else {
            panic!("expected one circle");
        };
        // Farthest corners (10,10) and (33,33) form the diameter.
        assert!((circle.center.x - 21.5).abs() < 1e-4);
        assert!((circle.radius - (2.0f32 * 23.0 * 23.0).sqrt() / 2.0).abs() < 1e-3);
    }

    #[test]
    fn ellipse_fits_the_minimum_area_rectangle() {
        let mut frame = RgbImage::new(40, 40);
        for y in 10..16 {
            for x in 5..25 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let mut algorithm = BoundingCircle {
            circle_type: CircleType::Ellipse,
            ..BoundingCircle::default()
        };
        let output = algorithm.process(&frame).unwrap();
        let [ResultRecord::Ellipse(ellipse)] = output.records.as_slice() else {
            panic!("expected one ellipse");
        };
        assert!((ellipse.center.x - 14.5).abs() < 1e-4);
        assert!((ellipse.center.y - 12.5).abs() < 1e-4);
        let (long, short) = if ellipse.width > ellipse.height {
            (ellipse.width, ellipse.height)
        } else {
            (ellipse.height, ellipse.width)
        };
        assert!((long - 19.0).abs() < 1e-4);
        assert!((short - 5.0).abs() < 1e-4);
    }

    #[test]
    fn collinear_points_use_the_widest_pair() {
        let points = [Point::new(0, 0), Point::new(5, 0), Point::new(10, 0)];
        let circle = min_enclosing_circle(&points).unwrap();
        assert!((circle.center.x - 5.0).abs() < 1e-4);
        assert!((circle.radius - 5.0).abs() < 1e-4);
        assert!(min_enclosing_circle(&[]).is_none());
    }
}
