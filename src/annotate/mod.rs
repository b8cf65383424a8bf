//! Overlay drawing for result records and diagnostic frames.

mod diagnostic;
pub mod glyphs;

pub use diagnostic::{diagnostic_frame, DIAGNOSTIC_HEIGHT, DIAGNOSTIC_WIDTH};

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};

use crate::records::{BoxRecord, Contour, Ellipse, KeyPoint, PointF, ResultRecord};

/// Color and line thickness an algorithm draws its overlays with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotation {
    pub color: Rgb<u8>,
    pub thickness: u32,
}

impl Default for Annotation {
    fn default() -> Self {
        Self {
            color: Rgb([255, 0, 0]),
            thickness: 2,
        }
    }
}

impl Annotation {
    pub fn new(color: Rgb<u8>, thickness: u32) -> Self {
        Self {
            color,
            thickness: thickness.clamp(1, 20),
        }
    }
}

/// Draw every record onto `image`.
pub fn draw_records(image: &mut RgbImage, records: &[ResultRecord], style: Annotation) {
    for record in records {
        draw_record(image, record, style);
    }
}

pub fn draw_record(image: &mut RgbImage, record: &ResultRecord, style: Annotation) {
    match record {
        ResultRecord::Box(b) => draw_box(image, b, style),
        ResultRecord::RotatedBox(r) => draw_polyline(image, &r.vertices, true, style),
        ResultRecord::Circle(c) => draw_circle(image, c.center, c.radius, style),
        ResultRecord::Ellipse(e) => draw_ellipse(image, e, style),
        ResultRecord::Contour(c) => draw_contour(image, c, style),
        ResultRecord::Segment(s) => draw_line(image, s.p1, s.p2, style),
        ResultRecord::KeyPoint(k) => draw_keypoint(image, k, style),
        ResultRecord::Text(t) => {
            let (x, y) = t.region.map(|r| (r.x, r.y)).unwrap_or((4, 4));
            if let Some(region) = &t.region {
                draw_box(image, region, style);
            }
            glyphs::draw_text_line(image, x, y - glyphs::line_height(2) as i32, &t.text, style.color, 2);
        }
    }
}

/// Draw a line of `style.thickness` pixels by stacking parallel segments
/// along the normal.
pub fn draw_line(image: &mut RgbImage, p1: PointF, p2: PointF, style: Annotation) {
    let (dx, dy) = (p2.x - p1.x, p2.y - p1.y);
    let length = (dx * dx + dy * dy).sqrt();
    let (nx, ny) = if length > 0.0 {
        (-dy / length, dx / length)
    } else {
        (0.0, 0.0)
    };

    let half = (style.thickness as f32 - 1.0) / 2.0;
    for step in 0..style.thickness {
        let offset = step as f32 - half;
        draw_line_segment_mut(
            image,
            (p1.x + nx * offset, p1.y + ny * offset),
            (p2.x + nx * offset, p2.y + ny * offset),
            style.color,
        );
    }
}

pub fn draw_polyline(image: &mut RgbImage, points: &[PointF], closed: bool, style: Annotation) {
    for pair in points.windows(2) {
        draw_line(image, pair[0], pair[1], style);
    }
    if closed && points.len() > 2 {
        draw_line(image, points[points.len() - 1], points[0], style);
    }
}

pub fn draw_box(image: &mut RgbImage, b: &BoxRecord, style: Annotation) {
    let (left, top) = (b.x as f32, b.y as f32);
    let right = (b.right() - 1) as f32;
    let bottom = (b.bottom() - 1) as f32;
    let corners = [
        PointF::new(left, top),
        PointF::new(right, top),
        PointF::new(right, bottom),
        PointF::new(left, bottom),
    ];
    draw_polyline(image, &corners, true, style);
}

pub fn draw_circle(image: &mut RgbImage, center: PointF, radius: f32, style: Annotation) {
    let center = (center.x.round() as i32, center.y.round() as i32);
    let radius = radius.round() as i32;
    let half = style.thickness as i32 / 2;
    for r in (radius - half).max(0)..=(radius + half) {
        draw_hollow_circle_mut(image, center, r, style.color);
    }
}

fn draw_ellipse(image: &mut RgbImage, e: &Ellipse, style: Annotation) {
    const STEPS: usize = 48;
    let (sin, cos) = e.angle.to_radians().sin_cos();
    let (a, b) = (e.width / 2.0, e.height / 2.0);
    let points: Vec<PointF> = (0..STEPS)
        .map(|i| {
            let t = i as f32 / STEPS as f32 * std::f32::consts::TAU;
            let (x, y) = (a * t.cos(), b * t.sin());
            PointF::new(e.center.x + x * cos - y * sin, e.center.y + x * sin + y * cos)
        })
        .collect();
    draw_polyline(image, &points, true, style);
}

fn draw_contour(image: &mut RgbImage, contour: &Contour, style: Annotation) {
    let points: Vec<PointF> = contour.points.iter().map(|&p| p.into()).collect();
    if points.len() == 1 {
        image_put(image, contour.points[0].x, contour.points[0].y, style.color);
        return;
    }
    draw_polyline(image, &points, true, style);
}

fn draw_keypoint(image: &mut RgbImage, k: &KeyPoint, style: Annotation) {
    let radius = (k.size / 2.0).max(2.0);
    let center = PointF::new(k.x, k.y);
    draw_circle(image, center, radius, Annotation::new(style.color, 1));
    if k.angle >= 0.0 {
        let (sin, cos) = k.angle.to_radians().sin_cos();
        let tip = PointF::new(k.x + radius * cos, k.y + radius * sin);
        draw_line(image, center, tip, Annotation::new(style.color, 1));
    }
}

fn image_put(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}
