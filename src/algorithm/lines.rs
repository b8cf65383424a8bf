use anyhow::Result;
use image::{Rgb, RgbImage};
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};

use super::{Algorithm, AlgorithmOutput};
use crate::annotate::{draw_records, Annotation};
use crate::processor::to_gray;
use crate::records::{PointF, ResultRecord, Segment};

/// Straight lines through non-zero pixels, reported as frame-spanning
/// segments. Usually run after `Canny`.
#[derive(Debug, Clone)]
pub struct HoughLines {
    vote_threshold: u32,
    suppression_radius: u32,
    pub annotation: Annotation,
}

impl Default for HoughLines {
    fn default() -> Self {
        Self {
            vote_threshold: 80,
            suppression_radius: 8,
            annotation: Annotation::new(Rgb([255, 0, 255]), 1),
        }
    }
}

impl HoughLines {
    pub fn vote_threshold(&self) -> u32 {
        self.vote_threshold
    }

    pub fn set_vote_threshold(&mut self, votes: u32) {
        self.vote_threshold = votes.max(1);
    }

    pub fn suppression_radius(&self) -> u32 {
        self.suppression_radius
    }

    pub fn set_suppression_radius(&mut self, radius: u32) {
        self.suppression_radius = radius.min(180);
    }
}

/// Clip `x cos(t) + y sin(t) = r` to the frame rectangle.
fn clip_polar_line(line: &PolarLine, width: u32, height: u32) -> Option<Segment> {
    let (sin, cos) = (line.angle_in_degrees as f32).to_radians().sin_cos();
    let (max_x, max_y) = ((width - 1) as f32, (height - 1) as f32);
    let r = line.r;
    let eps = 1e-4;

    let mut hits: Vec<PointF> = Vec::with_capacity(4);
    let mut push = |p: PointF| {
        let inside = p.x >= -eps && p.x <= max_x + eps && p.y >= -eps && p.y <= max_y + eps;
        if inside && !hits.iter().any(|h| h.distance(&p) < 0.5) {
            hits.push(p);
        }
    };

    if sin.abs() > eps {
        push(PointF::new(0.0, r / sin));
        push(PointF::new(max_x, (r - max_x * cos) / sin));
    }
    if cos.abs() > eps {
        push(PointF::new(r / cos, 0.0));
        push(PointF::new((r - max_y * sin) / cos, max_y));
    }

    match hits.as_slice() {
        [p1, p2, ..] => Some(Segment { p1: *p1, p2: *p2 }),
        _ => None,
    }
}

impl Algorithm for HoughLines {
    fn name(&self) -> &'static str {
        "Hough Lines"
    }

    fn process(&mut self, frame: &RgbImage) -> Result<AlgorithmOutput> {
        let options = LineDetectionOptions {
            vote_threshold: self.vote_threshold,
            suppression_radius: self.suppression_radius,
        };
        let (width, height) = frame.dimensions();
        let records: Vec<ResultRecord> = detect_lines(&to_gray(frame), options)
            .iter()
            .filter_map(|line| clip_polar_line(line, width, height))
            .map(ResultRecord::Segment)
            .collect();
        tracing::debug!("Hough: {} lines", records.len());

        let mut annotated = frame.clone();
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

    #[test]
    fn horizontal_line_spans_the_frame() {
        let mut frame = RgbImage::new(64, 48);
        for x in 0..64 {
            frame.put_pixel(x, 20, Rgb([255, 255, 255]));
        }
        let mut hough = HoughLines::default();
        hough.set_vote_threshold(40);

        let output = hough.process(&frame).unwrap();
        assert!(!output.records.is_empty());
        let ResultRecord::Segment(segment) = &output.records[0] else {
            panic!("expected a segment");
        };
        assert!((segment.p1.y - 20.0).abs() <= 1.5);
        assert!((segment.p2.y - 20.0).abs() <= 1.5);
        assert!(segment.length() > 60.0);
    }

    #[test]
    fn blank_frame_has_no_lines() {
        let output = HoughLines::default().process(&RgbImage::new(32, 32)).unwrap();
        assert!(output.records.is_empty());
    }

    #[test]
    fn vertical_polar_line_is_clipped() {
        let line = PolarLine {
            r: 10.0,
            angle_in_degrees: 0,
        };
        let segment = clip_polar_line(&line, 50, 30).unwrap();
        assert!((segment.p1.x - 10.0).abs() < 1e-3);
        assert!((segment.p2.x - 10.0).abs() < 1e-3);
        assert!((segment.length() - 29.0).abs() < 1e-3);
    }
}
