use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::{FrameUpdate, PresentationSink};
use crate::records::ResultRecord;

#[derive(Serialize)]
struct RecordLine<'a> {
    frame: u64,
    width: u32,
    height: u32,
    elapsed_ms: f64,
    records: &'a [ResultRecord],
}

/// Appends one JSON line of result records per successful frame.
/// Diagnostic frames carry no records and are skipped.
pub struct RecordsSink {
    writer: BufWriter<File>,
}

impl RecordsSink {
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open records file {}", path.display()))?;
        tracing::info!("Writing result records to {}", path.display());
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl PresentationSink for RecordsSink {
    fn present(&mut self, update: &FrameUpdate) -> Result<()> {
        let Some(records) = &update.records else {
            return Ok(());
        };
        let line = RecordLine {
            frame: update.status.frame_index,
            width: update.status.width,
            height: update.status.height,
            elapsed_ms: update.status.elapsed.as_secs_f64() * 1000.0,
            records: &records[..],
        };
        serde_json::to_writer(&mut self.writer, &line).context("Failed to encode records")?;
        self.writer.write_all(b"\n")?;
        self.writer.flush().context("Failed to write records")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FrameStatus;
    use crate::records::BoxRecord;
    use image::RgbImage;
    use std::sync::Arc;

    fn update(frame_index: u64, records: Option<Vec<ResultRecord>>) -> FrameUpdate {
        FrameUpdate {
            annotated: Arc::new(RgbImage::new(4, 3)),
            records: records.map(Arc::from),
            status: FrameStatus {
                width: 4,
                height: 3,
                frame_index,
                ..FrameStatus::default()
            },
        }
    }

    #[test]
    fn writes_one_line_per_successful_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let mut sink = RecordsSink::create(&path).unwrap();

        sink.present(&update(1, Some(vec![ResultRecord::Box(BoxRecord::new(0, 0, 2, 2))])))
            .unwrap();
        sink.present(&update(2, None)).unwrap();
        sink.present(&update(3, Some(Vec::new()))).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["frame"], 1);
        assert_eq!(lines[0]["records"][0]["kind"], "box");
        assert_eq!(lines[1]["frame"], 3);
        assert_eq!(lines[1]["records"].as_array().unwrap().len(), 0);
    }
}
