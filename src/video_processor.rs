// src/video_processor.rs
//
// Frame stream I/O for the CLI: a directory of still frames in, annotated
// PNGs and a JSON-lines offset log out. The pipeline itself never touches
// the filesystem.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use serde::Serialize;
use tracing::info;
use walkdir::WalkDir;

use crate::debug::{draw_offset_gauge, draw_search_trace};
use crate::pipeline::FrameResult;
use crate::types::{Config, TrackStatus};

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

pub struct VideoProcessor {
    config: Config,
}

impl VideoProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Image files under the input directory, sorted so that zero-padded
    /// frame numbers come out in stream order.
    pub fn find_frames(&self) -> Result<Vec<PathBuf>> {
        let input_dir = Path::new(&self.config.video.input_dir);
        if !input_dir.is_dir() {
            anyhow::bail!("Input directory {} does not exist", input_dir.display());
        }

        let mut frames: Vec<PathBuf> = WalkDir::new(input_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| is_frame_file(p))
            .collect();
        frames.sort();

        info!("Found {} frames in {}", frames.len(), input_dir.display());
        Ok(frames)
    }

    pub fn read_frame(&self, path: &Path) -> Result<RgbImage> {
        let frame = image::open(path)
            .with_context(|| format!("Failed to read frame {}", path.display()))?
            .to_rgb8();
        Ok(frame)
    }

    /// Prepare the output directory and offset log.
    pub fn create_writer(&self) -> Result<FrameWriter> {
        let output_dir = PathBuf::from(&self.config.video.output_dir);
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let log_path = output_dir.join("offsets.jsonl");
        let log = BufWriter::new(File::create(&log_path)?);
        info!("Output: {} (log {})", output_dir.display(), log_path.display());

        Ok(FrameWriter {
            output_dir,
            log,
            save_annotated: self.config.video.save_annotated,
            save_debug: self.config.video.save_debug,
            written: 0,
        })
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// One line of the offset log.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub frame_id: u64,
    pub source: String,
    pub status: TrackStatus,
    pub has_estimate: bool,
    pub offset: f64,
    pub offset_px: f64,
    pub left_x_real: f64,
    pub right_x_real: f64,
}

impl FrameRecord {
    pub fn new(source: &Path, result: &FrameResult) -> Self {
        Self {
            frame_id: result.frame_id,
            source: source.display().to_string(),
            status: result.status(),
            has_estimate: result.curve.has_estimate,
            offset: result.curve.offset,
            offset_px: result.curve.offset_px,
            left_x_real: result.curve.left_x_real,
            right_x_real: result.curve.right_x_real,
        }
    }
}

pub struct FrameWriter {
    output_dir: PathBuf,
    log: BufWriter<File>,
    save_annotated: bool,
    save_debug: bool,
    written: u64,
}

impl FrameWriter {
    pub fn write(&mut self, source: &Path, result: &FrameResult) -> Result<()> {
        let record = FrameRecord::new(source, result);
        serde_json::to_writer(&mut self.log, &record)?;
        self.log.write_all(b"\n")?;

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("frame")
            .to_string();

        if self.save_annotated {
            let annotated = draw_offset_gauge(&result.annotated, result.curve.offset_px);
            let path = self.output_dir.join(format!("{}_annotated.png", stem));
            annotated
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        if self.save_debug {
            let trace = draw_search_trace(&result.birdseye, &result.update.trace);
            let path = self.output_dir.join(format!("{}_search.png", stem));
            trace
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(mut self) -> Result<u64> {
        self.log.flush()?;
        Ok(self.written)
    }
}
