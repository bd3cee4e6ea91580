// src/main.rs

use anyhow::Result;
use lane_finder::types::Config;
use lane_finder::video_processor::VideoProcessor;
use lane_finder::{LanePipeline, TrackStatus};
use tracing::{error, info, warn};

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.filter_directive())
        .init();

    info!("🛣️  Lane finder starting");
    info!("✓ Configuration loaded from {}", config_path);

    let processor = VideoProcessor::new(config.clone());
    let frames = processor.find_frames()?;
    if frames.is_empty() {
        error!("No frames found in {}", config.video.input_dir);
        return Ok(());
    }

    let mut pipeline = LanePipeline::new(config);
    let mut writer = processor.create_writer()?;
    let mut last_status = None;

    for (idx, path) in frames.iter().enumerate() {
        let raw = match processor.read_frame(path) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                continue;
            }
        };

        let result = match pipeline.process_frame(&raw) {
            Ok(result) => result,
            Err(e) => {
                warn!("Frame {} ({}) failed: {}", idx + 1, path.display(), e);
                continue;
            }
        };

        let status = result.status();
        if last_status != Some(status) {
            info!("Frame {}: tracker {}", result.frame_id, status.as_str());
            last_status = Some(status);
        }
        if status == TrackStatus::Tracking && (idx + 1) % 30 == 0 {
            info!(
                "Frame {}/{}: offset {:+.5} ({:+.1}px)",
                idx + 1,
                frames.len(),
                result.curve.offset,
                result.curve.offset_px
            );
        }

        writer.write(path, &result)?;
    }

    let written = writer.finish()?;
    let summary = pipeline.metrics().summary();

    info!("✓ Processed {} frames, wrote {}", summary.total_frames, written);
    info!(
        "  Tracking: {}  Coasting: {}  No estimate: {}  Rejected: {}",
        summary.tracking_frames, summary.coasting_frames, summary.no_estimate_frames, summary.rejected_frames
    );
    info!("  Processing speed: {:.1} FPS", summary.fps);
    info!("  Summary: {}", serde_json::to_string(&summary)?);

    Ok(())
}
