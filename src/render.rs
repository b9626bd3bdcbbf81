//! Headless render: replay a scroll script against the stage, writing every drawn
//! canvas frame as PNG and every engine event as a JSON line.
//!
//! Output layout:
//! - `<out>/trace.jsonl` - `{"t_ms": .., "event": "..", ...}` per drained event
//! - `<out>/canvas_<t_ms>_<index>.png` - canvas after each draw

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::RenderArgs;
use crate::core::event_bus::{BoxedEvent, EventBus, downcast_event};
use crate::core::events::{
    FrameDrawnEvent, FrameIndexChangedEvent, FrameSkippedEvent, MediaReadyEvent, MediaSeekEvent,
    PlaybackModeChangedEvent, ScrollProgressEvent,
};
use crate::core::mapping::{FrameIndex, MediaTimestamp};
use crate::core::playback::PlaybackMode;
use crate::core::scroll::ScrollProgress;
use crate::scenes::script::ScrollScript;
use crate::scenes::stage::Stage;
use crate::settings::Settings;

pub const TRACE_FILE: &str = "trace.jsonl";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum TraceRecord {
    ScrollProgress { tracker: Uuid, progress: ScrollProgress },
    FrameIndexChanged { index: FrameIndex },
    FrameDrawn { index: FrameIndex },
    FrameSkipped { index: FrameIndex },
    MediaReady { duration: f64 },
    MediaSeek { from: f64, to: MediaTimestamp },
    PlaybackMode { mode: PlaybackMode },
}

impl TraceRecord {
    fn from_event(event: &BoxedEvent) -> Option<Self> {
        if let Some(e) = downcast_event::<ScrollProgressEvent>(event) {
            return Some(Self::ScrollProgress {
                tracker: e.tracker,
                progress: e.progress,
            });
        }
        if let Some(e) = downcast_event::<FrameIndexChangedEvent>(event) {
            return Some(Self::FrameIndexChanged { index: e.index });
        }
        if let Some(e) = downcast_event::<FrameDrawnEvent>(event) {
            return Some(Self::FrameDrawn { index: e.index });
        }
        if let Some(e) = downcast_event::<FrameSkippedEvent>(event) {
            return Some(Self::FrameSkipped { index: e.index });
        }
        if let Some(e) = downcast_event::<MediaReadyEvent>(event) {
            return Some(Self::MediaReady { duration: e.duration });
        }
        if let Some(e) = downcast_event::<MediaSeekEvent>(event) {
            return Some(Self::MediaSeek { from: e.from, to: e.to });
        }
        downcast_event::<PlaybackModeChangedEvent>(event).map(|e| Self::PlaybackMode { mode: e.mode })
    }
}

#[derive(Serialize)]
struct TraceLine<'a> {
    t_ms: u64,
    #[serde(flatten)]
    record: &'a TraceRecord,
}

/// Summary of a finished render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub ticks: u64,
    pub events: usize,
    pub frames_written: usize,
    pub loop_entries: usize,
    pub final_mode: Option<PlaybackMode>,
}

struct TraceSink {
    out_dir: PathBuf,
    trace: BufWriter<File>,
    write_frames: bool,
    report: RenderReport,
}

impl TraceSink {
    fn record(&mut self, stage: &mut Stage, t_ms: u64) -> Result<()> {
        self.report.ticks += 1;
        for event in stage.take_events() {
            let Some(record) = TraceRecord::from_event(&event) else {
                continue;
            };
            serde_json::to_writer(&mut self.trace, &TraceLine { t_ms, record: &record })
                .context("Failed to serialize trace line")?;
            self.trace.write_all(b"\n").context("Failed to write trace")?;
            self.report.events += 1;

            match record {
                TraceRecord::FrameDrawn { index } if self.write_frames => self.write_canvas(stage, t_ms, index)?,
                TraceRecord::PlaybackMode {
                    mode: PlaybackMode::Looping,
                } => self.report.loop_entries += 1,
                _ => {}
            }
        }
        Ok(())
    }

    fn write_canvas(&mut self, stage: &Stage, t_ms: u64, index: FrameIndex) -> Result<()> {
        let Some(frames) = stage.frames() else {
            return Ok(());
        };
        let path = self.out_dir.join(format!("canvas_{:06}_{:03}.png", t_ms, index.get()));
        frames.canvas_surface().save_png(&path)?;
        self.report.frames_written += 1;
        Ok(())
    }
}

/// Replay `script` (or a full-page sweep) and write results to `args.out_dir`.
pub fn run_render(settings: &Settings, args: &RenderArgs, base: &Path, threads: usize) -> Result<RenderReport> {
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create output directory: {}", args.out_dir.display()))?;

    let mut stage = settings.build_stage(EventBus::new(), base);
    stage.preload(threads);
    for counts in stage.wait_decoded(Duration::from_secs(args.decode_timeout)) {
        if counts.failed > 0 || !counts.is_settled() {
            warn!(
                "Decode incomplete: {} ready, {} failed, {} still loading",
                counts.ready, counts.failed, counts.loading
            );
        }
    }

    let script = match &args.script {
        Some(path) => ScrollScript::load(path).with_context(|| format!("Failed to load script {}", path.display()))?,
        None => ScrollScript::sweep(0.0, stage.layout().max_scroll(), args.sweep_ms, 16, args.hold_ms),
    };
    info!(
        "Replaying {} script events over {}ms",
        script.events.len(),
        script.end_ms()
    );

    let trace_path = args.out_dir.join(TRACE_FILE);
    let trace = File::create(&trace_path).with_context(|| format!("Failed to create {}", trace_path.display()))?;
    let mut sink = TraceSink {
        out_dir: args.out_dir.clone(),
        trace: BufWriter::new(trace),
        write_frames: !args.no_frames,
        report: RenderReport::default(),
    };

    let start = Instant::now();
    stage.mount(start);
    sink.record(&mut stage, 0)?;

    let mut failure = None;
    script.replay(&mut stage, start, |stage, t_ms| {
        if failure.is_none()
            && let Err(e) = sink.record(stage, t_ms)
        {
            failure = Some(e);
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }

    sink.trace.flush().context("Failed to flush trace")?;
    sink.report.final_mode = stage.video().and_then(|v| v.mode());
    if let Some(frames) = stage.frames() {
        let stats = frames.cache().stats();
        debug!(
            "Frame cache: {} hits, {} misses ({:.1}% hit rate)",
            stats.hits(),
            stats.misses(),
            stats.hit_rate() * 100.0
        );
    }
    stage.unmount();

    info!(
        "Render done: {} ticks, {} events, {} frames -> {}",
        sink.report.ticks,
        sink.report.events,
        sink.report.frames_written,
        args.out_dir.display()
    );
    Ok(sink.report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::FramePattern;
    use crate::core::scroll::{RegionRect, ScrollOffset};
    use crate::scenes::stage::PageLayout;
    use image::{Rgba, RgbaImage};

    fn write_sequence(dir: &Path, n: u32) {
        std::fs::create_dir_all(dir).unwrap();
        for i in 1..=n {
            RgbaImage::from_pixel(4, 4, Rgba([i as u8, 0, 0, 255]))
                .save(dir.join(format!("{}.png", i)))
                .unwrap();
        }
    }

    fn small_settings() -> Settings {
        let mut settings = Settings::default();
        settings.frames.template = FramePattern::new("frames/{}.png");
        settings.frames.frame_count = 5;
        settings.frames.canvas_width = 4;
        settings.frames.canvas_height = 4;
        settings.frames.offset = ScrollOffset::CONTAIN;
        settings.video.template = FramePattern::new("video/{}.png");
        settings.video.frame_count = 20;
        settings.video.fps = 10.0;
        settings.video.loop_start = 1.0;
        settings.video.loop_end = 1.5;
        settings.layout = PageLayout {
            frames_region: RegionRect { top: 0.0, height: 500.0 },
            video_region: RegionRect { top: 600.0, height: 300.0 },
            viewport_height: 100.0,
        };
        settings
    }

    #[test]
    fn test_render_sweep_writes_frames_and_trace() {
        let root = std::env::temp_dir().join(format!("scrollreel-render-{}", uuid::Uuid::new_v4()));
        write_sequence(&root.join("frames"), 5);
        write_sequence(&root.join("video"), 20);

        let args = RenderArgs {
            script: None,
            out_dir: root.join("out"),
            sweep_ms: 320,
            hold_ms: 500,
            decode_timeout: 10,
            no_frames: false,
        };
        let report = run_render(&small_settings(), &args, &root, 2).unwrap();

        // Every frame of the sequence gets drawn during a full sweep
        assert_eq!(report.frames_written, 5);
        assert!(report.loop_entries >= 1);
        assert_eq!(report.final_mode, Some(PlaybackMode::Looping));

        let trace = std::fs::read_to_string(root.join("out").join(TRACE_FILE)).unwrap();
        let lines: Vec<serde_json::Value> = trace.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), report.events);
        assert!(lines.iter().any(|l| l["event"] == "media_ready"));
        assert!(lines.iter().any(|l| l["event"] == "playback_mode" && l["mode"] == "Looping"));

        std::fs::remove_dir_all(&root).ok();
    }
}
