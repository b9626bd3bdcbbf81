//! Interactive viewer: a scrollable page with the two tracked regions.
//!
//! Page units map 1:1 to egui points. The scroll area offset is the page
//! `scroll_y`; the central panel height is the viewport height. Each region keeps
//! its picture pinned to the top of the window while the region is on screen.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use eframe::egui;
use log::{debug, info};

use crate::core::event_bus::{Event, EventBus, downcast_event};
use crate::core::events::MediaReadyEvent;
use crate::core::mapping::FrameIndex;
use crate::core::media::MediaElement;
use crate::core::scroll::RegionRect;
use crate::scenes::stage::Stage;
use crate::settings::Settings;

/// Repaint interval while decoding or playing
const ACTIVE_REPAINT: Duration = Duration::from_millis(16);

/// Video panel fade-in once the media is ready
const VIDEO_FADE_IN: Duration = Duration::from_millis(500);

/// Top of a picture of `content_height` pinned inside `region` for the current scroll.
pub fn pinned_top(region: RegionRect, scroll_y: f64, content_height: f64) -> f64 {
    let max_top = (region.top + region.height - content_height).max(region.top);
    scroll_y.clamp(region.top, max_top)
}

/// Largest size with the image's aspect ratio that fits in `bounds`.
fn fit_size(image: (u32, u32), bounds: egui::Vec2) -> egui::Vec2 {
    let (w, h) = (image.0.max(1) as f32, image.1.max(1) as f32);
    let scale = (bounds.x / w).min(bounds.y / h).max(0.0);
    egui::vec2(w * scale, h * scale)
}

/// Video picture opacity: hidden until ready, then a linear fade-in.
pub fn fade_alpha(ready_at: Option<Instant>, now: Instant) -> f32 {
    let Some(ready_at) = ready_at else {
        return 0.0;
    };
    let elapsed = now.saturating_duration_since(ready_at).as_secs_f32();
    (elapsed / VIDEO_FADE_IN.as_secs_f32()).clamp(0.0, 1.0)
}

fn color_image(image: &image::RgbaImage) -> egui::ColorImage {
    let size = [image.width() as usize, image.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw())
}

/// Page placement for one paint pass
#[derive(Clone, Copy)]
struct PageView {
    origin: egui::Pos2,
    width: f32,
    scroll_y: f64,
    viewport_height: f64,
}

struct ViewerApp {
    stage: Stage,
    canvas_texture: Option<egui::TextureHandle>,
    /// Canvas draw count at last upload
    uploaded_draws: u64,
    video_texture: Option<egui::TextureHandle>,
    uploaded_video_frame: Option<FrameIndex>,
    /// When `MediaReadyEvent` arrived
    video_ready_at: Option<Instant>,
}

impl ViewerApp {
    fn new(mut stage: Stage) -> Self {
        stage.mount(Instant::now());
        Self {
            stage,
            canvas_texture: None,
            uploaded_draws: 0,
            video_texture: None,
            uploaded_video_frame: None,
            video_ready_at: None,
        }
    }

    fn upload_textures(&mut self, ctx: &egui::Context) {
        if let Some(frames) = self.stage.frames()
            && frames.draw_count() != self.uploaded_draws
        {
            let image = color_image(frames.canvas());
            match self.canvas_texture.as_mut() {
                Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                None => self.canvas_texture = Some(ctx.load_texture("canvas", image, egui::TextureOptions::LINEAR)),
            }
            self.uploaded_draws = frames.draw_count();
        }

        if let Some(video) = self.stage.video() {
            let index = video.media().current_frame();
            if self.uploaded_video_frame != Some(index)
                && let Some(asset) = video.media().current_asset()
            {
                let image = color_image(asset.image());
                match self.video_texture.as_mut() {
                    Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                    None => self.video_texture = Some(ctx.load_texture("video", image, egui::TextureOptions::LINEAR)),
                }
                self.uploaded_video_frame = Some(index);
            }
        }
    }

    fn status_text(&self) -> String {
        let mut parts = vec![format!("scroll {:.0}", self.stage.viewport().scroll_y)];
        if let Some(frames) = self.stage.frames() {
            let counts = frames.cache().counts();
            parts.push(format!(
                "frame {}/{} ({} decoded, {:.0}% hits)",
                frames.current_index(),
                frames.cache().frame_count(),
                counts.ready,
                frames.cache().stats().hit_rate() * 100.0
            ));
        }
        if let Some(video) = self.stage.video() {
            let mode = video
                .mode()
                .map(|m| format!("{:?}", m))
                .unwrap_or_else(|| "loading".to_string());
            parts.push(format!("video {} @ {:.2}s", mode, video.media().current_time()));
        }
        parts.join("  |  ")
    }

    fn needs_activity(&self) -> bool {
        let decoding = |counts: crate::core::frame_cache::CacheCounts| !counts.is_settled();
        let frames_busy = self.stage.frames().is_some_and(|f| decoding(f.cache().counts()));
        let video_busy = self
            .stage
            .video()
            .is_some_and(|v| !v.media().is_paused() || decoding(v.media().cache().counts()));
        frames_busy || video_busy
    }

    fn paint_region(
        painter: &egui::Painter,
        page: &PageView,
        region: RegionRect,
        picture: Option<(&egui::TextureHandle, (u32, u32))>,
        alpha: f32,
        label: &str,
    ) {
        let PageView {
            origin,
            width,
            scroll_y,
            viewport_height,
        } = *page;
        let rect = egui::Rect::from_min_size(
            origin + egui::vec2(0.0, region.top as f32),
            egui::vec2(width, region.height as f32),
        );
        painter.rect_filled(rect, 0.0, egui::Color32::from_gray(24));
        painter.text(
            rect.left_top() + egui::vec2(8.0, 8.0),
            egui::Align2::LEFT_TOP,
            label,
            egui::FontId::proportional(14.0),
            egui::Color32::GRAY,
        );

        let Some((texture, size)) = picture else {
            return;
        };
        if alpha <= 0.0 {
            return;
        }
        let bounds = egui::vec2(width * 0.9, (viewport_height as f32).min(region.height as f32) * 0.9);
        let shown = fit_size(size, bounds);
        let top = pinned_top(region, scroll_y, f64::from(shown.y));
        let pos = origin + egui::vec2((width - shown.x) * 0.5, top as f32);
        painter.image(
            texture.id(),
            egui::Rect::from_min_size(pos, shown),
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::from_white_alpha((alpha * 255.0).round() as u8),
        );
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.stage.pump(now);
        for event in self.stage.take_events() {
            log::trace!("Viewer event: {}", (*event).type_name());
            if downcast_event::<MediaReadyEvent>(&event).is_some() {
                self.video_ready_at = Some(now);
            }
        }
        let video_alpha = fade_alpha(self.video_ready_at, now);
        self.upload_textures(ctx);

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            ui.label(self.status_text());
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let viewport_height = f64::from(ui.available_height());
            if (viewport_height - self.stage.layout().viewport_height).abs() > 0.5 {
                self.stage.resize(viewport_height, now);
            }

            let layout = self.stage.layout();
            let scroll_y = self.stage.viewport().scroll_y;
            let canvas = self
                .stage
                .frames()
                .map(|f| f.canvas().dimensions())
                .zip(self.canvas_texture.as_ref());
            let video = self
                .stage
                .video()
                .and_then(|v| v.media().current_asset())
                .map(|a| (a.width(), a.height()))
                .zip(self.video_texture.as_ref());

            let output = egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                    let (page, _) = ui.allocate_exact_size(
                        egui::vec2(ui.available_width(), layout.page_height() as f32),
                        egui::Sense::hover(),
                    );
                    let view = PageView {
                        origin: page.min,
                        width: page.width(),
                        scroll_y,
                        viewport_height: layout.viewport_height,
                    };
                    let painter = ui.painter();
                    Self::paint_region(
                        painter,
                        &view,
                        layout.frames_region,
                        canvas.map(|(size, tex)| (tex, size)),
                        1.0,
                        "image sequence",
                    );
                    Self::paint_region(
                        painter,
                        &view,
                        layout.video_region,
                        video.map(|(size, tex)| (tex, size)),
                        video_alpha,
                        "scroll video",
                    );
                });

            self.stage.scroll_to(f64::from(output.state.offset.y), now);
        });

        if self.needs_activity() || (self.video_ready_at.is_some() && video_alpha < 1.0) {
            ctx.request_repaint_after(ACTIVE_REPAINT);
        } else if let Some(deadline) = self.stage.next_deadline() {
            ctx.request_repaint_after(deadline.saturating_duration_since(now));
        }
    }
}

impl Drop for ViewerApp {
    fn drop(&mut self) {
        debug!("Viewer closing");
        self.stage.unmount();
    }
}

/// Open the viewer window; returns when it closes.
pub fn run_viewer(settings: &Settings, base: &Path, threads: usize) -> Result<()> {
    let mut stage = settings.build_stage(EventBus::new(), base);
    stage.preload(threads);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, settings.layout.viewport_height as f32])
            .with_title(format!("scrollreel v{}", env!("CARGO_PKG_VERSION")))
            .with_resizable(true),
        ..Default::default()
    };

    info!("Starting viewer");
    eframe::run_native(
        "scrollreel",
        options,
        Box::new(move |_cc| Ok(Box::new(ViewerApp::new(stage)))),
    )
    .map_err(|e| anyhow::anyhow!("Viewer failed: {}", e))
}
