mod audio;
mod config;
mod disc;
mod drag;
mod logging;
mod playback;
mod theme;
mod tracks;
mod vinyl;

use crate::{
    audio::{AudioBackend, RodioBackend},
    config::Config,
    disc::{DiscPresentation, RotationState},
    drag::{DragController, GestureOutcome, MoveOutcome, WidgetAnchor},
    playback::PlaybackController,
    theme::{paint_backdrop, BACKDROP_BOTTOM, BACKDROP_TOP, DARK_INK, PANEL_DIVIDER, PANEL_FILL},
    tracks::TrackRegistry,
    vinyl::{load_label_image, render_disc, DiscTextureOptions},
};
use anyhow::Context as _;
use eframe::egui::{
    self, pos2, vec2, Align2, Color32, ColorImage, CursorIcon, FontId, Id, Pos2, Rect, RichText,
    Sense, TextureHandle, TextureOptions, UiBuilder, Vec2, ViewportBuilder,
};
use std::time::Duration;

const MENU_GAP: f32 = 10.0;
const MENU_PADDING: f32 = 15.0;
const DISC_HINT: &str = "Kéo tôi đi! / Nhấn để mở menu";

/// Pointer activity of one frame, read once from egui's input state.
#[derive(Debug, Clone, Copy, Default)]
struct PointerFrame {
    /// Any button went down; only used for the autoplay unlock.
    pressed: bool,
    primary_pressed: bool,
    press_pos: Option<Pos2>,
    latest: Option<Pos2>,
    moved: bool,
    released: bool,
    down: bool,
    cancelled: bool,
    time: f64,
    dt: f32,
}

impl PointerFrame {
    fn read(ctx: &egui::Context) -> Self {
        ctx.input(|i| {
            let mut moved = false;
            let mut cancelled = false;
            for event in &i.events {
                match event {
                    egui::Event::PointerMoved(_) => moved = true,
                    egui::Event::PointerGone | egui::Event::WindowFocused(false) => {
                        cancelled = true
                    }
                    _ => {}
                }
            }
            Self {
                pressed: i.pointer.any_pressed(),
                primary_pressed: i.pointer.primary_pressed(),
                press_pos: i.pointer.press_origin().or(i.pointer.interact_pos()),
                latest: i.pointer.latest_pos(),
                moved,
                released: i.pointer.primary_released(),
                down: i.pointer.primary_down(),
                cancelled,
                time: i.time,
                dt: i.stable_dt,
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MenuAction {
    Close,
    SelectTrack(usize),
    TogglePlayback,
    Volume(f32),
    Seek(f64),
}

fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0).floor() as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

fn play_pause_glyph(is_playing: bool) -> &'static str {
    if is_playing {
        "⏸"
    } else {
        "▶"
    }
}

struct App<B = RodioBackend> {
    config: Config,
    player: PlaybackController<B>,
    disc: DiscPresentation,
    drag: DragController,
    label_image: Option<ColorImage>,
    disc_texture: Option<TextureHandle>,
    disc_texture_ppp: f32,
    viewport_size: Vec2,
    widget_size: Vec2,
    disc_rect: Option<Rect>,
    menu_rect: Option<Rect>,
    disc_hovered: bool,
    seek_preview: Option<f64>,
}

impl App<RodioBackend> {
    fn new(cc: &eframe::CreationContext<'_>, config: Config, backend: RodioBackend) -> Self {
        theme::apply_style(&cc.egui_ctx, config.disc.accent);

        let label_image = config
            .disc
            .label_image
            .as_deref()
            .and_then(|path| match load_label_image(path) {
                Ok(image) => Some(image),
                Err(err) => {
                    tracing::warn!("disc label unavailable: {err:#}");
                    None
                }
            });

        Self::with_backend(config, backend, label_image)
    }
}

impl<B: AudioBackend> App<B> {
    fn with_backend(config: Config, backend: B, label_image: Option<ColorImage>) -> Self {
        let registry = TrackRegistry::new(config.player.tracks.clone());
        tracing::debug!(tracks = registry.len(), "playlist ready");
        let player = PlaybackController::initialize(
            backend,
            registry,
            config.player.theme_override(),
            config.player.volume,
        );
        let disc = DiscPresentation::new(
            config.animation.spin_period_secs,
            config.animation.pop_secs,
        );
        let widget = &config.widget;
        let drag = DragController::new(
            WidgetAnchor::BottomLeft {
                left: widget.start_left,
                bottom: widget.start_bottom,
            },
            widget.drag_threshold,
            widget.edge_inset,
        );
        let disc_size = widget.disc_size;

        Self {
            config,
            player,
            disc,
            drag,
            label_image,
            disc_texture: None,
            disc_texture_ppp: 0.0,
            viewport_size: vec2(1024.0, 720.0),
            widget_size: Vec2::splat(disc_size),
            disc_rect: None,
            menu_rect: None,
            disc_hovered: false,
            seek_preview: None,
        }
    }

    fn widget_origin(&self) -> Pos2 {
        self.drag.anchor().origin(self.viewport_size, self.widget_size)
    }

    /// Routes one frame of pointer input through the unlock, the drag
    /// controller and tap detection. Hit-testing uses last frame's geometry.
    fn handle_pointer(&mut self, pointer: PointerFrame) {
        if pointer.pressed {
            let over_menu = matches!(
                (pointer.press_pos, self.menu_rect),
                (Some(pos), Some(rect)) if rect.contains(pos)
            );
            if !over_menu {
                self.player.on_user_interaction();
            }
        }

        if pointer.cancelled && self.drag.is_active() {
            self.drag
                .on_gesture_cancel(self.viewport_size, self.widget_size);
            return;
        }

        if pointer.primary_pressed {
            if let (Some(pos), Some(rect)) = (pointer.press_pos, self.disc_rect) {
                if rect.contains(pos) {
                    let origin = self.widget_origin();
                    self.drag.on_gesture_start(pos, origin);
                }
            }
        }

        if !self.drag.is_active() {
            return;
        }

        if pointer.moved {
            if let Some(pos) = pointer.latest {
                if self.drag.on_gesture_move(pos) == Some(MoveOutcome::Dragging) {
                    self.disc.force_collapse();
                }
            }
        }

        if pointer.released || !pointer.down {
            let outcome = self
                .drag
                .on_gesture_end(self.viewport_size, self.widget_size);
            if outcome == Some(GestureOutcome::Tap) {
                self.disc.tap(pointer.time);
            }
        }
    }

    fn apply_menu_action(&mut self, action: MenuAction, now: f64) {
        match action {
            MenuAction::Close => self.disc.close(now),
            MenuAction::SelectTrack(index) => self.player.select_track(index),
            MenuAction::TogglePlayback => self.player.toggle_play_pause(),
            MenuAction::Volume(volume) => self.player.set_volume(volume),
            MenuAction::Seek(position) => self.player.seek(position),
        }
    }

    fn desired_repaint_interval(&self, now: f64) -> Duration {
        let is_playing = self.player.state().is_playing;
        match self.disc.rotation_state(now, is_playing) {
            RotationState::Popping | RotationState::Spinning => Duration::from_millis(16),
            RotationState::Frozen if self.drag.is_active() => Duration::from_millis(16),
            RotationState::Frozen => Duration::from_millis(250),
        }
    }

    fn ensure_disc_texture(&mut self, ctx: &egui::Context) {
        let ppp = ctx.pixels_per_point();
        if self.disc_texture.is_some() && (self.disc_texture_ppp - ppp).abs() < f32::EPSILON {
            return;
        }
        let options =
            DiscTextureOptions::from_config(&self.config.disc, self.config.widget.disc_size, ppp);
        let image = render_disc(self.label_image.as_ref(), &options);
        self.disc_texture = Some(ctx.load_texture("music_disc.disc", image, TextureOptions::LINEAR));
        self.disc_texture_ppp = ppp;
    }

    fn paint_backdrop(&self, ctx: &egui::Context) {
        let mut panel_frame = egui::Frame::central_panel(&ctx.style());
        panel_frame.fill = Color32::TRANSPARENT;

        egui::CentralPanel::default()
            .frame(panel_frame)
            .show(ctx, |ui| {
                let rect = ui.ctx().screen_rect();
                paint_backdrop(ui.painter(), rect, BACKDROP_TOP, BACKDROP_BOTTOM);
                ui.painter().text(
                    rect.center(),
                    Align2::CENTER_CENTER,
                    "Phú Quốc",
                    FontId::proportional(42.0),
                    Color32::from_white_alpha(60),
                );
            });
    }

    /// Lays out disc and menu from the current state and collects the menu's
    /// actions; they are applied once rendering is done.
    fn render_widget(&mut self, ctx: &egui::Context, now: f64) -> Vec<MenuAction> {
        let widget = self.config.widget.clone();
        let menu_width = ctx.animate_value_with_time(
            Id::new("music_disc.menu_width"),
            self.disc.menu_width(widget.menu_width),
            self.config.animation.menu_transition_secs,
        );
        let progress = if widget.menu_width > 0.0 {
            (menu_width / widget.menu_width).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let disc_size = widget.disc_size;
        let full_height = widget.menu_height.max(disc_size);
        let size = vec2(
            disc_size + progress * (MENU_GAP + widget.menu_width),
            disc_size + progress * (full_height - disc_size),
        );
        self.widget_size = size;
        let origin = self.widget_origin();
        let box_rect = Rect::from_min_size(origin, size);

        let disc_rect = Rect::from_min_size(
            pos2(origin.x, origin.y + (size.y - disc_size) / 2.0),
            Vec2::splat(disc_size),
        );
        self.disc_rect = Some(disc_rect);

        let mut actions = Vec::new();

        egui::Area::new(Id::new("music_disc.widget"))
            .order(egui::Order::Foreground)
            .fixed_pos(origin)
            .movable(false)
            .constrain(false)
            .show(ctx, |ui| {
                ui.allocate_rect(box_rect, Sense::hover());

                let response = ui.interact(disc_rect, Id::new("music_disc.disc"), Sense::click_and_drag());
                self.disc_hovered = response.hovered();
                if !self.drag.is_active() {
                    response.on_hover_text(DISC_HINT);
                }
                self.paint_disc(ui, disc_rect, now);

                if menu_width > 1.0 {
                    let menu_rect = Rect::from_min_max(
                        pos2(disc_rect.right() + MENU_GAP * progress, box_rect.top()),
                        pos2(disc_rect.right() + MENU_GAP * progress + menu_width, box_rect.bottom()),
                    );
                    self.menu_rect = Some(menu_rect);
                    self.render_menu(ui, menu_rect, &mut actions);
                } else {
                    self.menu_rect = None;
                }
            });

        actions
    }

    fn paint_disc(&self, ui: &egui::Ui, rect: Rect, now: f64) {
        let pose = self.disc.pose(now);
        let radius = rect.width() / 2.0 * pose.scale;
        let painter = ui.painter();
        painter.circle_filled(
            rect.center() + vec2(0.0, 4.0),
            radius,
            Color32::from_black_alpha(100),
        );

        let Some(texture) = self.disc_texture.as_ref() else {
            painter.circle_filled(rect.center(), radius, DARK_INK);
            return;
        };

        let half = Vec2::splat(radius);
        let center = rect.center();
        let (sin_r, cos_r) = pose.angle.sin_cos();
        let offsets = [
            vec2(-half.x, -half.y),
            vec2(half.x, -half.y),
            vec2(half.x, half.y),
            vec2(-half.x, half.y),
        ];
        let uvs = [
            pos2(0.0, 0.0),
            pos2(1.0, 0.0),
            pos2(1.0, 1.0),
            pos2(0.0, 1.0),
        ];

        let mut mesh = egui::Mesh::with_texture(texture.id());
        for (offset, uv) in offsets.into_iter().zip(uvs) {
            let rotated = vec2(
                offset.x * cos_r - offset.y * sin_r,
                offset.x * sin_r + offset.y * cos_r,
            );
            mesh.vertices.push(egui::epaint::Vertex {
                pos: center + rotated,
                uv,
                color: Color32::WHITE,
            });
        }
        mesh.indices.extend_from_slice(&[0, 1, 2, 0, 2, 3]);
        painter.add(egui::Shape::mesh(mesh));
    }

    fn render_menu(&mut self, ui: &mut egui::Ui, menu_rect: Rect, actions: &mut Vec<MenuAction>) {
        let accent = self.config.disc.accent;
        ui.painter().rect_filled(menu_rect, 20.0, PANEL_FILL);

        let content_width = self.config.widget.menu_width - 2.0 * MENU_PADDING;
        let content_rect = Rect::from_min_size(
            menu_rect.min + Vec2::splat(MENU_PADDING),
            vec2(content_width, (menu_rect.height() - 2.0 * MENU_PADDING).max(0.0)),
        );
        let mut content = ui.new_child(
            UiBuilder::new()
                .max_rect(content_rect)
                .layout(egui::Layout::top_down(egui::Align::Min)),
        );
        content.set_clip_rect(menu_rect.shrink(2.0));
        content.spacing_mut().item_spacing.y = 6.0;

        content.horizontal(|row| {
            row.label(
                RichText::new("MUSIC PLAYER")
                    .size(12.0)
                    .strong()
                    .color(accent),
            );
            row.with_layout(egui::Layout::right_to_left(egui::Align::Center), |right| {
                let close = right.add(
                    egui::Button::new(RichText::new("✖").size(13.0).color(Color32::WHITE))
                        .frame(false),
                );
                if close.clicked() {
                    actions.push(MenuAction::Close);
                }
            });
        });
        let divider_y = content.cursor().top();
        content.painter().hline(
            content_rect.x_range(),
            divider_y,
            egui::Stroke::new(1.0, PANEL_DIVIDER),
        );
        content.add_space(4.0);

        let highlighted = self.player.highlighted();
        for (index, track) in self.player.tracks().iter().enumerate() {
            let playing_row = highlighted == Some(index);
            let mut text = RichText::new(format!("🎵  {}", track.display_name)).size(13.0);
            text = if playing_row {
                text.color(accent).strong()
            } else {
                text.color(Color32::from_white_alpha(204))
            };
            let row = content.add(
                egui::Label::new(text)
                    .sense(Sense::click())
                    .selectable(false)
                    .truncate(),
            );
            if row.hovered() {
                content.ctx().set_cursor_icon(CursorIcon::PointingHand);
            }
            if row.clicked() {
                actions.push(MenuAction::SelectTrack(index));
            }
        }

        self.render_timeline(&mut content, content_width, actions);

        let state = self.player.state();
        content.horizontal(|row| {
            row.spacing_mut().item_spacing.x = 10.0;
            let toggle = row.add(
                egui::Button::new(
                    RichText::new(play_pause_glyph(state.is_playing))
                        .size(11.0)
                        .color(DARK_INK),
                )
                .fill(accent)
                .corner_radius(15.0)
                .min_size(vec2(30.0, 30.0)),
            );
            if toggle.clicked() {
                actions.push(MenuAction::TogglePlayback);
            }

            let mut volume = state.volume;
            row.spacing_mut().slider_width = 80.0;
            let slider = row.add(
                egui::Slider::new(&mut volume, 0.0..=1.0)
                    .step_by(0.1)
                    .show_value(false),
            );
            if slider.changed() {
                actions.push(MenuAction::Volume(volume));
            }
        });
    }

    fn render_timeline(&mut self, ui: &mut egui::Ui, width: f32, actions: &mut Vec<MenuAction>) {
        let Some(timeline) = self.player.timeline().cloned() else {
            return;
        };
        let duration = timeline.duration_secs();
        if !timeline.can_seek || duration <= f64::EPSILON {
            return;
        }

        let mut value = self
            .seek_preview
            .unwrap_or(timeline.position_secs)
            .clamp(0.0, duration);
        ui.spacing_mut().slider_width = width;
        let response = ui.add(egui::Slider::new(&mut value, 0.0..=duration).show_value(false));
        if response.changed() {
            self.seek_preview = Some(value);
        }
        if response.drag_stopped() || (response.clicked() && !response.dragged()) {
            actions.push(MenuAction::Seek(value));
            self.seek_preview = None;
        }

        ui.horizontal(|row| {
            let small = |text: String| RichText::new(text).size(10.0).color(Color32::from_white_alpha(160));
            row.label(small(format_timestamp(value)));
            row.with_layout(egui::Layout::right_to_left(egui::Align::Center), |right| {
                right.label(small(format_timestamp(duration)));
            });
        });
    }

    fn update_cursor(&self, ctx: &egui::Context) {
        if self.drag.is_dragging() {
            ctx.set_cursor_icon(CursorIcon::Grabbing);
        } else if self.disc_hovered {
            ctx.set_cursor_icon(CursorIcon::Grab);
        }
    }
}

impl<B: AudioBackend> eframe::App for App<B> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let pointer = PointerFrame::read(ctx);
        self.viewport_size = ctx.screen_rect().size();

        if self.player.poll() {
            ctx.request_repaint();
        }
        self.handle_pointer(pointer);
        self.disc
            .advance(pointer.time, pointer.dt, self.player.state().is_playing);
        self.ensure_disc_texture(ctx);

        self.paint_backdrop(ctx);
        let actions = self.render_widget(ctx, pointer.time);
        for action in actions {
            self.apply_menu_action(action, pointer.time);
        }
        self.update_cursor(ctx);

        ctx.request_repaint_after(self.desired_repaint_interval(pointer.time));
    }
}

fn main() -> anyhow::Result<()> {
    if let Err(err) = logging::init() {
        eprintln!("failed to initialise logging: {err}");
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("{err:#}; falling back to defaults");
            Config::default()
        }
    };
    let backend =
        RodioBackend::spawn(config.player.autoplay).context("failed to start audio worker")?;

    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title("Phú Quốc")
            .with_inner_size([1024.0, 720.0])
            .with_min_inner_size([280.0, 220.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Phú Quốc Music",
        native_options,
        Box::new(
            move |cc| -> std::result::Result<
                Box<dyn eframe::App>,
                Box<dyn std::error::Error + Send + Sync>,
            > { Ok(Box::new(App::new(cc, config, backend))) },
        ),
    )
    .map_err(|e| anyhow::anyhow!("window closed with error: {e}"))
}
