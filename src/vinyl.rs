use std::path::Path;

use anyhow::Context;
use eframe::egui::{Color32, ColorImage, Vec2};

use crate::config::DiscConfig;

// Ring geometry of the disc, relative to its radius (30px disc, 28px body,
// faint grooves at 25px and 20px, 14px label border, 10px label).
const RIM_START: f32 = 28.0 / 30.0;
const GROOVE_RINGS: [f32; 2] = [25.0 / 30.0, 20.0 / 30.0];
const LABEL_BORDER_RATIO: f32 = 14.0 / 30.0;

#[derive(Debug, Clone)]
pub struct DiscTextureOptions {
    pub swirl_strength: f32,
    pub label_ratio: f32,
    pub output_size: usize,
    pub groove_count: usize,
    pub accent: Color32,
    pub body: [Color32; 2],
}

impl DiscTextureOptions {
    pub fn from_config(config: &DiscConfig, disc_size: f32, pixels_per_point: f32) -> Self {
        let mut output_size = ((disc_size * pixels_per_point * 2.0).ceil() as usize).clamp(64, 512);
        if output_size % 2 == 1 {
            output_size += 1;
        }
        Self {
            swirl_strength: config.swirl_strength(),
            label_ratio: config.label_ratio(),
            output_size,
            groove_count: 12,
            accent: config.accent,
            body: [
                Color32::from_rgb(0x1a, 0x1a, 0x1a),
                Color32::from_rgb(0x33, 0x33, 0x33),
            ],
        }
    }
}

pub fn load_label_image(path: &Path) -> anyhow::Result<ColorImage> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read disc label: {}", path.display()))?;
    decode_label_image(&bytes)
        .with_context(|| format!("Failed to decode disc label: {}", path.display()))
}

pub fn decode_label_image(bytes: &[u8]) -> anyhow::Result<ColorImage> {
    let image = image::load_from_memory(bytes)?.to_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    let pixels = image.into_raw();
    Ok(ColorImage::from_rgba_unmultiplied(size, &pixels))
}

/// Paints the record: dark diagonal body, accent rim, faint grooves and a
/// centre label. With `label` set, the image fills the label area with a
/// slight swirl; otherwise the label is a flat accent dot.
pub fn render_disc(label: Option<&ColorImage>, options: &DiscTextureOptions) -> ColorImage {
    let size = options.output_size;
    let mut output = ColorImage::new([size, size], vec![Color32::TRANSPARENT; size * size]);

    let radius_px = (size as f32) / 2.0;
    let inv_radius = 1.0 / radius_px;

    let label_ratio = options.label_ratio;
    let border_ratio = LABEL_BORDER_RATIO.max(label_ratio + 0.04);
    let groove_count = options.groove_count.max(6);
    let groove_half_width = 0.015;
    let groove_intensity = 0.14;
    let ring_half_width = 1.2 * inv_radius;
    let sheen_angle = -0.35..=0.25;
    let sheen_strength = 0.12;

    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 + 0.5;
            let fy = y as f32 + 0.5;
            let dx = (fx - radius_px) * inv_radius;
            let dy = (fy - radius_px) * inv_radius;
            let r = (dx * dx + dy * dy).sqrt();

            let idx = y * size + x;

            if r >= 1.0 {
                continue;
            }

            let base_angle = dy.atan2(dx);

            let mut color = if r >= RIM_START {
                options.accent
            } else if r >= border_ratio {
                // 135deg linear gradient, top-left dark to bottom-right light.
                let t = ((dx + dy) * 0.25 + 0.5).clamp(0.0, 1.0);
                let mut body = lerp_color(options.body[0], options.body[1], t);

                let normalized = ((r - border_ratio) / (RIM_START - border_ratio)).clamp(0.0, 1.0);
                let mut groove_shade = 0.0;
                for i in 1..=groove_count {
                    let ring_pos = i as f32 / (groove_count as f32 + 1.0);
                    let dist = (normalized - ring_pos).abs();
                    if dist < groove_half_width {
                        let t = 1.0 - (dist / groove_half_width);
                        groove_shade += t * t;
                    }
                }
                if groove_shade > 0.0 {
                    body = darken(body, groove_shade * groove_intensity);
                }
                for ring in GROOVE_RINGS {
                    let dist = (r - ring).abs();
                    if dist < ring_half_width {
                        body = lighten(body, 0.1 * (1.0 - dist / ring_half_width));
                    }
                }
                body
            } else if r >= label_ratio {
                options.body[0]
            } else {
                match label {
                    Some(image) => {
                        let normalized = (r / label_ratio).min(1.0);
                        let swirl = options.swirl_strength * normalized.powf(1.6) * 0.1;
                        sample_label(image, base_angle + swirl, normalized)
                    }
                    None => options.accent,
                }
            };

            if r > label_ratio && r < RIM_START && sheen_angle.contains(&base_angle) {
                let angle_t =
                    (base_angle - sheen_angle.start()) / (sheen_angle.end() - sheen_angle.start());
                let highlight = (1.0 - angle_t.clamp(0.0, 1.0)).powf(2.2);
                color = lighten(color, highlight * sheen_strength);
            }

            let alpha = if r > 0.995 {
                let t = ((1.0 - r) / (1.0 - 0.995)).clamp(0.0, 1.0);
                (t * 255.0) as u8
            } else {
                255
            };

            output.pixels[idx] =
                Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha);
        }
    }

    output
}

fn sample_label(image: &ColorImage, angle: f32, normalized_radius: f32) -> Color32 {
    let width = image.size[0] as f32;
    let height = image.size[1] as f32;
    let src_radius = width.min(height) / 2.0;
    let center = Vec2::new(width / 2.0, height / 2.0);
    let px_radius = normalized_radius * src_radius;
    sample_bilinear(
        image,
        center.x + angle.cos() * px_radius,
        center.y + angle.sin() * px_radius,
    )
}

fn sample_bilinear(image: &ColorImage, x: f32, y: f32) -> Color32 {
    let width = image.size[0] as i32;
    let height = image.size[1] as i32;
    if width == 0 || height == 0 {
        return Color32::BLACK;
    }

    let clamped_x = x.clamp(0.0, (width - 1) as f32);
    let clamped_y = y.clamp(0.0, (height - 1) as f32);

    let x0 = clamped_x.floor() as i32;
    let y0 = clamped_y.floor() as i32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let tx = clamped_x - x0 as f32;
    let ty = clamped_y - y0 as f32;

    let row = image.size[0];
    let c00 = image.pixels[(y0 as usize) * row + x0 as usize];
    let c10 = image.pixels[(y0 as usize) * row + x1 as usize];
    let c01 = image.pixels[(y1 as usize) * row + x0 as usize];
    let c11 = image.pixels[(y1 as usize) * row + x1 as usize];

    let top = lerp_color(c00, c10, tx);
    let bottom = lerp_color(c01, c11, tx);
    lerp_color(top, bottom, ty)
}

fn lerp_color(a: Color32, b: Color32, t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let inv = 1.0 - t;
    let mix = |a: u8, b: u8| (a as f32 * inv + b as f32 * t).round() as u8;
    Color32::from_rgba_unmultiplied(
        mix(a.r(), b.r()),
        mix(a.g(), b.g()),
        mix(a.b(), b.b()),
        mix(a.a(), b.a()),
    )
}

fn darken(color: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let scale = |c: u8| (c as f32 * (1.0 - amount)).round().clamp(0.0, 255.0) as u8;
    Color32::from_rgba_unmultiplied(scale(color.r()), scale(color.g()), scale(color.b()), color.a())
}

fn lighten(color: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let lift = |c: u8| {
        (c as f32 + (255.0 - c as f32) * amount)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    Color32::from_rgba_unmultiplied(lift(color.r()), lift(color.g()), lift(color.b()), color.a())
}
