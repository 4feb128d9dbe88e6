use anyhow::{anyhow, Result};
use eframe::egui::{self, epaint::Vertex, Color32, Mesh, Pos2, Rect, Rgba, Stroke};

pub const ACCENT: Color32 = Color32::from_rgb(0xC2, 0xB2, 0x80);
pub const PANEL_FILL: Color32 = Color32::from_rgba_premultiplied(23, 29, 40, 230);
pub const PANEL_DIVIDER: Color32 = Color32::from_rgba_premultiplied(26, 26, 26, 26);
pub const DARK_INK: Color32 = Color32::from_rgb(0x1a, 0x20, 0x2c);
pub const BACKDROP_TOP: Color32 = Color32::from_rgb(0x0b, 0x2a, 0x3c);
pub const BACKDROP_BOTTOM: Color32 = Color32::from_rgb(0x1f, 0x5f, 0x6b);

pub fn apply_style(ctx: &egui::Context, accent: Color32) {
    let mut style = (*ctx.style()).clone();
    style.visuals.selection.bg_fill = accent;
    style.visuals.selection.stroke = Stroke::new(1.0, accent);
    style.visuals.slider_trailing_fill = true;
    style.visuals.widgets.inactive.fg_stroke = Stroke::new(1.0, Color32::WHITE);
    style.visuals.widgets.hovered.fg_stroke = Stroke::new(1.5, Color32::WHITE);
    style.visuals.widgets.active.fg_stroke = Stroke::new(1.5, accent);
    style.spacing.slider_rail_height = 4.0;
    ctx.set_style(style);
}

/// Fills `rect` with a top-to-bottom gradient.
pub fn paint_backdrop(painter: &egui::Painter, rect: Rect, top: Color32, bottom: Color32) {
    if rect.height() <= f32::EPSILON || top == bottom {
        painter.rect_filled(rect, 0.0, top);
        return;
    }

    let height = rect.height();
    let steps = (height.ceil() as usize).clamp(1, 128);
    let step_height = height / steps as f32;
    let mut mesh = Mesh::default();

    for i in 0..steps {
        let y0 = rect.min.y + step_height * i as f32;
        let y1 = if i == steps - 1 {
            rect.max.y
        } else {
            (y0 + step_height).min(rect.max.y)
        };
        let color0 = lerp_color(top, bottom, (y0 - rect.min.y) / height);
        let color1 = lerp_color(top, bottom, (y1 - rect.min.y) / height);

        let v0 = push_vertex(&mut mesh, Pos2::new(rect.min.x, y0), color0);
        let v1 = push_vertex(&mut mesh, Pos2::new(rect.max.x, y0), color0);
        let v2 = push_vertex(&mut mesh, Pos2::new(rect.min.x, y1), color1);
        let v3 = push_vertex(&mut mesh, Pos2::new(rect.max.x, y1), color1);

        mesh.add_triangle(v0, v2, v1);
        mesh.add_triangle(v1, v2, v3);
    }

    painter.add(egui::Shape::mesh(mesh));
}

fn lerp_color(start: Color32, end: Color32, t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let a = Rgba::from(start);
    let b = Rgba::from(end);
    Color32::from(a * (1.0 - t) + b * t)
}

fn push_vertex(mesh: &mut Mesh, pos: Pos2, color: Color32) -> u32 {
    let idx = mesh.vertices.len() as u32;
    mesh.vertices.push(Vertex {
        pos,
        uv: Pos2::new(0.0, 0.0),
        color,
    });
    idx
}

/// Accepts `#rrggbb`, `#rrggbbaa`, `rgb(r, g, b)` and `rgba(r, g, b, a)`.
pub fn parse_color(value: &str) -> Result<Color32> {
    let v = value.trim();
    if v.eq_ignore_ascii_case("transparent") {
        return Ok(Color32::TRANSPARENT);
    }
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex_color(hex);
    }
    if let Some(rest) = v.strip_prefix("rgba(") {
        let (r, g, b, a) = parse_rgba_components(rest.trim_end_matches(')'))?;
        return Ok(Color32::from_rgba_unmultiplied(r, g, b, a));
    }
    if let Some(rest) = v.strip_prefix("rgb(") {
        let (r, g, b) = parse_rgb_components(rest.trim_end_matches(')'))?;
        return Ok(Color32::from_rgb(r, g, b));
    }
    Err(anyhow!("Unsupported color format: {v}"))
}

fn parse_hex_color(hex: &str) -> Result<Color32> {
    let value = hex.trim();
    let bytes = match value.len() {
        6 | 8 => u32::from_str_radix(value, 16).ok(),
        _ => None,
    }
    .ok_or_else(|| anyhow!("Invalid hex color: #{value}"))?;

    Ok(if value.len() == 6 {
        let r = ((bytes >> 16) & 0xFF) as u8;
        let g = ((bytes >> 8) & 0xFF) as u8;
        let b = (bytes & 0xFF) as u8;
        Color32::from_rgb(r, g, b)
    } else {
        let r = ((bytes >> 24) & 0xFF) as u8;
        let g = ((bytes >> 16) & 0xFF) as u8;
        let b = ((bytes >> 8) & 0xFF) as u8;
        let a = (bytes & 0xFF) as u8;
        Color32::from_rgba_unmultiplied(r, g, b, a)
    })
}

fn parse_rgba_components(input: &str) -> Result<(u8, u8, u8, u8)> {
    let parts: Vec<_> = input.split(',').map(|p| p.trim()).collect();
    if parts.len() != 4 {
        return Err(anyhow!("rgba expects 4 components"));
    }
    let (r, g, b) = parse_rgb_components(&parts[0..3].join(","))?;
    let a = parse_alpha(parts[3])?;
    Ok((r, g, b, a))
}

fn parse_rgb_components(input: &str) -> Result<(u8, u8, u8)> {
    let parts: Vec<_> = input.split(',').map(|p| p.trim()).collect();
    if parts.len() != 3 {
        return Err(anyhow!("rgb expects 3 components"));
    }
    Ok((
        parse_component(parts[0])?,
        parse_component(parts[1])?,
        parse_component(parts[2])?,
    ))
}

fn parse_component(src: &str) -> Result<u8> {
    let value: f32 = src
        .parse()
        .map_err(|_| anyhow!("Invalid color channel: {src}"))?;
    if !(0.0..=255.0).contains(&value) {
        return Err(anyhow!("Color channel out of range: {src}"));
    }
    Ok(value.round() as u8)
}

fn parse_alpha(src: &str) -> Result<u8> {
    if src.contains('.') {
        let value: f32 = src.parse().map_err(|_| anyhow!("Invalid alpha: {src}"))?;
        if !(0.0..=1.0).contains(&value) {
            return Err(anyhow!("Alpha out of range: {src}"));
        }
        Ok((value * 255.0).round() as u8)
    } else {
        parse_component(src)
    }
}
