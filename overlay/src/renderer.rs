//! Crosshair renderer using tiny-skia
//!
//! Rendering is split in two: [`plan`] turns a config and canvas size into
//! an ordered list of draw operations (pure geometry), and [`render`] clears
//! the canvas and paints that list with tiny-skia. Both are deterministic.
//!
//! Every primitive is drawn in two passes when the outline is visible: a
//! wider stroke in the outline color first, then the primitive itself.

use crosshair_types::{CrosshairConfig, CrosshairStyle, Rgba};
use tiny_skia::{
    Color, FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, PixmapMut, Stroke,
    Transform,
};

// ─────────────────────────────────────────────────────────────────────────────
// Draw Plan
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Geometry of one primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Disjoint segments stroked together as a single path
    Segments(Vec<(Point, Point)>),
    Circle { center: Point, radius: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pass {
    Stroke { width: f64 },
    Fill,
}

/// One paint call: a shape, how to paint it, and with which color
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOp {
    pub shape: Shape,
    pub pass: Pass,
    pub color: Rgba,
}

/// Half-pixel nudge that puts odd-width strokes on pixel centers.
pub fn pixel_alignment(thickness: f64) -> f64 {
    if (thickness / 2.0).rem_euclid(1.0) == 0.5 {
        0.5
    } else {
        0.0
    }
}

/// Center of the crosshair on a `width` x `height` canvas
pub fn crosshair_center(
    config: &CrosshairConfig,
    width: u32,
    height: u32,
    centering: (f64, f64),
) -> Point {
    let align = pixel_alignment(config.thickness);
    Point::new(
        f64::from(width) / 2.0 + config.offset.x + centering.0 + align,
        f64::from(height) / 2.0 + config.offset.y + centering.1 + align,
    )
}

/// Radius of the `Dot` style disc
pub fn dot_radius(config: &CrosshairConfig) -> f64 {
    (config.size * 0.2 + config.thickness * 0.6).max(1.0)
}

/// Radius of the center disc added by `CrossDot`
pub fn center_dot_radius(config: &CrosshairConfig) -> f64 {
    (config.thickness * 0.75).max(1.0)
}

/// Stroke `shape`, preceded by its outline ring when the outline is visible
fn push_stroke(ops: &mut Vec<DrawOp>, config: &CrosshairConfig, shape: Shape, width: f64) {
    let outline = &config.outline;
    if outline.is_drawn() {
        ops.push(DrawOp {
            shape: shape.clone(),
            pass: Pass::Stroke {
                width: width + 2.0 * outline.thickness,
            },
            color: outline.color.with_alpha(outline.effective_alpha()),
        });
    }
    ops.push(DrawOp {
        shape,
        pass: Pass::Stroke { width },
        color: config.color,
    });
}

/// Fill `shape`; its outline is a stroke around the edge drawn first
fn push_fill(ops: &mut Vec<DrawOp>, config: &CrosshairConfig, shape: Shape) {
    let outline = &config.outline;
    if outline.is_drawn() {
        ops.push(DrawOp {
            shape: shape.clone(),
            pass: Pass::Stroke {
                width: outline.thickness * 2.0,
            },
            color: outline.color.with_alpha(outline.effective_alpha()),
        });
    }
    ops.push(DrawOp {
        shape,
        pass: Pass::Fill,
        color: config.color,
    });
}

fn cross_arms(c: Point, gap: f64, size: f64) -> [Shape; 2] {
    let horizontal = Shape::Segments(vec![
        (Point::new(c.x - gap - size, c.y), Point::new(c.x - gap, c.y)),
        (Point::new(c.x + gap, c.y), Point::new(c.x + gap + size, c.y)),
    ]);
    let vertical = Shape::Segments(vec![
        (Point::new(c.x, c.y - gap - size), Point::new(c.x, c.y - gap)),
        (Point::new(c.x, c.y + gap), Point::new(c.x, c.y + gap + size)),
    ]);
    [horizontal, vertical]
}

fn diagonal_arms(c: Point, gap: f64, size: f64) -> [Shape; 2] {
    // Top-left to bottom-right
    let falling = Shape::Segments(vec![
        (
            Point::new(c.x - gap - size, c.y - gap - size),
            Point::new(c.x - gap, c.y - gap),
        ),
        (
            Point::new(c.x + gap, c.y + gap),
            Point::new(c.x + gap + size, c.y + gap + size),
        ),
    ]);
    // Bottom-left to top-right
    let rising = Shape::Segments(vec![
        (
            Point::new(c.x - gap - size, c.y + gap + size),
            Point::new(c.x - gap, c.y + gap),
        ),
        (
            Point::new(c.x + gap, c.y - gap),
            Point::new(c.x + gap + size, c.y - gap - size),
        ),
    ]);
    [falling, rising]
}

/// Build the ordered draw operations for one frame.
///
/// `centering` is added to the canvas center so the crosshair lands on the
/// selected monitor when the canvas is larger than it.
pub fn plan(
    config: &CrosshairConfig,
    width: u32,
    height: u32,
    centering: (f64, f64),
) -> Vec<DrawOp> {
    let center = crosshair_center(config, width, height, centering);
    let thickness = config.thickness;
    let mut ops = Vec::with_capacity(6);

    match config.style {
        CrosshairStyle::Cross => {
            for arm in cross_arms(center, config.gap, config.size) {
                push_stroke(&mut ops, config, arm, thickness);
            }
        }
        CrosshairStyle::CrossDot => {
            for arm in cross_arms(center, config.gap, config.size) {
                push_stroke(&mut ops, config, arm, thickness);
            }
            let disc = Shape::Circle {
                center,
                radius: center_dot_radius(config),
            };
            push_fill(&mut ops, config, disc);
        }
        CrosshairStyle::X => {
            for arm in diagonal_arms(center, config.gap, config.size) {
                push_stroke(&mut ops, config, arm, thickness);
            }
        }
        CrosshairStyle::Circle => {
            let ring = Shape::Circle {
                center,
                radius: config.size.max(1.0),
            };
            push_stroke(&mut ops, config, ring, thickness);
        }
        CrosshairStyle::Dot => {
            let disc = Shape::Circle {
                center,
                radius: dot_radius(config),
            };
            push_fill(&mut ops, config, disc);
        }
    }

    ops
}

// ─────────────────────────────────────────────────────────────────────────────
// Painting
// ─────────────────────────────────────────────────────────────────────────────

fn to_color(color: Rgba) -> Color {
    let c = color.clamped();
    Color::from_rgba(c.r as f32, c.g as f32, c.b as f32, c.a as f32).unwrap_or(Color::TRANSPARENT)
}

fn build_path(shape: &Shape) -> Option<Path> {
    match shape {
        Shape::Segments(segments) => {
            let mut pb = PathBuilder::new();
            for (from, to) in segments {
                pb.move_to(from.x as f32, from.y as f32);
                pb.line_to(to.x as f32, to.y as f32);
            }
            pb.finish()
        }
        Shape::Circle { center, radius } => {
            PathBuilder::from_circle(center.x as f32, center.y as f32, *radius as f32)
        }
    }
}

fn paint_op(pixmap: &mut PixmapMut<'_>, op: &DrawOp) {
    let Some(path) = build_path(&op.shape) else {
        return;
    };

    let mut paint = Paint::default();
    paint.set_color(to_color(op.color));
    paint.anti_alias = true;
    paint.force_hq_pipeline = true;

    match op.pass {
        Pass::Stroke { width } => {
            let stroke = Stroke {
                width: width as f32,
                line_cap: LineCap::Round,
                line_join: LineJoin::Round,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
        Pass::Fill => {
            pixmap.fill_path(
                &path,
                &paint,
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }
}

/// Clear `buffer` and draw the crosshair into it.
///
/// `buffer` is premultiplied RGBA, exactly `width * height * 4` bytes.
/// Returns false (leaving the buffer untouched) when the size does not match.
pub fn render(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    config: &CrosshairConfig,
    centering: (f64, f64),
) -> bool {
    let Some(mut pixmap) = PixmapMut::from_bytes(buffer, width, height) else {
        return false;
    };

    // Overwrite, not blend: nothing from the previous frame survives
    pixmap.fill(Color::TRANSPARENT);

    for op in plan(config, width, height, centering) {
        paint_op(&mut pixmap, &op);
    }
    true
}

/// Render into a fresh offscreen pixmap
pub fn render_to_pixmap(config: &CrosshairConfig, width: u32, height: u32) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)?;
    render(pixmap.data_mut(), width, height, config, (0.0, 0.0)).then_some(pixmap)
}
