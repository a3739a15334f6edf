use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use altrion::render::{DrawCommand, Font, MonospaceMeasure, Rect, Scene, TextMeasure};

use crate::ui_model::{backing_store, BackingStore};

pub(super) fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, String> {
    canvas
        .get_context("2d")
        .map_err(|_| "canvas: get_context threw".to_string())?
        .ok_or("canvas: missing 2d context".to_string())?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| "canvas: context is not 2d".to_string())
}

/// Size the backing store for the canvas' CSS box. Returns `None` when the
/// size is unchanged.
pub(super) fn fit_backing_store(
    canvas: &HtmlCanvasElement,
    device_pixel_ratio: f64,
) -> Option<(f64, f64, BackingStore)> {
    let rect = canvas.get_bounding_client_rect();
    let (css_w, css_h) = (rect.width(), rect.height());
    let store = backing_store(css_w, css_h, device_pixel_ratio);
    if canvas.width() == store.width && canvas.height() == store.height {
        return None;
    }
    canvas.set_width(store.width);
    canvas.set_height(store.height);
    Some((css_w, css_h, store))
}

/// Measures with the live context; falls back to a monospace estimate if the
/// browser throws.
pub(super) struct CanvasTextMeasure<'a> {
    ctx: &'a CanvasRenderingContext2d,
}

impl<'a> CanvasTextMeasure<'a> {
    pub(super) fn new(ctx: &'a CanvasRenderingContext2d) -> Self {
        Self { ctx }
    }
}

impl TextMeasure for CanvasTextMeasure<'_> {
    fn measure(&self, font: &Font, text: &str) -> f64 {
        self.ctx.set_font(&font.css());
        match self.ctx.measure_text(text) {
            Ok(m) => m.width(),
            Err(_) => MonospaceMeasure.measure(font, text),
        }
    }
}

fn set_dash(ctx: &CanvasRenderingContext2d, dash: Option<[f64; 2]>) {
    let segments = js_sys::Array::new();
    if let Some([on, off]) = dash {
        segments.push(&JsValue::from_f64(on));
        segments.push(&JsValue::from_f64(off));
    }
    let _ = ctx.set_line_dash(&segments);
}

fn round_rect_path(ctx: &CanvasRenderingContext2d, r: &Rect, radius: f64) {
    let radius = radius.min(r.w * 0.5).min(r.h * 0.5).max(0.0);
    ctx.begin_path();
    ctx.move_to(r.x + radius, r.y);
    let _ = ctx.arc_to(r.right(), r.y, r.right(), r.bottom(), radius);
    let _ = ctx.arc_to(r.right(), r.bottom(), r.x, r.bottom(), radius);
    let _ = ctx.arc_to(r.x, r.bottom(), r.x, r.y, radius);
    let _ = ctx.arc_to(r.x, r.y, r.right(), r.y, radius);
    ctx.close_path();
}

/// Execute a scene. Scene coordinates are CSS pixels; `scale` maps them onto
/// the backing store.
pub(super) fn replay(ctx: &CanvasRenderingContext2d, scene: &Scene, scale: f64) {
    let _ = ctx.set_transform(scale, 0.0, 0.0, scale, 0.0, 0.0);
    ctx.set_text_baseline("alphabetic");

    for cmd in &scene.commands {
        match cmd {
            DrawCommand::Clear { color } => {
                ctx.set_fill_style_str(&color.css());
                ctx.fill_rect(0.0, 0.0, scene.width, scene.height);
            }
            DrawCommand::FillRect { rect, color } => {
                ctx.set_fill_style_str(&color.css());
                ctx.fill_rect(rect.x, rect.y, rect.w, rect.h);
            }
            DrawCommand::StrokeRoundRect {
                rect,
                radius,
                color,
                width,
            } => {
                set_dash(ctx, None);
                ctx.set_stroke_style_str(&color.css());
                ctx.set_line_width(*width);
                round_rect_path(ctx, rect, *radius);
                ctx.stroke();
            }
            DrawCommand::Line {
                from,
                to,
                color,
                width,
                dash,
            } => {
                set_dash(ctx, *dash);
                ctx.set_stroke_style_str(&color.css());
                ctx.set_line_width(*width);
                ctx.begin_path();
                ctx.move_to(from.0, from.1);
                ctx.line_to(to.0, to.1);
                ctx.stroke();
            }
            DrawCommand::Polyline {
                points,
                color,
                width,
            } => {
                let Some((first, rest)) = points.split_first() else {
                    continue;
                };
                set_dash(ctx, None);
                ctx.set_stroke_style_str(&color.css());
                ctx.set_line_width(*width);
                ctx.set_line_join("round");
                ctx.begin_path();
                ctx.move_to(first.0, first.1);
                for p in rest {
                    ctx.line_to(p.0, p.1);
                }
                ctx.stroke();
            }
            DrawCommand::Circle { x, y, r, color } => {
                ctx.set_fill_style_str(&color.css());
                ctx.begin_path();
                let _ = ctx.arc(*x, *y, *r, 0.0, std::f64::consts::PI * 2.0);
                ctx.fill();
            }
            DrawCommand::Text {
                x,
                y,
                text,
                font,
                color,
                align,
            } => {
                ctx.set_font(&font.css());
                ctx.set_text_align(align.css());
                ctx.set_fill_style_str(&color.css());
                let _ = ctx.fill_text(text, *x, *y);
            }
            DrawCommand::PushClip { rect } => {
                ctx.save();
                ctx.begin_path();
                ctx.rect(rect.x, rect.y, rect.w, rect.h);
                ctx.clip();
            }
            DrawCommand::PopClip => ctx.restore(),
        }
    }
}
