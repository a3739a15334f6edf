//! Scene builder.
//!
//! `render` turns a read-only snapshot of the simulation into a flat list of
//! [`DrawCommand`]s. It never touches a canvas: the web host replays the list
//! on a 2D context, tests and benches inspect it directly.

use crate::config::AltrionConfig;
use crate::controller::{SimulationState, Viewport};
use crate::fmt::{fmt_fixed, fmt_pct, fmt_percent_int};
use crate::gates::{CaseLog, Decision};
use crate::model::{clamp, collapse_factor, error_target, Regime};
use crate::particles::{Particle, TokenState, GATE_X};
use crate::prng::{Prng, RandomSource};

/// Reciprocal of the golden ratio; biases the split toward the flow panel.
const INV_PHI: f64 = 0.618_033_988_749_895;

pub const ELLIPSIS: &str = "…";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Self {
            a: clamp(a, 0.0, 1.0),
            ..self
        }
    }

    /// CSS `rgba(...)`, formatted without core float formatting.
    pub fn css(&self) -> String {
        let mut s = String::with_capacity(28);
        s.push_str("rgba(");
        s.push_str(&self.r.to_string());
        s.push_str(", ");
        s.push_str(&self.g.to_string());
        s.push_str(", ");
        s.push_str(&self.b.to_string());
        s.push_str(", ");
        s.push_str(&fmt_fixed(clamp(self.a, 0.0, 1.0), 3));
        s.push(')');
        s
    }
}

mod palette {
    use super::Rgba;

    pub const BACKGROUND: Rgba = Rgba::new(7, 10, 18, 1.0);
    pub const FRAME: Rgba = Rgba::new(122, 162, 255, 0.28);
    pub const GUIDE: Rgba = Rgba::new(122, 162, 255, 0.22);
    pub const TEXT: Rgba = Rgba::new(230, 236, 255, 0.92);
    pub const MUTED: Rgba = Rgba::new(178, 186, 210, 0.62);
    pub const COOL: Rgba = Rgba::new(122, 200, 255, 1.0);
    pub const HOT: Rgba = Rgba::new(255, 122, 92, 1.0);
    pub const AMBER: Rgba = Rgba::new(251, 191, 36, 1.0);
    pub const RED: Rgba = Rgba::new(239, 68, 68, 1.0);
    pub const GRAIN: Rgba = Rgba::new(255, 255, 255, 0.05);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFamily {
    Mono,
    Sans,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Font {
    pub size_px: f64,
    pub bold: bool,
    pub family: FontFamily,
}

impl Font {
    pub const fn mono(size_px: f64) -> Self {
        Self {
            size_px,
            bold: false,
            family: FontFamily::Mono,
        }
    }

    pub const fn sans(size_px: f64) -> Self {
        Self {
            size_px,
            bold: false,
            family: FontFamily::Sans,
        }
    }

    pub const fn bold(self) -> Self {
        Self { bold: true, ..self }
    }

    /// CSS shorthand for `ctx.font`.
    pub fn css(&self) -> String {
        let family = match self.family {
            FontFamily::Mono => "ui-monospace, SFMono-Regular, Menlo, Consolas, monospace",
            FontFamily::Sans => "ui-sans-serif, system-ui, -apple-system, Segoe UI, Roboto",
        };
        let weight = if self.bold { "600 " } else { "" };
        format!("{weight}{}px {family}", fmt_fixed(self.size_px, 1))
    }
}

const HUD_FONT: Font = Font::mono(12.0);
const LABEL_FONT: Font = Font::mono(10.0);
const LOG_FONT: Font = Font::mono(11.0);
const TITLE_FONT: Font = Font::sans(11.0).bold();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn css(self) -> &'static str {
        match self {
            TextAlign::Left => "left",
            TextAlign::Center => "center",
            TextAlign::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w: w.max(0.0),
            h: h.max(0.0),
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right() + 1e-9
            && other.bottom() <= self.bottom() + 1e-9
    }
}

/// One primitive for the canvas backend.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear {
        color: Rgba,
    },
    FillRect {
        rect: Rect,
        color: Rgba,
    },
    StrokeRoundRect {
        rect: Rect,
        radius: f64,
        color: Rgba,
        width: f64,
    },
    Line {
        from: (f64, f64),
        to: (f64, f64),
        color: Rgba,
        width: f64,
        /// `[dash, gap]` in px.
        dash: Option<[f64; 2]>,
    },
    Polyline {
        points: Vec<(f64, f64)>,
        color: Rgba,
        width: f64,
    },
    Circle {
        x: f64,
        y: f64,
        r: f64,
        color: Rgba,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        font: Font,
        color: Rgba,
        align: TextAlign,
    },
    PushClip {
        rect: Rect,
    },
    PopClip,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub commands: Vec<DrawCommand>,
}

impl Scene {
    fn push(&mut self, cmd: DrawCommand) {
        self.commands.push(cmd);
    }

    fn text(&mut self, x: f64, y: f64, text: String, font: Font, color: Rgba, align: TextAlign) {
        if text.is_empty() {
            return;
        }
        self.push(DrawCommand::Text {
            x,
            y,
            text,
            font,
            color,
            align,
        });
    }

    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgba, width: f64, dash: Option<[f64; 2]>) {
        self.push(DrawCommand::Line {
            from,
            to,
            color,
            width,
            dash,
        });
    }
}

/// Text width provider. The browser measures with the 2D context; headless
/// callers use [`MonospaceMeasure`].
pub trait TextMeasure {
    fn measure(&self, font: &Font, text: &str) -> f64;
}

/// Fixed advance of `0.6 * size` per char.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceMeasure;

impl TextMeasure for MonospaceMeasure {
    fn measure(&self, font: &Font, text: &str) -> f64 {
        text.chars().count() as f64 * font.size_px * 0.6
    }
}

/// Fit `text` into `max_width`, replacing the tail with `…`.
///
/// Binary search over char counts for the longest prefix whose
/// `prefix + "…"` still fits. Returns `""` when not even the ellipsis fits.
/// The output always measures `<= max_width`, and feeding it back returns it
/// unchanged.
pub fn ellipsize<M: TextMeasure + ?Sized>(measure: &M, font: &Font, text: &str, max_width: f64) -> String {
    if max_width.is_nan() || max_width <= 0.0 {
        return String::new();
    }
    if measure.measure(font, text) <= max_width {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let candidate = |k: usize| -> String {
        let mut s: String = chars[..k].iter().collect();
        s.push_str(ELLIPSIS);
        s
    };

    if measure.measure(font, ELLIPSIS) > max_width {
        return String::new();
    }

    // Invariant: candidate(lo) fits; candidate(hi + 1) does not (or hi is the end).
    let mut lo = 0usize;
    let mut hi = chars.len().saturating_sub(1);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if measure.measure(font, &candidate(mid)) <= max_width {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    candidate(lo)
}

/// Panel geometry for one canvas size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub pad: f64,
    pub split: f64,
    /// Left panel frame.
    pub flow_panel: Rect,
    /// Region tokens travel through, below the HUD.
    pub flow: Rect,
    pub hud_origin: (f64, f64),
    /// Right panel frame.
    pub side_panel: Rect,
    pub plot: Rect,
    pub log: Rect,
}

const HUD_LINE: f64 = 16.0;
const LOG_LINE: f64 = 15.0;

pub fn layout(width: f64, height: f64) -> Layout {
    let w = width.max(0.0);
    let h = height.max(0.0);
    let pad = (w.min(h) * 0.03).round().max(14.0);
    let split = (w * (0.5 + 0.12 * INV_PHI)).round();

    let flow_panel = Rect::new(pad, pad, split - pad * 1.5, h - pad * 2.0);
    let inner = 10.0;
    let hud_h = HUD_LINE * 2.0 + 10.0;
    let hud_origin = (flow_panel.x + inner, flow_panel.y + inner + 12.0);
    let flow = Rect::new(
        flow_panel.x + inner,
        flow_panel.y + inner + hud_h,
        flow_panel.w - inner * 2.0,
        flow_panel.h - inner * 2.0 - hud_h,
    );

    let side_x = split + pad * 0.5;
    let side_panel = Rect::new(side_x, pad, w - pad - side_x, h - pad * 2.0);
    let plot_h = (side_panel.h * 0.58).floor();
    // Title row above the plot, axis labels below it.
    let plot = Rect::new(
        side_panel.x + inner + 18.0,
        side_panel.y + inner + 18.0,
        side_panel.w - inner * 2.0 - 18.0,
        plot_h - inner - 18.0 - 14.0,
    );
    let log_top = side_panel.y + plot_h + 8.0;
    let log = Rect::new(
        side_panel.x + inner,
        log_top,
        side_panel.w - inner * 2.0,
        side_panel.bottom() - inner - log_top,
    );

    Layout {
        pad,
        split,
        flow_panel,
        flow,
        hud_origin,
        side_panel,
        plot,
        log,
    }
}

/// `(x, err)` samples of the analytic error curve, `samples + 1` points.
pub fn error_curve(friction: f64, critical_nc: f64, samples: usize) -> Vec<(f64, f64)> {
    let n = samples.max(1);
    (0..=n)
        .map(|i| {
            let x = i as f64 / n as f64;
            (x, error_target(x, friction, critical_nc))
        })
        .collect()
}

/// Index at which the curve switches to the post-critical color.
pub fn curve_split_index(critical_nc: f64, samples: usize) -> usize {
    let n = samples.max(1);
    ((critical_nc * n as f64).floor().max(1.0) as usize).min(n)
}

pub fn hud_lines(state: &SimulationState) -> [String; 2] {
    let m = &state.metrics;
    let i = &state.inputs;
    let first = format!(
        "NC:{}  ERR:{}  ENG:{}  γ:{}  λ:{}  f:{}",
        fmt_pct(m.nc),
        fmt_pct(m.err),
        fmt_pct(m.engagement),
        fmt_percent_int(i.gamma),
        fmt_percent_int(i.workload),
        fmt_percent_int(i.friction),
    );
    let mut second = format!(
        "P={}  {}",
        fmt_fixed(m.integrity(state.critical_nc), 3),
        Regime::classify(m.nc, state.critical_nc).label()
    );
    if !state.running {
        second.push_str("  [paused]");
    }
    [first, second]
}

fn decision_color(decision: Decision) -> Rgba {
    match decision {
        Decision::Reject => palette::RED,
        Decision::Hold => palette::AMBER,
        Decision::AllowRitual => palette::HOT.with_alpha(0.85),
        Decision::Allow | Decision::AllowRationale | Decision::Override => palette::TEXT,
    }
}

fn token_color(p: &Particle, hot: bool) -> Rgba {
    match p.state {
        TokenState::Rejected => palette::RED,
        TokenState::Flagged => palette::AMBER,
        TokenState::Ok if hot => palette::HOT,
        TokenState::Ok => palette::COOL,
    }
}

/// Build the frame. Pure: same inputs, same scene.
pub fn render<M: TextMeasure + ?Sized>(
    viewport: &Viewport,
    state: &SimulationState,
    particles: &[Particle],
    log: &CaseLog,
    cfg: &AltrionConfig,
    measure: &M,
) -> Scene {
    let mut scene = Scene {
        width: viewport.width,
        height: viewport.height,
        commands: Vec::with_capacity(particles.len() * 2 + 160),
    };
    scene.push(DrawCommand::Clear {
        color: palette::BACKGROUND,
    });
    if viewport.width < 1.0 || viewport.height < 1.0 {
        return scene;
    }

    let lay = layout(viewport.width, viewport.height);
    let collapsed = state.metrics.is_collapsed(state.critical_nc);

    draw_flow_panel(&mut scene, &lay, state, particles, log, collapsed, measure);
    draw_plot(&mut scene, &lay, state, cfg, collapsed, measure);
    draw_log(&mut scene, &lay, log, measure);

    if !viewport.reduced_motion {
        draw_grain(&mut scene, viewport, state.time);
    }
    scene
}

fn draw_flow_panel<M: TextMeasure + ?Sized>(
    scene: &mut Scene,
    lay: &Layout,
    state: &SimulationState,
    particles: &[Particle],
    log: &CaseLog,
    collapsed: bool,
    measure: &M,
) {
    scene.push(DrawCommand::StrokeRoundRect {
        rect: lay.flow_panel,
        radius: 10.0,
        color: palette::FRAME,
        width: 1.0,
    });

    let hud_width = lay.flow_panel.w - 20.0;
    let (hx, hy) = lay.hud_origin;
    for (i, line) in hud_lines(state).into_iter().enumerate() {
        let color = if i == 0 { palette::TEXT } else { palette::MUTED };
        let text = ellipsize(measure, &HUD_FONT, &line, hud_width);
        scene.text(hx, hy + i as f64 * HUD_LINE, text, HUD_FONT, color, TextAlign::Left);
    }

    let flow = lay.flow;
    if flow.w <= 0.0 || flow.h <= 0.0 {
        return;
    }
    scene.push(DrawCommand::PushClip { rect: flow });

    let collapse = collapse_factor(state.metrics.nc, state.critical_nc);
    if collapse > 0.0 {
        let tint_w = flow.w * 0.18;
        scene.push(DrawCommand::FillRect {
            rect: Rect::new(flow.right() - tint_w, flow.y, tint_w, flow.h),
            color: palette::HOT.with_alpha(0.04 + 0.16 * collapse),
        });
    }

    let highlighted = log.latest().and_then(|r| r.gates.last_fired());
    for (i, gx) in GATE_X.iter().enumerate() {
        let x = flow.x + gx * flow.w;
        let lit = highlighted == Some(i);
        let color = if lit {
            palette::AMBER.with_alpha(0.75)
        } else {
            palette::GUIDE
        };
        scene.line((x, flow.y + 14.0), (x, flow.bottom()), color, if lit { 1.5 } else { 1.0 }, Some([4.0, 5.0]));
        let label_color = if lit { palette::AMBER } else { palette::MUTED };
        scene.text(x, flow.y + 10.0, format!("G{}", i + 1), LABEL_FONT, label_color, TextAlign::Center);
    }

    for p in particles {
        let x = flow.x + p.position * flow.w;
        let y = flow.y + p.lane * flow.h;
        let color = token_color(p, collapsed);
        scene.push(DrawCommand::Circle {
            x,
            y,
            r: p.radius * 3.2,
            color: color.with_alpha(p.alpha * 0.18),
        });
        scene.push(DrawCommand::Circle {
            x,
            y,
            r: p.radius,
            color: color.with_alpha(p.alpha),
        });
    }

    scene.push(DrawCommand::PopClip);
}

fn draw_plot<M: TextMeasure + ?Sized>(
    scene: &mut Scene,
    lay: &Layout,
    state: &SimulationState,
    cfg: &AltrionConfig,
    collapsed: bool,
    measure: &M,
) {
    scene.push(DrawCommand::StrokeRoundRect {
        rect: lay.side_panel,
        radius: 10.0,
        color: palette::FRAME,
        width: 1.0,
    });

    let plot = lay.plot;
    let title = ellipsize(measure, &TITLE_FONT, "Error vs non-compliance", lay.side_panel.w - 20.0);
    scene.text(lay.side_panel.x + 10.0, lay.side_panel.y + 20.0, title, TITLE_FONT, palette::TEXT, TextAlign::Left);
    if plot.w <= 0.0 || plot.h <= 0.0 {
        return;
    }

    let to_px = |x: f64, y: f64| (plot.x + x * plot.w, plot.bottom() - clamp(y, 0.0, 1.0) * plot.h);

    // Axes.
    scene.line((plot.x, plot.bottom()), (plot.right(), plot.bottom()), palette::FRAME, 1.0, None);
    scene.line((plot.x, plot.y), (plot.x, plot.bottom()), palette::FRAME, 1.0, None);
    scene.text(plot.right(), plot.bottom() + 12.0, "NC".to_string(), LABEL_FONT, palette::MUTED, TextAlign::Right);
    scene.text(plot.x - 4.0, plot.y + 8.0, "ERR".to_string(), LABEL_FONT, palette::MUTED, TextAlign::Right);

    let (cx, _) = to_px(state.critical_nc, 0.0);
    scene.line((cx, plot.y), (cx, plot.bottom()), palette::HOT.with_alpha(0.45), 1.0, Some([3.0, 4.0]));
    scene.text(cx + 3.0, plot.y + 9.0, "critical".to_string(), LABEL_FONT, palette::HOT.with_alpha(0.7), TextAlign::Left);

    let samples = cfg.curve_samples.max(1);
    let points: Vec<(f64, f64)> = error_curve(state.inputs.friction, state.critical_nc, samples)
        .into_iter()
        .map(|(x, y)| to_px(x, y))
        .collect();
    let split = curve_split_index(state.critical_nc, samples);
    scene.push(DrawCommand::Polyline {
        points: points[..=split].to_vec(),
        color: palette::COOL.with_alpha(0.9),
        width: 2.0,
    });
    scene.push(DrawCommand::Polyline {
        points: points[split..].to_vec(),
        color: palette::HOT.with_alpha(0.9),
        width: 2.0,
    });

    let (mx, my) = to_px(state.metrics.nc, state.metrics.err);
    let marker = if collapsed { palette::HOT } else { palette::COOL };
    scene.push(DrawCommand::Circle {
        x: mx,
        y: my,
        r: 5.0,
        color: marker.with_alpha(0.35),
    });
    scene.push(DrawCommand::Circle {
        x: mx,
        y: my,
        r: 2.5,
        color: palette::TEXT,
    });
}

fn draw_log<M: TextMeasure + ?Sized>(scene: &mut Scene, lay: &Layout, log: &CaseLog, measure: &M) {
    let area = lay.log;
    if area.w <= 0.0 || area.h < LOG_LINE {
        return;
    }
    let mut y = area.y + 12.0;
    scene.text(area.x, y, "Decision log".to_string(), TITLE_FONT, palette::TEXT, TextAlign::Left);

    if log.is_empty() {
        y += LOG_LINE;
        scene.text(area.x, y, "no cases yet".to_string(), LOG_FONT, palette::MUTED, TextAlign::Left);
        return;
    }
    for record in log.newest_first() {
        y += LOG_LINE;
        if y > area.bottom() {
            break;
        }
        let line = ellipsize(measure, &LOG_FONT, &record.summary, area.w);
        scene.text(area.x, y, line, LOG_FONT, decision_color(record.decision), TextAlign::Left);
    }
}

fn draw_grain(scene: &mut Scene, viewport: &Viewport, time: f64) {
    let count = (viewport.width * viewport.height / 110_000.0).floor() as usize;
    let mut rng = Prng::from_f64(time);
    for _ in 0..count {
        let x = rng.range(0.0, viewport.width).floor();
        let y = rng.range(0.0, viewport.height).floor();
        scene.push(DrawCommand::FillRect {
            rect: Rect::new(x, y, 1.0, 1.0),
            color: palette::GRAIN,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Metrics, ModelInputs};

    const TEN: Font = Font::mono(10.0);

    fn state() -> SimulationState {
        SimulationState {
            time: 3.25,
            inputs: ModelInputs::default(),
            perturbation: 0.0,
            critical_nc: 0.40,
            metrics: Metrics {
                nc: 0.7462,
                err: 0.62,
                engagement: 0.33,
            },
            running: true,
        }
    }

    fn viewport(reduced_motion: bool) -> Viewport {
        Viewport {
            width: 960.0,
            height: 420.0,
            reduced_motion,
        }
    }

    #[test]
    fn ellipsize_boundaries_are_exact() {
        let m = MonospaceMeasure;
        // 6 px per char at 10 px.
        assert_eq!(ellipsize(&m, &TEN, "abcdefghij", 60.0), "abcdefghij");
        assert_eq!(ellipsize(&m, &TEN, "abcdefghij", 59.9), "abcdefgh…");
        assert_eq!(ellipsize(&m, &TEN, "abcdefghij", 54.0), "abcdefgh…");
        assert_eq!(ellipsize(&m, &TEN, "abcdefghij", 53.9), "abcdefg…");
        assert_eq!(ellipsize(&m, &TEN, "abcdefghij", 6.0), "…");
        assert_eq!(ellipsize(&m, &TEN, "abcdefghij", 5.9), "");
        assert_eq!(ellipsize(&m, &TEN, "abc", f64::NAN), "");
    }

    #[test]
    fn ellipsize_is_idempotent_and_fits() {
        let m = MonospaceMeasure;
        let texts = ["", "x", "case-0007 Δm=+0.21 Δp=-0.31 age=81h [G2,G3] → HOLD", "γ λ μ"];
        for text in texts {
            for tenth in 0..800 {
                let w = tenth as f64 / 10.0;
                let once = ellipsize(&m, &TEN, text, w);
                assert!(m.measure(&TEN, &once) <= w, "{text:?} @ {w}");
                assert_eq!(ellipsize(&m, &TEN, &once, w), once);
            }
        }
    }

    /// Proportional measure, to exercise the search with uneven advances.
    struct Wide;

    impl TextMeasure for Wide {
        fn measure(&self, font: &Font, text: &str) -> f64 {
            text.chars()
                .map(|c| {
                    let advance = if c.is_ascii_uppercase() { 0.9 } else { 0.5 };
                    advance * font.size_px
                })
                .sum()
        }
    }

    #[test]
    fn ellipsize_returns_longest_fitting_prefix() {
        let text = "ABcdEFghIJ";
        for half in 0..200 {
            let w = half as f64 / 2.0;
            let out = ellipsize(&Wide, &TEN, text, w);
            if out.is_empty() || out == text {
                continue;
            }
            let kept = out.chars().count() - 1;
            let longer: String = text.chars().take(kept + 1).chain("…".chars()).collect();
            assert!(Wide.measure(&TEN, &longer) > w);
        }
    }

    #[test]
    fn layout_stays_inside_canvas() {
        for (w, h) in [(320.0, 240.0), (720.0, 420.0), (1920.0, 1080.0)] {
            let lay = layout(w, h);
            let canvas = Rect::new(0.0, 0.0, w, h);
            assert!(canvas.contains(&lay.flow_panel));
            assert!(canvas.contains(&lay.side_panel));
            assert!(lay.flow_panel.contains(&lay.flow));
            assert!(lay.side_panel.contains(&lay.plot));
            assert!(lay.flow_panel.right() < lay.side_panel.x);
        }
        assert_eq!(layout(720.0, 420.0).pad, 14.0);
        assert_eq!(layout(2000.0, 1000.0).pad, 30.0);
    }

    #[test]
    fn curve_is_split_at_critical() {
        assert_eq!(curve_split_index(0.40, 80), 32);
        assert_eq!(curve_split_index(0.001, 80), 1);
        assert_eq!(curve_split_index(1.0, 80), 80);
        let curve = error_curve(0.62, 0.40, 80);
        assert_eq!(curve.len(), 81);
        assert_eq!(curve[0].0, 0.0);
        assert_eq!(curve[80].0, 1.0);

        let scene = render(
            &viewport(true),
            &state(),
            &[],
            &CaseLog::new(4),
            &AltrionConfig::default(),
            &MonospaceMeasure,
        );
        let polylines: Vec<usize> = scene
            .commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Polyline { points, .. } => Some(points.len()),
                _ => None,
            })
            .collect();
        assert_eq!(polylines, vec![33, 49]);
    }

    #[test]
    fn hud_formats_metrics_and_regime() {
        let [first, second] = hud_lines(&state());
        assert_eq!(first, "NC:75%  ERR:62%  ENG:33%  γ:50  λ:55  f:62");
        assert!(second.starts_with("P=0."));
        assert!(second.ends_with("Ritualized Compliance"));

        let mut paused = state();
        paused.running = false;
        assert!(hud_lines(&paused)[1].ends_with("[paused]"));
    }

    #[test]
    fn render_is_pure_and_draws_two_layers_per_token() {
        let mut rng = Prng::new(12);
        let mut pool = crate::particles::ParticlePool::new();
        pool.seed(50, &mut rng);
        let log = CaseLog::new(4);
        let cfg = AltrionConfig::default();

        let a = render(&viewport(false), &state(), pool.particles(), &log, &cfg, &MonospaceMeasure);
        let b = render(&viewport(false), &state(), pool.particles(), &log, &cfg, &MonospaceMeasure);
        assert_eq!(a, b);

        let reduced = render(&viewport(true), &state(), pool.particles(), &log, &cfg, &MonospaceMeasure);
        let grain = (960.0 * 420.0 / 110_000.0_f64).floor() as usize;
        assert_eq!(a.commands.len(), reduced.commands.len() + grain);

        // 2 per token + 2 for the curve marker.
        let circles = reduced
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Circle { .. }))
            .count();
        assert_eq!(circles, 50 * 2 + 2);
    }

    #[test]
    fn collapse_tint_only_past_critical() {
        let cfg = AltrionConfig::default();
        let log = CaseLog::new(1);
        let has_tint = |s: &SimulationState| {
            render(&viewport(true), s, &[], &log, &cfg, &MonospaceMeasure)
                .commands
                .iter()
                .any(|c| matches!(c, DrawCommand::FillRect { color, .. } if color.r == 255 && color.g == 122))
        };
        assert!(has_tint(&state()));
        let mut calm = state();
        calm.metrics.nc = 0.2;
        assert!(!has_tint(&calm));
    }

    #[test]
    fn degenerate_canvas_only_clears() {
        let vp = Viewport {
            width: 0.0,
            height: 300.0,
            reduced_motion: false,
        };
        let scene = render(&vp, &state(), &[], &CaseLog::new(1), &AltrionConfig::default(), &MonospaceMeasure);
        assert_eq!(scene.commands.len(), 1);
    }

    #[test]
    fn rgba_css_is_stable() {
        assert_eq!(Rgba::new(255, 122, 92, 0.5).css(), "rgba(255, 122, 92, 0.500)");
        assert_eq!(Rgba::new(0, 0, 0, 7.0).css(), "rgba(0, 0, 0, 1.000)");
        assert_eq!(Font::mono(12.0).bold().css().split(' ').next(), Some("600"));
    }
}
