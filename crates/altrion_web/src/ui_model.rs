//! UI models and helpers that should be available on both wasm and native.
//!
//! Keeping these out of the wasm-only `web` module allows us to unit-test the
//! control inventory and input parsing on the host.

use altrion::controller::{InputField, Preset};
use altrion::model::ModelInputs;

/// Canvas backing store never exceeds this many device pixels per CSS pixel.
pub const MAX_DPR: f64 = 2.5;

/// One of the three model sliders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slider {
    Gamma,
    Workload,
    Friction,
}

impl Slider {
    pub fn all() -> &'static [Slider] {
        &[Slider::Gamma, Slider::Workload, Slider::Friction]
    }

    pub fn field(self) -> InputField {
        match self {
            Slider::Gamma => InputField::Gamma,
            Slider::Workload => InputField::Workload,
            Slider::Friction => InputField::Friction,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Slider::Gamma => "γ",
            Slider::Workload => "λ",
            Slider::Friction => "f",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Slider::Gamma => "Fatigue",
            Slider::Workload => "Workload",
            Slider::Friction => "Gate friction",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Slider::Gamma => 0,
            Slider::Workload => 1,
            Slider::Friction => 2,
        }
    }

    /// Slider position (`0..=100`) for this field of `inputs`.
    pub fn position(self, inputs: &ModelInputs) -> i64 {
        let v = match self {
            Slider::Gamma => inputs.gamma,
            Slider::Workload => inputs.workload,
            Slider::Friction => inputs.friction,
        };
        slider_from_unit(v)
    }
}

/// `[0, 1]` -> `0..=100`.
pub fn slider_from_unit(x01: f64) -> i64 {
    if x01.is_nan() {
        return 0;
    }
    (x01.clamp(0.0, 1.0) * 100.0).round() as i64
}

/// Parse a range input's value. Browsers hand back strings like `"55"`;
/// anything unparseable is ignored, anything out of range is clamped.
pub fn parse_slider(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n.clamp(0, 100));
    }
    let x: f64 = raw.parse().ok()?;
    if !x.is_finite() {
        return None;
    }
    Some((x.round() as i64).clamp(0, 100))
}

/// `<select>` options: `(value, text)`.
pub fn preset_options() -> Vec<(&'static str, &'static str)> {
    Preset::all()
        .iter()
        .map(|p| (p.label(), p.display_name()))
        .collect()
}

pub fn parse_preset(value: &str) -> Option<Preset> {
    Preset::from_label(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackingStore {
    pub width: u32,
    pub height: u32,
    /// Device pixels per CSS pixel applied to the context transform.
    pub scale: f64,
}

pub fn effective_dpr(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw.min(MAX_DPR)
    } else {
        1.0
    }
}

pub fn backing_store(css_width: f64, css_height: f64, device_pixel_ratio: f64) -> BackingStore {
    let scale = effective_dpr(device_pixel_ratio);
    let px = |v: f64| {
        if v.is_finite() {
            (v.max(0.0) * scale).round() as u32
        } else {
            0
        }
    };
    BackingStore {
        width: px(css_width),
        height: px(css_height),
        scale,
    }
}

/// Short status shown under the export buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportNote {
    Copied,
    CopyFallback,
    Exported,
    Failed,
}

impl ExportNote {
    pub fn text(self) -> &'static str {
        match self {
            ExportNote::Copied => "copied",
            ExportNote::CopyFallback => "clipboard blocked: JSON selected below, press Ctrl+C",
            ExportNote::Exported => "exported",
            ExportNote::Failed => "export failed",
        }
    }
}

/// What the animation-frame callback does once a frame is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    /// Schedule the next frame.
    Continue,
    /// Stop and drop the self-referencing callback.
    Release,
}

impl FrameStep {
    /// `drawn` is false once the widget is disposed or a frame failed.
    pub fn after(drawn: bool) -> Self {
        if drawn {
            FrameStep::Continue
        } else {
            FrameStep::Release
        }
    }
}
