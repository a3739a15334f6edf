//! Float formatting helpers for wasm.
//!
//! Rust's core float-to-decimal formatting has had wasm-facing panics in some
//! toolchain/browser combinations (see `dragon.rs` panics). The renderer builds
//! every HUD string and CSS color through these helpers instead of `format!`.
//!
//! They:
//! - Handle `NaN`/`±Inf` explicitly.
//! - For finite values, scale + round into an `i64`, then format integers.

#[inline]
pub fn fmt_fixed(v: f64, decimals: usize) -> String {
    fmt_fixed_inner(v, decimals, false)
}

#[inline]
pub fn fmt_signed_fixed(v: f64, decimals: usize) -> String {
    fmt_fixed_inner(v, decimals, true)
}

/// `0.7462` -> `"75%"`. Input is clamped to `[0, 1]`.
pub fn fmt_pct(x01: f64) -> String {
    let x = if x01.is_nan() { 0.0 } else { x01.clamp(0.0, 1.0) };
    let mut s = ((x * 100.0).round() as i64).to_string();
    s.push('%');
    s
}

/// Slider-style integer readout: `0.55` -> `"55"`.
pub fn fmt_percent_int(x01: f64) -> String {
    let x = if x01.is_nan() { 0.0 } else { x01.clamp(0.0, 1.0) };
    ((x * 100.0).round() as i64).to_string()
}

fn fmt_fixed_inner(v: f64, decimals: usize, force_sign: bool) -> String {
    if !v.is_finite() {
        return if v.is_nan() {
            "NaN".to_string()
        } else if v.is_sign_positive() {
            "Inf".to_string()
        } else {
            "-Inf".to_string()
        };
    }

    // Clamp decimals to something reasonable to avoid huge powers.
    let decimals = decimals.min(9);

    let scale_i64 = 10_i64.pow(decimals as u32);
    let scale_f = scale_i64 as f64;

    let scaled = (v * scale_f).round();
    if !scaled.is_finite() || scaled.abs() > (i64::MAX as f64) {
        return if v.is_sign_negative() {
            "-Inf".to_string()
        } else {
            "Inf".to_string()
        };
    }

    let scaled_i = scaled as i64;

    // Preserve a negative sign for -0.0 if the caller forces a sign.
    let negative = scaled_i < 0 || (scaled_i == 0 && force_sign && v.is_sign_negative());

    let abs_i = scaled_i.abs();
    let int_part = abs_i / scale_i64;
    let frac_part = abs_i % scale_i64;

    let mut out = String::new();

    if negative {
        out.push('-');
    } else if force_sign {
        out.push('+');
    }

    out.push_str(&int_part.to_string());

    if decimals > 0 {
        out.push('.');
        let frac_str = frac_part.to_string();
        for _ in 0..decimals.saturating_sub(frac_str.len()) {
            out.push('0');
        }
        out.push_str(&frac_str);
    }

    out
}
