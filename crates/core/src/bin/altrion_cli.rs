//! Headless driver for the Altrion widget core.
//!
//! Examples:
//!   altrion-cli run
//!   altrion-cli run --preset strained --seconds 45 --seed 7
//!   altrion-cli run --config altrion.json --out session.json
//!   altrion-cli curve --friction 0.2
//!
//! `run` writes the decision-log export to `<data_dir>/altrion/` unless
//! `--out` is given. Set `RUST_LOG=altrion=debug` to see every case.

use std::fs;
use std::path::PathBuf;
use std::process;

use altrion::config::AltrionConfig;
use altrion::controller::{Controller, Preset};
use altrion::export::{export_document, export_filename};
use altrion::fmt::fmt_fixed;
use altrion::render::{self, MonospaceMeasure};
use chrono::Utc;
use tracing::info;

const FPS: f64 = 60.0;

const USAGE: &str = "Usage:
  altrion-cli run [--preset steady|high-volume|strained] [--seconds N] [--seed S]
                  [--config FILE] [--out FILE]
  altrion-cli curve [--friction F] [--config FILE]
  altrion-cli help";

fn usage() -> ! {
    eprintln!("{USAGE}");
    process::exit(2);
}

fn fail(msg: &str) -> ! {
    eprintln!("Error: {msg}");
    process::exit(1);
}

#[derive(Debug, Default)]
struct Flags {
    preset: Option<Preset>,
    seconds: Option<f64>,
    seed: Option<u64>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    friction: Option<f64>,
}

/// One simulated day.
const MAX_SECONDS: f64 = 86_400.0;

fn parse_seconds(value: &str) -> Result<f64, String> {
    let s: f64 = value
        .parse()
        .map_err(|_| "seconds must be a number".to_string())?;
    if !(s.is_finite() && s > 0.0 && s <= MAX_SECONDS) {
        return Err(format!("seconds must be in (0, {MAX_SECONDS}]"));
    }
    Ok(s)
}

fn parse_friction(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(f.clamp(0.0, 1.0)),
        _ => Err("friction must be a number in [0, 1]".to_string()),
    }
}

fn parse_flags(args: &[String]) -> Flags {
    let mut flags = Flags::default();
    let mut it = args.iter();
    while let Some(flag) = it.next() {
        let value = it
            .next()
            .unwrap_or_else(|| fail(&format!("{flag} needs a value")));
        match flag.as_str() {
            "--preset" => {
                flags.preset = Some(
                    Preset::from_label(value)
                        .unwrap_or_else(|| fail("preset must be steady|high-volume|strained")),
                )
            }
            "--seconds" => flags.seconds = Some(parse_seconds(value).unwrap_or_else(|e| fail(&e))),
            "--seed" => {
                flags.seed = Some(value.parse().unwrap_or_else(|_| fail("seed must be a u64")))
            }
            "--config" => flags.config = Some(PathBuf::from(value)),
            "--out" => flags.out = Some(PathBuf::from(value)),
            "--friction" => flags.friction = Some(parse_friction(value).unwrap_or_else(|e| fail(&e))),
            _ => usage(),
        }
    }
    flags
}

fn load_config(path: Option<&PathBuf>) -> Result<AltrionConfig, String> {
    let Some(path) = path else {
        return Ok(AltrionConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
    AltrionConfig::from_json_str(&text).map_err(|e| format!("{}: {e}", path.display()))
}

fn default_export_dir() -> Result<PathBuf, String> {
    let base = dirs::data_dir().ok_or("Could not determine data directory")?;
    Ok(base.join("altrion"))
}

fn run(flags: Flags) -> Result<(), String> {
    let cfg = load_config(flags.config.as_ref())?;
    let seed = flags.seed.unwrap_or(1);
    let seconds = flags.seconds.unwrap_or(30.0);
    let preset = flags.preset.unwrap_or_default();

    let started_at = Utc::now();
    let mut widget = Controller::new(cfg, seed, started_at).map_err(|e| e.to_string())?;
    widget.apply_preset(preset);

    let frames = (seconds * FPS).ceil() as u64;
    let frame_ms = 1000.0 / FPS;
    for i in 0..frames {
        widget.tick(frame_ms / 1000.0);
        if (i + 1) % FPS as u64 == 0 {
            let [hud, detail] = render::hud_lines(widget.state());
            println!("t={:>6}s  {hud}  {detail}", fmt_fixed(widget.state().time, 1));
        }
    }

    let scene = widget.render(&MonospaceMeasure);
    info!(commands = scene.commands.len(), "final frame built");

    println!();
    println!("decision log (newest first):");
    for record in widget.log().newest_first() {
        println!("  {}", record.summary);
    }

    let now = Utc::now();
    let doc = export_document(widget.log(), now);
    let json = doc.to_json_pretty().map_err(|e| e.to_string())?;
    let path = match flags.out {
        Some(p) => p,
        None => {
            let dir = default_export_dir()?;
            fs::create_dir_all(&dir)
                .map_err(|e| format!("Failed to create data directory: {e}"))?;
            dir.join(export_filename(now))
        }
    };
    fs::write(&path, json).map_err(|e| format!("write {}: {e}", path.display()))?;
    println!("exported {} records to {}", doc.records.len(), path.display());
    Ok(())
}

fn curve(flags: Flags) -> Result<(), String> {
    let cfg = load_config(flags.config.as_ref())?;
    let friction = flags.friction.unwrap_or(0.62);
    let split = render::curve_split_index(cfg.critical_nc, cfg.curve_samples);
    println!("# friction={} critical_nc={}", fmt_fixed(friction, 2), fmt_fixed(cfg.critical_nc, 2));
    println!("#     nc    err");
    for (i, (x, err)) in render::error_curve(friction, cfg.critical_nc, cfg.curve_samples)
        .into_iter()
        .enumerate()
    {
        let mark = if i == split { "  <- critical" } else { "" };
        println!("  {}  {}{mark}", fmt_fixed(x, 4), fmt_fixed(err, 4));
    }
    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(cmd) = args.first() else { usage() };

    let result = match cmd.as_str() {
        "run" => {
            tracing_subscriber::fmt::init();
            run(parse_flags(&args[1..]))
        }
        "curve" => curve(parse_flags(&args[1..])),
        "help" | "--help" | "-h" => {
            println!("altrion-cli: headless Altrion gate-flow simulation\n\n{USAGE}");
            Ok(())
        }
        _ => usage(),
    };

    if let Err(e) = result {
        fail(&e);
    }
}
