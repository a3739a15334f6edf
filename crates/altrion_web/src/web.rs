use std::cell::RefCell;
use std::rc::Rc;

use altrion::config::AltrionConfig;
use altrion::controller::{Controller, CUSTOM_PRESET};
use altrion::export::{export_document, export_filename};
use chrono::Utc;
use leptos::html::Canvas;
use leptos::prelude::*;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};
use web_time::Instant;

use crate::ui_model::{self, ExportNote, FrameStep, Slider};

mod canvas;
mod clipboard;
mod files;

pub fn start() {
    mount_to_body(|| view! { <App /> });
}

fn session_seed() -> u64 {
    let now = js_sys::Date::now() as u64;
    let noise = (js_sys::Math::random() * u32::MAX as f64) as u64;
    (now << 20) ^ noise
}

fn prefers_reduced_motion() -> bool {
    web_sys::window()
        .and_then(|w| w.match_media("(prefers-reduced-motion: reduce)").ok().flatten())
        .map(|q| q.matches())
        .unwrap_or(false)
}

fn warn(msg: &str) {
    web_sys::console::warn_1(&msg.into());
}

#[component]
fn App() -> impl IntoView {
    match Controller::new(AltrionConfig::default(), session_seed(), Utc::now()) {
        Ok(controller) => view! { <Widget controller=controller /> }.into_any(),
        Err(e) => {
            warn(&format!("altrion: {e}"));
            view! { <p style="color: #b00;">"Altrion could not start: invalid configuration."</p> }
                .into_any()
        }
    }
}

#[component]
fn Widget(controller: Controller) -> impl IntoView {
    let ctrl = StoredValue::new(controller);
    let alive = StoredValue::new(true);
    let canvas_ref: NodeRef<Canvas> = NodeRef::new();

    let (positions, set_positions) = signal([0i64; 3]);
    let (preset, set_preset) = signal(String::new());
    let (running, set_running) = signal(true);
    let (pending, set_pending) = signal(false);
    let (note, set_note) = signal(String::new());
    let (rationale, set_rationale) = signal(String::new());
    let (declined, set_declined) = signal(false);

    let sync = move || {
        ctrl.with_value(|c| {
            let inputs = c.state().inputs;
            let mut p = [0i64; 3];
            for s in Slider::all() {
                p[s.index()] = s.position(&inputs);
            }
            set_positions.set(p);
            set_preset.set(c.preset().map_or(CUSTOM_PRESET, |p| p.label()).to_string());
            set_running.set(c.is_running());
            set_pending.set(c.has_pending_override());
        });
    };
    sync();

    on_cleanup(move || {
        let _ = alive.try_set_value(false);
    });

    let started = StoredValue::new(false);
    Effect::new(move |_| {
        let Some(el) = canvas_ref.get() else {
            return;
        };
        if started.get_value() {
            return;
        }
        started.set_value(true);
        match canvas::context_2d(&el) {
            Ok(ctx) => start_animation_loop(el, ctx, ctrl, alive, prefers_reduced_motion()),
            Err(e) => {
                warn(&format!("altrion: {e}"));
                set_declined.set(true);
            }
        }
    });

    let on_slider = move |slider: Slider, raw: String| {
        if let Some(v) = ui_model::parse_slider(&raw) {
            ctrl.update_value(|c| c.set_slider(slider.field(), v));
            sync();
        }
    };

    let on_preset = move |value: String| {
        if let Some(p) = ui_model::parse_preset(&value) {
            ctrl.update_value(|c| c.apply_preset(p));
            sync();
        }
    };

    let do_toggle = move || {
        ctrl.update_value(|c| {
            c.toggle_running();
        });
        sync();
    };

    let do_reset = move || {
        ctrl.update_value(|c| c.reset());
        sync();
        set_note.set(String::new());
    };

    let do_new_case = move || {
        ctrl.update_value(|c| {
            c.request_case();
        });
        sync();
    };

    let do_override = move || {
        let text = rationale.get_untracked();
        let text = if text.trim().is_empty() {
            None
        } else {
            Some(text.trim().to_string())
        };
        ctrl.update_value(|c| c.request_override(text));
        set_rationale.set(String::new());
        sync();
    };

    let export_json = move || -> Option<String> {
        let json = ctrl.with_value(|c| export_document(c.log(), Utc::now()).to_json_pretty());
        match json {
            Ok(s) => Some(s),
            Err(e) => {
                warn(&format!("altrion: export failed: {e}"));
                set_note.set(ExportNote::Failed.text().to_string());
                None
            }
        }
    };

    let do_copy = move || {
        let Some(json) = export_json() else {
            return;
        };
        spawn_local(async move {
            let note = match clipboard::copy_with_fallback(json).await {
                Ok(false) => ExportNote::Copied,
                Ok(true) => ExportNote::CopyFallback,
                Err(e) => {
                    warn(&e);
                    ExportNote::Failed
                }
            };
            let _ = set_note.try_set(note.text().to_string());
        });
    };

    let do_export = move || {
        let Some(json) = export_json() else {
            return;
        };
        let name = export_filename(Utc::now());
        let note = match files::download_text(&name, &json, "application/json") {
            Ok(()) => ExportNote::Exported,
            Err(e) => {
                warn(&e);
                ExportNote::Failed
            }
        };
        set_note.set(note.text().to_string());
    };

    let on_pointer_move = move |ev: web_sys::PointerEvent| {
        let Some(el) = canvas_ref.get_untracked() else {
            return;
        };
        let width = el.client_width() as f64;
        ctrl.update_value(|c| c.set_pointer(ev.offset_x() as f64, width));
    };

    let on_pointer_leave = move |_ev: web_sys::PointerEvent| {
        ctrl.update_value(|c| c.clear_pointer());
    };

    view! {
        <main style="font-family: ui-sans-serif, system-ui; max-width: 980px; margin: 0 auto; padding: 16px;">
            <Show when=move || declined.get()>
                <p style="color: #b00;">"Canvas 2D is not available in this browser."</p>
            </Show>
            <canvas
                node_ref=canvas_ref
                style=move || {
                    let display = if declined.get() { "none" } else { "block" };
                    format!("display: {display}; width: 100%; height: 420px; border-radius: 10px; touch-action: none;")
                }
                on:pointermove=on_pointer_move
                on:pointerleave=on_pointer_leave
            />

            <section style="display: flex; gap: 14px; flex-wrap: wrap; margin-top: 12px; align-items: center;">
                {Slider::all()
                    .iter()
                    .map(|&s| {
                        view! {
                            <label style="display: flex; gap: 8px; align-items: center;">
                                <span style="min-width: 110px; color: #333;">
                                    {format!("{} {}", s.symbol(), s.label())}
                                </span>
                                <input
                                    type="range"
                                    min="0"
                                    max="100"
                                    step="1"
                                    prop:value=move || positions.get()[s.index()].to_string()
                                    on:input=move |ev| on_slider(s, event_target_value(&ev))
                                />
                                <span style="min-width: 34px; color: #555;">
                                    {move || positions.get()[s.index()].to_string()}
                                </span>
                            </label>
                        }
                    })
                    .collect_view()}

                <label style="display: flex; gap: 8px; align-items: center;">
                    <span style="color: #333;">"Preset"</span>
                    <select
                        prop:value=move || preset.get()
                        on:change=move |ev| on_preset(event_target_value(&ev))
                    >
                        {ui_model::preset_options()
                            .into_iter()
                            .map(|(value, text)| view! { <option value=value>{text}</option> })
                            .collect_view()}
                        <option value=CUSTOM_PRESET disabled=true>"Custom"</option>
                    </select>
                </label>
            </section>

            <section style="display: flex; gap: 8px; flex-wrap: wrap; margin-top: 12px; align-items: center;">
                <button on:click=move |_| do_toggle()>
                    {move || if running.get() { "Pause" } else { "Play" }}
                </button>
                <button on:click=move |_| do_reset()>"Reset"</button>
                <button on:click=move |_| do_new_case()>"New case"</button>
                <input
                    type="text"
                    placeholder="Override rationale (optional)"
                    style="min-width: 240px;"
                    prop:value=move || rationale.get()
                    on:input=move |ev| set_rationale.set(event_target_value(&ev))
                />
                <button on:click=move |_| do_override()>
                    {move || if pending.get() { "Override armed" } else { "Override next case" }}
                </button>
            </section>

            <section style="display: flex; gap: 8px; flex-wrap: wrap; margin-top: 12px; align-items: center;">
                <button on:click=move |_| do_copy()>"Copy log JSON"</button>
                <button on:click=move |_| do_export()>"Export log"</button>
                <span style="color: #666;">{move || note.get()}</span>
            </section>
        </main>
    }
}

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

fn request_frame(callback: &FrameCallback) {
    let Some(window) = web_sys::window() else {
        return;
    };
    if let Some(cb) = callback.borrow().as_ref() {
        if window
            .request_animation_frame(cb.as_ref().unchecked_ref())
            .is_err()
        {
            warn("altrion: requestAnimationFrame failed");
        }
    }
}

/// Drive the controller from `requestAnimationFrame` until the widget is
/// disposed.
fn start_animation_loop(
    el: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    ctrl: StoredValue<Controller>,
    alive: StoredValue<bool>,
    reduced_motion: bool,
) {
    let origin = Instant::now();
    let callback: FrameCallback = Rc::new(RefCell::new(None));
    let next = callback.clone();

    *callback.borrow_mut() = Some(Closure::wrap(Box::new(move |_ts: f64| {
        let drawn = alive.try_get_value().unwrap_or(false) && {
            let now_ms = origin.elapsed().as_secs_f64() * 1000.0;
            match draw_frame(&el, &ctx, ctrl, reduced_motion, now_ms) {
                Ok(()) => true,
                Err(e) => {
                    warn(&e);
                    false
                }
            }
        };
        match FrameStep::after(drawn) {
            FrameStep::Continue => request_frame(&next),
            // Dropping the closure breaks the Rc cycle; wasm-bindgen defers
            // the free until this call returns.
            FrameStep::Release => drop(next.borrow_mut().take()),
        }
    }) as Box<dyn FnMut(f64)>));

    request_frame(&callback);
}

fn draw_frame(
    el: &HtmlCanvasElement,
    ctx: &CanvasRenderingContext2d,
    ctrl: StoredValue<Controller>,
    reduced_motion: bool,
    now_ms: f64,
) -> Result<(), String> {
    let window = web_sys::window().ok_or("no window".to_string())?;
    let dpr = window.device_pixel_ratio();

    if let Some((w, h, _)) = canvas::fit_backing_store(el, dpr) {
        ctrl.try_update_value(|c| c.resize(w, h, reduced_motion))
            .ok_or("widget disposed".to_string())?;
    }

    let measure = canvas::CanvasTextMeasure::new(ctx);
    let scene = ctrl
        .try_update_value(|c| c.frame(now_ms, &measure))
        .ok_or("widget disposed".to_string())?;
    canvas::replay(ctx, &scene, ui_model::effective_dpr(dpr));
    Ok(())
}
