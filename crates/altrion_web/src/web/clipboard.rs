use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

const FALLBACK_ID: &str = "altrion-copy-fallback";

pub(super) async fn write_text(text: &str) -> Result<(), String> {
    let window = web_sys::window().ok_or("no window".to_string())?;
    let promise = window.navigator().clipboard().write_text(text);
    JsFuture::from(promise)
        .await
        .map(|_| ())
        .map_err(|_| "clipboard: write rejected".to_string())
}

/// Manual copy path: park the text in an off-screen, pre-selected textarea.
/// A previous fallback area is replaced.
pub(super) fn show_fallback(text: &str) -> Result<(), String> {
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or("no document".to_string())?;
    let body = document.body().ok_or("no body".to_string())?;

    if let Some(old) = document.get_element_by_id(FALLBACK_ID) {
        old.remove();
    }

    let area = document
        .create_element("textarea")
        .map_err(|_| "document: create_element failed".to_string())?
        .dyn_into::<web_sys::HtmlTextAreaElement>()
        .map_err(|_| "document: textarea cast failed".to_string())?;
    area.set_id(FALLBACK_ID);
    area.set_read_only(true);
    area.set_value(text);
    let _ = area.set_attribute(
        "style",
        "position: fixed; left: -9999px; top: 0; width: 1px; height: 1px; opacity: 0;",
    );
    body.append_child(&area)
        .map_err(|_| "document: append failed".to_string())?;
    let _ = area.focus();
    area.select();
    Ok(())
}

/// Copy with the async clipboard API, falling back to a selectable textarea.
/// Returns whether the fallback was used.
pub(super) async fn copy_with_fallback(text: String) -> Result<bool, String> {
    match write_text(&text).await {
        Ok(()) => Ok(false),
        Err(e) => {
            web_sys::console::warn_1(&e.into());
            show_fallback(&text).map(|()| true)
        }
    }
}
