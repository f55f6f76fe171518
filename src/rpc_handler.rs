//! RPC method handler for the Smartmarks JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` dispatches a method call to the `App`.

use std::sync::Mutex;

use serde_json::{json, Value};

use crate::app::{App, SignInStep};
use crate::services::settings_engine::SettingsEngineTrait;
use crate::types::bookmark::Bookmark;

fn bookmark_json(b: &Bookmark) -> Value {
    json!({
        "id": b.id,
        "title": b.title,
        "url": b.url,
        "created_at": b.created_at.to_rfc3339(),
    })
}

fn list_json(bookmarks: &[Bookmark]) -> Value {
    json!({ "items": bookmarks.iter().map(bookmark_json).collect::<Vec<_>>() })
}

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", name))
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub fn handle_method(app: &Mutex<App>, method: &str, params: &Value) -> Result<Value, String> {
    let mut a = app.lock().map_err(|e| e.to_string())?;

    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Auth ───
        "auth.begin" => {
            let redirect = params.get("redirect_to").and_then(|v| v.as_str());
            match a.begin_sign_in(redirect).map_err(|e| e.to_string())? {
                SignInStep::AlreadySignedIn => Ok(json!({"signed_in": true})),
                SignInStep::Redirect(url) => Ok(json!({"signed_in": false, "authorize_url": url})),
            }
        }
        "auth.complete" => {
            let callback = params
                .get("callback_url")
                .or_else(|| params.get("code"))
                .and_then(|v| v.as_str())
                .ok_or("missing callback_url")?;
            let session = a.complete_sign_in(callback).map_err(|e| e.to_string())?;
            Ok(json!({"user_id": session.user_id, "display_name": session.display_name()}))
        }
        "auth.sign_in_local" => {
            let user_id = str_param(params, "user_id")?;
            let email = params.get("email").and_then(|v| v.as_str());
            let session = a.sign_in_local(user_id, email).map_err(|e| e.to_string())?;
            Ok(json!({"user_id": session.user_id, "display_name": session.display_name()}))
        }
        "auth.session" => match a.session() {
            Some(session) => Ok(json!({
                "signed_in": true,
                "user_id": session.user_id,
                "display_name": session.display_name(),
            })),
            None => Ok(json!({"signed_in": false})),
        },
        "auth.sign_out" => {
            a.sign_out().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Bookmarks ───
        "bookmarks.list" => {
            let session = a.bookmarks().map_err(|e| e.to_string())?;
            Ok(list_json(session.snapshot()))
        }
        "bookmarks.add" => {
            let title = params.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let url = params.get("url").and_then(|v| v.as_str()).unwrap_or("");
            let session = a.bookmarks().map_err(|e| e.to_string())?;
            let stored = session.add_bookmark(title, url).map_err(|e| e.to_string())?;
            Ok(json!({"bookmark": bookmark_json(&stored), "view": list_json(session.snapshot())}))
        }
        "bookmarks.delete" => {
            let id = str_param(params, "id")?;
            let session = a.bookmarks().map_err(|e| e.to_string())?;
            session.delete_bookmark(id).map_err(|e| e.to_string())?;
            Ok(list_json(session.snapshot()))
        }
        "bookmarks.refresh" => {
            let session = a.bookmarks().map_err(|e| e.to_string())?;
            let items = session.refresh().map_err(|e| e.to_string())?;
            Ok(list_json(items))
        }
        "bookmarks.poll" => {
            let session = a.bookmarks().map_err(|e| e.to_string())?;
            let changed = session.pump_events();
            let mut result = list_json(session.snapshot());
            result["changed"] = json!(changed);
            result["live"] = json!(session.is_live());
            Ok(result)
        }

        // ─── Settings ───
        "settings.get" => serde_json::to_value(a.settings_engine.get_settings()).map_err(|e| e.to_string()),
        "settings.set" => {
            let key = str_param(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            a.settings_engine.set_value(key, value).map_err(|e| e.to_string())?;
            let restart_required = a.reload_settings();
            Ok(json!({"ok": true, "restart_required": restart_required}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
