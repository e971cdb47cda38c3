use crate::auth;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_opt_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "userId": state.user_id,
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

/// The identity provider is external; the daemon just scopes data to the
/// opaque user id it yielded.
fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let user_id = match get_required_str(&req.params, "userId") {
        Ok(v) => v.trim().to_string(),
        Err(e) => return e.response(&req.id),
    };
    if user_id.is_empty() {
        return err(&req.id, "bad_params", "userId must not be empty", None);
    }
    state.user_id = Some(user_id.clone());
    ok(&req.id, json!({ "userId": user_id }))
}

fn handle_session_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.user_id = None;
    ok(&req.id, json!({ "ok": true }))
}

fn handle_auth_describe_error(req: &Request) -> serde_json::Value {
    let code = match get_required_str(&req.params, "code") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let context = match get_opt_str(&req.params, "context") {
        Some(s) => match auth::AuthContext::parse(&s) {
            Some(c) => c,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "context must be signUp or signIn",
                    None,
                )
            }
        },
        None => auth::AuthContext::SignIn,
    };
    ok(
        &req.id,
        json!({ "message": auth::friendly_auth_message(&code, context) }),
    )
}

/// Sign-up form checks that must reject before the provider is contacted.
fn handle_auth_validate_signup(req: &Request) -> serde_json::Value {
    let password = match get_required_str(&req.params, "password") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let confirm = match get_required_str(&req.params, "confirmPassword") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match auth::validate_new_password(&password, &confirm) {
        Ok(()) => ok(&req.id, json!({ "valid": true })),
        Err(issue) => err(&req.id, "bad_params", issue.message(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "session.open" => Some(handle_session_open(state, req)),
        "session.close" => Some(handle_session_close(state, req)),
        "auth.describeError" => Some(handle_auth_describe_error(req)),
        "auth.validateSignup" => Some(handle_auth_validate_signup(req)),
        _ => None,
    }
}
