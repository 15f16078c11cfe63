/*!
Trading an email and password for a session key.
*/
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{self, AuthResult};
use crate::config::Glob;
use super::*;

/// Data type to read the body of a login request.
#[derive(Deserialize, Debug)]
pub struct LoginData {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn respond_bad_password() -> Response {
    log::trace!("respond_bad_password() called.");
    respond_message(StatusCode::UNAUTHORIZED, "Invalid email/password combination.")
}

pub async fn login(
    Extension(glob): Extension<Arc<Glob>>,
    payload: Result<Json<LoginData>, JsonRejection>,
) -> Response {
    let form = match payload {
        Ok(Json(form)) => form,
        Err(_) => { return respond_bad_request("Malformed payload"); },
    };

    let (email, password) = match (form.email.as_deref(), form.password.as_deref()) {
        (Some(e), Some(p)) if !e.is_empty() && !p.is_empty() => (e, p),
        _ => { return respond_bad_request("Missing required fields"); },
    };
    log::trace!("login( {:?}, [ password ] ) called.", email);

    let auth_response = auth::check_password_and_issue_key(
        glob.store.as_ref(),
        email,
        password,
        glob.key_length,
    ).await;

    match auth_response {
        Err(e) => {
            log::error!(
                "Error: auth::check_password_and_issue_key( {:?}, [ password ] ): {}",
                email, &e
            );
            text_500()
        },
        Ok(AuthResult::Key(k)) => (
            StatusCode::OK,
            Json(json!({ "email": email, "key": k })),
        ).into_response(),
        Ok(AuthResult::BadPassword) | Ok(AuthResult::NoSuchUser) => {
            respond_bad_password()
        },
        Ok(x) => {
            log::warn!(
                "auth::check_password_and_issue_key( {:?}, [ password ] ) returned {:?}, which shouldn't happen.",
                email, &x
            );
            respond_bad_password()
        },
    }
}
