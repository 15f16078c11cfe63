/*!
Interoperation between the client (user) and server.

(Not the application and the database; that's covered by `auth` and `store`.)

Every response body is JSON. Most carry just a `"message"`.
*/
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{header, HeaderName, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{self, AuthResult};
use crate::config::Glob;

pub mod login;
pub mod project;
pub mod register;

pub const EMAIL_HEADER: &str = "x-nest-email";
pub const KEY_HEADER: &str = "x-nest-key";

static TEXT_500: &str = "Internal Server Error";

/// The authenticated user's email, put in the request extensions by
/// `key_authenticate()`.
#[derive(Clone, Debug)]
pub struct Owner(pub String);

pub fn respond_message(code: StatusCode, msg: &str) -> Response {
    (
        code,
        Json(json!({ "message": msg })),
    ).into_response()
}

/**
Return a response in the case of an unrecoverable* error.

(*"Unrecoverable" from the perspective of fielding the current request,
not from the perspective of the program crashing.)

Whatever went wrong should already have been logged; the client only ever
sees the generic message.
*/
pub fn text_500() -> Response {
    respond_message(StatusCode::INTERNAL_SERVER_ERROR, TEXT_500)
}

pub fn respond_bad_request(msg: &str) -> Response {
    log::trace!("respond_bad_request( {:?} ) called.", msg);
    respond_message(StatusCode::BAD_REQUEST, msg)
}

pub fn respond_bad_key() -> Response {
    log::trace!("respond_bad_key() called.");
    respond_message(StatusCode::UNAUTHORIZED, "Invalid authorization key.")
}

fn header_string<B>(req: &Request<B>, name: &str) -> Result<String, Response> {
    match req.headers().get(name) {
        Some(val) => match val.to_str() {
            Ok(s) => Ok(s.to_owned()),
            Err(e) => {
                log::error!(
                    "Failed converting {} value {:?} to &str: {}",
                    name, val, &e
                );
                Err(respond_bad_request(&format!("{} value unrecognizable.", name)))
            },
        },
        None => Err(respond_bad_request(
            &format!("Request must have an {} header.", name)
        )),
    }
}

/// Middleware function to ensure requests carry a valid email/key pair.
///
/// On success the email is made available to the handler as an `Owner`
/// extension.
pub async fn key_authenticate<B>(
    mut req: Request<B>,
    next: Next<B>,
) -> Response {
    let glob: Arc<Glob> = match req.extensions().get::<Arc<Glob>>() {
        Some(glob) => glob.clone(),
        None => {
            log::error!("key_authenticate(): no Glob in request extensions.");
            return text_500();
        },
    };

    let email = match header_string(&req, EMAIL_HEADER) {
        Ok(s) => s,
        Err(r) => { return r; },
    };
    let key = match header_string(&req, KEY_HEADER) {
        Ok(s) => s,
        Err(r) => { return r; },
    };

    match auth::check_key(glob.store.as_ref(), &email, &key, glob.key_lifetime).await {
        Err(e) => {
            log::error!(
                "auth::check_key( {:?}, [ key ] ) returned error: {}",
                &email, &e
            );
            return text_500();
        },
        Ok(AuthResult::InvalidKey) => { return respond_bad_key(); },
        Ok(AuthResult::Ok) => {
            // Good path; fall through to the next layer.
        },
        Ok(x) => {
            log::warn!(
                "auth::check_key() returned {:?}, which should never happen.",
                &x
            );
            return text_500();
        },
    }

    req.extensions_mut().insert(Owner(email));
    next.run(req).await
}

/// The whole HTTP application.
pub fn app(glob: Arc<Glob>) -> Router {
    let student_api = Router::new()
        .route("/save_files", post(project::save_files))
        .route("/save_files/post", post(project::save_files))
        .route("/get_projectlist", post(project::get_projectlist))
        .route("/get_projectlist/post", post(project::get_projectlist))
        .route("/get_project", post(project::get_project))
        .route("/get_project/post", post(project::get_project))
        .route_layer(middleware::from_fn(key_authenticate));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(EMAIL_HEADER),
            HeaderName::from_static(KEY_HEADER),
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/create_student", post(register::create_student))
        .route("/api/create_student/post", post(register::create_student))
        .route("/api/get_schools", post(register::get_schools))
        .route("/api/get_schools/post", post(register::get_schools))
        .route("/api/login", post(login::login))
        .nest("/api/student", student_api)
        .layer(cors)
        .layer(Extension(glob))
}
