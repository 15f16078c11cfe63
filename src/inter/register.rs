/*!
Account creation and the school list the signup form needs.
*/
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::config::Glob;
use crate::register::{register_student, RegistrationError};
use crate::user::StudentSignup;
use super::*;

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        match self {
            RegistrationError::MissingFields(_) => {
                respond_message(StatusCode::BAD_REQUEST, "Missing required fields")
            },
            RegistrationError::Malformed(_) => {
                respond_message(StatusCode::BAD_REQUEST, &self.to_string())
            },
            RegistrationError::AlreadyExists => {
                respond_message(StatusCode::CONFLICT, "User already exists")
            },
            RegistrationError::NoSuchSchool(_) => {
                respond_message(StatusCode::NOT_FOUND, "School does not exist")
            },
            RegistrationError::Internal(e) => {
                log::error!("Error registering student: {}", &e);
                text_500()
            },
        }
    }
}

pub async fn create_student(
    Extension(glob): Extension<Arc<Glob>>,
    payload: Result<Json<StudentSignup>, JsonRejection>,
) -> Response {
    let signup = match payload {
        Ok(Json(signup)) => signup,
        Err(e) => {
            log::trace!("create_student(): rejected payload: {}", &e);
            return respond_bad_request("Malformed payload");
        },
    };
    log::trace!("create_student( {:?} ) called.", &signup.email);

    match register_student(glob.store.as_ref(), &signup, glob.bcrypt_cost).await {
        Ok(_) => respond_message(StatusCode::CREATED, "Student created successfully"),
        Err(e) => e.into_response(),
    }
}

pub async fn get_schools(
    Extension(glob): Extension<Arc<Glob>>,
) -> Response {
    log::trace!("get_schools() called.");

    match glob.store.get_schools().await {
        Ok(schools) => (
            StatusCode::OK,
            Json(json!({ "schools": schools })),
        ).into_response(),
        Err(e) => {
            log::error!("Error retrieving schools: {}", &e);
            text_500()
        },
    }
}
