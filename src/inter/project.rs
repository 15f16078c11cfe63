/*!
The remote Java project store. Every route here sits behind
`key_authenticate()`.
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

use crate::config::Glob;
use crate::project::RemoteProject;
use super::*;

#[derive(Deserialize, Debug)]
pub struct ProjectRequest {
    pub project: String,
}

pub async fn save_files(
    Extension(glob): Extension<Arc<Glob>>,
    Extension(Owner(owner)): Extension<Owner>,
    payload: Result<Json<RemoteProject>, JsonRejection>,
) -> Response {
    let project = match payload {
        Ok(Json(p)) => p,
        Err(e) => {
            log::trace!("save_files(): rejected payload: {}", &e);
            return respond_bad_request("Malformed payload");
        },
    };
    log::trace!(
        "save_files( {:?}, {:?} [ {} files ] ) called.",
        &owner, &project.project, project.files.len()
    );

    if project.project.trim().is_empty() {
        return respond_bad_request("Project name required");
    }

    match glob.store.save_project(&owner, &project).await {
        Ok(()) => respond_message(StatusCode::OK, "Project saved"),
        Err(e) => {
            log::error!(
                "Error saving project {:?} for {:?}: {}",
                &project.project, &owner, &e
            );
            text_500()
        },
    }
}

pub async fn get_projectlist(
    Extension(glob): Extension<Arc<Glob>>,
    Extension(Owner(owner)): Extension<Owner>,
) -> Response {
    log::trace!("get_projectlist( {:?} ) called.", &owner);

    match glob.store.get_project_names(&owner).await {
        Ok(names) => (
            StatusCode::OK,
            Json(json!({ "java_project_names": names })),
        ).into_response(),
        Err(e) => {
            log::error!("Error listing projects for {:?}: {}", &owner, &e);
            text_500()
        },
    }
}

pub async fn get_project(
    Extension(glob): Extension<Arc<Glob>>,
    Extension(Owner(owner)): Extension<Owner>,
    payload: Result<Json<ProjectRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(_) => { return respond_bad_request("Malformed payload"); },
    };
    log::trace!("get_project( {:?}, {:?} ) called.", &owner, &req.project);

    match glob.store.get_project(&owner, &req.project).await {
        Ok(Some(p)) => (StatusCode::OK, Json(p)).into_response(),
        Ok(None) => respond_message(StatusCode::NOT_FOUND, "No such project"),
        Err(e) => {
            log::error!(
                "Error fetching project {:?} for {:?}: {}",
                &req.project, &owner, &e
            );
            text_500()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::tests::{post_json, test_glob};
    use crate::tests::ensure_logging;

    async fn signed_in(app: &Router) -> (String, String) {
        let email = "kj@example.org".to_owned();
        let (status, _) = post_json(app.clone(), "/api/create_student", &[], json!({
            "firstname": "Katherine",
            "lastname": "Johnson",
            "age": 15,
            "grade": 10,
            "email": &email,
            "schoolname": "ABC: Lincoln High",
            "password": "trajectory",
        })).await;
        assert_eq!(StatusCode::CREATED, status);

        let (_, body) = post_json(app.clone(), "/api/login", &[], json!({
            "email": &email, "password": "trajectory"
        })).await;
        let key = body["key"].as_str().unwrap().to_owned();
        (email, key)
    }

    #[tokio::test]
    async fn save_list_fetch() {
        ensure_logging();
        let app = app(test_glob().await);
        let (email, key) = signed_in(&app).await;
        let hdrs = [(EMAIL_HEADER, email.as_str()), (KEY_HEADER, key.as_str())];

        let project = json!({
            "project": "Orbits",
            "files": [
                { "filename": "Main.java", "contents": "public class Main {}" },
                { "filename": "Orbit.java", "contents": "public class Orbit {}" },
            ],
        });
        let (status, _) = post_json(app.clone(), "/api/student/save_files", &hdrs, project.clone()).await;
        assert_eq!(StatusCode::OK, status);
        let (status, _) = post_json(app.clone(), "/api/student/save_files/post", &hdrs, project).await;
        assert_eq!(StatusCode::OK, status);

        let (status, body) = post_json(app.clone(), "/api/student/get_projectlist", &hdrs, json!({})).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!(json!(["Orbits"]), body["java_project_names"]);

        let (status, body) = post_json(
            app.clone(), "/api/student/get_project", &hdrs, json!({ "project": "Orbits" })
        ).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!("Orbit.java", body["files"][1]["filename"]);

        let (status, body) = post_json(
            app.clone(), "/api/student/get_project/post", &hdrs, json!({ "project": "Orbits" })
        ).await;
        assert_eq!(StatusCode::OK, status);
        assert_eq!("Orbit.java", body["files"][1]["filename"]);

        let (status, _) = post_json(
            app.clone(), "/api/student/get_project", &hdrs, json!({ "project": "Nope" })
        ).await;
        assert_eq!(StatusCode::NOT_FOUND, status);

        let (status, _) = post_json(
            app, "/api/student/save_files", &hdrs, json!({ "project": " ", "files": [] })
        ).await;
        assert_eq!(StatusCode::BAD_REQUEST, status);
    }
}
