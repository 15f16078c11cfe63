/*!
The workspace's view of the server-side project store.
*/
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::inter::{EMAIL_HEADER, KEY_HEADER};
use crate::project::RemoteProject;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unable to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{1} ({0})")]
    Status(u16, String),
}

#[async_trait]
pub trait RemoteProjects: Send + Sync {
    async fn save(&self, project: &RemoteProject) -> Result<(), RemoteError>;
    async fn list(&self) -> Result<Vec<String>, RemoteError>;
    async fn fetch(&self, name: &str) -> Result<Option<RemoteProject>, RemoteError>;
}

/// Talks to a `nest` server over HTTP with an issued session key.
pub struct HttpRemote {
    client: Client,
    base_url: String,
    email: String,
    key: String,
}

#[derive(Deserialize)]
struct MessageBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct LoginBody {
    key: String,
}

#[derive(Deserialize)]
struct ProjectListBody {
    java_project_names: Vec<String>,
}

async fn status_error(resp: reqwest::Response) -> RemoteError {
    let code = resp.status().as_u16();
    let msg = match resp.json::<MessageBody>().await {
        Ok(MessageBody { message: Some(m) }) => m,
        _ => format!("Request failed with status {}", &code),
    };
    RemoteError::Status(code, msg)
}

impl HttpRemote {
    pub fn new(base_url: &str, email: &str, key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            email: email.to_owned(),
            key: key.to_owned(),
        }
    }

    /// Log in to the server at `base_url` and keep the issued key.
    pub async fn login(
        base_url: &str,
        email: &str,
        password: &str,
    ) -> Result<Self, RemoteError> {
        log::trace!("HttpRemote::login( {:?}, {:?}, [ password ] ) called.", base_url, email);

        let client = Client::new();
        let resp = client
            .post(format!("{}/api/login", base_url.trim_end_matches('/')))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        let body: LoginBody = resp.json().await?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            email: email.to_owned(),
            key: body.key,
        })
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, RemoteError> {
        let resp = self.client
            .post(format!("{}/api/student/{}", &self.base_url, path))
            .header(EMAIL_HEADER, &self.email)
            .header(KEY_HEADER, &self.key)
            .json(&body)
            .send()
            .await?;
        Ok(resp)
    }
}

#[async_trait]
impl RemoteProjects for HttpRemote {
    async fn save(&self, project: &RemoteProject) -> Result<(), RemoteError> {
        let body = serde_json::to_value(project)?;
        let resp = self.post("save_files", body).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(status_error(resp).await)
        }
    }

    async fn list(&self) -> Result<Vec<String>, RemoteError> {
        let resp = self.post("get_projectlist", json!({})).await?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }
        let body: ProjectListBody = resp.json().await?;
        Ok(body.java_project_names)
    }

    async fn fetch(&self, name: &str) -> Result<Option<RemoteProject>, RemoteError> {
        let resp = self.post("get_project", json!({ "project": name })).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(resp.json().await?)),
            _ => Err(status_error(resp).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inter::{app, tests::test_glob};
    use crate::project::SourceFile;
    use crate::tests::ensure_logging;

    async fn serve() -> String {
        let glob = test_glob().await;
        let server = axum::Server::bind(&"127.0.0.1:0".parse().unwrap())
            .serve(app(glob).into_make_service());
        let addr = server.local_addr();
        tokio::spawn(server);
        format!("http://{}", addr)
    }

    async fn register(base: &str, email: &str, password: &str) {
        let resp = Client::new()
            .post(format!("{}/api/create_student", base))
            .json(&json!({
                "firstname": "Annie",
                "lastname": "Easley",
                "age": 17,
                "grade": 12,
                "email": email,
                "schoolname": "ABC: Lincoln High",
                "password": password,
            }))
            .send().await.unwrap();
        assert_eq!(StatusCode::CREATED, resp.status());
    }

    #[tokio::test]
    async fn http_remote_against_server() {
        ensure_logging();
        let base = serve().await;
        register(&base, "ae@example.org", "centaur").await;

        match HttpRemote::login(&base, "ae@example.org", "wrong").await {
            Err(RemoteError::Status(401, _)) => {},
            Err(e) => panic!("unexpected error {:?}", &e),
            Ok(_) => panic!("logged in with the wrong password"),
        }

        let remote = HttpRemote::login(&base, "ae@example.org", "centaur").await.unwrap();
        let p = RemoteProject {
            project: "Rockets".to_owned(),
            files: vec![SourceFile::new("Main.java", "public class Main {}")],
        };
        remote.save(&p).await.unwrap();

        assert_eq!(vec!["Rockets".to_owned()], remote.list().await.unwrap());
        assert_eq!(Some(p), remote.fetch("Rockets").await.unwrap());
        assert_eq!(None, remote.fetch("Gliders").await.unwrap());

        let forged = HttpRemote::new(&base, "ae@example.org", "forged");
        assert!(matches!(forged.list().await, Err(RemoteError::Status(401, _))));
    }
}
