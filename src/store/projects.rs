/*!
`Store` methods for remotely-saved Java projects.

Each project is one row; the file list is kept as a JSON array in a `TEXT`
column and always written whole.
*/
use time::OffsetDateTime;

use super::{DbError, Store};
use crate::project::{RemoteProject, SourceFile};

impl Store {
    pub async fn save_project(
        &self,
        owner: &str,
        project: &RemoteProject,
    ) -> Result<(), DbError> {
        log::trace!(
            "Store::save_project( {:?}, {:?} [ {} files ] ) called.",
            owner, &project.project, project.files.len()
        );

        let files_json = serde_json::to_string(&project.files)
            .map_err(|e| DbError(format!("Unable to serialize project files: {}", &e)))?;
        let now = OffsetDateTime::now_utc();

        let client = self.connect().await?;
        client.execute(
            "INSERT INTO projects (owner, name, files, modified)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (owner, name) DO UPDATE
                SET files = EXCLUDED.files, modified = EXCLUDED.modified",
            &[&owner, &project.project, &files_json, &now]
        ).await
            .map_err(|e| DbError::from(e).annotate("Error saving project"))?;

        Ok(())
    }

    pub async fn get_project_names(&self, owner: &str) -> Result<Vec<String>, DbError> {
        log::trace!("Store::get_project_names( {:?} ) called.", owner);

        let client = self.connect().await?;
        let rows = client.query(
            "SELECT name FROM projects WHERE owner = $1 ORDER BY modified DESC",
            &[&owner]
        ).await?;

        let mut names: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            names.push(row.try_get("name")?);
        }
        Ok(names)
    }

    pub async fn get_project(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<RemoteProject>, DbError> {
        log::trace!("Store::get_project( {:?}, {:?} ) called.", owner, name);

        let client = self.connect().await?;
        let row = match client.query_opt(
            "SELECT files FROM projects WHERE owner = $1 AND name = $2",
            &[&owner, &name]
        ).await? {
            None => { return Ok(None); },
            Some(row) => row,
        };

        let files_json: &str = row.try_get("files")?;
        let files: Vec<SourceFile> = serde_json::from_str(files_json)
            .map_err(|e| DbError(format!(
                "Stored files for project {:?} are unreadable: {}", name, &e
            )))?;

        Ok(Some(RemoteProject { project: name.to_owned(), files }))
    }
}
