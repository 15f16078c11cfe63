/*!
An in-process `AccountStore`, for tests and for running without Postgres
(`in_memory = true` in the config file). Nothing survives a restart.
*/
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AccountStore, DbError, Insertion};
use crate::{
    auth::SessionKey,
    project::RemoteProject,
    school::School,
    user::User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    schools: HashMap<String, School>,
    keys: HashMap<String, SessionKey>,
    /// Per owner, most recently saved first.
    projects: HashMap<String, Vec<RemoteProject>>,
}

#[derive(Default)]
pub struct MemStore {
    tables: RwLock<Tables>,
}

impl MemStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl AccountStore for MemStore {
    async fn ensure_db_schema(&self) -> Result<(), DbError> {
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        log::trace!("MemStore::get_user_by_email( {:?} ) called.", email);
        Ok(self.tables.read().await.users.get(email).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<Insertion, DbError> {
        log::trace!("MemStore::insert_user( {:?} ) called.", &user.email);

        let mut tables = self.tables.write().await;
        if tables.users.contains_key(&user.email) {
            return Ok(Insertion::Duplicate);
        }
        if !tables.schools.contains_key(&user.school_abbr) {
            return Err(DbError(format!(
                "School {:?} does not exist.", &user.school_abbr
            )));
        }
        tables.users.insert(user.email.clone(), user.clone());
        Ok(Insertion::Inserted)
    }

    async fn count_users(&self) -> Result<usize, DbError> {
        Ok(self.tables.read().await.users.len())
    }

    async fn get_school(&self, abbr: &str) -> Result<Option<School>, DbError> {
        log::trace!("MemStore::get_school( {:?} ) called.", abbr);
        Ok(self.tables.read().await.schools.get(abbr).cloned())
    }

    async fn get_schools(&self) -> Result<Vec<School>, DbError> {
        let mut schools: Vec<School> = self.tables.read().await
            .schools.values()
            .cloned()
            .collect();
        schools.sort_by(|a, b| a.abbr.cmp(&b.abbr));
        Ok(schools)
    }

    async fn insert_school(&self, school: &School) -> Result<Insertion, DbError> {
        let mut tables = self.tables.write().await;
        if tables.schools.contains_key(&school.abbr) {
            return Ok(Insertion::Duplicate);
        }
        tables.schools.insert(school.abbr.clone(), school.clone());
        Ok(Insertion::Inserted)
    }

    async fn set_key(&self, email: &str, key: &SessionKey) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(email) {
            return Err(DbError(format!("There is no user with email {:?}.", email)));
        }
        tables.keys.insert(email.to_owned(), key.clone());
        Ok(())
    }

    async fn get_key(&self, email: &str) -> Result<Option<SessionKey>, DbError> {
        Ok(self.tables.read().await.keys.get(email).cloned())
    }

    async fn save_project(&self, owner: &str, project: &RemoteProject) -> Result<(), DbError> {
        log::trace!(
            "MemStore::save_project( {:?}, {:?} ) called.",
            owner, &project.project
        );

        let mut tables = self.tables.write().await;
        let projects = tables.projects.entry(owner.to_owned()).or_default();
        projects.retain(|p| p.project != project.project);
        projects.insert(0, project.clone());
        Ok(())
    }

    async fn get_project_names(&self, owner: &str) -> Result<Vec<String>, DbError> {
        let tables = self.tables.read().await;
        let names = match tables.projects.get(owner) {
            Some(projects) => projects.iter().map(|p| p.project.clone()).collect(),
            None => Vec::new(),
        };
        Ok(names)
    }

    async fn get_project(&self, owner: &str, name: &str) -> Result<Option<RemoteProject>, DbError> {
        let tables = self.tables.read().await;
        let p = tables.projects.get(owner)
            .and_then(|projects| projects.iter().find(|p| p.project == name))
            .cloned();
        Ok(p)
    }
}
