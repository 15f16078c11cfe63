/*!
`Store` methods for the `users` and `keys` tables.
*/
use time::OffsetDateTime;
use tokio_postgres::Row;

use super::{is_unique_violation, DbError, Insertion, Store};
use crate::auth::SessionKey;
use crate::user::{Role, User};

fn user_from_row(row: &Row) -> Result<User, DbError> {
    log::trace!("user_from_row( {:?} ) called", row);

    let role_str: &str = row.try_get("role")?;
    let u = User {
        firstname: row.try_get("firstname")?,
        lastname: row.try_get("lastname")?,
        age: row.try_get("age")?,
        grade: row.try_get("grade")?,
        email: row.try_get("email")?,
        schoolname: row.try_get("schoolname")?,
        school_abbr: row.try_get("school_abbr")?,
        password: row.try_get("password")?,
        role: role_str.parse::<Role>()?,
        email_verified: row.try_get("email_verified")?,
    };

    Ok(u)
}

impl Store {
    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<User>, DbError> {
        log::trace!("Store::get_user_by_email( {:?} ) called.", email);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM users WHERE email = $1",
            &[&email]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(user_from_row(&row)?)),
        }
    }

    /// Inserts a new user. An existing user with the same email is reported
    /// as `Insertion::Duplicate` rather than an error, so a racing second
    /// registration comes back as a conflict.
    pub async fn insert_user(&self, u: &User) -> Result<Insertion, DbError> {
        log::trace!(
            "Store::insert_user( {:?} ({}) ) called.",
            &u.email, &u.role
        );

        let client = self.connect().await?;
        let res = client.execute(
            "INSERT INTO users (
                email, firstname, lastname, age, grade,
                schoolname, school_abbr, password, role, email_verified
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            &[
                &u.email, &u.firstname, &u.lastname, &u.age, &u.grade,
                &u.schoolname, &u.school_abbr, &u.password,
                &u.role.to_string(), &u.email_verified,
            ]
        ).await;

        match res {
            Ok(_) => {
                log::trace!("Inserted user {:?}.", &u.email);
                Ok(Insertion::Inserted)
            },
            Err(e) if is_unique_violation(&e) => {
                log::trace!("User {:?} already exists.", &u.email);
                Ok(Insertion::Duplicate)
            },
            Err(e) => Err(DbError::from(e).annotate("Error inserting user")),
        }
    }

    pub async fn count_users(&self) -> Result<usize, DbError> {
        log::trace!("Store::count_users() called.");

        let client = self.connect().await?;
        let row = client.query_one("SELECT COUNT(*) AS n FROM users", &[]).await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as usize)
    }

    /// Replaces whatever key `email` had.
    pub async fn set_key(
        &self,
        email: &str,
        key: &SessionKey,
    ) -> Result<(), DbError> {
        log::trace!("Store::set_key( {:?}, [ key ] ) called.", email);

        let client = self.connect().await?;
        client.execute(
            "INSERT INTO keys (email, key, issued) VALUES ($1, $2, $3)
                ON CONFLICT (email) DO UPDATE
                SET key = EXCLUDED.key, issued = EXCLUDED.issued",
            &[&email, &key.key, &key.issued]
        ).await
            .map_err(|e| DbError::from(e).annotate("Error storing session key"))?;

        Ok(())
    }

    pub async fn get_key(
        &self,
        email: &str,
    ) -> Result<Option<SessionKey>, DbError> {
        log::trace!("Store::get_key( {:?} ) called.", email);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT key, issued FROM keys WHERE email = $1",
            &[&email]
        ).await? {
            None => Ok(None),
            Some(row) => {
                let issued: OffsetDateTime = row.try_get("issued")?;
                Ok(Some(SessionKey { key: row.try_get("key")?, issued }))
            },
        }
    }
}
