/*!
`Store` methods for the read-mostly `schools` table.
*/
use tokio_postgres::Row;

use super::{is_unique_violation, DbError, Insertion, Store};
use crate::school::School;

fn school_from_row(row: &Row) -> Result<School, DbError> {
    Ok(School {
        abbr: row.try_get("abbr")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
    })
}

impl Store {
    pub async fn get_school(&self, abbr: &str) -> Result<Option<School>, DbError> {
        log::trace!("Store::get_school( {:?} ) called.", abbr);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM schools WHERE abbr = $1",
            &[&abbr]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(school_from_row(&row)?)),
        }
    }

    pub async fn get_schools(&self) -> Result<Vec<School>, DbError> {
        log::trace!("Store::get_schools() called.");

        let client = self.connect().await?;
        let rows = client.query("SELECT * FROM schools ORDER BY abbr", &[]).await?;

        rows.iter().map(school_from_row).collect()
    }

    pub async fn insert_school(&self, s: &School) -> Result<Insertion, DbError> {
        log::trace!("Store::insert_school( {:?} ) called.", &s.abbr);

        let client = self.connect().await?;
        match client.execute(
            "INSERT INTO schools (abbr, name, address) VALUES ($1, $2, $3)",
            &[&s.abbr, &s.name, &s.address]
        ).await {
            Ok(_) => Ok(Insertion::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(Insertion::Duplicate),
            Err(e) => Err(DbError::from(e).annotate("Error inserting school")),
        }
    }
}
