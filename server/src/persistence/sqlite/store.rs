//! Generic SQLite implementation of [`PersistenceBackend`].

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, SqliteConnection, SqlitePool, Type};

use super::records::{Cells, SqlRecord};
use crate::persistence::traits::{PersistenceBackend, Removal};
use crate::persistence::PersistenceError;

/// SQLite implementation of [`PersistenceBackend`] for one table.
///
/// Each operation touches a single row; `update` and `delete` read and
/// write inside one transaction.
pub struct SqliteStore<R> {
    pool: SqlitePool,
    _phantom: PhantomData<R>,
}

impl<R: SqlRecord> SqliteStore<R> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }

    fn select_sql() -> String {
        format!(
            "SELECT id, created_at, updated_at, {} FROM {}",
            R::COLUMNS.join(", "),
            R::TABLE
        )
    }

    async fn fetch_one(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> Result<Option<R>, PersistenceError> {
        let sql = format!("{} WHERE id = ?", Self::select_sql());
        let row = sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await?;
        row.map(|row| decode_row::<R>(&row)).transpose()
    }
}

/// Read one column. A value that does not decode is reported as a corrupt
/// row rather than a driver failure.
fn column<'r, T>(
    row: &'r SqliteRow,
    table: &'static str,
    name: &str,
) -> Result<T, PersistenceError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name).map_err(|e| match e {
        sqlx::Error::ColumnDecode { source, .. } => PersistenceError::Corrupt {
            table,
            reason: format!("column {name}: {source}"),
        },
        e => e.into(),
    })
}

fn decode_row<R: SqlRecord>(row: &SqliteRow) -> Result<R, PersistenceError> {
    let id: String = column(row, R::TABLE, "id")?;
    let created_at: Option<DateTime<Utc>> = column(row, R::TABLE, "created_at")?;
    let updated_at: Option<DateTime<Utc>> = column(row, R::TABLE, "updated_at")?;
    let values = R::COLUMNS
        .iter()
        .map(|name| column::<Option<String>>(row, R::TABLE, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut cells = Cells::new(R::COLUMNS, values);
    R::from_cells(id, &mut cells, created_at, updated_at)
        .map_err(|reason| PersistenceError::Corrupt {
            table: R::TABLE,
            reason,
        })
}

/// Insert one record. Shared with the JSON importer.
pub(super) async fn insert<R: SqlRecord>(
    conn: &mut SqliteConnection,
    record: &R,
) -> Result<(), PersistenceError> {
    let placeholders = vec!["?"; R::COLUMNS.len() + 3].join(", ");
    let sql = format!(
        "INSERT INTO {} (id, created_at, updated_at, {}) VALUES ({placeholders})",
        R::TABLE,
        R::COLUMNS.join(", ")
    );

    let mut query = sqlx::query(&sql)
        .bind(record.id())
        .bind(record.created_at())
        .bind(record.updated_at());
    for value in record.values() {
        query = query.bind(value);
    }

    match query.execute(&mut *conn).await {
        Ok(_) => Ok(()),
        Err(e)
            if e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation()) =>
        {
            Err(PersistenceError::Duplicate(record.id().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

impl<R: SqlRecord> PersistenceBackend<R> for SqliteStore<R> {
    async fn list(&self) -> Result<Vec<R>, PersistenceError> {
        let sql = format!("{} ORDER BY rowid", Self::select_sql());
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(decode_row::<R>).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<R>, PersistenceError> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_one(&mut conn, id).await
    }

    async fn create(&self, record: &R) -> Result<(), PersistenceError> {
        let mut conn = self.pool.acquire().await?;
        insert(&mut conn, record).await
    }

    async fn update(&self, id: &str, patch: &R::Patch) -> Result<R, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut record) = Self::fetch_one(&mut tx, id).await? else {
            return Err(PersistenceError::NotFound(id.to_string()));
        };
        record.apply(patch);
        record.touch(Utc::now());

        let assignments = R::COLUMNS
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments}, updated_at = ? WHERE id = ?",
            R::TABLE
        );
        let mut query = sqlx::query(&sql);
        for value in record.values() {
            query = query.bind(value);
        }
        query
            .bind(record.updated_at())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<Removal<R>, PersistenceError> {
        let mut tx = self.pool.begin().await?;
        let Some(record) = Self::fetch_one(&mut tx, id).await? else {
            return Ok(Removal::Absent);
        };
        let sql = format!("DELETE FROM {} WHERE id = ?", R::TABLE);
        sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(Removal::Removed(record))
    }

    async fn clear(&self) -> Result<(), PersistenceError> {
        let sql = format!("DELETE FROM {}", R::TABLE);
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}
