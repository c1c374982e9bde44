//! One-time import of file-backed collections into SQLite.

use std::path::Path;

use content::{Activity, Event, Photo};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::records::SqlRecord;
use super::store::insert;
use crate::persistence::{FileStore, PersistenceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub skipped: bool,
    pub activities: u64,
    pub events: u64,
    pub photos: u64,
}

impl ImportReport {
    fn has_data(&self) -> bool {
        self.activities > 0 || self.events > 0 || self.photos > 0
    }
}

/// Copy `activities.json`, `events.json` and `photos.json` from `data_dir`
/// into the database in a single transaction.
///
/// Skipped entirely when any table already holds rows, so running it twice
/// never duplicates data.
pub async fn import_json_to_sqlite(
    pool: &SqlitePool,
    data_dir: &Path,
) -> Result<ImportReport, PersistenceError> {
    info!(data_dir = %data_dir.display(), "Starting JSON to SQLite import");

    let existing = sqlite_counts(pool).await?;
    if existing.has_data() {
        info!(
            activities = existing.activities,
            events = existing.events,
            photos = existing.photos,
            "SQLite already contains data, skipping JSON import"
        );
        return Ok(ImportReport {
            skipped: true,
            ..existing
        });
    }

    let activities = FileStore::<Activity>::in_dir(data_dir, None).load()?;
    let events = FileStore::<Event>::in_dir(data_dir, None).load()?;
    let photos = FileStore::<Photo>::in_dir(data_dir, None).load()?;

    info!(
        activities = activities.len(),
        events = events.len(),
        photos = photos.len(),
        "Loaded JSON records for import"
    );

    let mut tx = pool.begin().await?;
    insert_all(&mut tx, &activities).await?;
    insert_all(&mut tx, &events).await?;
    insert_all(&mut tx, &photos).await?;
    tx.commit().await?;

    let report = ImportReport {
        skipped: false,
        activities: activities.len() as u64,
        events: events.len() as u64,
        photos: photos.len() as u64,
    };

    info!(
        activities = report.activities,
        events = report.events,
        photos = report.photos,
        "JSON to SQLite import completed"
    );

    Ok(report)
}

async fn insert_all<R: SqlRecord>(
    conn: &mut SqliteConnection,
    records: &[R],
) -> Result<(), PersistenceError> {
    for record in records {
        insert(conn, record).await?;
    }
    Ok(())
}

async fn sqlite_counts(pool: &SqlitePool) -> Result<ImportReport, PersistenceError> {
    Ok(ImportReport {
        skipped: false,
        activities: table_count(pool, Activity::TABLE).await?,
        events: table_count(pool, Event::TABLE).await?,
        photos: table_count(pool, Photo::TABLE).await?,
    })
}

async fn table_count(pool: &SqlitePool, table: &str) -> Result<u64, PersistenceError> {
    let query = format!("SELECT COUNT(*) FROM {table}");
    let row: (i64,) = sqlx::query_as(&query).fetch_one(pool).await?;
    Ok(row.0 as u64)
}
