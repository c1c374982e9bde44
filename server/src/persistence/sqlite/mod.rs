//! SQLite-backed store.
//!
//! ## Database setup
//!
//! [`Database`] wraps a `sqlx::SqlitePool` configured with:
//! - **WAL mode**: one writer and multiple concurrent readers.
//! - **Embedded migrations**: `sqlx::migrate!` runs `migrations/*.sql`
//!   when [`Database::open`] is called. The schema is idempotent.
//!
//! ## Store
//!
//! [`SqliteStore<R>`] is generic over the resource kind. Each kind
//! describes its table through [`SqlRecord`]: the table name, the ordered
//! kind-specific columns, and how to go to and from column values. All
//! kind columns are `TEXT`; `id`, `created_at` and `updated_at` are shared.
//!
//! ## JSON import
//!
//! [`import_json_to_sqlite`] performs a one-time, idempotent import of the
//! file-backed collections. JSON files are not deleted.

mod database;
mod import;
mod records;
mod store;

pub use database::Database;
pub use import::{import_json_to_sqlite, ImportReport};
pub use records::SqlRecord;
pub use store::SqliteStore;
