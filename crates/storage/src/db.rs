use chrono::{DateTime, Utc};
use saldo_core::{AccountId, CategoryId, Direction, Money, NewLedgerTransaction, UserId};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Amount out of range: {0}")]
    AmountOutOfRange(String),
    #[error("Transaction {id} has an invalid direction: '{value}'")]
    InvalidDirection { id: i64, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTransaction {
    pub id: i64,
    pub fit_id: Option<String>,
    pub date: String,
    pub description: String,
    pub memo: Option<String>,
    pub amount: Money,
    pub direction: Direction,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewImportHistory {
    pub user_id: UserId,
    pub account_id: AccountId,
    pub file_name: Option<String>,
    /// SHA-256 hex digest of the imported file.
    pub file_digest: Option<String>,
    pub total_count: i64,
    pub imported_count: i64,
    pub duplicate_count: i64,
    pub skipped_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportHistoryEntry {
    pub id: i64,
    pub user_id: UserId,
    pub account_id: AccountId,
    pub file_name: Option<String>,
    pub file_digest: Option<String>,
    pub total_count: i64,
    pub imported_count: i64,
    pub duplicate_count: i64,
    pub skipped_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCategoryPattern {
    pub id: i64,
    pub pattern: String,
    pub category_id: CategoryId,
    pub position: i64,
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            fit_id TEXT,
            date TEXT NOT NULL,
            description TEXT NOT NULL,
            memo TEXT,
            amount_cents INTEGER NOT NULL,
            direction TEXT NOT NULL,
            category_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_fit_id
            ON transactions (user_id, account_id, fit_id)
            WHERE fit_id IS NOT NULL
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            file_name TEXT,
            file_digest TEXT,
            total_count INTEGER NOT NULL,
            imported_count INTEGER NOT NULL,
            duplicate_count INTEGER NOT NULL,
            skipped_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS category_patterns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            pattern TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            UNIQUE (user_id, pattern)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Every FITID already stored for the account, for duplicate checks.
pub async fn get_existing_fit_ids(
    pool: &DbPool,
    account_id: AccountId,
    user_id: UserId,
) -> Result<HashSet<String>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT fit_id FROM transactions WHERE account_id = ? AND user_id = ? AND fit_id IS NOT NULL",
    )
    .bind(account_id.0)
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(fit_id,)| fit_id).collect())
}

/// Inserts all rows in one database transaction and returns how many were
/// written. Rows whose FITID is already stored for the same user and
/// account are ignored.
pub async fn insert_ledger_transactions(
    pool: &DbPool,
    rows: &[NewLedgerTransaction],
) -> Result<u64, StorageError> {
    let mut tx = pool.begin().await?;
    let mut inserted = 0;

    for row in rows {
        let amount_cents = row
            .amount
            .to_cents()
            .ok_or_else(|| StorageError::AmountOutOfRange(row.amount.to_string()))?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO transactions (user_id, account_id, fit_id, date, description, memo, amount_cents, direction, category_id) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(row.user_id.0)
        .bind(row.account_id.0)
        .bind(&row.fit_id)
        .bind(&row.date)
        .bind(&row.description)
        .bind(&row.memo)
        .bind(amount_cents)
        .bind(row.direction.as_str())
        .bind(row.category_id.map(|c| c.0))
        .execute(&mut *tx)
        .await?;

        inserted += result.rows_affected();
    }

    tx.commit().await?;

    if inserted < rows.len() as u64 {
        tracing::info!(
            ignored = rows.len() as u64 - inserted,
            "skipped rows with an already stored FITID"
        );
    }

    Ok(inserted)
}

type TransactionRow = (i64, Option<String>, String, String, Option<String>, i64, String, Option<i64>);

pub async fn get_account_transactions(
    pool: &DbPool,
    account_id: AccountId,
    user_id: UserId,
) -> Result<Vec<StoredTransaction>, StorageError> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT id, fit_id, date, description, memo, amount_cents, direction, category_id FROM transactions WHERE account_id = ? AND user_id = ? ORDER BY date DESC, id"
    )
    .bind(account_id.0)
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            let direction = r
                .6
                .parse::<Direction>()
                .map_err(|_| StorageError::InvalidDirection { id: r.0, value: r.6.clone() })?;
            Ok(StoredTransaction {
                id: r.0,
                fit_id: r.1,
                date: r.2,
                description: r.3,
                memo: r.4,
                amount: Money::from_cents(r.5),
                direction,
                category_id: r.7.map(CategoryId),
            })
        })
        .collect()
}

pub async fn record_import_history(
    pool: &DbPool,
    entry: &NewImportHistory,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO import_history (user_id, account_id, file_name, file_digest, total_count, imported_count, duplicate_count, skipped_count, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(entry.user_id.0)
    .bind(entry.account_id.0)
    .bind(&entry.file_name)
    .bind(&entry.file_digest)
    .bind(entry.total_count)
    .bind(entry.imported_count)
    .bind(entry.duplicate_count)
    .bind(entry.skipped_count)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

type HistoryRow = (
    i64,
    i64,
    i64,
    Option<String>,
    Option<String>,
    i64,
    i64,
    i64,
    i64,
    DateTime<Utc>,
);

const HISTORY_COLUMNS: &str = "id, user_id, account_id, file_name, file_digest, total_count, imported_count, duplicate_count, skipped_count, created_at";

fn history_entry(r: HistoryRow) -> ImportHistoryEntry {
    ImportHistoryEntry {
        id: r.0,
        user_id: UserId(r.1),
        account_id: AccountId(r.2),
        file_name: r.3,
        file_digest: r.4,
        total_count: r.5,
        imported_count: r.6,
        duplicate_count: r.7,
        skipped_count: r.8,
        created_at: r.9,
    }
}

/// Newest first.
pub async fn get_import_history(
    pool: &DbPool,
    account_id: AccountId,
    user_id: UserId,
) -> Result<Vec<ImportHistoryEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, HistoryRow>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM import_history WHERE account_id = ? AND user_id = ? ORDER BY id DESC"
    ))
    .bind(account_id.0)
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(history_entry).collect())
}

/// The most recent import of a file with this digest, if any.
pub async fn find_import_by_digest(
    pool: &DbPool,
    account_id: AccountId,
    user_id: UserId,
    digest: &str,
) -> Result<Option<ImportHistoryEntry>, sqlx::Error> {
    let row = sqlx::query_as::<_, HistoryRow>(&format!(
        "SELECT {HISTORY_COLUMNS} FROM import_history WHERE account_id = ? AND user_id = ? AND file_digest = ? ORDER BY id DESC LIMIT 1"
    ))
    .bind(account_id.0)
    .bind(user_id.0)
    .bind(digest)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(history_entry))
}

/// Appends a pattern at the end of the user's list. Saving an existing
/// pattern again only changes its category.
pub async fn save_category_pattern(
    pool: &DbPool,
    user_id: UserId,
    pattern: &str,
    category_id: CategoryId,
) -> Result<i64, sqlx::Error> {
    let (id,) = sqlx::query_as::<_, (i64,)>(
        r#"
        INSERT INTO category_patterns (user_id, pattern, category_id, position)
        VALUES (?, ?, ?, (SELECT COALESCE(MAX(position), 0) + 1 FROM category_patterns WHERE user_id = ?))
        ON CONFLICT (user_id, pattern) DO UPDATE SET category_id = excluded.category_id
        RETURNING id
        "#,
    )
    .bind(user_id.0)
    .bind(pattern)
    .bind(category_id.0)
    .bind(user_id.0)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

pub async fn get_category_patterns(
    pool: &DbPool,
    user_id: UserId,
) -> Result<Vec<StoredCategoryPattern>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, String, i64, i64)>(
        "SELECT id, pattern, category_id, position FROM category_patterns WHERE user_id = ? ORDER BY position, id",
    )
    .bind(user_id.0)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| StoredCategoryPattern {
            id: r.0,
            pattern: r.1,
            category_id: CategoryId(r.2),
            position: r.3,
        })
        .collect())
}
