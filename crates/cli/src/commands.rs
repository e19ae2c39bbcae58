use anyhow::{Context, Result};
use saldo_core::{AccountId, CategoryId, UserId};
use saldo_import::{
    apply_suggestions, ofx, prepare, selected_transactions, summarize, CategoryPattern,
    ImportSummary,
};
use saldo_storage::{DbPool, NewImportHistory};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;

use crate::config::Config;

pub async fn open_db(config: &Config) -> Result<DbPool> {
    let path = config.database_path()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    saldo_storage::create_db(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))
}

async fn read_statement_file(file: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))
}

/// Lowercase hex SHA-256 of the raw file.
pub fn file_digest(data: &[u8]) -> String {
    let hash: [u8; 32] = Sha256::digest(data).into();
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

pub async fn validate(file: &Path) -> Result<()> {
    let data = read_statement_file(file).await?;
    let content = String::from_utf8_lossy(&data);
    match ofx::validate(&content) {
        Ok(()) => {
            println!("valid");
            Ok(())
        }
        Err(reason) => anyhow::bail!("{}: {reason}", file.display()),
    }
}

pub async fn inspect(file: &Path) -> Result<()> {
    let data = read_statement_file(file).await?;
    let statement = ofx::parse(&data).with_context(|| format!("Failed to parse {}", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&statement)?);
    Ok(())
}

/// Config patterns first, then the user's stored patterns.
async fn category_patterns(
    config: &Config,
    pool: Option<&DbPool>,
    user: UserId,
) -> Result<Vec<CategoryPattern>> {
    let stored = match pool {
        Some(pool) => saldo_storage::get_category_patterns(pool, user).await?,
        None => Vec::new(),
    };
    Ok(config
        .category_patterns
        .iter()
        .cloned()
        .chain(stored.into_iter().map(|p| CategoryPattern {
            pattern: p.pattern,
            category_id: p.category_id,
        }))
        .collect())
}

pub struct ImportOutcome {
    pub summary: ImportSummary,
    /// Blocks dropped by the parser.
    pub skipped: usize,
    pub inserted: u64,
    pub history_id: Option<i64>,
}

pub async fn import(
    config: &Config,
    file: &Path,
    account: AccountId,
    user: UserId,
    dry_run: bool,
) -> Result<ImportOutcome> {
    let data = read_statement_file(file).await?;
    let statement = ofx::parse(&data).with_context(|| format!("Failed to import {}", file.display()))?;
    let digest = file_digest(&data);

    // A dry run against a database that does not exist yet has nothing to
    // compare with and must not create one.
    let pool = if dry_run && !tokio::fs::try_exists(config.database_path()?).await.unwrap_or(false) {
        tracing::debug!("no database yet, previewing without stored transactions");
        None
    } else {
        Some(open_db(config).await?)
    };

    let mut existing = HashSet::new();
    if let Some(pool) = &pool {
        if let Some(previous) = saldo_storage::find_import_by_digest(pool, account, user, &digest).await? {
            tracing::warn!(
                previous_import = previous.id,
                at = %previous.created_at,
                "this file was imported before; already stored transactions will be skipped"
            );
        }
        existing = saldo_storage::get_existing_fit_ids(pool, account, user).await?;
    }

    let mut candidates = prepare(&statement, &existing);
    let patterns = category_patterns(config, pool.as_ref(), user).await?;
    let categorized = apply_suggestions(&mut candidates, &patterns);
    let summary = summarize(&candidates);

    tracing::info!(
        account = %account,
        total = summary.total,
        duplicates = summary.duplicates,
        skipped = statement.skipped,
        categorized,
        "prepared statement import"
    );

    let pool = match pool {
        Some(pool) if !dry_run => pool,
        _ => {
            println!("{}", serde_json::to_string_pretty(&candidates)?);
            return Ok(ImportOutcome {
                summary,
                skipped: statement.skipped,
                inserted: 0,
                history_id: None,
            });
        }
    };

    let rows = selected_transactions(&candidates, user, account);
    let inserted = saldo_storage::insert_ledger_transactions(&pool, &rows).await?;

    let history_id = saldo_storage::record_import_history(
        &pool,
        &NewImportHistory {
            user_id: user,
            account_id: account,
            file_name: file.file_name().map(|n| n.to_string_lossy().into_owned()),
            file_digest: Some(digest),
            total_count: summary.total as i64,
            imported_count: inserted as i64,
            duplicate_count: summary.duplicates as i64,
            skipped_count: statement.skipped as i64,
        },
    )
    .await?;

    Ok(ImportOutcome {
        summary,
        skipped: statement.skipped,
        inserted,
        history_id: Some(history_id),
    })
}

pub async fn history(config: &Config, account: AccountId, user: UserId) -> Result<()> {
    let pool = open_db(config).await?;
    let entries = saldo_storage::get_import_history(&pool, account, user).await?;
    if entries.is_empty() {
        println!("No imports for account {account}");
        return Ok(());
    }
    for e in entries {
        println!(
            "{}  {}  total={} imported={} duplicates={} skipped={}",
            e.created_at.format("%Y-%m-%d %H:%M"),
            e.file_name.as_deref().unwrap_or("-"),
            e.total_count,
            e.imported_count,
            e.duplicate_count,
            e.skipped_count,
        );
    }
    Ok(())
}

pub async fn add_pattern(config: &Config, user: UserId, pattern: &str, category: CategoryId) -> Result<()> {
    anyhow::ensure!(!pattern.trim().is_empty(), "pattern must not be blank");
    let pool = open_db(config).await?;
    saldo_storage::save_category_pattern(&pool, user, pattern.trim(), category).await?;
    println!("Saved pattern '{}' -> category {category}", pattern.trim());
    Ok(())
}

pub async fn list_patterns(config: &Config, user: UserId) -> Result<()> {
    let pool = open_db(config).await?;
    for p in &config.category_patterns {
        println!("config  '{}' -> {}", p.pattern, p.category_id);
    }
    for p in saldo_storage::get_category_patterns(&pool, user).await? {
        println!("{:>6}  '{}' -> {}", p.position, p.pattern, p.category_id);
    }
    Ok(())
}
