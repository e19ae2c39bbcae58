pub mod db;

pub use db::{
    create_db, find_import_by_digest, get_account_transactions, get_category_patterns,
    get_existing_fit_ids, get_import_history, insert_ledger_transactions, record_import_history,
    save_category_pattern, DbPool, ImportHistoryEntry, NewImportHistory, StorageError,
    StoredCategoryPattern, StoredTransaction,
};
