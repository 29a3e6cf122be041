//! Ingest service endpoint URL builders

use crate::api::types::{TransactionId, WorkerLocation};

fn base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Build service version URL
pub fn version_url(base_url: &str) -> String {
    format!("{}/meta/version", base(base_url))
}

/// Build database creation URL
pub fn database_url(base_url: &str) -> String {
    format!("{}/ingest/database", base(base_url))
}

/// Build database publication URL
pub fn database_publish_url(base_url: &str, database: &str, consolidate_secondary_index: bool) -> String {
    format!(
        "{}/ingest/database/{}?consolidate-secondary-index={}",
        base(base_url),
        urlencoding::encode(database),
        flag(consolidate_secondary_index)
    )
}

/// Build table creation URL
pub fn table_url(base_url: &str) -> String {
    format!("{}/ingest/table", base(base_url))
}

/// Build transaction start URL
pub fn transaction_url(base_url: &str) -> String {
    format!("{}/ingest/trans", base(base_url))
}

/// Build commit/abort URL for a transaction
pub fn transaction_finish_url(
    base_url: &str,
    id: TransactionId,
    abort: bool,
    build_secondary_index: bool,
) -> String {
    format!(
        "{}/ingest/trans/{}?abort={}&build-secondary-index={}",
        base(base_url),
        id,
        flag(abort),
        flag(build_secondary_index)
    )
}

/// Build chunk allocation URL
pub fn chunk_url(base_url: &str) -> String {
    format!("{}/ingest/chunk", base(base_url))
}

/// Build the file-ingest URL on a worker
pub fn worker_file_url(worker: &WorkerLocation) -> String {
    format!("{}/ingest/file", worker.base_url())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_urls() {
        assert_eq!(
            database_url("http://qserv-master:25080/"),
            "http://qserv-master:25080/ingest/database"
        );
        assert_eq!(
            database_publish_url("http://qserv-master:25080", "hsc rc2", true),
            "http://qserv-master:25080/ingest/database/hsc%20rc2?consolidate-secondary-index=1"
        );
        assert_eq!(version_url("http://h:1"), "http://h:1/meta/version");
    }

    #[test]
    fn test_transaction_finish_url() {
        assert_eq!(
            transaction_finish_url("http://h:25080", 99, false, true),
            "http://h:25080/ingest/trans/99?abort=0&build-secondary-index=1"
        );
        assert_eq!(
            transaction_finish_url("http://h:25080", 99, true, false),
            "http://h:25080/ingest/trans/99?abort=1&build-secondary-index=0"
        );
    }

    #[test]
    fn test_worker_file_url() {
        let worker = WorkerLocation::new("worker-3", 25004);
        assert_eq!(worker_file_url(&worker), "http://worker-3:25004/ingest/file");
    }
}
