//! Transaction id recovery from a `start-transaction` log
//!
//! The grammar is exactly one line starting with `Started transaction <digits>`.
//! The first such line wins; anything else in the log is ignored.

use crate::api::TransactionId;
use crate::error::{CliError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static STARTED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Started transaction (\d+)").expect("valid transaction line regex"));

/// The line printed by `transaction start`, and parsed back by later stages
pub fn started_line(id: TransactionId) -> String {
    format!("Started transaction {}", id)
}

/// Extract the transaction id from log text
pub fn parse_transaction_id(text: &str) -> Result<TransactionId> {
    let digits = text
        .lines()
        .find_map(|line| STARTED_LINE.captures(line))
        .and_then(|captures| captures.get(1))
        .ok_or_else(|| CliError::config("no 'Started transaction <id>' line found"))?;

    digits.as_str().parse().map_err(|_| {
        CliError::config(format!(
            "transaction id '{}' is out of range",
            digits.as_str()
        ))
    })
}

/// Read a log file and extract its transaction id
pub fn read_transaction_id(path: &Path) -> Result<TransactionId> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::config(format!(
            "cannot read transaction log '{}': {}",
            path.display(),
            e
        ))
    })?;

    parse_transaction_id(&text).map_err(|e| {
        CliError::config(format!("{} (in '{}')", e, path.display()))
    })
}
