use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs;

/// Reads `file_path` and parses it as JSON into `T`.
pub fn parse_json_file<T: DeserializeOwned>(file_path: &str) -> Result<T> {
    let data = fs::read_to_string(file_path).map_err(|e| Error::ConfigurationError { error: format!("reading {file_path}: {e}") })?;
    let parsed: T = serde_json::from_str(&data)?;
    Ok(parsed)
}
