//! Identifier input: `--id` values followed by the contents of `--ids-file`.

use std::fs;
use std::path::Path;

use vbd_sharding::LocatorError;

/// Collect the identifiers to process, in input order.
///
/// Fails when none are given or the file is not a JSON list of strings.
pub fn load_identifiers(
    ids: &[String],
    ids_file: Option<&Path>,
) -> Result<Vec<String>, LocatorError> {
    let mut identifiers = ids.to_vec();

    if let Some(path) = ids_file {
        let content = fs::read_to_string(path).map_err(|e| {
            LocatorError::InvalidInput(format!("cannot read ids file {}: {e}", path.display()))
        })?;
        let listed: Vec<String> = serde_json::from_str(&content).map_err(|e| {
            LocatorError::InvalidInput(format!(
                "ids file {} must be a JSON list of strings: {e}",
                path.display()
            ))
        })?;
        identifiers.extend(listed);
    }

    if identifiers.is_empty() {
        return Err(LocatorError::InvalidInput(
            "no document identifiers given (use --id or --ids-file)".to_string(),
        ));
    }
    Ok(identifiers)
}
