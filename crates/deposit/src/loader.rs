//! Loads deposit records from inline JSON or a file.

use std::fs;

use tracing::debug;

use crate::{errors::DepositError, record::DepositRecord};

/// Shape of a JSON document, decided by its first non-whitespace character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Object,
    Array,
}

fn classify(input: &str) -> Option<Shape> {
    match input.trim_start().chars().next() {
        Some('{') => Some(Shape::Object),
        Some('[') => Some(Shape::Array),
        _ => None,
    }
}

/// Loads deposit records.
///
/// `input` is either a JSON object (a single deposit), a JSON array of deposits, or a path to
/// a file containing either of those.
pub fn load(input: &str) -> Result<Vec<DepositRecord>, DepositError> {
    let records = match classify(input) {
        Some(shape) => parse(input, shape)?,
        None => {
            let path = input.trim();
            let contents = fs::read_to_string(path).map_err(|e| {
                DepositError::MalformedInput(format!("failed to read deposit data file {path}: {e}"))
            })?;
            let shape = classify(&contents).ok_or_else(|| {
                DepositError::MalformedInput(format!(
                    "deposit data file {path} does not contain a JSON object or array"
                ))
            })?;
            debug!(%path, "loaded deposit data file");
            parse(&contents, shape)?
        }
    };

    if records.is_empty() {
        return Err(DepositError::EmptyInput);
    }
    debug!(count = records.len(), "parsed deposit data");
    Ok(records)
}

fn parse(data: &str, shape: Shape) -> Result<Vec<DepositRecord>, DepositError> {
    let malformed = |e: serde_json::Error| DepositError::MalformedInput(e.to_string());
    match shape {
        Shape::Object => Ok(vec![serde_json::from_str(data).map_err(malformed)?]),
        Shape::Array => serde_json::from_str(data).map_err(malformed),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const DEPOSIT: &str = r#"{
        "account": "Validators/1",
        "pubkey": "0xa99a76ed7796f7be22d5b7e85deeb7c5677e88e511e0b337618f8c4eb61349b4bf2d153f649f7b53359fe8b94a38e44c",
        "withdrawal_credentials": "0x00fad2a6bfb0e7f1f0f45460944fbd8dfa7f37da06a4d13b3983cc90bb46963b",
        "signature": "0xb7a757a4c506ac6ac5f2d23e065de7d00dc9f5a6a3f9610a8b60b65f166379139ae382c91ecbbf5c9fabc34b1cd2cf8f0211488d50d8754716d8e72e17c1a00b5d9b37cc73767946790ebe66cf9669abfc5c25c67e1e2d1c2e11429d149c25a2",
        "deposit_data_root": "0x9b1d6d5ec1c4a8c3e1c1a63e1a1ef6d86dc9c4e1dd36f5f6a5ed5e8a1ed4f3a2",
        "value": 32000000000,
        "version": 3
    }"#;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_single_object_equals_wrapped_array() {
        let single = load(DEPOSIT).unwrap();
        let wrapped = load(&format!("[{DEPOSIT}]")).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single, wrapped);
    }

    #[test]
    fn test_leading_whitespace_is_ignored() {
        let records = load(&format!("\n   {DEPOSIT}")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].account, "Validators/1");
    }

    #[test]
    fn test_array_of_deposits() {
        let records = load(&format!("[{DEPOSIT}, {DEPOSIT}]")).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let object = temp_file(DEPOSIT);
        let array = temp_file(&format!("[{DEPOSIT}]"));

        let from_object = load(object.path().to_str().unwrap()).unwrap();
        let from_array = load(array.path().to_str().unwrap()).unwrap();
        assert_eq!(from_object, from_array);
        assert_eq!(from_object, load(DEPOSIT).unwrap());
    }

    #[test]
    fn test_empty_array_is_rejected() {
        assert!(matches!(load("[]"), Err(DepositError::EmptyInput)));
        let file = temp_file("  []  ");
        assert!(matches!(
            load(file.path().to_str().unwrap()),
            Err(DepositError::EmptyInput)
        ));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(matches!(
            load("{\"pubkey\": "),
            Err(DepositError::MalformedInput(_))
        ));
        assert!(matches!(
            load("[{}, "),
            Err(DepositError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_missing_file_is_malformed() {
        assert!(matches!(
            load("/nonexistent/deposit-data.json"),
            Err(DepositError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_file_without_json_is_malformed() {
        let file = temp_file("pubkey=0x01");
        assert!(matches!(
            load(file.path().to_str().unwrap()),
            Err(DepositError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_missing_fields_are_deferred() {
        let records = load("{}").unwrap();
        assert_eq!(records, vec![DepositRecord::default()]);
    }
}
