use std::collections::HashMap;

/// A malformed settings string. Configuration-time, never sent to clients.
#[derive(Debug, PartialEq, Eq)]
pub struct SettingsError {
    line: String,
}

impl SettingsError {
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "settings line is missing '=': {:?}", self.line)
    }
}

impl std::error::Error for SettingsError {}

/// Parse a multi-line `key = value` settings string into a map, running
/// `value_type` on every value. `None` and blank lines yield nothing.
pub fn asdict<T, F>(setting: Option<&str>, value_type: F) -> Result<HashMap<String, T>, SettingsError>
where
    F: Fn(&str) -> T,
{
    let mut result = HashMap::new();
    let Some(setting) = setting else {
        return Ok(result);
    };

    for line in setting.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(SettingsError { line: line.to_owned() });
        };
        result.insert(key.trim().to_owned(), value_type(value.trim()));
    }
    Ok(result)
}

const TRUTHY: [&str; 6] = ["1", "true", "yes", "on", "y", "t"];

/// The host boolean convention: a known truthy token is `true`, anything
/// else is `false`. Case-insensitive.
pub fn asbool(value: &str) -> bool {
    TRUTHY.contains(&value.trim().to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::{asbool, asdict};

    #[test]
    fn test_asdict_parses_lines() {
        let setting = "
            alpha = one
            beta=two

            gamma =  three
        ";
        let parsed = asdict(Some(setting), str::to_owned).unwrap();

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed["alpha"], "one");
        assert_eq!(parsed["beta"], "two");
        assert_eq!(parsed["gamma"], "three");
    }

    #[test]
    fn test_asdict_applies_value_type() {
        let parsed = asdict(Some("retries = 3"), |value| value.parse::<u32>().unwrap()).unwrap();
        assert_eq!(parsed["retries"], 3);
    }

    #[test]
    fn test_asdict_missing_setting() {
        let parsed = asdict(None, str::to_owned).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_asdict_rejects_line_without_separator() {
        let error = asdict(Some("no separator here"), str::to_owned).unwrap_err();
        assert_eq!(error.line(), "no separator here");
    }

    #[test]
    fn test_asbool_tokens() {
        for token in ["1", "true", "TRUE", "True", "yes", "on", "y", "t", " true "] {
            assert!(asbool(token), "{token:?} should be truthy");
        }
        for token in ["0", "false", "FALSE", "no", "off", "n", "f", "", "banana"] {
            assert!(!asbool(token), "{token:?} should be falsy");
        }
    }
}
