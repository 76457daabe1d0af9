//! Caller-supplied facts about the target environment.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{InstallError, Result};

/// A `key=value` fact, e.g. `kibana.version=8.9.2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assertion {
    pub key: String,
    pub value: String,
}

impl Assertion {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parse a `key=value` pair. The first `=` separates key from value.
    pub fn parse(input: &str) -> Result<Self> {
        let (key, value) = input
            .split_once('=')
            .ok_or_else(|| invalid(input, "expected KEY=VALUE"))?;

        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err(invalid(input, "key is empty"));
        }
        if value.is_empty() {
            return Err(invalid(input, "value is empty"));
        }

        Ok(Self::new(key, value))
    }
}

impl FromStr for Assertion {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Parse every `key=value` pair, failing on the first malformed one.
pub fn parse_assertions<I, S>(pairs: I) -> Result<Vec<Assertion>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|pair| Assertion::parse(pair.as_ref()))
        .collect()
}

fn invalid(input: &str, reason: &str) -> InstallError {
    InstallError::InvalidAssertion {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value() {
        let a = Assertion::parse("kibana.version=8.9.2").unwrap();
        assert_eq!(a.key, "kibana.version");
        assert_eq!(a.value, "8.9.2");
        assert_eq!(a.to_string(), "kibana.version=8.9.2");
    }

    #[test]
    fn trims_and_splits_on_first_equals() {
        let a: Assertion = " labels = a=b ".parse().unwrap();
        assert_eq!(a.key, "labels");
        assert_eq!(a.value, "a=b");
    }

    #[test]
    fn rejects_malformed_pairs() {
        for input in ["kibana.version", "=8.9.2", "kibana.version=", "  =  "] {
            let err = Assertion::parse(input).unwrap_err();
            assert!(
                matches!(err, InstallError::InvalidAssertion { .. }),
                "unexpected error for {input:?}: {err}"
            );
        }
    }

    #[test]
    fn parse_assertions_stops_on_error() {
        let ok = parse_assertions(["a=1", "b=2"]).unwrap();
        assert_eq!(ok.len(), 2);

        assert!(parse_assertions(["a=1", "broken"]).is_err());
        assert!(parse_assertions(Vec::<String>::new()).unwrap().is_empty());
    }
}
