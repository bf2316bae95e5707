//! The raw textual escape hatch.
//!
//! Next to the guided form, an operator can always edit the resource as
//! structured text. Serialization must round-trip the edited tree;
//! deserialization of operator-typed text falls back to a supplied value
//! instead of erroring, so half-typed input never tears down the editor.

use serde::{Serialize, de::DeserializeOwned};
use snafu::{ResultExt, Snafu};
use tracing::debug;

type Result<T, E = Error> = std::result::Result<T, E>;

/// The text format of the raw editor.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum TextFormat {
    #[default]
    Yaml,
    Json,
}

/// Represents every error which can be encountered while serializing the
/// edited tree for the raw editor.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize the edited resource as YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to serialize the edited resource as JSON"))]
    SerializeJson { source: serde_json::Error },
}

/// Serializes any [serializable](serde::Serialize) value for the raw editor.
/// YAML output is an explicit document with leading dashes (`---`).
pub fn to_text<T>(value: &T, format: TextFormat) -> Result<String>
where
    T: Serialize,
{
    match format {
        TextFormat::Yaml => {
            let body = serde_yaml::to_string(value).context(SerializeYamlSnafu)?;
            Ok(format!("---\n{body}"))
        }
        TextFormat::Json => serde_json::to_string_pretty(value).context(SerializeJsonSnafu),
    }
}

/// Deserializes raw editor input, falling back to `fallback` when the input
/// does not parse.
pub fn from_text_or<T>(input: &str, format: TextFormat, fallback: T) -> T
where
    T: DeserializeOwned,
{
    let parsed = match format {
        TextFormat::Yaml => serde_yaml::from_str(input).map_err(|err| err.to_string()),
        TextFormat::Json => serde_json::from_str(input).map_err(|err| err.to_string()),
    };

    match parsed {
        Ok(value) => value,
        Err(reason) => {
            debug!(%reason, "raw editor input does not parse, keeping the fallback value");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn yaml_round_trip() {
        let tree = json!({"spec": {"image": "demo", "replicas": 3}});

        let text = to_text(&tree, TextFormat::Yaml).expect("serialization succeeds");
        assert!(text.starts_with("---\n"));

        let parsed: Value = from_text_or(&text, TextFormat::Yaml, Value::Null);
        assert_eq!(parsed, tree);
    }

    #[test]
    fn json_round_trip() {
        let tree = json!({"spec": {"image": "demo"}});

        let text = to_text(&tree, TextFormat::Json).expect("serialization succeeds");
        let parsed: Value = from_text_or(&text, TextFormat::Json, Value::Null);
        assert_eq!(parsed, tree);
    }

    #[test]
    fn unparseable_input_falls_back() {
        let fallback = json!({"spec": {"image": "demo"}});

        let parsed = from_text_or("{not yaml: [", TextFormat::Yaml, fallback.clone());
        assert_eq!(parsed, fallback);
    }
}
