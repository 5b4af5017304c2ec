//! Serialize u64 fields as strings so browser consumers never truncate them.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Numeric(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text.parse::<u64>().map_err(D::Error::custom),
        Raw::Numeric(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Holder {
        #[serde(with = "super")]
        session: u64,
    }

    #[test]
    fn serializes_as_string() {
        let encoded = serde_json::to_string(&Holder { session: 42 }).expect("serialize");
        assert_eq!(encoded, r#"{"session":"42"}"#);
    }

    #[test]
    fn accepts_string_and_number_on_decode() {
        let from_text: Holder = serde_json::from_str(r#"{"session":"7"}"#).expect("string");
        let from_number: Holder = serde_json::from_str(r#"{"session":7}"#).expect("number");
        assert_eq!(from_text, from_number);
    }
}
