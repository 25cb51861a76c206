//! Cairo serde encoding of constructor arguments.

use serde::{Deserialize, Serialize};

use crate::felt::{Felt, SHORT_STRING_MAX_LEN};

/// A typed constructor argument value.
///
/// Serialized externally tagged (`{"felt": "0x.."}`, `{"byteArray": "..."}`)
/// so the registry round-trips without ambiguity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArgValue {
    Felt(Felt),
    U64(u64),
    Bool(bool),
    Array(Vec<ArgValue>),
    ByteArray(String),
}

impl ArgValue {
    /// Append the Cairo serde encoding of this value to `out`.
    pub fn encode_into(&self, out: &mut Vec<Felt>) {
        match self {
            ArgValue::Felt(felt) => out.push(*felt),
            ArgValue::U64(value) => out.push(Felt::from_u64(*value)),
            ArgValue::Bool(value) => out.push(Felt::from(*value)),
            ArgValue::Array(items) => {
                out.push(Felt::from_u64(items.len() as u64));
                for item in items {
                    item.encode_into(out);
                }
            }
            ArgValue::ByteArray(text) => encode_byte_array(text.as_bytes(), out),
        }
    }

    pub fn encode(&self) -> Vec<Felt> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

impl From<Felt> for ArgValue {
    fn from(value: Felt) -> Self {
        ArgValue::Felt(value)
    }
}

impl From<u64> for ArgValue {
    fn from(value: u64) -> Self {
        ArgValue::U64(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::ByteArray(value.to_string())
    }
}

impl From<Vec<Felt>> for ArgValue {
    fn from(values: Vec<Felt>) -> Self {
        ArgValue::Array(values.into_iter().map(ArgValue::Felt).collect())
    }
}

/// `[full_word_count, full_words.., pending_word, pending_len]`
fn encode_byte_array(bytes: &[u8], out: &mut Vec<Felt>) {
    let full = bytes.len() / SHORT_STRING_MAX_LEN;
    let (words, pending) = bytes.split_at(full * SHORT_STRING_MAX_LEN);

    out.push(Felt::from_u64(full as u64));
    out.extend(
        words
            .chunks(SHORT_STRING_MAX_LEN)
            .map(Felt::from_be_slice_31),
    );
    out.push(Felt::from_be_slice_31(pending));
    out.push(Felt::from_u64(pending.len() as u64));
}

/// A named constructor argument. Names are kept for auditability only; the
/// calldata order is the declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorArg {
    pub name: String,
    pub value: ArgValue,
}

impl ConstructorArg {
    pub fn new(name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Flatten constructor arguments into calldata.
pub fn encode_constructor_args(args: &[ConstructorArg]) -> Vec<Felt> {
    let mut out = Vec::new();
    for arg in args {
        arg.value.encode_into(&mut out);
    }
    out
}
