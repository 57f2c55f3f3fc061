use std::fmt::{self, Write as _};

use serde_derive::{Deserialize, Serialize};

use crate::Result;

/// A single value in a block entry. There is no float variant, so float
/// values fail to deserialize.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    UnsignedInteger(u64),
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::UnsignedInteger(u) => write!(f, "{}", u),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<u64> for Scalar {
    fn from(u: u64) -> Self {
        Scalar::UnsignedInteger(u)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

/// A `(label, value)` pair, serialized as the two element array `["label",value]`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Entry(pub String, pub Scalar);

impl Entry {
    pub fn new(label: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Entry(label.into(), value.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> &Scalar {
        &self.1
    }
}

/// The ordered entries of a challenge block. Entry order is part of the hashed
/// payload, so it is never sorted or deduplicated.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct BlockData(Vec<Entry>);

impl BlockData {
    pub fn new(entries: Vec<Entry>) -> Self {
        BlockData(entries)
    }

    /// Parse the `data` array of a block, e.g. `[["a",1],["b","x"]]`
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Entry>> for BlockData {
    fn from(entries: Vec<Entry>) -> Self {
        BlockData(entries)
    }
}

impl fmt::Display for BlockData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "[{} {}]", entry.0, entry.1)?;
        }
        write!(f, "]")
    }
}

#[derive(Serialize)]
struct Payload<'a> {
    data: &'a BlockData,
    nonce: u64,
}

/// Render the canonical payload for `block` and `nonce`:
/// `{"data":[["a",1],["b","x"]],"nonce":0}`
pub fn encode_payload(block: &BlockData, nonce: u64) -> Result<String> {
    Ok(serde_json::to_string(&Payload { data: block, nonce })?)
}

/// Canonical payload with the `data` part rendered once.
///
/// Each call to `render` only rewrites the nonce digits at the end of the
/// buffer; the output is byte-identical to `encode_payload`.
#[derive(Clone, Debug)]
pub struct PayloadTemplate {
    buffer: String,
    prefix_length: usize,
}

impl PayloadTemplate {
    pub fn new(block: &BlockData) -> Result<Self> {
        let mut buffer = String::with_capacity(64);
        buffer.push_str("{\"data\":");
        buffer.push_str(&serde_json::to_string(block)?);
        buffer.push_str(",\"nonce\":");
        let prefix_length = buffer.len();
        Ok(PayloadTemplate {
            buffer,
            prefix_length,
        })
    }

    pub fn render(&mut self, nonce: u64) -> &str {
        self.buffer.truncate(self.prefix_length);
        // Writing into a String cannot fail.
        let _ = write!(self.buffer, "{}}}", nonce);
        &self.buffer
    }
}
