//! Storage friendly presentation of Activity Streams nodes.

mod symbols;

use anyhow::{Context, Result};
use minicbor::{Decode, Encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

use super::model::Item;

use self::symbols::activitystreams_symbol_table;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Encode, Decode)]
pub(crate) struct Header {
    #[n(0)]
    version: u32,
}

impl Header {
    pub(crate) const V_1: Header = Header { version: 1 };
}

pub(crate) trait ObjectSerDe {
    fn to_bytes(&self) -> Result<Vec<u8>>
    where
        Self: Serialize,
    {
        let node = NodeValue::from(serde_json::to_value(self).context("unable to encode node")?);
        minicbor::to_vec((Header::V_1, node)).context("unable to serialize stored node")
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self>
    where
        Self: DeserializeOwned + Sized,
    {
        let (header, node): (Header, NodeValue) =
            minicbor::decode(bytes).context("unable to deserialize stored node")?;
        if header != Header::V_1 {
            tracing::error!(target: "apub::repo", ?header, "invalid storage header version");
        }
        serde_json::from_value(Value::from(node)).context("unable to decode node")
    }
}

impl ObjectSerDe for Item {}

#[derive(Debug, PartialEq, Encode, Decode)]
pub(crate) enum Symbol {
    #[n(0)]
    SymbolId(#[n(0)] u32),
    #[n(1)]
    Text(#[n(0)] String),
}

#[derive(Debug, PartialEq, Encode, Decode)]
pub(crate) enum NodeValue {
    #[n(0)]
    Null,
    #[n(1)]
    Bool(#[n(0)] bool),
    #[n(2)]
    Integer(#[n(0)] i64),
    #[n(3)]
    Unsigned(#[n(0)] u64),
    #[n(4)]
    Float(#[n(0)] f64),
    #[n(5)]
    Symbol(#[n(0)] Symbol),
    #[n(6)]
    Array(#[n(0)] Vec<NodeValue>),
    #[n(7)]
    Object(#[n(0)] Vec<(Symbol, NodeValue)>),
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        let symtab = activitystreams_symbol_table();
        match symtab.get_by_left(value.as_str()) {
            Some(id) => Symbol::SymbolId(*id),
            None => Symbol::Text(value),
        }
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        let symtab = activitystreams_symbol_table();
        match value {
            Symbol::SymbolId(id) => match symtab.get_by_right(&id) {
                Some(text) => text.to_string(),
                None => "__unknown__".to_string(),
            },
            Symbol::Text(text) => text,
        }
    }
}

impl From<Number> for NodeValue {
    fn from(number: Number) -> Self {
        if let Some(n) = number.as_u64() {
            return NodeValue::Unsigned(n);
        }
        if let Some(n) = number.as_i64() {
            return NodeValue::Integer(n);
        }
        number.as_f64().map_or(NodeValue::Null, NodeValue::Float)
    }
}

impl NodeValue {
    /// Simple recursive conversion with depth limit
    fn from_serde_json(value: Value, stack_depth: u8, limit: u8) -> Self {
        if stack_depth == limit {
            return NodeValue::Null;
        }
        match value {
            Value::Null => NodeValue::Null,
            Value::Bool(v) => NodeValue::Bool(v),
            Value::Number(n) => n.into(),
            Value::String(s) => NodeValue::Symbol(s.into()),
            Value::Array(vec) => NodeValue::Array(
                vec.into_iter()
                    .map(|v| NodeValue::from_serde_json(v, stack_depth + 1, limit))
                    .collect(),
            ),
            Value::Object(map) => NodeValue::Object(
                map.into_iter()
                    .map(|(k, v)| {
                        (
                            k.into(),
                            NodeValue::from_serde_json(v, stack_depth + 1, limit),
                        )
                    })
                    .collect(),
            ),
        }
    }
}

impl From<Value> for NodeValue {
    fn from(value: Value) -> Self {
        Self::from_serde_json(value, 0, 128)
    }
}

impl From<NodeValue> for Value {
    fn from(value: NodeValue) -> Self {
        match value {
            NodeValue::Null => Value::Null,
            NodeValue::Bool(v) => Value::Bool(v),
            NodeValue::Integer(n) => Value::Number(n.into()),
            NodeValue::Unsigned(n) => Value::Number(n.into()),
            NodeValue::Float(n) => Number::from_f64(n).map_or(Value::Null, Value::Number),
            NodeValue::Symbol(s) => Value::String(s.into()),
            NodeValue::Array(vec) => Value::Array(vec.into_iter().map(Value::from).collect()),
            NodeValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
            }
        }
    }
}
