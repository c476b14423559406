//! Typed local-variable values recovered from `name = value` dump lines.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::tree::NodeRef;
use crate::error::CrashError;

static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S.*?)\s*=\s*(.*)$").expect("valid assignment regex"));
static NAMED_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<([^<>]+)>\s*\{\}?$").expect("valid table-name regex"));

/// One decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Function,
    Userdata,
    Table(Table),
}

/// Ordered members of a table, or of a frame's locals.
///
/// Keys keep the text they had in the dump. Keys that parse as integers
/// also act as array indices for lookup and paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Explicit annotation from `= <Name> {`, if any.
    pub name: Option<String>,
    entries: Vec<(String, Value)>,
    /// Array index -> position in `entries`, first occurrence wins.
    indices: BTreeMap<i64, usize>,
}

impl Value {
    pub fn is_table(&self) -> bool {
        matches!(self, Value::Table(_))
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Type label shown next to the value.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Function => "function",
            Value::Userdata => "userdata",
            Value::Table(table) => table.name.as_deref().unwrap_or("table"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_infinite() && *n > 0.0 => f.write_str("Infinite"),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Function => f.write_str("<function>"),
            Value::Userdata => f.write_str("<userdata>"),
            Value::Table(table) => {
                if let Some(name) = &table.name {
                    write!(f, "<{name}> ")?;
                }
                if table.is_empty() {
                    f.write_str("{}")
                } else {
                    f.write_str("{...}")
                }
            }
        }
    }
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Append a member, keeping declaration order.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(index) = key_index(&key) {
            self.indices.entry(index).or_insert(self.entries.len());
        }
        self.entries.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Exact key lookup, falling back to index lookup for integer keys.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .or_else(|| key.parse::<i64>().ok().and_then(|i| self.get_index(i)))
    }

    pub fn get_index(&self, index: i64) -> Option<&Value> {
        self.get_index_entry(index).map(|(_, v)| v)
    }

    /// The stored key and value for an array index.
    pub fn get_index_entry(&self, index: i64) -> Option<(&str, &Value)> {
        self.indices.get(&index).map(|&pos| self.entry(pos))
    }

    /// Members whose index lies in `[low, high]`, in index order.
    pub fn index_range(&self, low: i64, high: i64) -> impl Iterator<Item = (&str, &Value)> {
        (low <= high)
            .then(|| self.indices.range(low..=high))
            .into_iter()
            .flatten()
            .map(move |(_, &pos)| self.entry(pos))
    }

    fn entry(&self, pos: usize) -> (&str, &Value) {
        let (k, v) = &self.entries[pos];
        (k.as_str(), v)
    }

    /// Members whose key does not parse as an integer.
    pub fn named_entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.iter().filter(|(k, _)| key_index(k).is_none())
    }

    /// Length of the run of indices 1, 2, 3, ... present in the table.
    ///
    /// Sparse tables report only the leading contiguous run.
    pub fn contiguous_len(&self) -> usize {
        (1_i64..)
            .take_while(|index| self.indices.contains_key(index))
            .count()
    }
}

/// Integer value of a key, if it is an array index.
pub fn key_index(key: &str) -> Option<i64> {
    key.trim().parse::<i64>().ok()
}

/// Decode one `name = value` line, recursing into its children for tables.
///
/// Returns `Ok(None)` when the line is not an assignment at all.
pub fn decode(node: NodeRef<'_>) -> Result<Option<(String, Value)>, CrashError> {
    let Some(caps) = ASSIGNMENT.captures(node.content()) else {
        return Ok(None);
    };
    let name = normalize_key(&caps[1]);
    let text = caps[2].trim();

    let value = decode_value(&name, text, node)?;
    Ok(Some((name, value)))
}

fn decode_value(name: &str, text: &str, node: NodeRef<'_>) -> Result<Value, CrashError> {
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        return Ok(Value::String(text[1..text.len() - 1].to_string()));
    }
    if text.starts_with("<function>") {
        return Ok(Value::Function);
    }
    if text.starts_with('{') || text.ends_with('{') || text.ends_with("{}") {
        let mut table = match NAMED_TABLE.captures(text) {
            Some(caps) if &caps[1] != "table" => Table::named(&caps[1]),
            _ => Table::new(),
        };
        for child in node.children() {
            if let Some((key, value)) = decode(child)? {
                table.insert(key, value);
            }
        }
        return Ok(Value::Table(table));
    }
    if let Ok(n) = text.parse::<f64>() {
        return Ok(Value::Number(n));
    }
    match text {
        "nil" => Ok(Value::Nil),
        "true" => Ok(Value::Boolean(true)),
        "false" => Ok(Value::Boolean(false)),
        "<userdata>" => Ok(Value::Userdata),
        "Infinite" => Ok(Value::Number(f64::INFINITY)),
        _ => Err(CrashError::UnrecognizedValueSyntax {
            name: name.to_string(),
            value: text.to_string(),
        }),
    }
}

/// Strip Lua key brackets: `[1]` -> `1`, `["id"]` -> `id`.
fn normalize_key(raw: &str) -> String {
    let key = raw.trim();
    let key = key
        .strip_prefix('[')
        .and_then(|k| k.strip_suffix(']'))
        .unwrap_or(key);
    let key = key
        .strip_prefix('"')
        .and_then(|k| k.strip_suffix('"'))
        .unwrap_or(key);
    key.to_string()
}
