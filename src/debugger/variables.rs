use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;
use crate::parser::{CrashInfo, Table, Value};

/// Scope references for frame locals are `LOCALS_SCOPE_BASE + frame index`.
pub const LOCALS_SCOPE_BASE: i64 = 1;
/// First handle the registry hands out; everything below is a scope id.
pub const FIRST_VARIABLE_HANDLE: i64 = 1 << 20;

/// Frame index plus the member keys leading to a composite value.
///
/// Renders as `frame:key:key...`, e.g. `2:myTable:3:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariablePath {
    pub frame: usize,
    pub keys: Vec<String>,
}

impl VariablePath {
    pub fn new(frame: usize, keys: Vec<String>) -> Self {
        Self { frame, keys }
    }

    pub fn child(&self, key: &str) -> Self {
        let mut keys = self.keys.clone();
        keys.push(key.to_string());
        Self {
            frame: self.frame,
            keys,
        }
    }

    /// Walk into the crash data. The first key names a local of the frame.
    pub fn lookup<'a>(&self, crash: &'a CrashInfo) -> Option<&'a Value> {
        let frame = crash.frames.get(self.frame)?;
        let (first, rest) = self.keys.split_first()?;
        let mut value = frame.locals.get(first)?;
        for key in rest {
            value = value.as_table()?.get(key)?;
        }
        Some(value)
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.frame)?;
        for key in &self.keys {
            write!(f, ":{key}")?;
        }
        Ok(())
    }
}

impl FromStr for VariablePath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let frame = parts
            .next()
            .and_then(|p| p.parse::<usize>().ok())
            .ok_or_else(|| format!("path `{s}` does not start with a frame index"))?;
        let keys: Vec<String> = parts.map(str::to_string).collect();
        if keys.is_empty() {
            return Err(format!("path `{s}` has fewer than two segments"));
        }
        Ok(Self { frame, keys })
    }
}

/// Hands out integer handles for nested values shown to the client.
///
/// The same path may receive several handles; callers keep the first one
/// they got for a given display.
#[derive(Debug)]
pub struct VariableRegistry {
    next: i64,
    paths: HashMap<i64, VariablePath>,
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self {
            next: FIRST_VARIABLE_HANDLE,
            paths: HashMap::new(),
        }
    }

    pub fn create(&mut self, path: VariablePath) -> i64 {
        let handle = self.next;
        self.next += 1;
        self.paths.insert(handle, path);
        handle
    }

    pub fn resolve(&self, handle: i64) -> Result<&VariablePath, SessionError> {
        self.paths
            .get(&handle)
            .filter(|path| !path.keys.is_empty())
            .ok_or(SessionError::InvalidVariableReference(handle))
    }

    /// Drop every handle. The counter keeps going so old numbers never come back.
    pub fn reset(&mut self) {
        self.paths.clear();
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Which members of a composite a `variables` request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableFilter {
    /// Non-integer keys only.
    Named,
    /// Integer keys in `[start, start + count - 1]`, at least 1.
    Indexed { start: i64, count: Option<i64> },
    All,
}

impl VariableFilter {
    pub fn parse(
        filter: Option<&str>,
        start: Option<i64>,
        count: Option<i64>,
    ) -> Result<Self, SessionError> {
        match filter {
            None => Ok(VariableFilter::All),
            Some("named") => Ok(VariableFilter::Named),
            Some("indexed") => Ok(VariableFilter::Indexed {
                start: start.unwrap_or(1),
                count: count.filter(|c| *c > 0),
            }),
            Some(other) => Err(SessionError::UnsupportedFilter(other.to_string())),
        }
    }

    /// Pick the requested members of `table`, in display order.
    pub fn select<'a>(&self, table: &'a Table) -> Vec<(&'a str, &'a Value)> {
        match *self {
            VariableFilter::All => table.iter().collect(),
            VariableFilter::Named => table.named_entries().collect(),
            VariableFilter::Indexed { start, count } => {
                let high = match count {
                    Some(count) => start.saturating_add(count.saturating_sub(1)),
                    None => i64::MAX,
                };
                table.index_range(start.max(1), high).collect()
            }
        }
    }
}
