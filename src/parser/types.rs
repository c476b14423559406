use super::value::Table;

/// Sentinel for an unknown or non-positive line number.
pub const UNKNOWN_LINE: i64 = -1;

/// One stack entry. Index 0 of [`CrashInfo::frames`] is where the error occurred.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    /// Function name, `"?"` when unknown.
    pub display_name: String,
    /// Path relative to the addon root, when the location could be parsed.
    pub source_path: Option<String>,
    pub line: i64,
    /// Location text exactly as it appeared in the dump.
    pub raw_location_label: String,
    pub locals: Table,
}

impl FrameInfo {
    pub fn new(display_name: impl Into<String>, raw_location_label: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            display_name: if display_name.is_empty() {
                "?".to_string()
            } else {
                display_name
            },
            source_path: None,
            line: UNKNOWN_LINE,
            raw_location_label: raw_location_label.into(),
            locals: Table::new(),
        }
    }

    /// Attach a source location; non-positive lines collapse to [`UNKNOWN_LINE`].
    pub fn at(mut self, source_path: impl Into<String>, line: i64) -> Self {
        let path = source_path.into();
        self.source_path = (!path.is_empty()).then_some(path);
        self.line = if line > 0 { line } else { UNKNOWN_LINE };
        self
    }

    pub fn with_locals(mut self, locals: Table) -> Self {
        self.locals = locals;
        self
    }
}

/// Everything recovered from one crash file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrashInfo {
    pub error_message: String,
    pub frames: Vec<FrameInfo>,
    /// Oldest first.
    pub log_lines: Vec<String>,
}
