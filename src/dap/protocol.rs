use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::debugger::{ResolvedFrame, ScopeView, VariableView};

#[derive(Debug, Serialize, Deserialize)]
pub struct DapMessage {
    pub seq: u64,
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(flatten)]
    pub content: DapMessageContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DapMessageContent {
    Request {
        command: String,
        #[serde(default)]
        arguments: Option<Value>,
    },
    Response {
        request_seq: u64,
        success: bool,
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
    Event {
        event: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        body: Option<Value>,
    },
}

impl DapMessage {
    /// The command name, if this is a request.
    pub fn command(&self) -> Option<&str> {
        match &self.content {
            DapMessageContent::Request { command, .. } => Some(command),
            _ => None,
        }
    }
}

/// Category of an `output` event, so clients can filter and style them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCategory {
    /// Raw process-style output.
    Stdout,
    /// Log lines recovered from the crash file.
    Console,
    /// The decoded error message and launch failures.
    Stderr,
    /// Adapter internals, only sent when `verbose` is on.
    Trace,
}

impl OutputCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputCategory::Stdout => "stdout",
            OutputCategory::Console => "console",
            OutputCategory::Stderr => "stderr",
            OutputCategory::Trace => "trace",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_hint: Option<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub id: usize,
    pub name: String,
    pub line: i64,
    pub column: i64,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_hint: Option<&'static str>,
}

impl From<ResolvedFrame> for StackFrame {
    fn from(frame: ResolvedFrame) -> Self {
        let resolved = frame.is_resolved();
        Self {
            id: frame.id,
            name: frame.name,
            line: frame.line,
            column: 1,
            source: Source {
                name: frame.source_name,
                path: frame
                    .source_path
                    .map(|p| p.to_string_lossy().into_owned()),
                presentation_hint: (!resolved).then_some("deemphasize"),
            },
            presentation_hint: (!resolved).then_some("subtle"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub name: &'static str,
    pub variables_reference: i64,
    pub named_variables: usize,
    pub expensive: bool,
}

impl From<ScopeView> for Scope {
    fn from(scope: ScopeView) -> Self {
        Self {
            name: scope.name,
            variables_reference: scope.variables_reference,
            named_variables: scope.named_variables,
            expensive: false,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub variables_reference: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_variables: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_variables: Option<usize>,
}

impl From<VariableView> for Variable {
    fn from(view: VariableView) -> Self {
        Self {
            name: view.name,
            value: view.value,
            type_name: view.type_name,
            variables_reference: view.variables_reference,
            indexed_variables: view.indexed_variables,
            named_variables: view.named_variables,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackTraceArguments {
    pub thread_id: Option<i64>,
    pub start_frame: Option<usize>,
    pub levels: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopesArguments {
    pub frame_id: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariablesArguments {
    pub variables_reference: i64,
    pub filter: Option<String>,
    pub start: Option<i64>,
    pub count: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetBreakpointsArguments {
    pub breakpoints: Vec<SourceBreakpoint>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SourceBreakpoint {
    pub line: i64,
}

/// A breakpoint as reported back to the client. Never verified: a snapshot
/// has no execution to break into.
#[derive(Debug, Clone, Serialize)]
pub struct Breakpoint {
    pub verified: bool,
    pub line: i64,
    pub message: &'static str,
}

impl From<&SourceBreakpoint> for Breakpoint {
    fn from(bp: &SourceBreakpoint) -> Self {
        Self {
            verified: false,
            line: bp.line,
            message: "Crash snapshots do not execute",
        }
    }
}

/// Decode request arguments; a missing `arguments` object means all defaults.
pub fn parse_arguments<T>(arguments: Option<Value>) -> serde_json::Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match arguments {
        Some(value) if !value.is_null() => serde_json::from_value(value),
        _ => Ok(T::default()),
    }
}
