use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use super::gate::ConfigurationWaiter;
use super::variables::{
    VariableFilter, VariablePath, VariableRegistry, FIRST_VARIABLE_HANDLE, LOCALS_SCOPE_BASE,
};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::parser::{parse_crash, CrashInfo, FrameInfo, Table, Value};

pub type Result<T> = std::result::Result<T, SessionError>;

/// Lifecycle of one debug session. There is no live running state: the
/// crash is a snapshot, so leaving `Stopped` always means `Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Configuring,
    Stopped,
    Terminated,
}

/// A frame ready for presentation, with its source checked against disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFrame {
    pub id: usize,
    pub name: String,
    /// 0 when unknown.
    pub line: i64,
    pub source_name: String,
    /// Absolute path, only when the file exists.
    pub source_path: Option<PathBuf>,
}

impl ResolvedFrame {
    pub fn is_resolved(&self) -> bool {
        self.source_path.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackWindow {
    pub frames: Vec<ResolvedFrame>,
    pub total_frames: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeView {
    pub name: &'static str,
    pub variables_reference: i64,
    pub named_variables: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableView {
    pub name: String,
    pub value: String,
    pub type_name: String,
    /// Non-zero for table-like values.
    pub variables_reference: i64,
    pub indexed_variables: Option<usize>,
    pub named_variables: Option<usize>,
}

/// Answers the debugger requests from one parsed crash.
#[derive(Debug)]
pub struct CrashSession {
    state: SessionState,
    config: SessionConfig,
    crash: Option<CrashInfo>,
    registry: VariableRegistry,
    waiter: Option<ConfigurationWaiter>,
}

impl CrashSession {
    pub fn new(waiter: ConfigurationWaiter) -> Self {
        Self {
            state: SessionState::Created,
            config: SessionConfig::default(),
            crash: None,
            registry: VariableRegistry::new(),
            waiter: Some(waiter),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn crash(&self) -> Result<&CrashInfo> {
        self.crash.as_ref().ok_or(SessionError::NotLaunched)
    }

    pub fn initialize(&mut self) {
        if self.state == SessionState::Created {
            self.state = SessionState::Configuring;
        }
    }

    /// Wait for configuration, then read and parse the crash file.
    ///
    /// On failure nothing from the previous launch survives: the session
    /// holds no crash until a later launch succeeds.
    pub fn launch(&mut self, config: SessionConfig) -> Result<&CrashInfo> {
        if let Some(waiter) = self.waiter.take() {
            debug!("Waiting for configurationDone");
            waiter.wait()?;
        }

        self.registry.reset();
        self.crash = None;

        let path = config.crash_file_path();
        info!(path = %path.display(), error_type = %config.error_type, "Loading crash file");
        let text = fs::read_to_string(&path).map_err(|source| SessionError::ReadCrashFile {
            path: path.clone(),
            source,
        })?;
        let crash = parse_crash(&text, config.error_type.interpreter().as_ref())?;
        info!(
            frames = crash.frames.len(),
            log_lines = crash.log_lines.len(),
            "Parsed crash"
        );

        self.config = config;
        self.state = SessionState::Stopped;
        Ok(&*self.crash.insert(crash))
    }

    /// Frames `[start, start + levels)`, clamped. `levels` of `None` or 0 means all.
    pub fn stack_trace(&self, start: usize, levels: Option<usize>) -> Result<StackWindow> {
        let crash = self.crash()?;
        let total = crash.frames.len();
        let start = start.min(total);
        let end = match levels.filter(|l| *l > 0) {
            Some(levels) => start.saturating_add(levels).min(total),
            None => total,
        };

        let frames = crash.frames[start..end]
            .iter()
            .enumerate()
            .map(|(offset, frame)| self.resolve_frame(start + offset, frame))
            .collect();
        Ok(StackWindow {
            frames,
            total_frames: total,
        })
    }

    /// Exactly one scope per frame.
    pub fn scopes(&self, frame_id: usize) -> Result<Vec<ScopeView>> {
        let frame = self
            .crash()?
            .frames
            .get(frame_id)
            .ok_or(SessionError::UnknownFrame(frame_id))?;
        Ok(vec![ScopeView {
            name: "Locals",
            variables_reference: LOCALS_SCOPE_BASE + frame_id as i64,
            named_variables: frame.locals.len(),
        }])
    }

    /// Members of a scope or of a previously shown table.
    pub fn variables(&mut self, reference: i64, filter: VariableFilter) -> Result<Vec<VariableView>> {
        let crash = self.crash.as_ref().ok_or(SessionError::NotLaunched)?;

        let (parent, table): (VariablePath, &Table) =
            if (LOCALS_SCOPE_BASE..FIRST_VARIABLE_HANDLE).contains(&reference) {
                let index = (reference - LOCALS_SCOPE_BASE) as usize;
                let frame = crash
                    .frames
                    .get(index)
                    .ok_or(SessionError::InvalidVariableReference(reference))?;
                (VariablePath::new(index, Vec::new()), &frame.locals)
            } else {
                let path = self.registry.resolve(reference)?.clone();
                let table = path
                    .lookup(crash)
                    .and_then(Value::as_table)
                    .ok_or(SessionError::InvalidVariableReference(reference))?;
                (path, table)
            };

        let mut out = Vec::new();
        for (key, value) in filter.select(table) {
            let mut view = VariableView {
                name: key.to_string(),
                value: value.to_string(),
                type_name: value.type_name().to_string(),
                variables_reference: 0,
                indexed_variables: None,
                named_variables: None,
            };
            if let Value::Table(child) = value {
                view.variables_reference = self.registry.create(parent.child(key));
                view.indexed_variables = Some(child.contiguous_len());
                view.named_variables = Some(child.named_entries().count());
            }
            out.push(view);
        }
        debug!(reference, count = out.len(), "Listed variables");
        Ok(out)
    }

    /// Continue, step and terminate all end the session.
    pub fn terminate(&mut self) {
        self.registry.reset();
        self.state = SessionState::Terminated;
        info!("Session terminated");
    }

    fn resolve_frame(&self, id: usize, frame: &FrameInfo) -> ResolvedFrame {
        let on_disk = frame
            .source_path
            .as_deref()
            .map(|path| self.config.resolve(path))
            .filter(|path| path.is_file());

        let source_name = match &on_disk {
            Some(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| frame.raw_location_label.clone()),
            None => frame.raw_location_label.clone(),
        };

        ResolvedFrame {
            id,
            name: frame.display_name.clone(),
            line: frame.line.max(0),
            source_name,
            source_path: on_disk,
        }
    }
}
