//! Launch configuration as supplied by the editor extension.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::parser::{BlizzardInterpreter, CrashInterpreter, TsmInterpreter};

pub const DEFAULT_CRASH_FILE: &str = "crash.txt";

/// Which dump grammar the crash file uses. Never auto-detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    #[default]
    Blizzard,
    Tsm,
}

impl ErrorType {
    pub fn interpreter(self) -> Box<dyn CrashInterpreter> {
        match self {
            ErrorType::Blizzard => Box::new(BlizzardInterpreter),
            ErrorType::Tsm => Box::new(TsmInterpreter),
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorType::Blizzard => f.write_str("blizzard"),
            ErrorType::Tsm => f.write_str("tsm"),
        }
    }
}

impl FromStr for ErrorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blizzard" => Ok(ErrorType::Blizzard),
            "tsm" => Ok(ErrorType::Tsm),
            _ => Err(format!("Unknown error type: {s}. Use 'blizzard' or 'tsm'")),
        }
    }
}

/// Arguments of the `launch` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub workspace_path: Option<PathBuf>,
    pub extension_path: Option<PathBuf>,
    pub cwd: Option<PathBuf>,
    pub crash_file: PathBuf,
    pub error_type: ErrorType,
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workspace_path: None,
            extension_path: None,
            cwd: None,
            crash_file: PathBuf::from(DEFAULT_CRASH_FILE),
            error_type: ErrorType::default(),
            verbose: false,
        }
    }
}

impl SessionConfig {
    /// Parse launch arguments, falling back to defaults for anything absent.
    pub fn from_arguments(arguments: Option<&serde_json::Value>) -> serde_json::Result<Self> {
        match arguments {
            Some(value) if !value.is_null() => serde_json::from_value(value.clone()),
            _ => Ok(Self::default()),
        }
    }

    /// `cwd`, else the workspace, else the process directory.
    pub fn working_dir(&self) -> PathBuf {
        self.cwd
            .clone()
            .or_else(|| self.workspace_path.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn crash_file_path(&self) -> PathBuf {
        self.resolve(&self.crash_file)
    }

    /// Join a relative path onto the working directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir().join(path)
        }
    }
}
