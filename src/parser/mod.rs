mod blizzard;
mod tree;
mod tsm;
mod types;
mod value;

pub use blizzard::BlizzardInterpreter;
pub use tree::{LineNode, LineTree, NodeId, NodeRef};
pub use tsm::TsmInterpreter;
pub use types::{CrashInfo, FrameInfo, UNKNOWN_LINE};
pub use value::{decode, key_index, Table, Value};

use crate::error::CrashError;

/// One crash-dump grammar: walks a [`LineTree`] and produces a [`CrashInfo`].
pub trait CrashInterpreter {
    /// Short format name, used in logs.
    fn name(&self) -> &'static str;

    /// Walk the tree. Implementations return the raw result; callers go
    /// through [`CrashInterpreter::interpret`] to get the completeness check.
    fn walk(&self, tree: &LineTree) -> Result<CrashInfo, CrashError>;

    fn interpret(&self, tree: &LineTree) -> Result<CrashInfo, CrashError> {
        let info = self.walk(tree)?;
        if info.error_message.is_empty() {
            return Err(CrashError::IncompleteCrashInfo(
                "no error message".to_string(),
            ));
        }
        if info.frames.is_empty() {
            return Err(CrashError::IncompleteCrashInfo("no stack frames".to_string()));
        }
        Ok(info)
    }
}

/// Normalize line endings and drop blank lines.
pub fn crash_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Full pipeline: text -> indentation tree -> format interpreter.
pub fn parse_crash(text: &str, interpreter: &dyn CrashInterpreter) -> Result<CrashInfo, CrashError> {
    let lines = crash_lines(text);
    let tree = LineTree::build(&lines)?;
    tracing::debug!(
        format = interpreter.name(),
        lines = lines.len(),
        "Built indentation tree"
    );
    interpreter.interpret(&tree)
}
