mod gate;
mod session;
mod variables;

pub use gate::{configuration_gate, ConfigurationSignal, ConfigurationWaiter};
pub use session::{
    CrashSession, ResolvedFrame, ScopeView, SessionState, StackWindow, VariableView,
};
pub use variables::{
    VariableFilter, VariablePath, VariableRegistry, FIRST_VARIABLE_HANDLE, LOCALS_SCOPE_BASE,
};
