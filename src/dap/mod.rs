mod protocol;
mod server;
mod transport;

use std::io;

pub use protocol::{
    Breakpoint, DapMessage, DapMessageContent, OutputCategory, Scope, Source, StackFrame,
    Variable,
};
pub use server::{serve, DapServer, THREAD_ID};
pub use transport::{read_message, write_message};

/// Run the adapter over stdin/stdout until the client disconnects.
pub fn run_dap_mode() -> io::Result<()> {
    tracing::info!("DAP server starting");
    serve(io::stdin(), io::stdout())?;
    tracing::info!("DAP server exiting");
    Ok(())
}
