use std::io::{self, BufReader, Read, Write};
use std::sync::mpsc::channel;
use std::thread;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::protocol::{
    parse_arguments, Breakpoint, DapMessage, DapMessageContent, OutputCategory, Scope,
    ScopesArguments, SetBreakpointsArguments, StackFrame, StackTraceArguments, Variable,
    VariablesArguments,
};
use super::transport;
use crate::config::SessionConfig;
use crate::debugger::{configuration_gate, ConfigurationWaiter, CrashSession, VariableFilter};
use crate::error::SessionError;

/// Id of the one synthetic thread a crash snapshot has.
pub const THREAD_ID: i64 = 1;

pub struct DapServer<W: Write> {
    seq: u64,
    writer: W,
    session: CrashSession,
    configured: bool,
    /// A `launch` that arrived before `configurationDone`, with its request seq.
    pending_launch: Option<(u64, SessionConfig)>,
}

/// Serve one client until `disconnect` or end of input. Returns the writer.
///
/// Requests are decoded on a separate thread, which fires the configuration
/// gate before forwarding `configurationDone`. A `launch` received earlier is
/// parked and run once that request is dispatched, so requests in between
/// are still answered.
pub fn serve<R, W>(reader: R, writer: W) -> io::Result<W>
where
    R: Read + Send + 'static,
    W: Write,
{
    let (signal, waiter) = configuration_gate();
    let (tx, rx) = channel::<DapMessage>();

    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut signal = Some(signal);
        loop {
            match transport::read_message(&mut reader) {
                Ok(Some(msg)) => {
                    if msg.command() == Some("configurationDone") {
                        if let Some(signal) = signal.take() {
                            signal.fire();
                        }
                    }
                    if tx.send(msg).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Client closed the input stream");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read DAP message");
                    break;
                }
            }
        }
    });

    let mut server = DapServer::new(writer, waiter);
    for msg in rx {
        if !server.handle_message(msg) {
            break;
        }
    }
    server.abort_pending_launch();
    Ok(server.into_writer())
}

impl<W: Write> DapServer<W> {
    pub fn new(writer: W, waiter: ConfigurationWaiter) -> Self {
        Self {
            seq: 0,
            writer,
            session: CrashSession::new(waiter),
            configured: false,
            pending_launch: None,
        }
    }

    pub fn session(&self) -> &CrashSession {
        &self.session
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Dispatch one message. Returns `false` once the client disconnected.
    pub fn handle_message(&mut self, msg: DapMessage) -> bool {
        let DapMessageContent::Request { command, arguments } = msg.content else {
            debug!(seq = msg.seq, "Ignoring non-request message");
            return true;
        };
        debug!(seq = msg.seq, command = %command, "Received request");

        match command.as_str() {
            "initialize" => self.handle_initialize(msg.seq, &command),
            "configurationDone" => self.handle_configuration_done(msg.seq, &command),
            "launch" => self.handle_launch(msg.seq, &command, arguments),
            "threads" => self.handle_threads(msg.seq, &command),
            "setBreakpoints" => self.handle_set_breakpoints(msg.seq, &command, arguments),
            "setExceptionBreakpoints" | "setFunctionBreakpoints" => {
                self.send_response(msg.seq, &command, true, Some(json!({ "breakpoints": [] })))
            }
            "stackTrace" => self.handle_stack_trace(msg.seq, &command, arguments),
            "scopes" => self.handle_scopes(msg.seq, &command, arguments),
            "variables" => self.handle_variables(msg.seq, &command, arguments),
            "continue" | "next" | "stepIn" | "stepOut" | "terminate" => {
                self.handle_end(msg.seq, &command)
            }
            "disconnect" => {
                self.abort_pending_launch();
                self.session.terminate();
                self.send_response(msg.seq, &command, true, None);
                return false;
            }
            _ => {
                warn!(command = %command, "Unhandled DAP command");
                self.send_failure(msg.seq, &command, &format!("Unsupported request: {command}"));
            }
        }
        true
    }

    pub fn send_response(&mut self, request_seq: u64, command: &str, success: bool, body: Option<Value>) {
        let msg = DapMessage {
            seq: self.next_seq(),
            msg_type: "response".to_string(),
            content: DapMessageContent::Response {
                request_seq,
                success,
                command: command.to_string(),
                message: None,
                body,
            },
        };
        self.send_message(&msg);
    }

    fn send_failure(&mut self, request_seq: u64, command: &str, message: &str) {
        let msg = DapMessage {
            seq: self.next_seq(),
            msg_type: "response".to_string(),
            content: DapMessageContent::Response {
                request_seq,
                success: false,
                command: command.to_string(),
                message: Some(message.to_string()),
                body: None,
            },
        };
        self.send_message(&msg);
    }

    fn send_error(&mut self, request_seq: u64, command: &str, err: &SessionError) {
        warn!(command, error = %err, "Request failed");
        self.trace(&format!("{command} failed: {err}"));
        self.send_failure(request_seq, command, &err.to_string());
    }

    pub fn send_event(&mut self, event: &str, body: Option<Value>) {
        let msg = DapMessage {
            seq: self.next_seq(),
            msg_type: "event".to_string(),
            content: DapMessageContent::Event {
                event: event.to_string(),
                body,
            },
        };
        self.send_message(&msg);
    }

    pub fn send_output(&mut self, category: OutputCategory, text: &str) {
        let mut output = text.to_string();
        if !output.ends_with('\n') {
            output.push('\n');
        }
        self.send_event(
            "output",
            Some(json!({
                "category": category.as_str(),
                "output": output,
            })),
        );
    }

    /// Adapter internals, mirrored to the client only in verbose sessions.
    fn trace(&mut self, text: &str) {
        debug!("{text}");
        if self.session.config().verbose {
            self.send_output(OutputCategory::Trace, text);
        }
    }

    fn send_message(&mut self, msg: &DapMessage) {
        if let Err(e) = transport::write_message(&mut self.writer, msg) {
            error!(error = %e, "Failed to write DAP message");
        }
    }

    fn handle_initialize(&mut self, seq: u64, command: &str) {
        self.session.initialize();
        let body = json!({
            "supportsConfigurationDoneRequest": true,
            "supportsTerminateRequest": true,
            "supportsStepBack": false,
            "supportsSetVariable": false,
            "supportsFunctionBreakpoints": false,
            "supportsConditionalBreakpoints": false,
        });
        self.send_response(seq, command, true, Some(body));
        self.send_event("initialized", None);
    }

    fn handle_launch(&mut self, seq: u64, command: &str, arguments: Option<Value>) {
        let config = match SessionConfig::from_arguments(arguments.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                self.send_failure(seq, command, &format!("Invalid launch configuration: {e}"));
                return;
            }
        };

        if !self.configured {
            debug!(seq, "Deferring launch until configurationDone");
            if let Some((superseded, _)) = self.pending_launch.replace((seq, config)) {
                self.send_failure(superseded, command, "Superseded by a later launch request");
            }
            return;
        }
        self.run_launch(seq, command, config);
    }

    fn handle_configuration_done(&mut self, seq: u64, command: &str) {
        self.configured = true;
        self.send_response(seq, command, true, None);
        if let Some((launch_seq, config)) = self.pending_launch.take() {
            self.run_launch(launch_seq, "launch", config);
        }
    }

    /// Fail a parked launch whose `configurationDone` never came.
    fn abort_pending_launch(&mut self) {
        if let Some((seq, _)) = self.pending_launch.take() {
            let err = SessionError::ConfigurationAborted;
            error!(error = %err, "Launch failed");
            self.send_output(OutputCategory::Stderr, &format!("Failed to load crash: {err}"));
            self.send_error(seq, "launch", &err);
        }
    }

    fn run_launch(&mut self, seq: u64, command: &str, config: SessionConfig) {
        let crash_path = config.crash_file_path();

        let loaded = self
            .session
            .launch(config)
            .map(|crash| (crash.error_message.clone(), crash.frames.len(), crash.log_lines.clone()));

        match loaded {
            Ok((message, frames, log_lines)) => {
                info!(frames, "Crash loaded, stopping on exception");
                self.send_response(seq, command, true, None);
                self.send_output(
                    OutputCategory::Stdout,
                    &format!("Loaded {} ({frames} frames)", crash_path.display()),
                );
                self.send_event(
                    "stopped",
                    Some(json!({
                        "reason": "exception",
                        "description": "Paused on exception",
                        "text": message,
                        "threadId": THREAD_ID,
                        "allThreadsStopped": true,
                    })),
                );
                self.send_output(OutputCategory::Stderr, &message);
                for line in &log_lines {
                    self.send_output(OutputCategory::Console, line);
                }
            }
            Err(e) => {
                error!(error = %e, "Launch failed");
                self.send_output(OutputCategory::Stderr, &format!("Failed to load crash: {e}"));
                self.send_error(seq, command, &e);
            }
        }
    }

    fn handle_threads(&mut self, seq: u64, command: &str) {
        self.send_response(
            seq,
            command,
            true,
            Some(json!({
                "threads": [
                    {
                        "id": THREAD_ID,
                        "name": "Main Thread"
                    }
                ]
            })),
        );
    }

    fn handle_set_breakpoints(&mut self, seq: u64, command: &str, arguments: Option<Value>) {
        let args: SetBreakpointsArguments = match parse_arguments(arguments) {
            Ok(args) => args,
            Err(e) => return self.send_failure(seq, command, &e.to_string()),
        };
        let breakpoints: Vec<Breakpoint> = args.breakpoints.iter().map(Into::into).collect();
        self.send_response(seq, command, true, Some(json!({ "breakpoints": breakpoints })));
    }

    fn handle_stack_trace(&mut self, seq: u64, command: &str, arguments: Option<Value>) {
        let args: StackTraceArguments = match parse_arguments(arguments) {
            Ok(args) => args,
            Err(e) => return self.send_failure(seq, command, &e.to_string()),
        };

        match self
            .session
            .stack_trace(args.start_frame.unwrap_or(0), args.levels)
        {
            Ok(window) => {
                self.trace(&format!(
                    "stackTrace returned {} of {} frames",
                    window.frames.len(),
                    window.total_frames
                ));
                let frames: Vec<StackFrame> = window.frames.into_iter().map(Into::into).collect();
                self.send_response(
                    seq,
                    command,
                    true,
                    Some(json!({
                        "stackFrames": frames,
                        "totalFrames": window.total_frames,
                    })),
                );
            }
            Err(e) => self.send_error(seq, command, &e),
        }
    }

    fn handle_scopes(&mut self, seq: u64, command: &str, arguments: Option<Value>) {
        let args: ScopesArguments = match parse_arguments(arguments) {
            Ok(args) => args,
            Err(e) => return self.send_failure(seq, command, &e.to_string()),
        };

        match self.session.scopes(args.frame_id) {
            Ok(scopes) => {
                let scopes: Vec<Scope> = scopes.into_iter().map(Into::into).collect();
                self.send_response(seq, command, true, Some(json!({ "scopes": scopes })));
            }
            Err(e) => self.send_error(seq, command, &e),
        }
    }

    fn handle_variables(&mut self, seq: u64, command: &str, arguments: Option<Value>) {
        let args: VariablesArguments = match parse_arguments(arguments) {
            Ok(args) => args,
            Err(e) => return self.send_failure(seq, command, &e.to_string()),
        };

        let result = VariableFilter::parse(args.filter.as_deref(), args.start, args.count)
            .and_then(|filter| self.session.variables(args.variables_reference, filter));

        match result {
            Ok(variables) => {
                let variables: Vec<Variable> = variables.into_iter().map(Into::into).collect();
                self.send_response(seq, command, true, Some(json!({ "variables": variables })));
            }
            Err(e) => self.send_error(seq, command, &e),
        }
    }

    /// The snapshot cannot run, so every resume request ends the session.
    fn handle_end(&mut self, seq: u64, command: &str) {
        self.session.terminate();
        let body = (command == "continue").then(|| json!({ "allThreadsContinued": true }));
        self.send_response(seq, command, true, body);
        self.send_event("terminated", None);
    }
}
