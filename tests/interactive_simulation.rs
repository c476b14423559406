// tests/interactive_simulation.rs
// Drives the adapter through scripted client conversations

use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

use crash_debugger::dap::serve;
use crash_debugger::debugger::FIRST_VARIABLE_HANDLE;

const CRASH: &str = r#"Message: boom
Stack Trace:
  Core/Scan.lua:12 <Scan.Run>
    self = {
      results = {
        1 = "a"
        2 = "b"
        3 = "c"
      }
      state = "busy"
    }
    count = 3
  Core/Main.lua:40 <Main.OnEvent>
  [C]:? <pcall>
Debug Log:
  second
  first
"#;

fn frame(request: &Value) -> Vec<u8> {
    let body = request.to_string();
    format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
}

fn script(requests: &[Value]) -> Cursor<Vec<u8>> {
    Cursor::new(requests.iter().flat_map(frame).collect())
}

fn request(seq: u64, command: &str, arguments: Value) -> Value {
    json!({ "seq": seq, "type": "request", "command": command, "arguments": arguments })
}

/// Split the adapter's output back into JSON messages.
fn messages(output: &[u8]) -> Vec<Value> {
    let text = String::from_utf8(output.to_vec()).expect("utf-8 output");
    let mut rest = text.as_str();
    let mut out = Vec::new();
    while let Some(start) = rest.find("Content-Length: ") {
        let after = &rest[start + "Content-Length: ".len()..];
        let header_end = after.find("\r\n\r\n").expect("header terminator");
        let len: usize = after[..header_end].trim().parse().expect("length");
        let body = &after[header_end + 4..header_end + 4 + len];
        out.push(serde_json::from_str(body).expect("json body"));
        rest = &after[header_end + 4 + len..];
    }
    out
}

fn response<'a>(messages: &'a [Value], request_seq: u64) -> &'a Value {
    messages
        .iter()
        .find(|m| m["type"] == "response" && m["request_seq"] == request_seq)
        .unwrap_or_else(|| panic!("no response to request {request_seq}"))
}

fn events<'a>(messages: &'a [Value], name: &str) -> Vec<&'a Value> {
    messages
        .iter()
        .filter(|m| m["type"] == "event" && m["event"] == name)
        .collect()
}

fn run(requests: &[Value]) -> Vec<Value> {
    let output = serve(script(requests), Vec::new()).expect("adapter run");
    messages(&output)
}

/// Client input that arrives over time, ending when the sender is dropped.
struct ChannelReader {
    rx: Receiver<Vec<u8>>,
    buf: Vec<u8>,
    pos: usize,
}

impl Read for ChannelReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buf.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.buf = chunk;
                    self.pos = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let n = out.len().min(self.buf.len() - self.pos);
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[derive(Clone, Default)]
struct SharedWriter(Arc<Mutex<Vec<u8>>>);

impl Write for SharedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedWriter {
    fn wait_for(&self, needle: &str) -> bool {
        for _ in 0..100 {
            if String::from_utf8_lossy(&self.0.lock().unwrap()).contains(needle) {
                return true;
            }
            thread::sleep(Duration::from_millis(50));
        }
        false
    }
}

fn launch_args(dir: &Path) -> Value {
    json!({
        "cwd": dir.to_string_lossy(),
        "crashFile": "crash.txt",
        "errorType": "tsm",
        "verbose": true
    })
}

#[cfg(test)]
mod interactive_tests {
    use super::*;

    #[test]
    fn test_full_session() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("crash.txt"), CRASH).unwrap();
        fs::create_dir_all(dir.path().join("Core")).unwrap();
        fs::write(dir.path().join("Core/Scan.lua"), "-- scan\n").unwrap();

        let self_ref = FIRST_VARIABLE_HANDLE;
        let results_ref = FIRST_VARIABLE_HANDLE + 1;

        let out = run(&[
            request(1, "initialize", json!({ "adapterID": "wow" })),
            request(2, "launch", launch_args(dir.path())),
            request(3, "configurationDone", Value::Null),
            request(4, "threads", Value::Null),
            request(5, "stackTrace", json!({ "threadId": 1, "startFrame": 1, "levels": 1 })),
            request(6, "stackTrace", json!({ "threadId": 1 })),
            request(7, "scopes", json!({ "frameId": 0 })),
            request(8, "variables", json!({ "variablesReference": 1 })),
            request(9, "variables", json!({ "variablesReference": self_ref })),
            request(
                10,
                "variables",
                json!({ "variablesReference": results_ref, "filter": "indexed", "start": 1, "count": 2 }),
            ),
            request(11, "variables", json!({ "variablesReference": results_ref, "filter": "weird" })),
            request(12, "continue", json!({ "threadId": 1 })),
            request(13, "variables", json!({ "variablesReference": self_ref })),
            request(14, "disconnect", Value::Null),
        ]);

        assert_eq!(response(&out, 1)["success"], true);
        assert_eq!(
            response(&out, 1)["body"]["supportsConfigurationDoneRequest"],
            true
        );
        assert_eq!(events(&out, "initialized").len(), 1);

        assert_eq!(response(&out, 2)["success"], true);
        assert_eq!(response(&out, 3)["success"], true);

        let stopped = events(&out, "stopped");
        assert_eq!(stopped.len(), 1);
        assert_eq!(stopped[0]["body"]["reason"], "exception");
        assert_eq!(stopped[0]["body"]["text"], "boom");

        let outputs = events(&out, "output");
        let by_category = |category: &str| -> Vec<String> {
            outputs
                .iter()
                .filter(|e| e["body"]["category"] == category)
                .map(|e| e["body"]["output"].as_str().unwrap().to_string())
                .collect()
        };
        assert_eq!(by_category("stderr"), vec!["boom\n"]);
        assert_eq!(by_category("console"), vec!["first\n", "second\n"]);
        assert_eq!(by_category("stdout").len(), 1);
        assert!(!by_category("trace").is_empty());

        let threads = &response(&out, 4)["body"]["threads"];
        assert_eq!(threads.as_array().unwrap().len(), 1);

        let window = &response(&out, 5)["body"];
        assert_eq!(window["totalFrames"], 3);
        assert_eq!(window["stackFrames"].as_array().unwrap().len(), 1);
        assert_eq!(window["stackFrames"][0]["name"], "Main.OnEvent");
        assert_eq!(window["stackFrames"][0]["presentationHint"], "subtle");

        let all = response(&out, 6)["body"]["stackFrames"].as_array().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0]["line"], 12);
        assert_eq!(all[0]["source"]["name"], "Scan.lua");
        assert!(all[0].get("presentationHint").is_none());
        assert_eq!(all[2]["source"]["name"], "[C]:?");
        assert_eq!(all[2]["source"]["presentationHint"], "deemphasize");

        let scopes = response(&out, 7)["body"]["scopes"].as_array().unwrap();
        assert_eq!(scopes.len(), 1);
        assert_eq!(scopes[0]["name"], "Locals");
        assert_eq!(scopes[0]["variablesReference"], 1);

        let locals = response(&out, 8)["body"]["variables"].as_array().unwrap();
        assert_eq!(locals.len(), 2);
        assert_eq!(locals[0]["name"], "self");
        assert_eq!(locals[0]["variablesReference"], self_ref);
        assert_eq!(locals[1]["value"], "3");
        assert_eq!(locals[1]["variablesReference"], 0);

        let members = response(&out, 9)["body"]["variables"].as_array().unwrap();
        assert_eq!(members[0]["name"], "results");
        assert_eq!(members[0]["variablesReference"], results_ref);
        assert_eq!(members[0]["indexedVariables"], 3);

        let page = response(&out, 10)["body"]["variables"].as_array().unwrap();
        let names: Vec<&str> = page.iter().map(|v| v["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["1", "2"]);

        let bad_filter = response(&out, 11);
        assert_eq!(bad_filter["success"], false);
        assert!(bad_filter["message"].as_str().unwrap().contains("weird"));

        assert_eq!(response(&out, 12)["success"], true);
        assert_eq!(events(&out, "terminated").len(), 1);

        let stale = response(&out, 13);
        assert_eq!(stale["success"], false);
        assert!(stale["message"]
            .as_str()
            .unwrap()
            .contains("Invalid variable reference"));

        assert_eq!(response(&out, 14)["success"], true);
    }

    #[test]
    fn test_requests_before_launch_fail() {
        let out = run(&[
            request(1, "initialize", Value::Null),
            request(2, "stackTrace", json!({ "threadId": 1 })),
            request(3, "variables", json!({ "variablesReference": 1 })),
            request(4, "threads", Value::Null),
            request(5, "disconnect", Value::Null),
        ]);

        assert_eq!(response(&out, 2)["success"], false);
        assert_eq!(response(&out, 3)["success"], false);
        assert_eq!(response(&out, 4)["success"], true);
    }

    #[test]
    fn test_malformed_crash_fails_launch() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("crash.txt"), "Message: boom\nWeather: fine\n").unwrap();

        let out = run(&[
            request(1, "initialize", Value::Null),
            request(2, "launch", launch_args(dir.path())),
            request(3, "configurationDone", Value::Null),
            request(4, "disconnect", Value::Null),
        ]);

        let launch = response(&out, 2);
        assert_eq!(launch["success"], false);
        assert!(launch["message"]
            .as_str()
            .unwrap()
            .contains("Unknown crash section"));
        assert!(events(&out, "stopped").is_empty());
        assert!(events(&out, "output")
            .iter()
            .any(|e| e["body"]["category"] == "stderr"));
    }

    #[test]
    fn test_launch_without_configuration_done() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("crash.txt"), CRASH).unwrap();

        let out = run(&[
            request(1, "initialize", Value::Null),
            request(2, "launch", launch_args(dir.path())),
        ]);

        let launch = response(&out, 2);
        assert_eq!(launch["success"], false);
        assert!(launch["message"]
            .as_str()
            .unwrap()
            .contains("never completed"));
    }

    #[test]
    fn test_step_requests_terminate() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("crash.txt"), CRASH).unwrap();

        for command in ["next", "stepIn", "stepOut", "terminate"] {
            let out = run(&[
                request(1, "initialize", Value::Null),
                request(2, "launch", launch_args(dir.path())),
                request(3, "configurationDone", Value::Null),
                request(4, command, json!({ "threadId": 1 })),
                request(5, "disconnect", Value::Null),
            ]);
            assert_eq!(response(&out, 4)["success"], true, "{command}");
            assert_eq!(events(&out, "terminated").len(), 1, "{command}");
        }
    }

    #[test]
    fn test_unknown_command() {
        let out = run(&[
            request(1, "setVariable", json!({ "variablesReference": 1, "name": "x", "value": "1" })),
            request(2, "disconnect", Value::Null),
        ]);
        assert_eq!(response(&out, 1)["success"], false);
    }

    #[test]
    fn test_requests_answered_while_launch_waits() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("crash.txt"), CRASH).unwrap();

        let (tx, rx) = channel();
        let writer = SharedWriter::default();
        let adapter = {
            let writer = writer.clone();
            let reader = ChannelReader {
                rx,
                buf: Vec::new(),
                pos: 0,
            };
            thread::spawn(move || serve(reader, writer))
        };

        tx.send(frame(&request(1, "initialize", Value::Null))).unwrap();
        tx.send(frame(&request(2, "launch", launch_args(dir.path())))).unwrap();
        tx.send(frame(&request(
            3,
            "setExceptionBreakpoints",
            json!({ "filters": [] }),
        )))
        .unwrap();
        assert!(
            writer.wait_for("\"request_seq\":3,"),
            "setExceptionBreakpoints was not answered before configurationDone"
        );

        tx.send(frame(&request(4, "configurationDone", Value::Null))).unwrap();
        tx.send(frame(&request(5, "disconnect", Value::Null))).unwrap();
        drop(tx);
        adapter.join().unwrap().expect("adapter run");

        let out = messages(&writer.0.lock().unwrap());
        assert_eq!(response(&out, 3)["success"], true);
        assert_eq!(response(&out, 2)["success"], true);
        assert_eq!(events(&out, "stopped").len(), 1);

        let position = |seq: u64| {
            out.iter()
                .position(|m| m["type"] == "response" && m["request_seq"] == seq)
                .unwrap()
        };
        assert!(position(3) < position(4));
        assert!(position(4) < position(2));
    }

    #[test]
    fn test_breakpoint_requests_succeed_unverified() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("crash.txt"), CRASH).unwrap();

        let out = run(&[
            request(1, "initialize", Value::Null),
            request(2, "launch", launch_args(dir.path())),
            request(
                3,
                "setBreakpoints",
                json!({ "source": { "path": "Core/Scan.lua" }, "breakpoints": [{ "line": 12 }, { "line": 20 }] }),
            ),
            request(4, "setFunctionBreakpoints", json!({ "breakpoints": [] })),
            request(5, "threads", Value::Null),
            request(6, "configurationDone", Value::Null),
            request(7, "disconnect", Value::Null),
        ]);

        let set = response(&out, 3);
        assert_eq!(set["success"], true);
        let breakpoints = set["body"]["breakpoints"].as_array().unwrap();
        assert_eq!(breakpoints.len(), 2);
        assert_eq!(breakpoints[0]["verified"], false);
        assert_eq!(breakpoints[1]["line"], 20);

        assert_eq!(response(&out, 4)["success"], true);
        assert_eq!(response(&out, 5)["success"], true);
        assert_eq!(response(&out, 2)["success"], true);
    }
}
