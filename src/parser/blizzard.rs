use once_cell::sync::Lazy;
use regex::Regex;

use super::tree::{LineTree, NodeRef};
use super::types::{CrashInfo, FrameInfo};
use super::CrashInterpreter;
use crate::error::CrashError;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]+):\s*(.*)$").expect("valid heading regex"));
static FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\[string "@?(.+?)"\]:(\d+):\s*(.*)$"#).expect("valid frame regex")
});
/// `[C]: ...`, or the chunk form `[string "=[C]"]: ...` / `[string "=(tail call)"]: ?`.
static NATIVE_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\[(?:C|string "=([^"]*)")\]:\s*(.*)$"#).expect("valid native frame regex")
});
static BARE_LOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+?):(\d+):\s*(.*)$").expect("valid location regex"));
static ADDON_ROOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?AddOns[\\/][^\\/]+[\\/])").expect("valid addon root regex"));
static FUNCTION_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^in function (?:<(.+)>|[`'](.+)')$").expect("valid function name regex")
});

const ELIDED: &str = "...";

/// The stock error frame / BugSack layout. Locals are not decoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlizzardInterpreter;

/// A frame line before its path is made addon-relative.
#[derive(Debug)]
struct RawFrame {
    label: String,
    path: Option<String>,
    line: i64,
    name: String,
}

impl CrashInterpreter for BlizzardInterpreter {
    fn name(&self) -> &'static str {
        "blizzard"
    }

    fn walk(&self, tree: &LineTree) -> Result<CrashInfo, CrashError> {
        let mut info = CrashInfo::default();
        let mut in_locals = false;

        for heading in tree.root().children() {
            if in_locals {
                continue;
            }
            let Some(caps) = HEADING.captures(heading.content()) else {
                return Err(CrashError::UnknownCrashSection(heading.content().to_string()));
            };
            let rest = caps[2].trim();

            match &caps[1] {
                "Message" => info.error_message = rest.to_string(),
                "Time" | "Count" => {}
                "Stack" => info.frames = parse_stack(rest, heading)?,
                "Locals" => {
                    tracing::debug!("Locals are not decoded for the blizzard format");
                    in_locals = true;
                }
                _ => {
                    return Err(CrashError::UnknownCrashSection(heading.content().to_string()));
                }
            }
        }

        Ok(info)
    }
}

fn parse_stack(first: &str, heading: NodeRef<'_>) -> Result<Vec<FrameInfo>, CrashError> {
    if first.is_empty() {
        return Err(CrashError::MalformedStackHeader(
            "missing first frame".to_string(),
        ));
    }

    let mut rest = Vec::new();
    for line in heading.children() {
        let text = line.content();
        if text == ELIDED {
            break;
        }
        rest.push(parse_frame_line(text)?);
    }

    let mut head = match parse_frame_line(first) {
        Ok(frame) => frame,
        Err(_) => parse_bare_location(first)?,
    };
    let head_path = head
        .path
        .clone()
        .ok_or_else(|| CrashError::MalformedStackHeader(first.to_string()))?;
    let full_path = complete_partial_path(&head_path, &rest)
        .ok_or_else(|| CrashError::MalformedStackHeader(first.to_string()))?;
    head.path = Some(full_path.clone());

    let root = ADDON_ROOT
        .captures(&full_path)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| CrashError::MalformedStackHeader(full_path.clone()))?;
    tracing::debug!(addon_root = %root, "Resolved addon root");

    // The header usually repeats the innermost frame; keep the child's name.
    if let Some(next) = rest.first() {
        if next.path.as_deref() == head.path.as_deref() && next.line == head.line {
            head.name = next.name.clone();
            rest.remove(0);
        }
    }

    Ok(std::iter::once(head)
        .chain(rest)
        .map(|raw| into_frame(raw, &root))
        .collect())
}

fn parse_frame_line(text: &str) -> Result<RawFrame, CrashError> {
    if let Some(caps) = FRAME.captures(text) {
        return Ok(RawFrame {
            label: format!("{}:{}", &caps[1], &caps[2]),
            path: Some(caps[1].to_string()),
            line: caps[2].parse().unwrap_or(0),
            name: unwrap_function_name(&caps[3]),
        });
    }
    if let Some(caps) = NATIVE_FRAME.captures(text) {
        return Ok(RawFrame {
            label: caps.get(1).map_or("[C]", |m| m.as_str()).to_string(),
            path: None,
            line: 0,
            name: unwrap_function_name(&caps[2]),
        });
    }
    Err(CrashError::UnrecognizedFrameSyntax(text.to_string()))
}

/// `Interface/AddOns/Foo/Bar.lua:12: attempt to index ...`
fn parse_bare_location(text: &str) -> Result<RawFrame, CrashError> {
    let caps = BARE_LOCATION
        .captures(text)
        .ok_or_else(|| CrashError::MalformedStackHeader(text.to_string()))?;
    Ok(RawFrame {
        label: format!("{}:{}", &caps[1], &caps[2]),
        path: Some(caps[1].to_string()),
        line: caps[2].parse().unwrap_or(0),
        name: String::new(),
    })
}

/// Resolve a `...`-truncated path against later frames ending the same way.
fn complete_partial_path(path: &str, later: &[RawFrame]) -> Option<String> {
    let Some(suffix) = path.strip_prefix(ELIDED) else {
        return Some(path.to_string());
    };
    later
        .iter()
        .filter_map(|frame| frame.path.as_deref())
        .find(|candidate| candidate.ends_with(suffix))
        .map(str::to_string)
}

fn into_frame(raw: RawFrame, root: &str) -> FrameInfo {
    let frame = FrameInfo::new(raw.name, raw.label);
    match raw.path {
        Some(path) => {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            frame.at(relative, raw.line)
        }
        None => frame,
    }
}

fn unwrap_function_name(text: &str) -> String {
    let text = text.trim();
    FUNCTION_NAME
        .captures(text)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map_or_else(|| text.to_string(), |m| m.as_str().to_string())
}
