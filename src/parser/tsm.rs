use once_cell::sync::Lazy;
use regex::Regex;

use super::tree::{LineTree, NodeRef};
use super::types::{CrashInfo, FrameInfo};
use super::value::{decode, Table};
use super::CrashInterpreter;
use crate::error::CrashError;

static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z][A-Za-z ]*):\s*(.*)$").expect("valid heading regex"));
static MESSAGE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\.\.\.)?\S*?AddOns[\\/]").expect("valid prefix regex"));
static FRAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\S+)\s+(.+)$").expect("valid frame regex"));
static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\.\.\.)?(?:.*?AddOns[\\/][^\\/]+[\\/])?(.+\.lua):(\d+)$")
        .expect("valid location regex")
});

const IGNORED_HEADINGS: &[&str] = &[
    "Time",
    "Client",
    "Locale",
    "Combat",
    "Error Count",
    "Temp Tables",
    "Object Pools",
    "Running Threads",
    "Addons",
];

/// TradeSkillMaster error reports: strict headings, frames with locals.
#[derive(Debug, Default, Clone, Copy)]
pub struct TsmInterpreter;

impl CrashInterpreter for TsmInterpreter {
    fn name(&self) -> &'static str {
        "tsm"
    }

    fn walk(&self, tree: &LineTree) -> Result<CrashInfo, CrashError> {
        let mut info = CrashInfo::default();

        for heading in tree.root().children() {
            let Some(caps) = HEADING.captures(heading.content()) else {
                return Err(CrashError::UnknownCrashSection(heading.content().to_string()));
            };
            let rest = caps[2].trim();

            match caps[1].trim() {
                "Message" => {
                    info.error_message = MESSAGE_PREFIX.replace(rest, "").into_owned();
                }
                "Stack Trace" => {
                    for line in heading.children() {
                        info.frames.push(parse_frame(line)?);
                    }
                }
                "Debug Log" => {
                    info.log_lines = heading
                        .children()
                        .map(|line| line.content().to_string())
                        .collect();
                    info.log_lines.reverse();
                }
                name if IGNORED_HEADINGS.contains(&name) => {
                    tracing::trace!(heading = name, "Skipping section");
                }
                _ => {
                    return Err(CrashError::UnknownCrashSection(heading.content().to_string()));
                }
            }
        }

        Ok(info)
    }
}

fn parse_frame(line: NodeRef<'_>) -> Result<FrameInfo, CrashError> {
    let caps = FRAME
        .captures(line.content())
        .ok_or_else(|| CrashError::UnrecognizedFrameSyntax(line.content().to_string()))?;
    let location = &caps[1];
    let name = caps[2].trim();
    let name = name
        .strip_prefix('<')
        .and_then(|n| n.strip_suffix('>'))
        .unwrap_or(name);

    let mut frame = FrameInfo::new(name, location);
    if let Some(loc) = LOCATION.captures(location) {
        let line_no = loc[2].parse::<i64>().unwrap_or(0);
        frame = frame.at(&loc[1], line_no);
    }

    let mut locals = Table::new();
    for child in line.children() {
        if let Some((name, value)) = decode(child)? {
            locals.insert(name, value);
        }
    }
    Ok(frame.with_locals(locals))
}
