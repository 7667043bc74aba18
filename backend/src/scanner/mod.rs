//! Static source scanner.
//!
//! Runs over comment-stripped JavaScript and checks, in order: the game object
//! exists, it exposes every required method, and no forbidden capability is
//! referenced. The interface checks see code only, with literal text blanked;
//! the forbidden-API check also sees string contents. Submitted code is never
//! executed.

pub mod lexer;
pub mod rules;

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Rejection, SubReason};
use crate::models::submission::{Warning, WarningCode};

pub use lexer::{blank_literals, strip_comments};

/// Global every game must define.
pub const GAME_OBJECT: &str = "ClawmachineGame";

/// Methods the runtime calls on the game object.
pub const REQUIRED_METHODS: [&str; 6] = ["init", "start", "reset", "getState", "sendInput", "getMeta"];

/// Where the scanned source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Script,
    Html { has_viewport: bool },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub warnings: Vec<Warning>,
}

fn game_object_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bclass\s+ClawmachineGame\b|\bClawmachineGame\s*=[^=>]").unwrap()
    })
}

fn method_regexes() -> &'static [(&'static str, Regex)] {
    static RE: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RE.get_or_init(|| {
        REQUIRED_METHODS
            .iter()
            .map(|&method| {
                let pattern = format!(
                    r"(?m)(?:\b{m}\s*:|\b{m}\s*\([^()]*\)\s*\{{|\.{m}\s*=[^=]|^\s*{m}\s*=[^=]|\basync\s+{m}\s*\()",
                    m = method
                );
                (method, Regex::new(&pattern).unwrap())
            })
            .collect()
    })
}

/// Byte range of the `{ ... }` block opening at or after `from`.
fn balanced_block(source: &str, from: usize) -> Option<&str> {
    let bytes = source.as_bytes();
    let open = from + source[from..].find('{')?;
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' | b'`' => quote = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&source[open..=i]);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Text in which to look for the game object's methods.
///
/// An object literal or class body is used when the definition has one;
/// otherwise methods may be attached anywhere, so the whole source is used.
fn game_object_scope(source: &str) -> Option<&str> {
    let found = game_object_regex().find(source)?;
    let after = &source[found.start()..];

    let rhs_start = if after.starts_with("class") {
        found.end()
    } else {
        let eq = after.find('=')?;
        let rest = after[eq + 1..].trim_start();
        if !(rest.starts_with('{') || rest.starts_with("class")) {
            return Some(source);
        }
        found.start() + eq + 1
    };
    Some(balanced_block(source, rhs_start).unwrap_or(source))
}

/// Scan game source. Fails on the first failing check, collecting all findings
/// within that check.
pub fn scan(source: &str, mode: ScanMode) -> Result<ScanReport, Rejection> {
    let stripped = strip_comments(source);
    let code = blank_literals(source);

    let scope = game_object_scope(&code).ok_or_else(|| {
        Rejection::game_file(
            SubReason::MissingGameObject,
            format!("Game source must define a {} object", GAME_OBJECT),
        )
        .with_detail("expected_object", GAME_OBJECT)
    })?;

    let missing: Vec<&str> = method_regexes()
        .iter()
        .filter(|(_, re)| !re.is_match(scope))
        .map(|(method, _)| *method)
        .collect();
    if !missing.is_empty() {
        return Err(Rejection::game_file(
            SubReason::MissingMethod,
            format!("{} is missing required methods: {}", GAME_OBJECT, missing.join(", ")),
        )
        .with_detail("missing_methods", missing)
        .with_detail("required_methods", REQUIRED_METHODS));
    }

    let found = rules::find_forbidden(&stripped);
    if !found.is_empty() {
        return Err(Rejection::game_file(
            SubReason::ForbiddenApi,
            format!("Game source uses forbidden APIs: {}", found.join(", ")),
        )
        .with_detail("found_apis", found));
    }

    let mut warnings = rules::collect_warnings(&stripped);
    if let ScanMode::Html { has_viewport: false } = mode {
        warnings.push(Warning::new(
            WarningCode::MissingViewport,
            "No <meta name=\"viewport\"> tag; the game may render poorly on mobile",
        ));
    }

    Ok(ScanReport { warnings })
}
