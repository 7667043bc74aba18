//! Forbidden capability catalogue and non-blocking warning rules.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::submission::{Warning, WarningCode};

/// A capability games may not use.
pub struct ForbiddenApi {
    pub name: &'static str,
    pattern: Regex,
}

const CATALOGUE: &[(&str, &str)] = &[
    ("localStorage", r"\blocalStorage\b"),
    ("sessionStorage", r"\bsessionStorage\b"),
    ("indexedDB", r"\bindexedDB\b"),
    ("document.cookie", r"\bdocument\s*\.\s*cookie\b"),
    ("fetch", r"\bfetch\s*\("),
    ("XMLHttpRequest", r"\bXMLHttpRequest\b"),
    ("WebSocket", r"\bWebSocket\b"),
    ("EventSource", r"\bEventSource\b"),
    ("navigator.sendBeacon", r"\bsendBeacon\b"),
    ("eval", r"\beval\s*\("),
    ("Function constructor", r"\bFunction\s*\("),
    ("dynamic import", r"\bimport\s*\("),
    ("importScripts", r"\bimportScripts\s*\("),
    ("window.open", r"\bwindow\s*\.\s*open\s*\("),
    ("string timer", r#"\bset(?:Timeout|Interval)\s*\(\s*["'`]"#),
    ("Worker", r"\bnew\s+(?:Shared)?Worker\s*\("),
    ("window.parent", r"\bwindow\s*\.\s*(?:parent|top)\b"),
];

pub fn forbidden_apis() -> &'static [ForbiddenApi] {
    static RULES: OnceLock<Vec<ForbiddenApi>> = OnceLock::new();
    RULES.get_or_init(|| {
        CATALOGUE
            .iter()
            .map(|&(name, pattern)| ForbiddenApi {
                name,
                pattern: Regex::new(pattern).unwrap(),
            })
            .collect()
    })
}

fn console_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bconsole\s*\.\s*(?:log|debug|info|warn|error|trace|table)\s*\(").unwrap()
    })
}

fn dialog_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)(?:^|[^.\w$])(?:window\s*\.\s*)?(?:alert|confirm|prompt)\s*\(").unwrap()
    })
}

/// Names of every forbidden API present, in catalogue order.
pub fn find_forbidden(source: &str) -> Vec<&'static str> {
    forbidden_apis()
        .iter()
        .filter(|api| api.pattern.is_match(source))
        .map(|api| api.name)
        .collect()
}

/// Debug-output and blocking-dialog warnings.
pub fn collect_warnings(source: &str) -> Vec<Warning> {
    let mut warnings = Vec::new();

    let console_calls = console_regex().find_iter(source).count();
    if console_calls > 0 {
        warnings.push(Warning::new(
            WarningCode::DebugOutput,
            format!("Found {} console call(s); remove debug output before release", console_calls),
        ));
    }

    let dialogs = dialog_regex().find_iter(source).count();
    if dialogs > 0 {
        warnings.push(Warning::new(
            WarningCode::BlockingDialog,
            format!("Found {} alert/confirm/prompt call(s); dialogs block the player", dialogs),
        ));
    }

    warnings
}
