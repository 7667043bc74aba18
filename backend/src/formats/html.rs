//! Structural checks for single-file HTML games.
//!
//! Markup is inspected with comments removed, so a tag hidden inside
//! `<!-- -->` neither satisfies a requirement nor trips a rule. Script reaches
//! the scanner from inline `<script>` bodies, event-handler attributes and
//! `javascript:` URLs.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Rejection, SubReason};
use crate::models::game::Dimensions;

pub const CANVAS_ID: &str = "clawmachine-canvas";

fn comment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap())
}

fn script_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").unwrap())
}

fn src_attr_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)src\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#).unwrap()
    })
}

fn canvas_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)<canvas\b[^>]*\sid\s*=\s*(?:"clawmachine-canvas"|'clawmachine-canvas'|clawmachine-canvas(?:[\s/>]|$))"#,
        )
        .unwrap()
    })
}

fn viewport_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<meta\b[^>]*\sname\s*=\s*["']?viewport["'\s/>]"#).unwrap()
    })
}

/// Opening tags. Quoted attribute values may contain `>`.
fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<[A-Za-z][^\s/>]*(?:"[^"]*"|'[^']*'|[^'">])*>"#).unwrap())
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)[\s/]([a-z_:][-a-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#)
            .unwrap()
    })
}

fn entity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([a-zA-Z]+));?").unwrap())
}

fn required_elements() -> &'static [(&'static str, Regex)] {
    static RE: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RE.get_or_init(|| {
        vec![
            ("<!DOCTYPE html>", Regex::new(r"(?i)<!doctype\s+html").unwrap()),
            ("<html>", Regex::new(r"(?i)<html[\s>]").unwrap()),
            ("<body>", Regex::new(r"(?i)<body[\s>]").unwrap()),
            ("<script>", Regex::new(r"(?i)<script[\s>]").unwrap()),
        ]
    })
}

/// Result of a passing HTML structure check.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    /// Markup with HTML comments removed.
    pub markup: String,
    /// Bodies of `<script>` elements without a `src` attribute.
    pub inline_scripts: Vec<String>,
    /// Code from `on*` attributes and `javascript:` URLs, entity-decoded.
    pub attribute_scripts: Vec<String>,
    pub has_viewport: bool,
}

impl HtmlDocument {
    /// All script in the page joined for scanning.
    pub fn script_source(&self) -> String {
        self.inline_scripts
            .iter()
            .chain(&self.attribute_scripts)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n;\n")
    }
}

/// Decode game bytes as UTF-8 text.
pub fn decode_utf8(bytes: &[u8], what: &str) -> Result<String, Rejection> {
    std::str::from_utf8(bytes)
        .map(|s| s.trim_start_matches('\u{feff}').to_string())
        .map_err(|e| {
            Rejection::game_file(
                SubReason::InvalidEncoding,
                format!("{} must be UTF-8 text", what),
            )
            .with_detail("byte_offset", e.valid_up_to())
        })
}

pub fn strip_html_comments(markup: &str) -> String {
    comment_regex().replace_all(markup, "").into_owned()
}

pub fn has_viewport_meta(markup: &str) -> bool {
    viewport_regex().is_match(markup)
}

/// Validate a single-file HTML game.
pub fn validate_html(
    bytes: &[u8],
    dimensions: Dimensions,
    allowed_hosts: &[String],
) -> Result<HtmlDocument, Rejection> {
    let text = decode_utf8(bytes, "HTML game file")?;
    let markup = strip_html_comments(&text);

    let missing: Vec<&str> = required_elements()
        .iter()
        .filter(|(_, re)| !re.is_match(&markup))
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(Rejection::game_file(
            SubReason::MissingHtmlStructure,
            format!("HTML game is missing required elements: {}", missing.join(", ")),
        )
        .with_detail("missing_elements", missing));
    }

    if dimensions == Dimensions::TwoD && !canvas_regex().is_match(&markup) {
        return Err(Rejection::game_file(
            SubReason::MissingCanvas,
            format!("2D HTML games must contain <canvas id=\"{}\">", CANVAS_ID),
        )
        .with_detail("expected_id", CANVAS_ID));
    }

    let mut inline_scripts = Vec::new();
    let mut invalid_scripts = Vec::new();
    for captures in script_regex().captures_iter(&markup) {
        let attrs = captures.get(1).map_or("", |m| m.as_str());
        let body = captures.get(2).map_or("", |m| m.as_str());
        match script_src(attrs) {
            Some(src) => {
                if !is_allowed_script_src(&src, allowed_hosts) {
                    invalid_scripts.push(src);
                }
            }
            None => inline_scripts.push(body.to_string()),
        }
    }
    if !invalid_scripts.is_empty() {
        return Err(Rejection::game_file(
            SubReason::InvalidExternalScript,
            "External scripts must be loaded over https from an allowed CDN",
        )
        .with_detail("invalid_scripts", invalid_scripts)
        .with_detail("allowed_hosts", allowed_hosts));
    }

    let attribute_scripts = attribute_scripts(&markup);
    let has_viewport = has_viewport_meta(&markup);
    Ok(HtmlDocument {
        markup,
        inline_scripts,
        attribute_scripts,
        has_viewport,
    })
}

/// Script carried by attributes: event handlers and `javascript:` URLs.
pub fn attribute_scripts(markup: &str) -> Vec<String> {
    let tags_only = script_regex().replace_all(markup, "<script${1}></script>");
    let mut found = Vec::new();
    for tag in tag_regex().find_iter(&tags_only) {
        for captures in attribute_regex().captures_iter(tag.as_str()) {
            let name = captures[1].to_ascii_lowercase();
            let raw = captures
                .get(2)
                .or_else(|| captures.get(3))
                .or_else(|| captures.get(4))
                .map_or("", |m| m.as_str());
            let value = decode_entities(raw);
            if name.len() > 2 && name.starts_with("on") {
                found.push(value);
            } else if let Some(code) = javascript_url_body(&value) {
                found.push(code.to_string());
            }
        }
    }
    found
}

/// Code after a `javascript:` scheme, which browsers match case-insensitively
/// and with whitespace or control characters interspersed.
fn javascript_url_body(value: &str) -> Option<&str> {
    let mut scheme = "javascript:".chars();
    let mut want = scheme.next();
    for (i, c) in value.char_indices() {
        if c.is_ascii_whitespace() || c.is_ascii_control() {
            continue;
        }
        match want {
            Some(w) if c.eq_ignore_ascii_case(&w) => {
                want = scheme.next();
                if want.is_none() {
                    return Some(&value[i + c.len_utf8()..]);
                }
            }
            _ => return None,
        }
    }
    None
}

/// Decode numeric and common named character references in an attribute.
fn decode_entities(value: &str) -> String {
    entity_regex()
        .replace_all(value, |caps: &regex::Captures| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                match caps.get(3).map(|m| m.as_str()) {
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    Some("amp") => Some('&'),
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("lpar") => Some('('),
                    Some("rpar") => Some(')'),
                    Some("colon") => Some(':'),
                    Some("period") => Some('.'),
                    Some("Tab") => Some('\t'),
                    Some("NewLine") => Some('\n'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

fn script_src(attrs: &str) -> Option<String> {
    let captures = src_attr_regex().captures(attrs)?;
    let value = captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))?;
    Some(value.as_str().trim().to_string())
}

/// True when `src` is an https or protocol-relative URL on an allowed host.
pub fn is_allowed_script_src(src: &str, allowed_hosts: &[String]) -> bool {
    let lower = src.to_ascii_lowercase();
    let rest = if let Some(rest) = lower.strip_prefix("https://") {
        rest
    } else if let Some(rest) = lower.strip_prefix("//") {
        rest
    } else {
        return false;
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.contains('@') {
        return false;
    }
    let host = authority.strip_suffix(":443").unwrap_or(authority);
    !host.is_empty() && allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn hosts() -> Vec<String> {
        vec!["cdn.jsdelivr.net".into(), "unpkg.com".into()]
    }

    fn page(head: &str, body: &str) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>{}</head>\n<body>\n{}\n</body>\n</html>\n",
            head, body
        )
    }

    const CANVAS: &str = r#"<canvas id="clawmachine-canvas"></canvas>"#;

    #[test]
    fn test_valid_2d_page() {
        let html = page(
            r#"<meta name="viewport" content="width=device-width">"#,
            &format!("{}<script>window.x = 1;</script>", CANVAS),
        );
        let doc = validate_html(html.as_bytes(), Dimensions::TwoD, &hosts()).unwrap();
        assert_eq!(doc.inline_scripts, vec!["window.x = 1;"]);
        assert!(doc.has_viewport);
    }

    #[test]
    fn test_missing_elements_are_listed() {
        let html = "<html><body><canvas id=\"clawmachine-canvas\"></canvas></body></html>";
        let err = validate_html(html.as_bytes(), Dimensions::TwoD, &hosts()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGameFile);
        assert_eq!(err.reason, Some(SubReason::MissingHtmlStructure));
        let missing = err.details["missing_elements"].as_array().unwrap();
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0], "<!DOCTYPE html>");
        assert_eq!(missing[1], "<script>");
    }

    #[test]
    fn test_element_in_comment_does_not_count() {
        let html = "<!DOCTYPE html><html><body><!-- <script></script> --></body></html>";
        let err = validate_html(html.as_bytes(), Dimensions::ThreeD, &hosts()).unwrap_err();
        assert_eq!(err.reason, Some(SubReason::MissingHtmlStructure));
    }

    #[test]
    fn test_2d_requires_canvas_but_3d_does_not() {
        let html = page("", "<canvas id=\"other\"></canvas><script>1</script>");
        let err = validate_html(html.as_bytes(), Dimensions::TwoD, &hosts()).unwrap_err();
        assert_eq!(err.reason, Some(SubReason::MissingCanvas));
        assert!(validate_html(html.as_bytes(), Dimensions::ThreeD, &hosts()).is_ok());
    }

    #[test]
    fn test_canvas_id_attribute_forms() {
        for tag in [
            r#"<canvas width="400" id='clawmachine-canvas'>"#,
            r#"<CANVAS ID=clawmachine-canvas>"#,
        ] {
            let html = page("", &format!("{}<script>1</script>", tag));
            assert!(validate_html(html.as_bytes(), Dimensions::TwoD, &hosts()).is_ok(), "{}", tag);
        }
        let html = page("", r#"<canvas data-id="clawmachine-canvas"><script>1</script>"#);
        assert!(validate_html(html.as_bytes(), Dimensions::TwoD, &hosts()).is_err());
    }

    #[test]
    fn test_external_scripts_collected() {
        let body = format!(
            concat!(
                "{}",
                r#"<script src="https://cdn.jsdelivr.net/npm/phaser.js"></script>"#,
                r#"<script src="http://unpkg.com/x.js"></script>"#,
                r#"<script src="https://evil.example/x.js"></script>"#,
                r#"<script src="lib/local.js"></script>"#,
                "<script>1</script>"
            ),
            CANVAS
        );
        let err = validate_html(page("", &body).as_bytes(), Dimensions::TwoD, &hosts()).unwrap_err();
        assert_eq!(err.reason, Some(SubReason::InvalidExternalScript));
        let invalid = err.details["invalid_scripts"].as_array().unwrap();
        assert_eq!(invalid.len(), 3);
        assert_eq!(err.details["allowed_hosts"][1], "unpkg.com");
    }

    #[test]
    fn test_allowed_script_src() {
        let hosts = hosts();
        assert!(is_allowed_script_src("https://unpkg.com/a.js", &hosts));
        assert!(is_allowed_script_src("//cdn.jsdelivr.net/a.js", &hosts));
        assert!(is_allowed_script_src("HTTPS://UNPKG.COM/a.js", &hosts));
        assert!(!is_allowed_script_src("https://unpkg.com.evil.io/a.js", &hosts));
        assert!(!is_allowed_script_src("https://evil.io@unpkg.com/a.js", &hosts));
        assert!(!is_allowed_script_src("data:text/javascript,alert(1)", &hosts));
        assert!(!is_allowed_script_src("/abs/path.js", &hosts));
    }

    #[test]
    fn test_non_utf8_rejected() {
        let err = validate_html(&[0x3c, 0xff, 0xfe], Dimensions::TwoD, &hosts()).unwrap_err();
        assert_eq!(err.reason, Some(SubReason::InvalidEncoding));
    }

    #[test]
    fn test_comments_removed_from_inline_scan_input() {
        let html = page("", &format!("{}<!-- <script>fetch('x')</script> --><script>ok()</script>", CANVAS));
        let doc = validate_html(html.as_bytes(), Dimensions::TwoD, &hosts()).unwrap();
        assert_eq!(doc.inline_scripts, vec!["ok()"]);
        assert!(!doc.has_viewport);
    }

    #[test]
    fn test_event_handlers_and_javascript_urls_collected() {
        let body = format!(
            concat!(
                "{}<script>if (a > b) {{ go(); }}</script>",
                r#"<img src="x.png" onerror='localStorage.clear()'>"#,
                r#"<a HREF=" JavaScript:fetch(&quot;/x&quot;)">x</a>"#,
                r#"<button title="a > b" onclick="start()">go</button>"#,
                r#"<a href="/about">about</a>"#
            ),
            CANVAS
        );
        let html = page("", &body).replace("<body>", r#"<body onload="boot()">"#);
        let doc = validate_html(html.as_bytes(), Dimensions::TwoD, &hosts()).unwrap();
        assert_eq!(
            doc.attribute_scripts,
            vec!["boot()", "localStorage.clear()", r#"fetch("/x")"#, "start()"]
        );
        assert!(doc.script_source().contains("localStorage.clear()"));
    }

    #[test]
    fn test_handler_entities_decoded() {
        let scripts = attribute_scripts(r#"<div onclick="&#102;etch&#x28;1)">"#);
        assert_eq!(scripts, vec!["fetch(1)"]);
    }

    #[test]
    fn test_javascript_scheme_with_interspersed_whitespace() {
        assert_eq!(javascript_url_body("java\tscript:go()"), Some("go()"));
        assert_eq!(javascript_url_body("https://x"), None);
    }
}
