//! Test fixtures: game sources, image headers, zip bundles and multipart bodies.

use std::io::Write;

use zip::write::SimpleFileOptions;

pub const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Minimal PNG: signature and IHDR only.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = PNG_SIGNATURE.to_vec();
    out.extend_from_slice(&13u32.to_be_bytes());
    out.extend_from_slice(b"IHDR");
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&[8, 6, 0, 0, 0, 0, 0, 0, 0]);
    out
}

/// [`png`] padded with zeros to `total_len` bytes.
pub fn png_of_size(width: u32, height: u32, total_len: usize) -> Vec<u8> {
    let mut out = png(width, height);
    assert!(total_len >= out.len());
    out.resize(total_len, 0);
    out
}

/// Baseline JPEG header with an APP0 segment before the frame.
pub fn jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    out.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
    out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[0x03, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

pub fn valid_thumbnail() -> Vec<u8> {
    png(400, 300)
}

/// Game object with the given methods, each with a trivial body.
pub fn script_with_methods(methods: &[&str]) -> String {
    let mut out = String::from("const ClawmachineGame = {\n");
    for method in methods {
        out.push_str(&format!("  {}(arg) {{ return arg; }},\n", method));
    }
    out.push_str("};\n");
    out
}

pub fn valid_script() -> String {
    r#"const ClawmachineGame = {
  init(canvas) { this.canvas = canvas; this.score = 0; },
  start() { this.running = true; },
  reset() { this.score = 0; },
  getState() { return { score: this.score }; },
  sendInput(input) { if (input === "up") { this.score += 1; } },
  getMeta() { return { name: "Snake", version: "1.0" }; },
};
"#
    .to_string()
}

/// Valid script padded with a trailing line comment to exactly `len` bytes.
pub fn script_of_size(len: usize) -> String {
    let mut out = valid_script();
    out.push_str("// ");
    assert!(len >= out.len());
    let pad = len - out.len();
    out.push_str(&"x".repeat(pad));
    assert_eq!(out.len(), len);
    out
}

pub fn html_page(body_script: &str, extra_head: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta name=\"viewport\" content=\"width=device-width\">\n{}\n</head>\n<body>\n<canvas id=\"clawmachine-canvas\"></canvas>\n<script>\n{}\n</script>\n</body>\n</html>\n",
        extra_head, body_script
    )
}

pub fn valid_html() -> String {
    html_page(&valid_script(), "")
}

/// Deflated zip with the given `(path, contents)` entries.
pub fn zip_bundle(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (path, data) in entries {
        writer.start_file(*path, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub const BOUNDARY: &str = "clawmachine-test-boundary";

enum Part {
    Text(String, String),
    File(String, String, Vec<u8>),
}

/// Hand-built `multipart/form-data` body.
#[derive(Default)]
pub struct Form {
    parts: Vec<Part>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.retain(|p| !matches!(p, Part::Text(n, _) if n == name));
        self.parts.push(Part::Text(name.into(), value.into()));
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.parts.retain(|p| !matches!(p, Part::File(n, _, _) if n == name));
        self.parts
            .push(Part::File(name.into(), file_name.into(), data.into()));
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.parts.retain(|p| match p {
            Part::Text(n, _) | Part::File(n, _, _) => n != name,
        });
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        for part in &self.parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }
}

/// A script submission that passes every stage.
pub fn script_form(title: &str) -> Form {
    Form::new()
        .text("title", title)
        .text("genre", "arcade")
        .text("format", "script")
        .text("dimensions", "2d")
        .text("tags", "retro,snake")
        .file("game_file", "game.js", valid_script())
        .file("thumbnail", "thumb.png", valid_thumbnail())
}

/// An HTML submission that passes every stage.
pub fn html_form(title: &str) -> Form {
    Form::new()
        .text("title", title)
        .text("genre", "puzzle")
        .file("game_file", "index.html", valid_html())
        .file("thumbnail", "thumb.png", valid_thumbnail())
}

/// A zip bundle submission that passes every stage.
pub fn bundle_form(title: &str) -> Form {
    let bundle = zip_bundle(&[
        ("game.js", valid_script().into_bytes()),
        ("assets/player.png", png(32, 32)),
        ("assets/jump.ogg", vec![1u8; 2048]),
        ("levels/level1.json", br#"{"tiles":[0,1,0]}"#.to_vec()),
    ]);
    Form::new()
        .text("title", title)
        .text("genre", "action")
        .text("tier", "2d_basic")
        .file("game_file", "bundle.zip", bundle)
        .file("thumbnail", "thumb.jpg", jpeg(400, 300))
}
