use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped when a name is used as a relative href.
const HREF: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'[')
    .add(b']')
    .add(b'\\')
    .add(b'^')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Lexically cleans a slash-delimited URL path.
///
/// The result is rooted, has no empty or `.` segments, and resolves `..`
/// without ever climbing above `/`. A trailing slash is dropped.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Last segment of a slash-delimited path, ignoring trailing slashes.
/// Returns `/` for the root.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "/",
    }
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Encodes an entry name so it can be used as a relative link.
///
/// A colon in the first segment would read as a URL scheme, so such names
/// get a `./` prefix.
pub fn encode_href(name: &str) -> String {
    let encoded = utf8_percent_encode(name, HREF).to_string();
    let first = encoded.split('/').next().unwrap_or_default();
    if first.contains(':') {
        format!("./{}", encoded)
    } else {
        encoded
    }
}

/// Masks a secret for logging, keeping only its length in characters.
pub fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}
