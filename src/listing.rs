use std::fmt::Write;
use std::time::SystemTime;

use headers::{ContentType, HeaderMapExt, LastModified};
use mime_guess::mime;
use warp::hyper::Body;
use warp::reply::Response;

use crate::fs::EntryInfo;
use crate::utils::{encode_href, html_escape};

/// Renders the index page for a directory. Entries are shown sorted by name.
pub fn render(mut entries: Vec<EntryInfo>) -> String {
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut page = String::from("<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n");
    for entry in &entries {
        let mut name = entry.name.clone();
        if entry.is_dir() {
            name.push('/');
        }
        let _ = writeln!(
            page,
            "<a href=\"{}\">{}</a>",
            html_escape(&encode_href(&name)),
            html_escape(&name)
        );
    }
    page.push_str("</pre>\n");
    page
}

pub fn response(entries: Vec<EntryInfo>, modified: Option<SystemTime>, head_only: bool) -> Response {
    let page = render(entries);
    let mut res = Response::new(if head_only { Body::empty() } else { Body::from(page) });
    res.headers_mut().typed_insert(ContentType::from(mime::TEXT_HTML_UTF_8));
    if let Some(modified) = modified {
        res.headers_mut().typed_insert(LastModified::from(modified));
    }
    res
}
