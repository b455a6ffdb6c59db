use std::io::{self, Read, SeekFrom};
use std::ops::Bound;
use std::time::SystemTime;

use futures::{stream, Stream};
use headers::{
    AcceptRanges, ContentLength, ContentRange, ContentType, HeaderMapExt, IfModifiedSince,
    LastModified, Range,
};
use mime_guess::mime::{self, Mime};
use tracing::debug;
use warp::http::{HeaderMap, StatusCode};
use warp::hyper::Body;
use warp::reply::Response;

use crate::error::ShareError;
use crate::fs::{EntryInfo, Node};

/// Bytes inspected when the extension says nothing about the content type.
const SNIFF_LEN: usize = 512;
const CHUNK_SIZE: usize = 64 * 1024;

/// True when the client already holds a copy at least as new as `modified`.
pub fn not_modified(headers: &HeaderMap, modified: Option<SystemTime>) -> bool {
    match (headers.typed_get::<IfModifiedSince>(), modified) {
        (Some(since), Some(modified)) => !since.is_modified(modified),
        _ => false,
    }
}

pub fn not_modified_response(modified: Option<SystemTime>) -> Response {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = StatusCode::NOT_MODIFIED;
    if let Some(modified) = modified {
        res.headers_mut().typed_insert(LastModified::from(modified));
    }
    res
}

fn guess_type(name: &str) -> Option<Mime> {
    let guessed = mime_guess::from_path(name).first()?;
    if guessed.type_() == mime::TEXT && guessed.get_param(mime::CHARSET).is_none() {
        return format!("{}; charset=utf-8", guessed).parse().ok().or(Some(guessed));
    }
    Some(guessed)
}

fn sniff_type(prefix: &[u8]) -> Mime {
    let text = !prefix.contains(&0)
        && match std::str::from_utf8(prefix) {
            Ok(_) => true,
            // A multi-byte character cut off by the sniff window is fine.
            Err(err) => err.error_len().is_none(),
        };
    if text {
        mime::TEXT_PLAIN_UTF_8
    } else {
        mime::APPLICATION_OCTET_STREAM
    }
}

/// Resolves the first requested range against `len`.
///
/// Returns `Ok(None)` when no range was asked for, and `Err(())` when the
/// range cannot be satisfied.
fn byte_range(range: Option<Range>, len: u64) -> Result<Option<(u64, u64)>, ()> {
    let Some(range) = range else {
        return Ok(None);
    };
    let Some(bounds) = range.iter().next() else {
        return Ok(None);
    };

    let (start, end) = match bounds {
        (Bound::Unbounded, Bound::Included(suffix)) => {
            if suffix == 0 {
                return Err(());
            }
            (len.saturating_sub(suffix), len)
        }
        (Bound::Included(start), Bound::Included(last)) => {
            if last < start {
                return Err(());
            }
            (start, last.saturating_add(1).min(len))
        }
        (Bound::Included(start), Bound::Unbounded) => (start, len),
        _ => return Err(()),
    };
    if start >= len {
        return Err(());
    }
    Ok(Some((start, end)))
}

/// Streams `remaining` bytes of `node`, one blocking read per chunk.
fn body_stream<N: Node>(node: N, remaining: u64) -> impl Stream<Item = io::Result<Vec<u8>>> + Send {
    stream::try_unfold((node, remaining), |(node, remaining)| async move {
        if remaining == 0 {
            return Ok(None);
        }
        let (node, chunk) = tokio::task::spawn_blocking(move || {
            let mut node = node;
            let mut chunk = vec![0u8; remaining.min(CHUNK_SIZE as u64) as usize];
            let n = node.read(&mut chunk)?;
            chunk.truncate(n);
            Ok::<_, io::Error>((node, chunk))
        })
        .await
        .map_err(io::Error::other)??;

        if chunk.is_empty() {
            // File shrank since it was stat'ed.
            return Ok(None);
        }
        let remaining = remaining - chunk.len() as u64;
        Ok(Some((chunk, (node, remaining))))
    })
}

/// Builds the response for an opened file.
///
/// `info` must be the node's own stat. The body is empty for HEAD requests.
pub async fn serve<N: Node>(
    node: N,
    info: EntryInfo,
    headers: &HeaderMap,
    head_only: bool,
) -> Result<Response, ShareError> {
    if not_modified(headers, info.modified) {
        return Ok(not_modified_response(info.modified));
    }

    let len = info.size;
    let range = match byte_range(headers.typed_get::<Range>(), len) {
        Ok(range) => range,
        Err(()) => {
            debug!(name = %info.name, len, "unsatisfiable range");
            let mut res = Response::new(Body::empty());
            *res.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            res.headers_mut().typed_insert(ContentRange::unsatisfied_bytes(len));
            return Ok(res);
        }
    };
    let (start, end) = range.unwrap_or((0, len));

    let guessed = guess_type(&info.name);
    let (node, content_type) = tokio::task::spawn_blocking(move || {
        let mut node = node;
        let content_type = match guessed {
            Some(content_type) => content_type,
            None => {
                let mut prefix = Vec::with_capacity(SNIFF_LEN);
                (&mut node).take(SNIFF_LEN as u64).read_to_end(&mut prefix)?;
                sniff_type(&prefix)
            }
        };
        node.seek(SeekFrom::Start(start))?;
        Ok::<_, io::Error>((node, content_type))
    })
    .await
    .map_err(io::Error::other)??;

    let body = if head_only {
        Body::empty()
    } else {
        Body::wrap_stream(body_stream(node, end - start))
    };

    let mut res = Response::new(body);
    let headers = res.headers_mut();
    headers.typed_insert(ContentType::from(content_type));
    headers.typed_insert(ContentLength(end - start));
    headers.typed_insert(AcceptRanges::bytes());
    if let Some(modified) = info.modified {
        headers.typed_insert(LastModified::from(modified));
    }
    if range.is_some() {
        if let Ok(content_range) = ContentRange::bytes(start..end, len) {
            headers.typed_insert(content_range);
        }
        *res.status_mut() = StatusCode::PARTIAL_CONTENT;
    }
    Ok(res)
}
