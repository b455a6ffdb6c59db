use std::convert::Infallible;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::{debug, error, info};
use warp::http::header::{HeaderValue, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use warp::http::{HeaderMap, StatusCode};
use warp::hyper::Body;
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::auth::{self, Credentials, Unauthorized};
use crate::content;
use crate::error::{ListError, ShareError};
use crate::filtered::FilteredFileAccess;
use crate::fs::{EntryInfo, FileSystem, Node, RootDir};
use crate::listing;
use crate::utils::{base_name, clean_path, encode_href};
use crate::ShareConfig;

/// What a request resolved to, decided on the blocking pool.
enum Target<N> {
    Redirect(String),
    File(N, EntryInfo),
    Listing(Vec<EntryInfo>, EntryInfo),
    Unreadable(ListError),
}

fn plain_text(status: StatusCode, message: &str) -> Response {
    let mut res = Response::new(Body::from(format!("{}\n", message)));
    *res.status_mut() = status;
    res.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    res.headers_mut()
        .insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    res
}

fn error_response(err: &ShareError) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!(%err, "request failed");
    } else {
        debug!(%err, "request refused");
    }
    plain_text(status, err.message())
}

fn redirect(location: &str, query: &str) -> Response {
    let location = if query.is_empty() {
        location.to_string()
    } else {
        format!("{}?{}", location, query)
    };
    let mut res = Response::new(Body::empty());
    *res.status_mut() = StatusCode::MOVED_PERMANENTLY;
    match HeaderValue::from_str(&location) {
        Ok(value) => {
            res.headers_mut().insert(LOCATION, value);
        }
        Err(err) => {
            error!(%err, location, "unusable redirect target");
            return plain_text(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error");
        }
    }
    res
}

/// Opens `name` and decides how to answer. `upath` is the decoded request
/// path, whose trailing slash drives the directory/file redirects.
fn resolve<F: FileSystem>(files: &F, name: &str, upath: &str) -> Result<Target<F::Node>, ShareError> {
    let mut node = files.open(name)?;
    let mut info = node.stat()?;

    if info.is_dir() {
        if !upath.ends_with('/') {
            return Ok(Target::Redirect(format!("{}/", encode_href(base_name(upath)))));
        }
    } else if upath.ends_with('/') {
        return Ok(Target::Redirect(format!("../{}", encode_href(base_name(upath)))));
    }

    if info.is_dir() {
        let index = format!("{}/index.html", name.trim_end_matches('/'));
        if let Ok(index_node) = files.open(&index) {
            match index_node.stat() {
                Ok(index_info) if !index_info.is_dir() => {
                    node = index_node;
                    info = index_info;
                }
                _ => {}
            }
        }
    }

    if !info.is_dir() {
        return Ok(Target::File(node, info));
    }
    match node.read_dir(None) {
        Ok(entries) => Ok(Target::Listing(entries, info)),
        Err(err) => Ok(Target::Unreadable(err)),
    }
}

async fn handle<F>(
    head_only: bool,
    full: FullPath,
    query: String,
    headers: HeaderMap,
    files: Arc<F>,
) -> Result<Response, Infallible>
where
    F: FileSystem + 'static,
{
    let decoded = percent_decode_str(full.as_str()).decode_utf8_lossy();
    let upath = if decoded.starts_with('/') {
        decoded.into_owned()
    } else {
        format!("/{}", decoded)
    };

    if upath.ends_with("/index.html") {
        return Ok(redirect("./", &query));
    }

    let name = clean_path(&upath);
    let resolved = {
        let upath = upath.clone();
        tokio::task::spawn_blocking(move || resolve(files.as_ref(), &name, &upath)).await
    };
    let target = match resolved {
        Ok(Ok(target)) => target,
        Ok(Err(err)) => return Ok(error_response(&err)),
        Err(err) => return Ok(error_response(&ShareError::Io(std::io::Error::other(err)))),
    };

    let res = match target {
        Target::Redirect(location) => redirect(&location, &query),
        Target::File(node, info) => match content::serve(node, info, &headers, head_only).await {
            Ok(res) => res,
            Err(err) => error_response(&err),
        },
        Target::Listing(entries, info) => {
            if content::not_modified(&headers, info.modified) {
                content::not_modified_response(info.modified)
            } else {
                listing::response(entries, info.modified, head_only)
            }
        }
        Target::Unreadable(err) => {
            error!(%err, path = %upath, "error reading directory");
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, "Error reading directory")
        }
    };
    Ok(res)
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if err.find::<Unauthorized>().is_some() {
        let mut res = plain_text(StatusCode::UNAUTHORIZED, "Unauthorized");
        let challenge = format!("Basic realm=\"{}\"", auth::REALM);
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            res.headers_mut().insert(WWW_AUTHENTICATE, value);
        }
        return Ok(res);
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(plain_text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
    }
    if err.is_not_found() {
        return Ok(plain_text(StatusCode::NOT_FOUND, "404 page not found"));
    }
    error!(?err, "unhandled rejection");
    Ok(plain_text(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error"))
}

/// All routes of the share: GET and HEAD on any path, behind Basic auth
/// when `credentials` are set.
pub fn routes<F>(
    files: Arc<FilteredFileAccess<F>>,
    credentials: Credentials,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone
where
    F: FileSystem + 'static,
{
    let head_only = warp::get()
        .map(|| false)
        .or(warp::head().map(|| true))
        .unify();
    let query = warp::query::raw()
        .or(warp::any().map(String::new))
        .unify();
    let files = warp::any().map(move || files.clone());

    head_only
        .and(auth::basic(credentials))
        .and(warp::path::full())
        .and(query)
        .and(warp::header::headers_cloned())
        .and(files)
        .and_then(handle::<FilteredFileAccess<F>>)
        .recover(handle_rejection)
        .unify()
        .with(warp::trace::request())
}

pub async fn serve_files(config: &ShareConfig) -> Result<(), Box<dyn std::error::Error>> {
    let root_dir = config.resolve_root()?;
    let addr = config.listen_addr()?;
    let credentials = config.credentials();

    info!("Sharing folder: {}", root_dir.display());
    let files = Arc::new(FilteredFileAccess::new(RootDir::new(root_dir)));
    let routes = routes(files, credentials);

    let (bound, server) = warp::serve(routes).try_bind_ephemeral(addr)?;
    if bound.ip().is_unspecified() {
        info!("Listening on all interfaces, port {}", bound.port());
    }
    if let Some(url) = listen_url(bound) {
        info!("Listening on {}", url);
    }
    server.await;
    Ok(())
}

/// URL a local browser can use to reach the share.
fn listen_url(addr: SocketAddr) -> Option<url::Url> {
    let shown = if addr.ip().is_unspecified() {
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port())
    } else {
        addr
    };
    url::Url::parse(&format!("http://{}/", shown)).ok()
}
