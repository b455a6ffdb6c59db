use std::sync::Arc;

use headers::authorization::Basic;
use headers::{Authorization, HeaderMapExt};
use warp::http::HeaderMap;
use warp::{Filter, Rejection};

pub const REALM: &str = "sharefolder";

/// The single username/password pair the share is guarded by.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Authentication is off when neither a username nor a password is set.
    pub fn is_enabled(&self) -> bool {
        !self.username.is_empty() || !self.password.is_empty()
    }

    pub fn accepts(&self, presented: Option<&Authorization<Basic>>) -> bool {
        if !self.is_enabled() {
            return true;
        }
        match presented {
            Some(auth) => auth.username() == self.username && auth.password() == self.password,
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

/// Rejects with [`Unauthorized`] unless the request carries matching
/// Basic credentials.
pub fn basic(credentials: Credentials) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    let credentials = Arc::new(credentials);
    warp::header::headers_cloned()
        .and_then(move |headers: HeaderMap| {
            let credentials = credentials.clone();
            async move {
                let presented = headers.typed_get::<Authorization<Basic>>();
                if credentials.accepts(presented.as_ref()) {
                    Ok(())
                } else {
                    tracing::debug!(user = presented.as_ref().map(|a| a.username()), "rejected credentials");
                    Err(warp::reject::custom(Unauthorized))
                }
            }
        })
        .untuple_one()
}
