//! Authentication for API clients.
//!
//! The [`Authentication`] trait decorates each outgoing request. `BasicAuth`
//! sends credentials with every request, `()` sends nothing, and `Option<A>`
//! authenticates with `A` only when it is present.

use std::sync::Arc;

use base64::Engine as _;
use http::HeaderValue;
use tower::layer::Layer;
use zeroize::Zeroizing;

use crate::Secret;

/// Create a basic authentication header value, with the password being optional.
///
/// # Example
/// ```rust
/// use api_client::basic_auth;
///
/// let header = basic_auth("username", Some("password"));
/// assert_eq!(header.to_str().unwrap(), "Basic dXNlcm5hbWU6cGFzc3dvcmQ=");
/// ```
pub fn basic_auth<U, P>(username: U, password: Option<P>) -> HeaderValue
where
    U: std::fmt::Display,
    P: std::fmt::Display,
{
    let credentials = Zeroizing::new(match password {
        Some(password) => format!("{username}:{password}"),
        None => format!("{username}:"),
    });
    let encoded = Zeroizing::new(base64::engine::general_purpose::STANDARD.encode(&*credentials));

    let mut header = HeaderValue::try_from(format!("Basic {}", encoded.as_str()))
        .expect("base64 is always valid HeaderValue");
    header.set_sensitive(true);
    header
}

/// Decorates requests sent by an `ApiClient` with credentials.
pub trait Authentication: Clone {
    /// Called by the `ApiClient` for every request before it is sent.
    fn authenticate<B>(&self, req: http::Request<B>) -> http::Request<B>;
}

/// Basic authentication, with the password being optional.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    username: String,
    password: Option<Secret>,
}

impl BasicAuth {
    /// Create a new Basic authentication with a given username and optional password.
    pub fn new<U, P>(username: U, password: Option<P>) -> Self
    where
        U: Into<String>,
        P: Into<Secret>,
    {
        BasicAuth {
            username: username.into(),
            password: password.map(Into::into),
        }
    }

    /// The `Authorization` header value for these credentials.
    pub fn header_value(&self) -> HeaderValue {
        basic_auth(&self.username, self.password.as_ref().map(Secret::revealed))
    }
}

impl Authentication for BasicAuth {
    fn authenticate<B>(&self, mut req: http::Request<B>) -> http::Request<B> {
        if req.headers().contains_key(http::header::AUTHORIZATION) {
            tracing::warn!("{} header already set", http::header::AUTHORIZATION);
        } else {
            req.headers_mut()
                .insert(http::header::AUTHORIZATION, self.header_value());
        }
        req
    }
}

impl Authentication for () {
    fn authenticate<B>(&self, req: http::Request<B>) -> http::Request<B> {
        req
    }
}

impl<A: Authentication> Authentication for Option<A> {
    fn authenticate<B>(&self, req: http::Request<B>) -> http::Request<B> {
        match self {
            Some(auth) => auth.authenticate(req),
            None => req,
        }
    }
}

/// A layer which authenticates every request passing through it.
#[derive(Debug)]
pub struct AuthenticationLayer<A> {
    auth: Arc<A>,
}

impl<A> Clone for AuthenticationLayer<A> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
        }
    }
}

impl<A> AuthenticationLayer<A> {
    pub(crate) fn new(auth: Arc<A>) -> Self {
        Self { auth }
    }
}

impl<A, S> Layer<S> for AuthenticationLayer<A> {
    type Service = AuthenticationService<A, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthenticationService {
            inner,
            auth: self.auth.clone(),
        }
    }
}

/// Service half of [`AuthenticationLayer`].
#[derive(Debug)]
pub struct AuthenticationService<A, S> {
    inner: S,
    auth: Arc<A>,
}

impl<A, S: Clone> Clone for AuthenticationService<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            auth: self.auth.clone(),
        }
    }
}

impl<A, S, BIn, BOut> tower::Service<http::Request<BIn>> for AuthenticationService<A, S>
where
    A: Authentication,
    S: tower::Service<http::Request<BIn>, Response = http::Response<BOut>>,
{
    type Response = http::Response<BOut>;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<BIn>) -> Self::Future {
        let req = self.auth.authenticate(req);
        self.inner.call(req)
    }
}
