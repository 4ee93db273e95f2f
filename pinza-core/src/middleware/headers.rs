use super::{Middleware, Next, Response};
use crate::{client::RequestContext, error::CallError};
use futures_util::future::BoxFuture;
use http::{
    HeaderName, HeaderValue,
    header::{AUTHORIZATION, InvalidHeaderValue},
};
use std::fmt;

/// Injects `Authorization: Bearer <token>` into every request.
///
/// This is the only supported way of attaching credentials: the core never looks for
/// them anywhere else.
#[derive(Clone)]
pub struct BearerAuth {
    value: HeaderValue,
}

impl BearerAuth {
    pub fn new(token: impl AsRef<str>) -> Result<Self, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.as_ref()))?;
        value.set_sensitive(true);
        Ok(Self { value })
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

impl Middleware for BearerAuth {
    fn handle<'a>(
        &'a self,
        mut context: RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, CallError>> {
        context
            .headers_mut()
            .insert(AUTHORIZATION, self.value.clone());
        next.run(context)
    }

    fn name(&self) -> &'static str {
        "bearer_auth"
    }
}

/// Sets a static header on every request.
#[derive(Debug, Clone)]
pub struct SetHeader {
    name: HeaderName,
    value: HeaderValue,
    overwrite: bool,
}

impl SetHeader {
    /// Sets the header, replacing any value already present.
    pub fn overriding(name: HeaderName, value: HeaderValue) -> Self {
        Self {
            name,
            value,
            overwrite: true,
        }
    }

    /// Sets the header only when the request does not carry it yet.
    pub fn if_missing(name: HeaderName, value: HeaderValue) -> Self {
        Self {
            name,
            value,
            overwrite: false,
        }
    }
}

impl Middleware for SetHeader {
    fn handle<'a>(
        &'a self,
        mut context: RequestContext,
        next: Next<'a>,
    ) -> BoxFuture<'a, Result<Response, CallError>> {
        let headers = context.headers_mut();
        if self.overwrite || !headers.contains_key(&self.name) {
            headers.insert(self.name.clone(), self.value.clone());
        }
        next.run(context)
    }

    fn name(&self) -> &'static str {
        "set_header"
    }
}
