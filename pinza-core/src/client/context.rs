use crate::{
    error::CallError,
    message::{FieldValue, MessageEnvelope, WireFormat},
    registry::Registry,
    schema::{HttpBinding, MessageType, MethodDescriptor, ServiceDescriptor},
    transport::TransportRequest,
};
use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderValue, Method, header::CONTENT_TYPE};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::{collections::HashSet, sync::Arc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The resolved target of a bound method: service, method, request and response types.
#[derive(Debug)]
pub struct CallTarget {
    pub(crate) service: Arc<ServiceDescriptor>,
    pub(crate) method: MethodDescriptor,
    pub(crate) binding: HttpBinding,
    pub(crate) request_type: Arc<MessageType>,
    pub(crate) response_type: Arc<MessageType>,
    pub(crate) format: WireFormat,
    pub(crate) registry: Registry,
}

impl CallTarget {
    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    pub fn method_name(&self) -> &str {
        self.method.name()
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn binding(&self) -> &HttpBinding {
        &self.binding
    }

    pub fn request_type(&self) -> &Arc<MessageType> {
        &self.request_type
    }

    pub fn response_type(&self) -> &Arc<MessageType> {
        &self.response_type
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Per-call mutable state threaded through the middleware stack.
///
/// A context is created for one invocation, owned by that invocation only, and dropped
/// once the call resolves. Middleware may rewrite anything but the target.
#[derive(Debug, Clone)]
pub struct RequestContext {
    target: Arc<CallTarget>,
    verb: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    extensions: Extensions,
}

impl RequestContext {
    /// Builds the context of one call: path substitution, query parameters, body
    /// encoding, and header merging (`defaults` first, `overrides` win).
    pub(crate) fn build(
        target: Arc<CallTarget>,
        request: &MessageEnvelope,
        defaults: &HeaderMap,
        overrides: &HeaderMap,
        cancellation: CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<Self, CallError> {
        let binding = target.binding();
        let (path, used) = render_path(&binding.path, request)?;

        let (query, body) = if binding.verb.has_body() {
            let body = request.encode(target.format).map_err(|e| match e {
                crate::message::EncodeError::MissingDescriptor(name) => {
                    CallError::UnsupportedFormat(name)
                }
                other => CallError::InvalidRequest(other.to_string()),
            })?;
            (Vec::new(), body)
        } else {
            let mut query = Vec::new();
            for (name, value) in request.iter().filter(|(name, _)| !used.contains(*name)) {
                flatten_query(name, value, &mut query);
            }
            (query, Bytes::new())
        };

        let mut headers = defaults.clone();
        for name in overrides.keys() {
            headers.remove(name);
        }
        for (name, value) in overrides {
            headers.append(name.clone(), value.clone());
        }
        if !body.is_empty() && !headers.contains_key(CONTENT_TYPE) {
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static(target.format.content_type()),
            );
        }

        Ok(Self {
            verb: binding.verb.as_method(),
            target,
            path,
            query,
            headers,
            body,
            cancellation,
            deadline,
            extensions: Extensions::new(),
        })
    }

    pub fn target(&self) -> &Arc<CallTarget> {
        &self.target
    }

    pub fn verb(&self) -> &Method {
        &self.verb
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut Vec<(String, String)> {
        &mut self.query
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The encoded request body. Empty for bodiless verbs.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Free-form per-call state shared between middleware units.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub(crate) fn into_transport_request(self) -> TransportRequest {
        TransportRequest {
            method: self.verb,
            path: self.path,
            query: self.query,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// Bytes escaped in substituted path values. `/` is kept so a value may span segments.
const PATH_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Substitutes `{field}` placeholders with the request's scalar field values.
/// Values are percent-encoded, so URL delimiters inside them stay part of the path.
/// Returns the resolved path and the names of the fields it consumed.
fn render_path(
    template: &str,
    request: &MessageEnvelope,
) -> Result<(String, HashSet<String>), CallError> {
    let mut path = String::with_capacity(template.len());
    let mut used = HashSet::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        path.push_str(&rest[..start]);

        let end = rest[start..].find('}').ok_or_else(|| {
            CallError::InvalidRequest(format!("unterminated placeholder in path '{template}'"))
        })? + start;

        let name = &rest[start + 1..end];
        let value = request
            .get(name)
            .ok_or_else(|| CallError::InvalidRequest(format!("missing path parameter '{name}'")))?
            .as_param()
            .ok_or_else(|| {
                CallError::InvalidRequest(format!("path parameter '{name}' must be a scalar"))
            })?;

        path.extend(utf8_percent_encode(&value, PATH_VALUE));
        used.insert(name.to_string());
        rest = &rest[end + 1..];
    }

    path.push_str(rest);
    Ok((path, used))
}

/// Flattens a field into query parameters. Lists repeat the key, nested messages use
/// dotted keys (`team.title=core`).
fn flatten_query(name: &str, value: &FieldValue, query: &mut Vec<(String, String)>) {
    match value {
        FieldValue::List(items) => {
            for item in items {
                flatten_query(name, item, query);
            }
        }
        FieldValue::Message(message) => {
            for (field, value) in message.iter() {
                flatten_query(&format!("{name}.{field}"), value, query);
            }
        }
        scalar => {
            if let Some(param) = scalar.as_param() {
                query.push((name.to_string(), param));
            }
        }
    }
}
