use serde::{Deserialize, Serialize};

/// How many values a field holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    Optional,
    Required,
    Repeated,
}

/// The wire type of a field.
///
/// In a JSON bundle scalar kinds are plain strings (`"string"`, `"int64"`, ...) and nested
/// messages are written as `{ "message": "pkg.Type" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
    String,
    Bytes,
    /// An enumeration value, carried either by name or by number.
    Enum,
    /// A nested message, referenced by its fully qualified name.
    Message(String),
}

impl FieldKind {
    /// Returns the referenced message name if this is a message field.
    pub fn message_name(&self) -> Option<&str> {
        match self {
            FieldKind::Message(name) => Some(name),
            _ => None,
        }
    }
}

/// A single field of a [`MessageType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    /// Protobuf field number. Zero when the bundle does not assign one.
    #[serde(default)]
    pub number: u32,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, rename = "label")]
    pub cardinality: Cardinality,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            number,
            kind,
            cardinality: Cardinality::Optional,
        }
    }

    pub fn required(mut self) -> Self {
        self.cardinality = Cardinality::Required;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::Required
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }
}

/// Schema for one structured message.
///
/// Types imported from a protobuf descriptor set also keep their
/// [`prost_reflect::MessageDescriptor`], which enables the protobuf wire format.
/// The descriptor does not take part in equality: two types are equal when their
/// names and field lists are. On registration, an imported type takes the place of an
/// equal one that has no descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageType {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(skip)]
    pub(crate) protobuf: Option<prost_reflect::MessageDescriptor>,
}

impl PartialEq for MessageType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

impl Eq for MessageType {}

impl MessageType {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
            protobuf: None,
        }
    }

    /// Returns the fully qualified name (e.g. `my.package.v1.Account`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the last segment of the name (e.g. `Account`).
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }

    /// Returns the package part of the name (e.g. `my.package.v1`).
    pub fn package_name(&self) -> &str {
        package_name(&self.name)
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The protobuf descriptor, present only for types imported from a descriptor set.
    pub fn protobuf_descriptor(&self) -> Option<&prost_reflect::MessageDescriptor> {
        self.protobuf.as_ref()
    }

    pub(crate) fn with_protobuf(mut self, descriptor: prost_reflect::MessageDescriptor) -> Self {
        self.protobuf = Some(descriptor);
        self
    }
}

/// HTTP verbs a method can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Verb {
    pub fn as_method(&self) -> http::Method {
        match self {
            Verb::Get => http::Method::GET,
            Verb::Post => http::Method::POST,
            Verb::Put => http::Method::PUT,
            Verb::Patch => http::Method::PATCH,
            Verb::Delete => http::Method::DELETE,
            Verb::Head => http::Method::HEAD,
        }
    }

    /// Whether requests with this verb carry the serialized message as body.
    /// Bodiless verbs send the request fields as query parameters instead.
    pub fn has_body(&self) -> bool {
        matches!(self, Verb::Post | Verb::Put | Verb::Patch)
    }
}

/// Transport binding of a method: a verb and a path template.
///
/// The template may contain `{field}` placeholders that are substituted with the values of
/// the request's fields, e.g. `/files/{root}/metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HttpBinding {
    pub verb: Verb,
    pub path: String,
}

/// A single RPC method of a [`ServiceDescriptor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    #[serde(rename = "request")]
    pub request_type: String,
    #[serde(rename = "response")]
    pub response_type: String,
    #[serde(default, rename = "http", skip_serializing_if = "Option::is_none")]
    pub binding: Option<HttpBinding>,
}

impl MethodDescriptor {
    pub fn new(
        name: impl Into<String>,
        request_type: impl Into<String>,
        response_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            request_type: request_type.into(),
            response_type: response_type.into(),
            binding: None,
        }
    }

    pub fn with_binding(mut self, verb: Verb, path: impl Into<String>) -> Self {
        self.binding = Some(HttpBinding {
            verb,
            path: path.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn response_type(&self) -> &str {
        &self.response_type
    }

    /// Returns the explicit binding, or `POST /{service}/{method}` when none was given.
    pub fn binding_for(&self, service: &str) -> HttpBinding {
        self.binding.clone().unwrap_or_else(|| HttpBinding {
            verb: Verb::Post,
            path: format!("/{}/{}", service, self.name),
        })
    }
}

/// Schema for one RPC service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, methods: Vec<MethodDescriptor>) -> Self {
        Self {
            name: name.into(),
            methods,
        }
    }

    /// Returns the fully qualified name (e.g. `my.package.v1.AccountService`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }

    pub fn package_name(&self) -> &str {
        package_name(&self.name)
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

fn short_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, short)| short)
}

fn package_name(name: &str) -> &str {
    name.rsplit_once('.').map_or("", |(package, _)| package)
}
