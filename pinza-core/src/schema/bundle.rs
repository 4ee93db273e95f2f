use super::{Cardinality, FieldDef, FieldKind, MessageType, MethodDescriptor, ServiceDescriptor};
use prost_reflect::{DescriptorPool, Kind};
use serde::{Deserialize, Serialize};
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Invalid bundle document: '{0}'")]
    Json(#[from] serde_json::Error),
    #[error("Failed to decode file descriptor set: '{0}'")]
    Descriptor(#[from] prost_reflect::DescriptorError),
    #[error("Failed to read bundle: '{0}'")]
    Io(#[from] std::io::Error),
}

/// An immutable collection of message and service definitions.
///
/// Bundles are produced externally (by a schema compiler) and handed to
/// [`Registry::register`](crate::registry::Registry::register).
/// All names are fully qualified; a leading `.` (protobuf notation) is stripped on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub messages: Vec<MessageType>,
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: MessageType) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_service(mut self, service: ServiceDescriptor) -> Self {
        self.services.push(service);
        self
    }

    /// Parses a JSON bundle document.
    pub fn from_json(document: &str) -> Result<Self, BundleError> {
        let bundle: Bundle = serde_json::from_str(document)?;
        Ok(bundle.normalized())
    }

    /// Reads a JSON bundle document from any reader.
    pub fn from_reader(reader: impl Read) -> Result<Self, BundleError> {
        let bundle: Bundle = serde_json::from_reader(reader)?;
        Ok(bundle.normalized())
    }

    /// Imports every message and service of an encoded protobuf `FileDescriptorSet`.
    ///
    /// Imported methods get the default `POST /{service}/{method}` binding, which is the
    /// gRPC path of the method. Streaming methods are skipped.
    pub fn from_file_descriptor_set(bytes: &[u8]) -> Result<Self, BundleError> {
        let pool = DescriptorPool::decode(bytes)?;
        Ok(Self::from_descriptor_pool(&pool))
    }

    /// Imports every message and service of an already decoded [`DescriptorPool`].
    pub fn from_descriptor_pool(pool: &DescriptorPool) -> Self {
        let messages = pool
            .all_messages()
            .map(|descriptor| {
                let fields = descriptor
                    .fields()
                    .map(|field| FieldDef {
                        name: field.name().to_string(),
                        number: field.number(),
                        kind: field_kind(field.kind()),
                        cardinality: match field.cardinality() {
                            prost_reflect::Cardinality::Required => Cardinality::Required,
                            prost_reflect::Cardinality::Repeated => Cardinality::Repeated,
                            prost_reflect::Cardinality::Optional => Cardinality::Optional,
                        },
                    })
                    .collect();

                MessageType::new(descriptor.full_name(), fields).with_protobuf(descriptor)
            })
            .collect();

        let services = pool
            .services()
            .map(|service| {
                let methods = service
                    .methods()
                    .filter(|method| {
                        let streaming =
                            method.is_client_streaming() || method.is_server_streaming();
                        if streaming {
                            tracing::debug!(
                                method = method.full_name(),
                                "skipping streaming method"
                            );
                        }
                        !streaming
                    })
                    .map(|method| {
                        MethodDescriptor::new(
                            method.name(),
                            method.input().full_name(),
                            method.output().full_name(),
                        )
                    })
                    .collect();

                ServiceDescriptor::new(service.full_name(), methods)
            })
            .collect();

        Self { messages, services }
    }

    /// Strips protobuf-style leading dots from every name and type reference.
    fn normalized(mut self) -> Self {
        for message in &mut self.messages {
            strip_dot(&mut message.name);
            for field in &mut message.fields {
                if let FieldKind::Message(name) = &mut field.kind {
                    strip_dot(name);
                }
            }
        }
        for service in &mut self.services {
            strip_dot(&mut service.name);
            for method in &mut service.methods {
                strip_dot(&mut method.request_type);
                strip_dot(&mut method.response_type);
            }
        }
        self
    }
}

fn strip_dot(name: &mut String) {
    if name.starts_with('.') {
        name.remove(0);
    }
}

fn field_kind(kind: Kind) -> FieldKind {
    match kind {
        Kind::Double => FieldKind::Double,
        Kind::Float => FieldKind::Float,
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => FieldKind::Int32,
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => FieldKind::Int64,
        Kind::Uint32 | Kind::Fixed32 => FieldKind::Uint32,
        Kind::Uint64 | Kind::Fixed64 => FieldKind::Uint64,
        Kind::Bool => FieldKind::Bool,
        Kind::String => FieldKind::String,
        Kind::Bytes => FieldKind::Bytes,
        Kind::Enum(_) => FieldKind::Enum,
        Kind::Message(message) => FieldKind::Message(message.full_name().to_string()),
    }
}
