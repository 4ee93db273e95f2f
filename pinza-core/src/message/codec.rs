//! # Wire Formats
//!
//! Encoding of envelopes into request bodies and decoding of response bodies.
//!
//! 1. **JSON**: the structural view, serialized with `serde_json`.
//! 2. **Protobuf**: binary protobuf, available for message types imported from a
//!    `FileDescriptorSet`. The structural view is mapped onto a
//!    [`prost_reflect::DynamicMessage`], which performs the binary encoding.
use super::{MessageEnvelope, ShapeError, Strictness};
use crate::{registry::Registry, schema::MessageType};
use bytes::Bytes;
use prost::Message;
use prost_reflect::{DynamicMessage, SerializeOptions};
use std::sync::Arc;

/// The encoding used for request and response bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WireFormat {
    #[default]
    Json,
    Protobuf,
}

impl WireFormat {
    /// The `content-type` advertised for bodies in this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            WireFormat::Json => "application/json",
            WireFormat::Protobuf => "application/x-protobuf",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Message type '{0}' has no protobuf descriptor")]
    MissingDescriptor(String),
    #[error("Failed to serialize message as JSON: '{0}'")]
    Json(#[source] serde_json::Error),
    #[error("Message does not fit the protobuf schema: '{0}'")]
    Protobuf(#[source] serde_json::Error),
}

/// Response bytes do not conform to the expected message type.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Message type '{0}' has no protobuf descriptor")]
    MissingDescriptor(String),
    #[error("Response body is not valid JSON: '{0}'")]
    Json(#[source] serde_json::Error),
    #[error("Failed to decode Protobuf bytes: '{0}'")]
    Protobuf(#[from] prost::DecodeError),
    #[error("Failed to map Protobuf message to JSON: '{0}'")]
    Mapping(#[source] serde_json::Error),
    #[error("Response does not match message type '{type_name}': {source}")]
    Shape {
        type_name: String,
        #[source]
        source: ShapeError,
    },
}

impl MessageEnvelope {
    /// Serializes the envelope in the given wire format.
    pub fn encode(&self, format: WireFormat) -> Result<Bytes, EncodeError> {
        match format {
            WireFormat::Json => serde_json::to_vec(&self.as_structural_view())
                .map(Bytes::from)
                .map_err(EncodeError::Json),
            WireFormat::Protobuf => {
                let descriptor = self
                    .message_type
                    .protobuf_descriptor()
                    .ok_or_else(|| EncodeError::MissingDescriptor(self.type_name().to_string()))?;

                // The structural view follows the protobuf JSON mapping.
                let message =
                    DynamicMessage::deserialize(descriptor.clone(), self.as_structural_view())
                        .map_err(EncodeError::Protobuf)?;

                Ok(Bytes::from(message.encode_to_vec()))
            }
        }
    }

    /// Decodes a response body as an instance of `message_type`.
    ///
    /// An empty body decodes to the empty message. Unknown fields are ignored; missing
    /// required fields and mistyped values are a [`DecodeError::Shape`].
    pub fn decode(
        message_type: Arc<MessageType>,
        body: &[u8],
        format: WireFormat,
        registry: &Registry,
    ) -> Result<Self, DecodeError> {
        let value = match format {
            WireFormat::Json if body.is_empty() => serde_json::Value::Object(Default::default()),
            WireFormat::Json => serde_json::from_slice(body).map_err(DecodeError::Json)?,
            WireFormat::Protobuf => {
                let descriptor = message_type.protobuf_descriptor().ok_or_else(|| {
                    DecodeError::MissingDescriptor(message_type.name().to_string())
                })?;

                let message = DynamicMessage::decode(descriptor.clone(), body)?;
                let options = SerializeOptions::new()
                    .use_proto_field_name(true)
                    .stringify_64_bit_integers(false);

                message
                    .serialize_with_options(serde_json::value::Serializer, &options)
                    .map_err(DecodeError::Mapping)?
            }
        };

        let type_name = message_type.name().to_string();
        MessageEnvelope::from_value(message_type, &value, registry, Strictness::Lenient)
            .map_err(|source| DecodeError::Shape { type_name, source })
    }
}
