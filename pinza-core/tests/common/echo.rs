//! The `echo.v1` protobuf schema and an in-process gRPC server answering its unary method.
use bytes::Bytes;
use futures_util::future::BoxFuture;
use pinza_core::{registry::Registry, schema::Bundle, transport::grpc::codec::RawCodec};
use prost::Message;
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
    field_descriptor_proto::{Label, Type},
};
use std::{
    convert::Infallible,
    future::{Ready, ready},
    task::{Context, Poll},
};
use tonic::{Request, Response, Status, body::Body, server::UnaryService};

pub const UNARY_ECHO: &str = "/echo.v1.EchoService/UnaryEcho";

fn field(name: &str, number: i32, kind: Type, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(kind as i32),
        ..Default::default()
    }
}

fn message_field(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(type_name.to_string()),
        ..field(name, number, Type::Message, Label::Optional)
    }
}

fn method(name: &str, server_streaming: bool) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(".echo.v1.EchoRequest".to_string()),
        output_type: Some(".echo.v1.EchoResponse".to_string()),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

/// `EchoRequest` and `EchoResponse` share field numbers 1 to 3, so echoing the request
/// bytes is a valid reply.
pub fn descriptor_set() -> Vec<u8> {
    let file = FileDescriptorProto {
        name: Some("echo/v1/echo.proto".to_string()),
        package: Some("echo.v1".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            DescriptorProto {
                name: Some("EchoRequest".to_string()),
                field: vec![
                    field("message", 1, Type::String, Label::Optional),
                    field("count", 2, Type::Int64, Label::Optional),
                    field("tags", 3, Type::String, Label::Repeated),
                ],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("EchoResponse".to_string()),
                field: vec![
                    field("message", 1, Type::String, Label::Optional),
                    field("count", 2, Type::Int64, Label::Optional),
                    field("tags", 3, Type::String, Label::Repeated),
                    message_field("meta", 4, ".echo.v1.Meta"),
                ],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("Meta".to_string()),
                field: vec![
                    field("seen", 1, Type::Bool, Label::Optional),
                    field("payload", 2, Type::Bytes, Label::Optional),
                ],
                ..Default::default()
            },
        ],
        service: vec![ServiceDescriptorProto {
            name: Some("EchoService".to_string()),
            method: vec![
                method("UnaryEcho", false),
                method("ServerStreamingEcho", true),
            ],
            ..Default::default()
        }],
        ..Default::default()
    };

    FileDescriptorSet { file: vec![file] }.encode_to_vec()
}

pub fn registry() -> Registry {
    let registry = Registry::new();
    let bundle = Bundle::from_file_descriptor_set(&descriptor_set()).unwrap();
    registry.register(&bundle).unwrap();
    registry
}

/// Serves `UnaryEcho` by sending the request frame back.
///
/// The `x-request-id` metadata entry is copied to the response; a request carrying
/// `x-fail` is refused with `PERMISSION_DENIED`. Every other path is `UNIMPLEMENTED`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoServer;

struct Echo {
    path: String,
}

impl UnaryService<Bytes> for Echo {
    type Response = Bytes;
    type Future = Ready<Result<Response<Bytes>, Status>>;

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        if self.path != UNARY_ECHO {
            return ready(Err(Status::unimplemented(format!("no method at {}", self.path))));
        }

        if request.metadata().contains_key("x-fail") {
            return ready(Err(Status::permission_denied("echo refused")));
        }

        let request_id = request.metadata().get("x-request-id").cloned();
        let mut response = Response::new(request.into_inner());
        if let Some(id) = request_id {
            response.metadata_mut().insert("x-request-id", id);
        }

        ready(Ok(response))
    }
}

impl<B> tonic::codegen::Service<http::Request<B>> for EchoServer
where
    B: http_body::Body + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
{
    type Response = http::Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        let echo = Echo {
            path: request.uri().path().to_string(),
        };

        Box::pin(async move {
            let mut grpc = tonic::server::Grpc::new(RawCodec);
            Ok(grpc.unary(echo, request).await)
        })
    }
}
