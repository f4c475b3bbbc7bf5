//! Dynamic gRPC invocation: schemas compiled in-process become a descriptor
//! pool, JSON input binds to dynamic messages, and the four RPC arities run
//! over a raw tonic channel with a descriptor-driven codec.

mod codec;

use std::io::{BufRead, Write};
use std::time::Duration;

use prost_reflect::{DescriptorPool, DynamicMessage, MethodDescriptor};
use prost_types::FileDescriptorSet;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::client::Grpc;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{MetadataKey, MetadataValue};
use tonic::transport::Endpoint;
use tonic::Status;

use prototool_config::Error;

use codec::DynamicCodec;

/// Where request messages come from.
pub enum InvokeInput {
    /// One JSON message, inline.
    Data(String),
    /// Line-delimited JSON messages from a reader (stdin).
    Stream(Box<dyn BufRead + Send>),
}

pub struct InvokeRequest {
    /// `host:port`.
    pub address: String,
    /// `package.Service/Method`.
    pub method: String,
    /// ASCII metadata sent with the call.
    pub headers: Vec<(String, String)>,
    pub input: InvokeInput,
    pub call_timeout: Duration,
    pub connect_timeout: Duration,
    pub keepalive: Option<Duration>,
}

/// Invokes the method against the compiled schema, writing each response
/// message as pretty protobuf JSON to `out`. Blocks until the call finishes.
pub fn invoke(
    descriptors: FileDescriptorSet,
    request: InvokeRequest,
    out: &mut dyn Write,
) -> Result<(), Error> {
    let pool = DescriptorPool::from_file_descriptor_set(descriptors)
        .map_err(|err| Error::internal(format!("invalid descriptor set: {err}")))?;
    let method = resolve_method(&pool, &request.method)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::Io)?;
    runtime.block_on(invoke_async(method, request, out))
}

/// Resolves `package.Service/Method` in the pool.
fn resolve_method(pool: &DescriptorPool, method: &str) -> Result<MethodDescriptor, Error> {
    let (service_name, method_name) = method.split_once('/').ok_or_else(|| {
        Error::Rpc(format!(
            "method must look like package.Service/Method, got {method:?}"
        ))
    })?;
    let service = pool.get_service_by_name(service_name).ok_or_else(|| {
        Error::Rpc(format!("service {service_name} not found in compiled schema"))
    })?;
    let found = service
        .methods()
        .find(|candidate| candidate.name() == method_name);
    found.ok_or_else(|| {
        Error::Rpc(format!(
            "method {method_name} not found on service {service_name}"
        ))
    })
}

async fn invoke_async(
    method: MethodDescriptor,
    request: InvokeRequest,
    out: &mut dyn Write,
) -> Result<(), Error> {
    let mut endpoint = Endpoint::from_shared(format!("http://{}", request.address))
        .map_err(|err| Error::Rpc(format!("invalid address {}: {err}", request.address)))?
        .connect_timeout(request.connect_timeout)
        .timeout(request.call_timeout);
    if let Some(keepalive) = request.keepalive {
        endpoint = endpoint.http2_keep_alive_interval(keepalive);
    }
    let channel = endpoint
        .connect()
        .await
        .map_err(|err| Error::Rpc(format!("failed to dial {}: {err}", request.address)))?;

    let mut grpc = Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|err| Error::Rpc(format!("channel not ready: {err}")))?;

    let path: PathAndQuery = format!(
        "/{}/{}",
        method.parent_service().full_name(),
        method.name()
    )
    .parse()
    .map_err(|err| Error::Rpc(format!("invalid method path: {err}")))?;
    let codec = DynamicCodec::new(method.clone());

    let client_streaming = method.is_client_streaming();
    let server_streaming = method.is_server_streaming();

    match (client_streaming, server_streaming) {
        (false, false) => {
            let message = single_message(&method, request.input)?;
            let call = grpc
                .unary(with_metadata(message, &request.headers)?, path, codec)
                .await
                .map_err(status_error)?;
            write_message(out, call.into_inner())?;
        }
        (true, false) => {
            let messages = all_messages(&method, request.input)?;
            let stream = futures::stream::iter(messages);
            let call = grpc
                .client_streaming(with_metadata(stream, &request.headers)?, path, codec)
                .await
                .map_err(status_error)?;
            write_message(out, call.into_inner())?;
        }
        (false, true) => {
            let message = single_message(&method, request.input)?;
            let call = grpc
                .server_streaming(with_metadata(message, &request.headers)?, path, codec)
                .await
                .map_err(status_error)?;
            let mut inbound = call.into_inner();
            while let Some(message) = inbound.message().await.map_err(status_error)? {
                write_message(out, message)?;
            }
        }
        (true, true) => {
            // Send and receive as two cooperating tasks: a blocking reader
            // feeds the outbound channel while this task drains responses.
            // Either side failing tears the stream down for both.
            let (sender, receiver) = mpsc::channel::<DynamicMessage>(16);
            let descriptor = method.input();
            let reader = match request.input {
                InvokeInput::Data(data) => {
                    let message = parse_message(&descriptor, &data)?;
                    let _ = sender.try_send(message);
                    // Close the channel so the outbound side half-closes.
                    drop(sender);
                    None
                }
                InvokeInput::Stream(input) => Some(tokio::task::spawn_blocking(move || {
                    for line in input.lines() {
                        let line = match line {
                            Ok(line) => line,
                            Err(err) => {
                                log::debug!("stdin read failed: {err}");
                                break;
                            }
                        };
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_message(&descriptor, &line) {
                            Ok(message) => {
                                if sender.blocking_send(message).is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                log::debug!("skipping malformed input message: {err}");
                                break;
                            }
                        }
                    }
                })),
            };

            let outbound = ReceiverStream::new(receiver);
            let call = grpc
                .streaming(with_metadata(outbound, &request.headers)?, path, codec)
                .await
                .map_err(status_error)?;
            let mut inbound = call.into_inner();
            let result = loop {
                match inbound.message().await {
                    Ok(Some(message)) => write_message(out, message)?,
                    Ok(None) => break Ok(()),
                    Err(status) => break Err(status_error(status)),
                }
            };
            if let Some(reader) = reader {
                reader.abort();
            }
            result?;
        }
    }
    Ok(())
}

fn single_message(
    method: &MethodDescriptor,
    input: InvokeInput,
) -> Result<DynamicMessage, Error> {
    match input {
        InvokeInput::Data(data) => parse_message(&method.input(), &data),
        InvokeInput::Stream(mut reader) => {
            let mut data = String::new();
            reader.read_to_string(&mut data)?;
            parse_message(&method.input(), &data)
        }
    }
}

fn all_messages(
    method: &MethodDescriptor,
    input: InvokeInput,
) -> Result<Vec<DynamicMessage>, Error> {
    match input {
        InvokeInput::Data(data) => Ok(vec![parse_message(&method.input(), &data)?]),
        InvokeInput::Stream(reader) => {
            let mut messages = Vec::new();
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                messages.push(parse_message(&method.input(), &line)?);
            }
            Ok(messages)
        }
    }
}

/// Binds one JSON document to a dynamic message of `descriptor`'s type.
fn parse_message(
    descriptor: &prost_reflect::MessageDescriptor,
    json: &str,
) -> Result<DynamicMessage, Error> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    let message = DynamicMessage::deserialize(descriptor.clone(), &mut deserializer)
        .map_err(|err| Error::Rpc(format!("invalid request JSON: {err}")))?;
    deserializer
        .end()
        .map_err(|err| Error::Rpc(format!("trailing data after request JSON: {err}")))?;
    Ok(message)
}

/// Marshals one response with the canonical Protobuf JSON mapping.
fn write_message(out: &mut dyn Write, message: DynamicMessage) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(&message)
        .map_err(|err| Error::internal(format!("failed to marshal response: {err}")))?;
    writeln!(out, "{json}")?;
    Ok(())
}

fn with_metadata<T>(
    message: T,
    headers: &[(String, String)],
) -> Result<tonic::Request<T>, Error> {
    let mut request = tonic::Request::new(message);
    for (name, value) in headers {
        let key = MetadataKey::from_bytes(name.to_ascii_lowercase().as_bytes())
            .map_err(|err| Error::Rpc(format!("invalid header name {name:?}: {err}")))?;
        let value: MetadataValue<_> = value
            .parse()
            .map_err(|_| Error::Rpc(format!("invalid header value for {name:?}")))?;
        request.metadata_mut().insert(key, value);
    }
    Ok(request)
}

fn status_error(status: Status) -> Error {
    Error::Rpc(format!("{:?}: {}", status.code(), status.message()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::{
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, MethodDescriptorProto,
        ServiceDescriptorProto,
    };

    fn echo_descriptors() -> FileDescriptorSet {
        FileDescriptorSet {
            file: vec![FileDescriptorProto {
                name: Some("echo.proto".into()),
                package: Some("foo".into()),
                message_type: vec![DescriptorProto {
                    name: Some("EchoMessage".into()),
                    field: vec![FieldDescriptorProto {
                        name: Some("v".into()),
                        number: Some(1),
                        r#type: Some(9), // TYPE_STRING
                        label: Some(1),  // LABEL_OPTIONAL
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                service: vec![ServiceDescriptorProto {
                    name: Some("S".into()),
                    method: vec![MethodDescriptorProto {
                        name: Some("Unary".into()),
                        input_type: Some(".foo.EchoMessage".into()),
                        output_type: Some(".foo.EchoMessage".into()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                syntax: Some("proto3".into()),
                ..Default::default()
            }],
        }
    }

    fn echo_pool() -> DescriptorPool {
        DescriptorPool::from_file_descriptor_set(echo_descriptors()).unwrap()
    }

    #[test]
    fn resolves_method_by_slash_path() {
        let pool = echo_pool();
        let method = resolve_method(&pool, "foo.S/Unary").unwrap();
        assert_eq!(method.name(), "Unary");
        assert_eq!(method.parent_service().full_name(), "foo.S");
    }

    #[test]
    fn rejects_unknown_service_and_method() {
        let pool = echo_pool();
        assert!(matches!(
            resolve_method(&pool, "foo.Nope/Unary"),
            Err(Error::Rpc(_))
        ));
        assert!(matches!(
            resolve_method(&pool, "foo.S/Nope"),
            Err(Error::Rpc(_))
        ));
        assert!(matches!(
            resolve_method(&pool, "foo.S.Unary"),
            Err(Error::Rpc(_))
        ));
    }

    #[test]
    fn binds_json_and_marshals_canonically() {
        let pool = echo_pool();
        let method = resolve_method(&pool, "foo.S/Unary").unwrap();
        let message = parse_message(&method.input(), r#"{"v": "hi"}"#).unwrap();

        let mut out = Vec::new();
        write_message(&mut out, message).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"v\": \"hi\"\n}\n");
    }

    #[test]
    fn rejects_malformed_json() {
        let pool = echo_pool();
        let method = resolve_method(&pool, "foo.S/Unary").unwrap();
        assert!(parse_message(&method.input(), "{nope").is_err());
        assert!(parse_message(&method.input(), r#"{"v": "hi"} extra"#).is_err());
    }

    #[test]
    fn reads_line_delimited_messages() {
        let pool = echo_pool();
        let method = resolve_method(&pool, "foo.S/Unary").unwrap();
        let input = InvokeInput::Stream(Box::new(std::io::Cursor::new(
            "{\"v\": \"a\"}\n\n{\"v\": \"b\"}\n",
        )));
        let messages = all_messages(&method, input).unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn header_metadata_is_validated() {
        let ok = with_metadata((), &[("X-Trace-Id".to_string(), "abc123".to_string())]).unwrap();
        assert_eq!(ok.metadata().get("x-trace-id").unwrap(), "abc123");

        assert!(with_metadata((), &[("bad header".to_string(), "v".to_string())]).is_err());
    }
}
