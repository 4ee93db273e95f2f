//! # CLI
//!
//! This module defines the command-line interface of `pinza` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers
//! are `key:value` and bodies are valid JSON) before anything touches the registry.
use clap::{Parser, Subcommand};
use pinza_core::http::{HeaderName, HeaderValue};
use std::{path::PathBuf, time::Duration};

#[derive(Parser)]
#[command(name = "pinza", version, about = "Schema-driven RPC CLI")]
pub struct Cli {
    /// JSON schema bundle to register. Can be given several times.
    #[arg(long = "bundle", global = true)]
    pub bundles: Vec<PathBuf>,

    /// Compiled protobuf descriptor set (.bin) to register. Can be given several times.
    #[arg(long = "descriptor-set", global = true)]
    pub descriptor_sets: Vec<PathBuf>,

    /// Namespace used to resolve relative names (e.g. dropbox.core.v1)
    #[arg(long, global = true, default_value = "")]
    pub scope: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Call a method of a registered service
    ///
    /// Binds the service to an HTTP (or gRPC) transport and invokes one method with a JSON body.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// pinza --bundle dropbox.json --scope dropbox.core.v1 \
    ///     call https://api.dropbox.com/1 services.AccountService/Info --token "$TOKEN"
    /// ```
    Call {
        /// Base URL of the server (e.g. https://api.example.com or http://localhost:50051)
        url: String,

        /// Endpoint (Service/Method), resolved inside the scope
        #[arg(value_parser = parse_endpoint)]
        endpoint: (String, String),

        /// JSON object with the request fields
        #[arg(long, value_parser = parse_body, default_value = "{}")]
        body: serde_json::Value,

        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(HeaderName, HeaderValue)>,

        /// Bearer token sent as `Authorization: Bearer <token>`
        #[arg(long, env = "PINZA_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Use unary gRPC with the protobuf wire format instead of HTTP + JSON
        #[arg(long)]
        grpc: bool,

        /// Time budget of the call, in seconds
        #[arg(long, value_parser = parse_timeout)]
        timeout: Option<Duration>,

        /// How many times a failed call is retried on transient errors
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },

    /// List registered resources
    List {
        #[command(subcommand)]
        sub: ListCommands,
    },

    /// Describe a message, a service, or a method (Service/Method)
    Describe {
        /// Name, resolved inside the scope
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// List every service visible in the scope
    Services,
}

fn parse_endpoint(value: &str) -> Result<(String, String), String> {
    let (service, method) = value.split_once('/').ok_or_else(|| {
        format!("Invalid endpoint format: '{value}'. Expected 'package.Service/Method'",)
    })?;

    if service.trim().is_empty() || method.trim().is_empty() {
        return Err("Service and Method names cannot be empty".to_string());
    }

    Ok((service.to_string(), method.to_string()))
}

fn parse_header(s: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (key, value) = s
        .split_once(':')
        .ok_or_else(|| "Format must be 'key:value'".to_string())?;

    let name = HeaderName::from_bytes(key.trim().as_bytes())
        .map_err(|e| format!("Invalid header name '{}': {e}", key.trim()))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| format!("Invalid value for header '{name}': {e}"))?;

    Ok((name, value))
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    let body: serde_json::Value =
        serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))?;

    if !body.is_object() {
        return Err("The body must be a JSON object".to_string());
    }

    Ok(body)
}

fn parse_timeout(value: &str) -> Result<Duration, String> {
    let secs: f64 = value
        .parse()
        .map_err(|_| format!("Invalid timeout '{value}': expected a number of seconds"))?;

    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| format!("Invalid timeout '{value}': must be a positive number of seconds"))
}
