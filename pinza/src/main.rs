//! # Pinza CLI Entry Point
//!
//! The main executable for the Pinza tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and installs the
//!    log subscriber (filtered by `RUST_LOG`, written to standard error).
//! 2. **Schema Loading**: Registers every bundle and descriptor set via [`app::load_registry`].
//! 3. **Execution**: Delegates listing, describing or calling to [`app`].
//! 4. **Presentation**: Formats and prints the resulting data or error to standard output/error.
mod app;
mod cli;
mod formatter;

use clap::Parser;
use cli::{Cli, Commands, ListCommands};
use formatter::{FormattedString, ServiceList};
use pinza_core::registry::Registry;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let registry = match app::load_registry(&args.bundles, &args.descriptor_sets) {
        Ok(registry) => registry,
        Err(err) => exit_with(err),
    };

    match args.command {
        Commands::List { sub } => match sub {
            ListCommands::Services => list_services(&registry, &args.scope),
        },
        Commands::Describe { name } => describe(&registry, &args.scope, &name),
        Commands::Call {
            url,
            endpoint,
            body,
            headers,
            token,
            grpc,
            timeout,
            retries,
        } => {
            let (service, method) = endpoint;
            let input = app::CallInput {
                url,
                service,
                method,
                body,
                headers,
                token,
                grpc,
                timeout,
                retries,
            };
            run_call(&registry, &args.scope, input).await;
        }
    }
}

fn exit_with(err: impl Into<FormattedString>) -> ! {
    eprintln!("{}", err.into());
    process::exit(1);
}

fn list_services(registry: &Registry, scope: &str) {
    let services = app::list_services(registry, scope);
    println!("{}", FormattedString::from(ServiceList(services)));
}

fn describe(registry: &Registry, scope: &str, name: &str) {
    match app::describe(registry, scope, name) {
        Ok(app::Definition::Descriptor(descriptor)) => {
            println!("{}", FormattedString::from(descriptor))
        }
        Ok(app::Definition::Method(service, method)) => {
            println!("{}", FormattedString::from((service.as_ref(), &method)))
        }
        Err(err) => exit_with(err),
    }
}

async fn run_call(registry: &Registry, scope: &str, input: app::CallInput) {
    match app::call(registry, scope, input).await {
        Ok(Ok(value)) => println!("{}", FormattedString::from(value)),
        Ok(Err(err)) => exit_with(err),
        Err(err) => exit_with(err),
    }
}
