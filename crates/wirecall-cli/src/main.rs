//! wirecall CLI - invoke a remote function from the command line.
//!
//! Prints the call's `result` as JSON on stdout. Because remote calls never
//! return errors, the exit code is derived from the dispatch state: a call
//! that left the client unresponsive exits with status 1.

mod args;

use anyhow::{Context, Result};
use args::Args;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wirecall_core::{CallerContext, HttpTransport, Invoker, PageStatus};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::WARN };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = args.client_config()?;
    let params = args.params()?;

    let page = Arc::new(PageStatus::new());
    let transport = HttpTransport::from_config(&config)?;
    let invoker = Invoker::builder(config, transport)
        .status_sink(page.clone())
        .build()
        .context("Invalid client configuration")?;

    if let Some(tag) = &args.version_tag {
        invoker.registry().register(&args.hash, &args.name, tag);
    }

    let function = invoker.build(&args.name, &args.hash);
    let caller = CallerContext::new(args.caller_hash.as_deref().unwrap_or(&args.hash));
    info!("Calling {} as {}", function.descriptor(), function.verb());

    let result = function.call(&caller, params).await;

    let dispatch = invoker.dispatch();
    if !dispatch.is_responsive() {
        match dispatch.last_failure() {
            Some(failure) => error!("{} failed: {}", failure.function, failure.message),
            None => error!("{} failed", args.name),
        }
        return Ok(ExitCode::FAILURE);
    }

    info!("HTTP status: {:?}", page.status());
    let rendered = match result {
        Some(value) => serde_json::to_string_pretty(&value)?,
        None => "null".to_string(),
    };
    // Intentional stdout: the result is the program's output
    println!("{}", rendered);

    Ok(ExitCode::SUCCESS)
}
