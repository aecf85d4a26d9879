// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CLI probe runner: the same handler adaptors the HTTP router dispatches
//! to, driven from the command line.
//!
//! ```text
//! portofcall <proto>/<op> ['<json-params>'] [--config <yaml>] [--logger <yaml>]
//! portofcall iscsi/discover '{"host":"nas.local","port":3260}'
//! ```

use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use portofcall::{
    api::{self, adaptor::ApiRequest, gate::NoGate},
    cfg::{cli::resolve_config_path, config::GatewayConfig, logger::init_logger},
};
use tracing::debug;

struct Args {
    route: String,
    params: serde_json::Value,
    config: Option<String>,
    logger: Option<String>,
}

fn parse_args() -> Result<Args> {
    let mut route = None;
    let mut params = serde_json::json!({});
    let mut config = None;
    let mut logger = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => config = it.next(),
            "--logger" => logger = it.next(),
            _ if route.is_none() => route = Some(arg),
            _ => {
                params = serde_json::from_str(&arg)
                    .with_context(|| format!("params are not valid JSON: {arg}"))?;
            },
        }
    }

    let Some(route) = route else {
        bail!("usage: portofcall <proto>/<op> ['<json-params>'] [--config <yaml>]");
    };
    Ok(Args {
        route,
        params,
        config,
        logger,
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = parse_args()?;

    let _logger_guard = match &args.logger {
        Some(path) => Some(init_logger(path)?),
        None => None,
    };

    let cfg = match &args.config {
        Some(path) => resolve_config_path(path)
            .and_then(GatewayConfig::load_from_file)
            .context("failed to resolve or load config")?,
        None => GatewayConfig::default(),
    };
    debug!(route = %args.route, "dispatching");

    let req = ApiRequest::post(args.params);
    let Some(resp) = api::dispatch(&cfg, &NoGate, &args.route, req).await else {
        bail!("unknown endpoint {:?}", args.route);
    };

    println!("{}", serde_json::to_string_pretty(&resp.body)?);
    Ok(if (200..300).contains(&resp.status) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
