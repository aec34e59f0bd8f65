//! Fetch command - serve one request through the worker

use super::{build_manager, open_store, resolve_generation};
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::http::{parse_url, Method, Request};
use crate::worker::{Served, ServiceWorker};
use std::io::Write;
use tracing::{info, warn};

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> ShellCacheResult<()> {
    let method: Method = args.method.parse()?;
    let mut request = Request::new(method, parse_url(&args.url)?);
    if let Some(data) = args.data {
        request = request.with_body(data);
    }

    let store = open_store(config);

    // Serve from whatever generation an earlier `activate` left current
    let generation = match store.active().await {
        Ok(Some(active)) => active,
        Ok(None) => resolve_generation(config, None, None).await?,
        Err(e) => {
            warn!(error = %e, "Cannot read active generation");
            resolve_generation(config, None, None).await?
        }
    };

    let manager = build_manager(config, generation, store)?;
    if let Err(e) = manager.resume().await {
        warn!(error = %e, "Cannot resume worker, passing requests through");
    }

    let served = manager.on_fetch(&request).await?;
    info!(
        url = %request.url,
        status = served.response.status,
        source = %served.source,
        "Served request"
    );

    eprintln!("{} {}", served.response.status, served.source);
    write_response(&served, args.include)
        .map_err(|e| ShellCacheError::io("writing response to stdout", e))
}

fn write_response(served: &Served, include: bool) -> std::io::Result<()> {
    let mut out = std::io::stdout().lock();

    if include {
        writeln!(out, "HTTP {}", served.response.status)?;
        writeln!(out, "x-shellcache-source: {}", served.source)?;
        for (name, value) in &served.response.headers {
            writeln!(out, "{}: {}", name, value)?;
        }
        writeln!(out)?;
    }

    out.write_all(&served.response.body)?;
    out.flush()
}
