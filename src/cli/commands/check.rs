//! Check command - classify a request without touching the network

use crate::cli::args::CheckArgs;
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::http::{parse_url, Method, Request};

/// Execute the check command
///
/// Prints the decision on the first line and the cache key of intercepted
/// requests on the second.
pub async fn execute(args: CheckArgs, config: &Config) -> ShellCacheResult<()> {
    let method: Method = args.method.parse()?;
    let request = Request::new(method, parse_url(&args.url)?);

    let decision = config.policy.to_policy().evaluate(&request);
    println!("{}", decision);
    if !decision.is_bypass() {
        println!("key: {}", request.cache_key());
    }

    Ok(())
}
