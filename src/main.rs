//! Main entry point for the clipfetch CLI

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use clipfetch::cli::{Args, OutputFormatter, VerbosityLevel};
use clipfetch::{AcquireConfig, AcquisitionRequest, Capabilities, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity_level());
    debug!("Parsed args: {:?}", args);

    let mut formatter = OutputFormatter::new(args.verbosity_level());

    let platform = match args.resolved_platform() {
        Ok(platform) => platform,
        Err(e) => {
            formatter.error(&e);
            std::process::exit(2);
        }
    };
    let external_id = match args.resolved_id() {
        Ok(id) => id,
        Err(e) => {
            formatter.error(&e);
            std::process::exit(2);
        }
    };

    let mut capabilities = Capabilities::probe();
    if let Some(url) = &args.cobalt_url {
        capabilities = capabilities.with_cobalt_endpoint(url);
    }

    let mut config = AcquireConfig {
        output_dir: args.output_dir.clone(),
        cookie_file: args.cookies.clone(),
        ..AcquireConfig::default()
    };
    if let Some(order) = &args.order {
        config.strategy_order = order.clone();
    }
    config.session.headless = !args.headful;
    config.session.challenge_timeout = args.challenge_timeout_duration();

    let mut request = AcquisitionRequest::new(args.url.clone(), platform, external_id);
    if let Some(group) = &args.group {
        request = request.with_group(group);
    }
    if let Some(source) = &args.source {
        request = request.with_source(source);
    }
    if let Some(title) = &args.title {
        request = request.with_title(title);
    }

    info!("Acquiring {} ({})", request.source_url, request.platform);
    if !args.json {
        formatter.start_acquire(&request.source_url);
    }

    let orchestrator = Orchestrator::new(config, capabilities);
    let result = orchestrator.acquire(&request).await;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        formatter.print_result(&result);
    }

    if !result.is_completed() {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(verbosity: VerbosityLevel) {
    let default_filter = match verbosity {
        VerbosityLevel::Quiet => "error",
        VerbosityLevel::Normal => "clipfetch=info",
        VerbosityLevel::Verbose => "clipfetch=debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
