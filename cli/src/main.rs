//! Pipeline engine binary: loads config, initializes logging, starts the HTTP
//! surface. Interface-only wiring — no business logic lives here.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pipeline-engine")]
#[command(about = "Single-node pipeline execution engine")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "PIPELINE_ENGINE_ADDR")]
    addr: Option<String>,

    /// Log level filter (e.g. info, debug, cli=debug,engine=trace).
    #[arg(long, env = "PIPELINE_ENGINE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Err(e) = config::load_and_apply("pipeline-engine", None) {
        eprintln!("warning: failed to load config: {e}");
    }

    let args = Args::parse();
    let log_reload = serve::init_tracing(&args.log_level);
    let provider_env = serve::ProviderEnv::from_process_env();

    let addr = args.addr.clone().unwrap_or_else(|| "127.0.0.1:8080".to_string());
    println!("pipeline-engine starting on {addr}");

    serve::run_serve(args.addr.as_deref(), provider_env, Some(log_reload)).await
}
