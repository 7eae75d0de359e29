use lambda_http::{Error, Request, service_fn};
use opendota_mcp_server::lambda::handle_invocation;
use opendota_mcp_server::logging::init_lambda_tracing;
use opendota_openapi_tools::config::UpstreamConfig;

fn main() -> Result<(), Error> {
    // API Gateway prefixes the stage (`/prod/mcp`); routes are stage-agnostic.
    // SAFETY: no other threads exist before the runtime is built.
    unsafe {
        std::env::set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run())
}

async fn run() -> Result<(), Error> {
    init_lambda_tracing()?;

    let config = UpstreamConfig::default();
    let config = &config;
    lambda_http::run(service_fn(move |request: Request| async move {
        handle_invocation(config, request).await
    }))
    .await
}
