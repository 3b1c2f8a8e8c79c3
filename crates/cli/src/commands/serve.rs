//! `replyline serve`: Start the review server.

use replyline_config::AppConfig;

pub async fn run(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    println!("Replyline review server");
    println!("   Listening: http://{}", config.bind_address());
    println!("   Company:   {} ({})", config.brand.company_name, config.brand.domain);
    match config.pipeline.review_timeout_secs {
        Some(secs) => println!(
            "   Review:    {secs}s timeout, then {:?}",
            config.pipeline.on_review_timeout
        ),
        None => println!("   Review:    waits for an operator"),
    }

    replyline_gateway::start(config).await?;

    Ok(())
}
