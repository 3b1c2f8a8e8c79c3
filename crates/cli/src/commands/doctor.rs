//! `replyline doctor`: Check configuration and model access.

use replyline_agents::GuardAgent;
use replyline_config::{AppConfig, ConfigError};
use replyline_providers::ModelClient;
use std::path::Path;

pub async fn run(
    config: AppConfig,
    config_path: &Path,
    offline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Replyline Doctor");
    println!("================\n");

    let mut issues = 0;

    println!("{}", config_file_line(config_path));

    match config.check_credential() {
        Ok(_) => println!("  ✅ API key configured"),
        Err(ConfigError::MissingCredential) => {
            println!("  ❌ No API key: set REPLYLINE_API_KEY or GROQ_API_KEY");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match config.validate() {
        Ok(()) => println!("  ✅ Configuration valid"),
        Err(ConfigError::MissingCredential | ConfigError::InvalidCredential) => {}
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    for (stage, settings) in config.models.stages() {
        println!(
            "  ·  {stage:<9} {} (max {} tokens, temperature {})",
            settings.model, settings.max_tokens, settings.temperature
        );
    }
    println!("  ·  server    http://{}", config.bind_address());

    if offline {
        println!("\n  Skipping model checks (--offline)");
    } else if issues == 0 {
        issues += check_models(&config).await;
    } else {
        println!("\n  Skipping model checks until the issues above are fixed");
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
        Ok(())
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
        Err(format!("{issues} issue(s) found").into())
    }
}

fn config_file_line(path: &Path) -> String {
    if path.exists() {
        format!("  ✅ Config file found: {}", path.display())
    } else {
        format!(
            "  ℹ️  No config file at {}, using defaults and environment",
            path.display()
        )
    }
}

/// Reach the endpoint, then send a short prompt to the guard model.
async fn check_models(config: &AppConfig) -> usize {
    println!();
    let client = match ModelClient::from_config(config) {
        Ok(client) => client,
        Err(e) => {
            println!("  ❌ Could not build model client: {e}");
            return 1;
        }
    };

    match client.health_check().await {
        Ok(true) => println!("  ✅ Endpoint reachable: {}", config.api_url),
        Ok(false) => {
            println!("  ❌ Endpoint answered but not healthy: {}", config.api_url);
            return 1;
        }
        Err(e) => {
            println!("  ❌ Endpoint unreachable: {e}");
            return 1;
        }
    }

    let guard = GuardAgent::new(client, config.models.guard.clone());
    match guard.check("Hello, I have a question about my order.").await {
        Ok(reply) => {
            println!(
                "  ✅ Guard model answered in {:.0} ms ({})",
                reply.latency_ms,
                reply.value.summary()
            );
            0
        }
        Err(e) => {
            println!("  ❌ Guard model call failed: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_the_file_actually_loaded() {
        let path =
            std::env::temp_dir().join(format!("replyline-doctor-{}.toml", std::process::id()));
        std::fs::write(&path, "log_level = \"debug\"\n").unwrap();
        let line = config_file_line(&path);
        std::fs::remove_file(&path).unwrap();

        assert!(line.contains("Config file found"));
        assert!(line.contains(&path.display().to_string()));
    }

    #[test]
    fn missing_explicit_file_is_named() {
        let path = Path::new("/nonexistent/replyline/custom.toml");
        let line = config_file_line(path);
        assert!(line.contains("No config file at /nonexistent/replyline/custom.toml"));
    }
}
