//! `helix config`: Configuration management commands.

use helix_config::AppConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            for (name, backend) in config.enabled_backends() {
                if backend.api_key.is_none() && backend.api_url.is_none() {
                    warnings.push(format!(
                        "Backend '{name}' has no API key (set HELIX_{}_API_KEY)",
                        name.to_uppercase().replace('-', "_")
                    ));
                }
            }

            if config.enabled_backends().next().is_none() {
                warnings.push("No backends enabled; every query will use the knowledge bank".into());
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Backends:  {}", config.enabled_backends().count());
            println!(
                "   Cache:     {} entries, {}s freshness",
                config.cache.capacity, config.cache.ttl_secs
            );
            println!("   Budget:    {} units", config.budget.ceiling);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show_default() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::default_toml());
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
