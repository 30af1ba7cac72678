//! `relayline config`: print the effective configuration.

use std::path::Path;

use relayline_config::AppConfig;

pub fn show(config: &AppConfig, path: Option<&Path>) -> anyhow::Result<()> {
    let default_path = AppConfig::config_dir().join("config.toml");
    let path = path.unwrap_or(&default_path);

    println!("# {}", path.display());
    if !config.has_api_key() {
        println!("# warning: no chat API key set");
    }
    println!("{}", toml::to_string_pretty(&config.redacted())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    #[test]
    fn config_path_is_valid() {
        let path = relayline_config::AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }
}
