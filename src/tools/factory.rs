use super::builtin::{KnownWordTool, ScrabbleScoreTool, WeatherForecastTool};
use super::registry::ToolRegistry;
use super::traits::Tool;
use crate::config::ToolsConfig;
use crate::error::ToolError;
use crate::llm::build_http_client_with_timeout;

/// Built-in tools enabled by `config`, in catalogue order.
pub fn default_tools(config: &ToolsConfig) -> Vec<Box<dyn Tool>> {
    let client = build_http_client_with_timeout(config.request_timeout_secs);
    let mut tools: Vec<Box<dyn Tool>> = Vec::new();

    if config.scrabble_enabled {
        tools.push(Box::new(ScrabbleScoreTool::new()));
    }
    if config.dictionary_enabled {
        tools.push(Box::new(KnownWordTool::new(
            client.clone(),
            config.dictionary_base_url.clone(),
        )));
    }
    if config.weather_enabled {
        if config.tomtom_api_key.is_none() {
            tracing::warn!("get_weather_forecast enabled without a TomTom API key; calls will fail");
        }
        tools.push(Box::new(WeatherForecastTool::new(
            client,
            config.tomtom_api_key.clone(),
            config.tomtom_base_url.clone(),
            config.weather_base_url.clone(),
            config.user_agent.clone(),
        )));
    }

    tools
}

/// Registry holding the enabled built-in tools.
pub fn build_registry(config: &ToolsConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    for tool in default_tools(config) {
        registry.register(tool)?;
    }
    Ok(registry)
}
