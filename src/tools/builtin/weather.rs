//! Forecast lookup: TomTom geocoding, then the weather.gov points and
//! forecast endpoints. Only covers US locations.

use super::append_path_segments;
use crate::tools::traits::{Tool, ToolFuture};
use crate::tools::types::{ParamType, ParameterSchema};
use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};

pub const DEFAULT_TOMTOM_BASE_URL: &str = "https://api.tomtom.com";
pub const DEFAULT_WEATHER_GOV_BASE_URL: &str = "https://api.weather.gov";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    position: Option<Position>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Position {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    forecast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<ForecastPeriod>,
}

#[derive(Debug, Deserialize)]
struct ForecastPeriod {
    name: Option<String>,
    temperature: Option<Value>,
}

pub struct WeatherForecastTool {
    client: Client,
    tomtom_api_key: Option<String>,
    tomtom_base_url: String,
    weather_base_url: String,
    user_agent: String,
}

impl WeatherForecastTool {
    pub fn new(
        client: Client,
        tomtom_api_key: Option<String>,
        tomtom_base_url: impl Into<String>,
        weather_base_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            tomtom_api_key: tomtom_api_key.filter(|key| !key.trim().is_empty()),
            tomtom_base_url: tomtom_base_url.into(),
            weather_base_url: weather_base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    async fn geocode(&self, placename: &str) -> anyhow::Result<Position> {
        let key = self
            .tomtom_api_key
            .as_deref()
            .context("TomTom API key is missing (set tools.tomtom_api_key or TOMTOM_APIKEY)")?;

        let mut url = append_path_segments(
            &self.tomtom_base_url,
            &["search", "2", "geocode", &format!("{placename}.json")],
        )?;
        url.query_pairs_mut().append_pair("key", key);

        let geocode: GeocodeResponse = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            // The request URL carries the key in its query.
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("TomTom geocode request failed for '{placename}'"))?
            .json()
            .await
            .with_context(|| format!("unreadable TomTom response for '{placename}'"))?;

        let first = geocode
            .results
            .into_iter()
            .next()
            .with_context(|| format!("no geocoding results found for '{placename}'"))?;
        first
            .position
            .with_context(|| format!("TomTom result for '{placename}' has no position"))
    }

    async fn forecast_url(&self, position: Position) -> anyhow::Result<String> {
        // weather.gov redirects coordinates with more than four decimals
        let url = format!(
            "{}/points/{:.4},{:.4}",
            self.weather_base_url, position.lat, position.lon
        );
        let points: PointsResponse = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .context("weather.gov points request failed")?
            .json()
            .await
            .context("unreadable weather.gov points response")?;

        points
            .properties
            .forecast
            .context("weather.gov points response has no properties.forecast URL")
    }

    async fn first_period(&self, forecast_url: &str) -> anyhow::Result<Value> {
        let forecast: ForecastResponse = self
            .client
            .get(forecast_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .context("weather.gov forecast request failed")?
            .json()
            .await
            .context("unreadable weather.gov forecast response")?;

        let period = forecast
            .properties
            .periods
            .into_iter()
            .next()
            .context("no forecast periods in weather.gov response")?;
        match (period.temperature, period.name) {
            (Some(temperature), Some(name)) => {
                Ok(json!({"temperature": temperature, "periodName": name}))
            }
            _ => anyhow::bail!("forecast period is missing temperature or name"),
        }
    }

    pub async fn forecast(&self, placename: &str) -> anyhow::Result<Value> {
        let position = self.geocode(placename).await?;
        tracing::debug!(placename, lat = position.lat, lon = position.lon, "Geocoded place");
        let forecast_url = self.forecast_url(position).await?;
        self.first_period(&forecast_url).await
    }
}

impl Tool for WeatherForecastTool {
    fn name(&self) -> &str {
        "get_weather_forecast"
    }

    fn description(&self) -> &str {
        "Gets the current weather forecast for a US place, returning the temperature \
         in Fahrenheit and the name of the forecast period."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required(
            "placename",
            ParamType::String,
            "City and state, e.g. Chicago, IL",
        )
    }

    fn execute<'a>(&'a self, args: &'a Map<String, Value>) -> ToolFuture<'a> {
        Box::pin(async move {
            let placename = args
                .get("placename")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("Missing 'placename' parameter"))?;
            self.forecast(placename).await
        })
    }
}
