pub mod dictionary;
pub mod scrabble;
pub mod weather;

pub use dictionary::{DEFAULT_DICTIONARY_BASE_URL, KnownWordTool};
pub use scrabble::{ScrabbleScoreTool, min_word_score};
pub use weather::{DEFAULT_TOMTOM_BASE_URL, DEFAULT_WEATHER_GOV_BASE_URL, WeatherForecastTool};

use anyhow::Context;
use url::Url;

/// Append percent-encoded path segments to a service base URL.
pub(crate) fn append_path_segments(base: &str, segments: &[&str]) -> anyhow::Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("invalid service URL '{base}'"))?;
    url.path_segments_mut()
        .map_err(|()| anyhow::anyhow!("service URL '{base}' cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
