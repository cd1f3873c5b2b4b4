//! Upstream data providers: infection rate, weather and news.
//!
//! Responses are deserialized into the minimal shape the planner reads.
//! Whether a response is usable is decided by the provider's own status
//! field, see the `is_valid` methods.

use crate::{
    config::{Config, DebugPaths},
    error::{PlannerError, Result},
};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

const WEATHER_BASE_URL: &str = "http://api.openweathermap.org/data/2.5/weather";
const NEWS_BASE_URL: &str = "http://newsapi.org/v2/top-headlines";
const COVID_BASE_URL: &str = "https://api.coronavirus.data.gov.uk/v1/data";
const CITY_LOOKUP_URL: &str = "https://ipapi.co/city";
const FALLBACK_CITY: &str = "London";

const COVID_STRUCTURE: &str = r#"{"areaName":"areaName","newCases":"newCasesBySpecimenDate","cumCases":"cumCasesBySpecimenDate"}"#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CovidData {
    #[serde(default)]
    pub data: Vec<CovidRecord>,
    #[serde(rename = "lastUpdate", default)]
    pub last_update: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CovidRecord {
    #[serde(rename = "areaName", default)]
    pub area_name: String,
    #[serde(rename = "newCases", default)]
    pub new_cases: Option<i64>,
    #[serde(rename = "cumCases", default)]
    pub cum_cases: Option<i64>,
}

impl CovidData {
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
    }

    /// Most recent record.
    pub fn latest(&self) -> Option<&CovidRecord> {
        self.data.first()
    }

    /// Date part of `lastUpdate`.
    pub fn last_update_date(&self) -> &str {
        self.last_update
            .split('T')
            .next()
            .unwrap_or(&self.last_update)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherData {
    pub cod: serde_json::Value,
    #[serde(default)]
    pub main: Option<WeatherMain>,
    #[serde(default)]
    pub weather: Vec<WeatherDescription>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherMain {
    /// Kelvin.
    pub temp: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherDescription {
    #[serde(default)]
    pub description: String,
}

impl WeatherData {
    pub fn is_valid(&self) -> bool {
        self.cod.as_i64() == Some(200)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewsData {
    pub status: String,
    #[serde(default)]
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: String,
}

impl NewsData {
    pub fn is_valid(&self) -> bool {
        self.status == "ok"
    }
}

/// Source of the three upstream datasets.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn covid(&self) -> Result<CovidData>;
    async fn weather(&self) -> Result<WeatherData>;
    async fn news(&self) -> Result<NewsData>;
}

/// Fully built request URLs.
#[derive(Debug, Clone)]
pub struct UpstreamUrls {
    pub covid: String,
    pub weather: String,
    pub news: String,
}

impl UpstreamUrls {
    pub fn from_config(config: &Config, city: &str) -> Self {
        Self::with_bases(config, city, COVID_BASE_URL, WEATHER_BASE_URL, NEWS_BASE_URL)
    }

    pub fn with_bases(
        config: &Config,
        city: &str,
        covid_base: &str,
        weather_base: &str,
        news_base: &str,
    ) -> Self {
        let city = urlencoding::encode(city);

        let covid = format!(
            "{covid_base}?filters=areaName={city}&structure={}",
            urlencoding::encode(COVID_STRUCTURE)
        );

        let weather = format!(
            "{weather_base}?appid={}&q={city}",
            urlencoding::encode(&config.api_keys.weatherapi)
        );

        let queries: String = config
            .news
            .queries
            .iter()
            .map(|q| format!("q={}&", urlencoding::encode(q)))
            .collect();
        let news = format!(
            "{news_base}?{queries}country={}&apiKey={}",
            urlencoding::encode(&config.news.country),
            urlencoding::encode(&config.api_keys.newsapi)
        );

        Self {
            covid,
            weather,
            news,
        }
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    urls: UpstreamUrls,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, urls: UpstreamUrls) -> Self {
        Self { client, urls }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", redact(url));
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PlannerError::Http(e.without_url().to_string()))?;
        response
            .json::<T>()
            .await
            .map_err(|e| PlannerError::Http(e.without_url().to_string()))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn covid(&self) -> Result<CovidData> {
        self.get_json(&self.urls.covid).await
    }

    async fn weather(&self) -> Result<WeatherData> {
        self.get_json(&self.urls.weather).await
    }

    async fn news(&self) -> Result<NewsData> {
        self.get_json(&self.urls.news).await
    }
}

/// Strips API keys from a URL before it is logged.
fn redact(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let params: Vec<String> = query
        .split('&')
        .map(|param| match param.split_once('=') {
            Some((key, _)) if is_secret_param(key) => format!("{key}=***"),
            _ => param.to_string(),
        })
        .collect();
    format!("{base}?{}", params.join("&"))
}

fn is_secret_param(key: &str) -> bool {
    key.eq_ignore_ascii_case("appid") || key.eq_ignore_ascii_case("apikey")
}

/// Reads the datasets from local JSON files.
pub struct FixtureFetcher {
    paths: DebugPaths,
}

impl FixtureFetcher {
    pub fn new(paths: DebugPaths) -> Self {
        Self { paths }
    }

    async fn load<T: DeserializeOwned>(path: &str) -> Result<T> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn covid(&self) -> Result<CovidData> {
        Self::load(&self.paths.covid).await
    }

    async fn weather(&self) -> Result<WeatherData> {
        Self::load(&self.paths.weather).await
    }

    async fn news(&self) -> Result<NewsData> {
        Self::load(&self.paths.news).await
    }
}

/// Returns the configured city, or looks it up by IP when set to `"auto"`.
pub async fn resolve_city(client: &reqwest::Client, configured: &str) -> String {
    if configured != "auto" {
        return configured.to_string();
    }
    let lookup = async {
        let response = client.get(CITY_LOOKUP_URL).send().await?.error_for_status()?;
        Ok::<String, reqwest::Error>(response.text().await?)
    };
    match lookup.await {
        Ok(city) if !city.trim().is_empty() => city.trim().to_string(),
        Ok(_) => {
            warn!("city lookup returned nothing, using {FALLBACK_CITY}");
            FALLBACK_CITY.to_string()
        }
        Err(e) => {
            warn!("city lookup failed ({}), using {FALLBACK_CITY}", e.without_url());
            FALLBACK_CITY.to_string()
        }
    }
}
