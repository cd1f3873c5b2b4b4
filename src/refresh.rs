//! Cached upstream datasets and the gate that refreshes them.

use crate::{
    entry::Notification,
    error::PlannerError,
    upstream::{CovidData, Fetcher, NewsData, WeatherData},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Most recent successful fetch of each dataset.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    pub covid: Option<CovidData>,
    pub weather: Option<WeatherData>,
    pub news: Option<NewsData>,
}

pub struct DataGate {
    fetcher: Arc<dyn Fetcher>,
    cache: Cache,
}

impl DataGate {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            cache: Cache::default(),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Fetches all three datasets. A failed or rejected fetch keeps the
    /// previous value of that slot.
    pub async fn refresh(&mut self) {
        match self.fetcher.covid().await.and_then(|d| accept(d, "covid", CovidData::is_valid)) {
            Ok(data) => {
                if let Some(latest) = data.latest() {
                    debug!(
                        "infection data for {:?} as of {}",
                        latest.area_name,
                        data.last_update_date()
                    );
                }
                self.cache.covid = Some(data);
            }
            Err(e) => warn!("keeping cached infection data: {e}"),
        }
        match self
            .fetcher
            .weather()
            .await
            .and_then(|d| accept(d, "weather", WeatherData::is_valid))
        {
            Ok(data) => self.cache.weather = Some(data),
            Err(e) => warn!("keeping cached weather data: {e}"),
        }
        match self.fetcher.news().await.and_then(|d| accept(d, "news", NewsData::is_valid)) {
            Ok(data) => self.cache.news = Some(data),
            Err(e) => warn!("keeping cached news data: {e}"),
        }
        info!("upstream data refreshed");
    }

    /// Notifications derived from the cache: one per news article, oldest
    /// first, then one for new infections if there are any.
    pub fn synthesize(&self) -> Vec<Notification> {
        let mut out = Vec::new();

        if let Some(news) = &self.cache.news {
            for article in news.articles.iter().rev() {
                out.push(Notification::new(
                    article.title.clone(),
                    article_content(
                        article.description.as_deref().unwrap_or_default(),
                        &article.url,
                    ),
                ));
            }
        }

        if let Some(covid) = &self.cache.covid {
            if let Some(latest) = covid.latest() {
                let new_cases = latest.new_cases.unwrap_or(0);
                if new_cases > 0 {
                    out.push(Notification::new(
                        format!(
                            "{new_cases} New COVID-19 Cases on {}",
                            covid.last_update_date()
                        ),
                        format!(
                            "Total recorded cases in your area now {}",
                            latest.cum_cases.unwrap_or(0)
                        ),
                    ));
                }
            }
        }

        debug!("synthesized {} candidate notifications", out.len());
        out
    }
}

fn accept<T>(data: T, source: &str, is_valid: fn(&T) -> bool) -> Result<T, PlannerError> {
    if is_valid(&data) {
        Ok(data)
    } else {
        Err(PlannerError::UpstreamUnavailable(source.to_string()))
    }
}

fn article_content(description: &str, url: &str) -> String {
    format!(
        "{} <a rel=\"noopener noreferrer\" target=\"_blank\" href=\"{}\">Link to article</a>",
        html_escape::encode_text(description),
        html_escape::encode_double_quoted_attribute(url)
    )
}
