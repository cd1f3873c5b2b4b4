//! Spoken briefings for fired alarms.

use crate::{
    config::TtsConfig,
    entry::Alarm,
    error::{PlannerError, Result},
    refresh::Cache,
};
use async_trait::async_trait;
use tracing::info;

const KELVIN_OFFSET: i64 = 273;
const MAX_HEADLINES: usize = 5;

/// Lines to be spoken for an alarm. Datasets missing from the cache are
/// skipped.
pub fn compose(alarm: &Alarm, cache: &Cache) -> Vec<String> {
    let mut lines = vec![format!("Alert: {}", alarm.title)];

    if let Some(latest) = cache.covid.as_ref().and_then(|c| c.latest()) {
        lines.push(format!(
            "There have been {} new covid 19 cases in your area, leading to a total of {} cases.",
            latest.new_cases.unwrap_or(0),
            latest.cum_cases.unwrap_or(0)
        ));
    }

    if alarm.weather {
        if let Some(weather) = &cache.weather {
            let temp = weather.main.as_ref().map(|m| m.temp as i64 - KELVIN_OFFSET);
            let desc = weather.weather.first().map(|w| w.description.as_str());
            match (desc, temp) {
                (Some(desc), Some(temp)) => lines.push(format!(
                    "The current weather is {desc}. With a temperature of {temp} degrees celsius."
                )),
                (Some(desc), None) => lines.push(format!("The current weather is {desc}.")),
                (None, Some(temp)) => lines.push(format!(
                    "The current temperature is {temp} degrees celsius."
                )),
                (None, None) => {}
            }
        }
    }

    if alarm.news {
        if let Some(news) = &cache.news {
            if !news.articles.is_empty() {
                lines.push("The latest headlines are:".to_string());
                lines.extend(
                    news.articles
                        .iter()
                        .take(MAX_HEADLINES)
                        .map(|a| a.title.clone()),
                );
            }
        }
    }

    lines
}

/// Text-to-speech output.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn say(&self, lines: &[String]) -> Result<()>;
}

/// Speaks through an external command, once per line.
pub struct CommandSpeaker {
    command: String,
    args: Vec<String>,
}

impl CommandSpeaker {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl Speaker for CommandSpeaker {
    async fn say(&self, lines: &[String]) -> Result<()> {
        for line in lines {
            let status = tokio::process::Command::new(&self.command)
                .args(&self.args)
                .arg(line)
                .status()
                .await?;
            if !status.success() {
                return Err(PlannerError::Io(std::io::Error::other(format!(
                    "{} exited with {status}",
                    self.command
                ))));
            }
        }
        Ok(())
    }
}

/// Only logs what would have been said.
pub struct LogSpeaker;

#[async_trait]
impl Speaker for LogSpeaker {
    async fn say(&self, lines: &[String]) -> Result<()> {
        for line in lines {
            info!("briefing: {line}");
        }
        Ok(())
    }
}

pub fn speaker_from_config(tts: &TtsConfig) -> Box<dyn Speaker> {
    if tts.command.trim().is_empty() {
        Box::new(LogSpeaker)
    } else {
        Box::new(CommandSpeaker::new(tts.command.clone(), tts.args.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_alarm_time;

    fn alarm(weather: bool, news: bool) -> Alarm {
        Alarm {
            title: "morning".into(),
            fire_time: parse_alarm_time("2030-01-01T07:00").unwrap(),
            weather,
            news,
        }
    }

    fn full_cache() -> Cache {
        Cache {
            covid: serde_json::from_str(include_str!("../access/fixtures/covid.json")).ok(),
            weather: serde_json::from_str(include_str!("../access/fixtures/weather.json")).ok(),
            news: serde_json::from_str(include_str!("../access/fixtures/news.json")).ok(),
        }
    }

    #[test]
    fn empty_cache_only_announces_title() {
        assert_eq!(compose(&alarm(true, true), &Cache::default()), ["Alert: morning"]);
    }

    #[test]
    fn flags_select_sections() {
        let cache = full_cache();

        let plain = compose(&alarm(false, false), &cache);
        assert_eq!(plain.len(), 2);
        assert_eq!(
            plain[1],
            "There have been 42 new covid 19 cases in your area, leading to a total of 3106 cases."
        );

        let all = compose(&alarm(true, true), &cache);
        assert_eq!(
            all[2],
            "The current weather is broken clouds. With a temperature of 8 degrees celsius."
        );
        assert_eq!(all[3], "The latest headlines are:");
        assert_eq!(all[4], "Vaccine rollout to begin next week");
        assert_eq!(all.len(), 6);
    }

    #[tokio::test]
    async fn empty_command_logs_instead() {
        let speaker = speaker_from_config(&TtsConfig {
            command: String::new(),
            args: Vec::new(),
        });
        speaker.say(&["hello".to_string()]).await.unwrap();
    }
}
