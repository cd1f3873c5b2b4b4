//! The planner service: owns the alarm queue, the notification store, the
//! journal and the upstream cache, and drives them from page loads and
//! background timers.

use crate::{
    briefing::{self, Speaker},
    config::{Config, UpdateMode},
    entry::{Alarm, Notification, PendingAlarm},
    error::{PlannerError, Result},
    journal::{self, FileJournal, JournalSink, Record, Recovered},
    notifications::NotificationStore,
    refresh::DataGate,
    scheduler::AlarmScheduler,
    upstream::{self, Fetcher, FixtureFetcher, HttpFetcher, UpstreamUrls},
};
use chrono::{DateTime, Local};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub type SharedPlanner = Arc<Mutex<Planner>>;

pub struct Planner {
    scheduler: AlarmScheduler,
    notifications: NotificationStore,
    journal: Box<dyn JournalSink>,
    gate: DataGate,
    speaker: Box<dyn Speaker>,
    mode: UpdateMode,
}

impl Planner {
    pub fn new(
        mode: UpdateMode,
        journal: Box<dyn JournalSink>,
        fetcher: Arc<dyn Fetcher>,
        speaker: Box<dyn Speaker>,
    ) -> Self {
        Self::recover(Recovered::default(), mode, journal, fetcher, speaker)
    }

    /// Builds a planner on top of state replayed from the journal.
    pub fn recover(
        state: Recovered,
        mode: UpdateMode,
        journal: Box<dyn JournalSink>,
        fetcher: Arc<dyn Fetcher>,
        speaker: Box<dyn Speaker>,
    ) -> Self {
        Self {
            scheduler: state.scheduler,
            notifications: state.notifications,
            journal,
            gate: DataGate::new(fetcher),
            speaker,
            mode,
        }
    }

    /// Replays the journal at `journal_path` and wires the collaborators
    /// described by `config`. A journal that cannot be replayed is fatal.
    pub async fn from_config(config: &Config, journal_path: &Path) -> Result<Self> {
        let mode = config.updates.mode()?;

        let lines = journal::read_lines(journal_path)?;
        let state = journal::replay(&lines)?;
        info!(
            "restored {} alarms and {} notifications from {}",
            state.scheduler.len(),
            state.notifications.active_len(),
            journal_path.display()
        );
        let journal = FileJournal::open(journal_path)?;

        let fetcher: Arc<dyn Fetcher> = if mode == UpdateMode::Debug {
            Arc::new(FixtureFetcher::new(config.updates.debug_paths.clone()))
        } else {
            let client = reqwest::Client::builder()
                .build()
                .map_err(|e| PlannerError::Http(format!("failed to build HTTP client: {e}")))?;
            let city = upstream::resolve_city(&client, &config.city_name).await;
            info!("using city {city}");
            Arc::new(HttpFetcher::new(client, UpstreamUrls::from_config(config, &city)))
        };

        let speaker = briefing::speaker_from_config(&config.tts);
        Ok(Self::recover(state, mode, Box::new(journal), fetcher, speaker))
    }

    pub fn mode(&self) -> UpdateMode {
        self.mode
    }

    /// Schedules an alarm and journals it. Rejected requests change nothing.
    pub fn schedule(
        &mut self,
        title: &str,
        alarm_time: &str,
        weather: bool,
        news: bool,
        now: DateTime<Local>,
    ) -> Result<()> {
        let alarm = self
            .scheduler
            .validate(title, alarm_time, weather, news, now)
            .inspect_err(|e| error!("cannot schedule alarm: {e}"))?;
        self.append(Record::alarm_add(&alarm))?;
        info!("alarm {:?} set for {}", alarm.title, alarm.fire_time);
        self.scheduler.insert(alarm)
    }

    pub fn cancel(&mut self, title: &str) -> Result<()> {
        if !self.scheduler.contains(title) {
            error!("no alarm titled {title:?}");
            return Err(PlannerError::NotFound(title.to_string()));
        }
        self.append(Record::AlarmDel {
            title: title.to_string(),
        })?;
        self.scheduler.cancel(title)?;
        info!("alarm {title:?} cancelled");
        Ok(())
    }

    /// Adds a notification unless the same pair was ever added before.
    /// Returns whether it was inserted.
    pub fn add_notification(&mut self, title: &str, content: &str) -> Result<bool> {
        if self.notifications.seen(title, content) {
            return Ok(false);
        }
        self.append(Record::NotifAdd {
            title: title.to_string(),
            content: content.to_string(),
        })?;
        Ok(self.notifications.add(title, content))
    }

    pub fn dismiss(&mut self, title: &str) -> Result<()> {
        if !self.notifications.contains_active(title) {
            error!("no notification titled {title:?}");
            return Err(PlannerError::NotFound(title.to_string()));
        }
        self.append(Record::NotifDel {
            title: title.to_string(),
        })?;
        self.notifications.remove(title)?;
        Ok(())
    }

    pub fn list_pending(&self) -> Vec<PendingAlarm> {
        self.scheduler.list_pending()
    }

    pub fn list_active(&self) -> Vec<Notification> {
        self.notifications.list_active()
    }

    /// Refreshes the upstream cache and feeds derived notifications into the
    /// store.
    pub async fn refresh(&mut self) {
        self.gate.refresh().await;
        self.sync_notifications();
    }

    /// Adds notifications derived from the current cache.
    pub fn sync_notifications(&mut self) {
        for notif in self.gate.synthesize() {
            if let Err(e) = self.add_notification(&notif.title, &notif.content) {
                error!("cannot add notification {:?}: {e}", notif.title);
            }
        }
    }

    /// Fires every due alarm. Returns the fired alarms.
    ///
    /// An alarm whose removal cannot be journalled goes back into the queue
    /// unfired and is retried on the next check.
    pub async fn fire_due(&mut self, now: DateTime<Local>) -> Vec<Alarm> {
        let due = self.retire_due(now);
        for alarm in &due {
            info!("alarm {:?} going off", alarm.title);
            if self.mode == UpdateMode::OnAlarm {
                self.refresh().await;
            }
            let lines = briefing::compose(alarm, self.gate.cache());
            if let Err(e) = self.speaker.say(&lines).await {
                error!("briefing for {:?} failed: {e}", alarm.title);
            }
        }
        due
    }

    /// Work done on every page load before the request itself is handled.
    pub async fn on_page_load(&mut self, now: DateTime<Local>) {
        if self.mode == UpdateMode::PageReload {
            self.refresh().await;
        }
        self.fire_due(now).await;
    }

    /// Drops alarms whose time passed while the process was not running.
    pub fn expire_missed(&mut self, now: DateTime<Local>) -> Vec<Alarm> {
        let missed = self.retire_due(now);
        for alarm in &missed {
            warn!(
                "alarm {:?} was due at {} while not running, dropped it",
                alarm.title, alarm.fire_time
            );
        }
        missed
    }

    /// Startup work after recovery: drop missed alarms, load initial data and
    /// derive notifications from it.
    pub async fn prime(&mut self, now: DateTime<Local>) {
        self.expire_missed(now);
        self.refresh().await;
    }

    /// Takes the due alarms out of the queue and journals their removal.
    /// Alarms whose `alarm_del` cannot be written are put back.
    fn retire_due(&mut self, now: DateTime<Local>) -> Vec<Alarm> {
        let mut retired = Vec::new();
        for alarm in self.scheduler.drain_due(now) {
            let record = Record::AlarmDel {
                title: alarm.title.clone(),
            };
            if let Err(e) = self.append(record) {
                error!("keeping alarm {:?} queued, removal not journalled: {e}", alarm.title);
                if let Err(e) = self.scheduler.insert(alarm) {
                    error!("cannot requeue alarm: {e}");
                }
                continue;
            }
            retired.push(alarm);
        }
        retired
    }

    fn append(&mut self, record: Record) -> Result<()> {
        debug!("journal: {}", record.encode());
        self.journal
            .append(&record)
            .inspect_err(|e| error!("cannot write journal: {e}"))
    }
}

/// Checks for due alarms every `period`.
pub fn spawn_tick_loop(planner: SharedPlanner, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("alarm loop started, checking every {}s", period.as_secs());
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let mut planner = planner.lock().await;
            planner.fire_due(Local::now()).await;
        }
    })
}

/// Refreshes upstream data every `period`, rescheduling itself after each run.
pub fn spawn_interval_refresh(planner: SharedPlanner, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("interval refresh started, every {}s", period.as_secs());
        loop {
            tokio::time::sleep(period).await;
            planner.lock().await.refresh().await;
        }
    })
}

/// Starts the background tasks the configured update mode needs.
pub fn start(planner: SharedPlanner, mode: UpdateMode, tick: Duration) -> Vec<JoinHandle<()>> {
    let mut handles = vec![spawn_tick_loop(Arc::clone(&planner), tick)];
    if let UpdateMode::Interval(period) = mode {
        handles.push(spawn_interval_refresh(planner, period));
    }
    handles
}
