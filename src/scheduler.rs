//! Time-ordered queue of pending alarms, unique by title.

use crate::{
    entry::{Alarm, PendingAlarm},
    error::{PlannerError, Result},
    journal::DELIMITER,
    utils,
};
use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap};

/// Queue position: fire time first, insertion order for equal times.
type QueueKey = (DateTime<Local>, u64);

#[derive(Debug, Default)]
pub struct AlarmScheduler {
    queue: BTreeMap<QueueKey, Alarm>,
    by_title: HashMap<String, QueueKey>,
    next_seq: u64,
}

impl AlarmScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks a schedule request and builds the alarm without queueing it.
    pub fn validate(
        &self,
        title: &str,
        alarm_time: &str,
        weather: bool,
        news: bool,
        now: DateTime<Local>,
    ) -> Result<Alarm> {
        if self.contains(title) {
            return Err(PlannerError::DuplicateTitle(title.to_string()));
        }
        if title.contains(DELIMITER) {
            return Err(PlannerError::ReservedToken(title.to_string()));
        }
        let fire_time = utils::parse_alarm_time(alarm_time)?;
        if fire_time <= now {
            return Err(PlannerError::InvalidTime(alarm_time.to_string()));
        }
        Ok(Alarm {
            title: title.to_string(),
            fire_time,
            weather,
            news,
        })
    }

    /// Validates and queues an alarm.
    pub fn schedule(
        &mut self,
        title: &str,
        alarm_time: &str,
        weather: bool,
        news: bool,
        now: DateTime<Local>,
    ) -> Result<Alarm> {
        let alarm = self.validate(title, alarm_time, weather, news, now)?;
        self.insert(alarm.clone())?;
        Ok(alarm)
    }

    /// Queues an alarm as-is. Only the title uniqueness is enforced.
    pub fn insert(&mut self, alarm: Alarm) -> Result<()> {
        if self.contains(&alarm.title) {
            return Err(PlannerError::DuplicateTitle(alarm.title));
        }
        let key = (alarm.fire_time, self.next_seq);
        self.next_seq += 1;
        self.by_title.insert(alarm.title.clone(), key);
        self.queue.insert(key, alarm);
        Ok(())
    }

    pub fn cancel(&mut self, title: &str) -> Result<Alarm> {
        let key = self
            .by_title
            .remove(title)
            .ok_or_else(|| PlannerError::NotFound(title.to_string()))?;
        self.queue
            .remove(&key)
            .ok_or_else(|| PlannerError::NotFound(title.to_string()))
    }

    pub fn contains(&self, title: &str) -> bool {
        self.by_title.contains_key(title)
    }

    /// Pending alarms ordered by fire time, for display.
    pub fn list_pending(&self) -> Vec<PendingAlarm> {
        self.queue
            .values()
            .map(|alarm| PendingAlarm {
                title: alarm.title.clone(),
                content: utils::describe_fire_time(&alarm.fire_time),
            })
            .collect()
    }

    /// Removes and returns every alarm due at `now`, earliest first.
    pub fn drain_due(&mut self, now: DateTime<Local>) -> Vec<Alarm> {
        let later = self.queue.split_off(&(now, u64::MAX));
        let due = std::mem::replace(&mut self.queue, later);
        let mut drained = Vec::with_capacity(due.len());
        for alarm in due.into_values() {
            self.by_title.remove(&alarm.title);
            drained.push(alarm);
        }
        drained
    }

    pub fn alarms(&self) -> impl Iterator<Item = &Alarm> {
        self.queue.values()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Local> {
        utils::parse_alarm_time("2025-06-01T09:00").unwrap()
    }

    #[test]
    fn schedule_then_list_and_cancel() {
        let mut s = AlarmScheduler::new();
        s.schedule("test", "2030-01-01T10:00", true, false, now()).unwrap();

        assert_eq!(
            s.list_pending(),
            vec![PendingAlarm {
                title: "test".into(),
                content: "Set to go off at 10:01 on 01/01/2030".into(),
            }]
        );

        let alarm = s.cancel("test").unwrap();
        assert!(alarm.weather && !alarm.news);
        assert!(s.is_empty());
    }

    #[test]
    fn rejects_duplicates_without_touching_queue() {
        let mut s = AlarmScheduler::new();
        s.schedule("t", "2030-01-01T10:00", false, false, now()).unwrap();
        let err = s.schedule("t", "2031-01-01T10:00", true, true, now()).unwrap_err();
        assert!(matches!(err, PlannerError::DuplicateTitle(_)));
        assert_eq!(s.len(), 1);
        assert!(s.list_pending()[0].content.ends_with("01/01/2030"));
    }

    #[test]
    fn rejects_reserved_token() {
        let mut s = AlarmScheduler::new();
        let err = s.schedule("a ^ b", "2030-01-01T10:00", false, false, now()).unwrap_err();
        assert!(matches!(err, PlannerError::ReservedToken(_)));
        s.schedule("a^b", "2030-01-01T10:00", false, false, now()).unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn past_or_garbage_times_never_queue() {
        let mut s = AlarmScheduler::new();
        for time in ["wkijdowi", "2020-01-01T10:00", "2025-06-01T09:00", ""] {
            let err = s.schedule("wrong", time, false, false, now()).unwrap_err();
            assert!(matches!(err, PlannerError::InvalidTime(_)), "{time}");
        }
        assert!(s.list_pending().is_empty());
    }

    #[test]
    fn cancel_unknown_is_not_found() {
        let mut s = AlarmScheduler::new();
        s.schedule("kept", "2030-01-01T10:00", false, false, now()).unwrap();
        assert!(matches!(s.cancel("nope"), Err(PlannerError::NotFound(_))));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn pending_listed_by_fire_time() {
        let mut s = AlarmScheduler::new();
        s.schedule("late", "2030-01-03T10:00", false, false, now()).unwrap();
        s.schedule("early", "2030-01-01T10:00", false, false, now()).unwrap();
        s.schedule("middle", "2030-01-02T10:00", false, false, now()).unwrap();
        let titles: Vec<_> = s.list_pending().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, ["early", "middle", "late"]);
    }

    #[test]
    fn drain_due_returns_due_alarms_in_order_with_fifo_ties() {
        let mut s = AlarmScheduler::new();
        s.schedule("b", "2025-06-01T09:05", false, false, now()).unwrap();
        s.schedule("a", "2025-06-01T09:05", false, false, now()).unwrap();
        s.schedule("first", "2025-06-01T09:01", false, false, now()).unwrap();
        s.schedule("later", "2025-06-01T10:00", false, false, now()).unwrap();

        assert!(s.drain_due(now()).is_empty());

        let due = s.drain_due(now() + Duration::minutes(5));
        let titles: Vec<_> = due.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["first", "b", "a"]);
        assert_eq!(s.len(), 1);
        assert!(!s.contains("b"));

        // a drained title can be scheduled again
        s.schedule("b", "2025-06-02T09:05", false, false, now()).unwrap();
        assert_eq!(s.len(), 2);
    }
}
