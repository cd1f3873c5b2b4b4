//! Append-only event journal.
//!
//! Every state mutation is written as one line:
//!
//! ```text
//! alarm_add ^ <title> ^ <YYYY-MM-DDTHH:MM> ^ <weather> ^ <news>
//! alarm_del ^ <title>
//! notif_add ^ <title> ^ <content>
//! notif_del ^ <title>
//! ```
//!
//! Field text is escaped (`\\`, `\^`, `\n`, `\r`) so an unescaped ` ^ ` only
//! ever appears as the delimiter. On startup the journal is replayed from the
//! first line to rebuild the scheduler and the notification store.

use crate::{
    entry::Alarm,
    error::{PlannerError, Result},
    notifications::NotificationStore,
    scheduler::AlarmScheduler,
    utils,
};
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const DELIMITER: &str = " ^ ";

const ALARM_ADD: &str = "alarm_add";
const ALARM_DEL: &str = "alarm_del";
const NOTIF_ADD: &str = "notif_add";
const NOTIF_DEL: &str = "notif_del";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    AlarmAdd {
        title: String,
        fire_time: DateTime<Local>,
        weather: bool,
        news: bool,
    },
    AlarmDel {
        title: String,
    },
    NotifAdd {
        title: String,
        content: String,
    },
    NotifDel {
        title: String,
    },
}

impl Record {
    pub fn alarm_add(alarm: &Alarm) -> Self {
        Self::AlarmAdd {
            title: alarm.title.clone(),
            fire_time: alarm.fire_time,
            weather: alarm.weather,
            news: alarm.news,
        }
    }

    /// Serializes the record as a single line, without the trailing newline.
    pub fn encode(&self) -> String {
        let fields: Vec<String> = match self {
            Record::AlarmAdd {
                title,
                fire_time,
                weather,
                news,
            } => vec![
                ALARM_ADD.to_string(),
                escape(title),
                utils::format_alarm_time(fire_time),
                weather.to_string(),
                news.to_string(),
            ],
            Record::AlarmDel { title } => vec![ALARM_DEL.to_string(), escape(title)],
            Record::NotifAdd { title, content } => {
                vec![NOTIF_ADD.to_string(), escape(title), escape(content)]
            }
            Record::NotifDel { title } => vec![NOTIF_DEL.to_string(), escape(title)],
        };
        fields.join(DELIMITER)
    }

    /// Parses one journal line. `line_no` is only used for error reporting.
    pub fn decode(line: &str, line_no: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split(DELIMITER).collect();
        let expect = |n: usize| -> Result<()> {
            if fields.len() == n {
                Ok(())
            } else {
                Err(PlannerError::malformed(
                    line_no,
                    format!("{} expects {n} fields, found {}", fields[0], fields.len()),
                ))
            }
        };

        let record = match fields[0] {
            ALARM_ADD => {
                expect(5)?;
                let fire_time = utils::parse_alarm_time(fields[2]).map_err(|_| {
                    PlannerError::malformed(line_no, format!("bad alarm time {:?}", fields[2]))
                })?;
                Record::AlarmAdd {
                    title: unescape(fields[1], line_no)?,
                    fire_time,
                    weather: parse_flag(fields[3], line_no)?,
                    news: parse_flag(fields[4], line_no)?,
                }
            }
            ALARM_DEL => {
                expect(2)?;
                Record::AlarmDel {
                    title: unescape(fields[1], line_no)?,
                }
            }
            NOTIF_ADD => {
                expect(3)?;
                Record::NotifAdd {
                    title: unescape(fields[1], line_no)?,
                    content: unescape(fields[2], line_no)?,
                }
            }
            NOTIF_DEL => {
                expect(2)?;
                Record::NotifDel {
                    title: unescape(fields[1], line_no)?,
                }
            }
            other => {
                return Err(PlannerError::malformed(
                    line_no,
                    format!("unknown record kind {other:?}"),
                ));
            }
        };
        Ok(record)
    }
}

fn parse_flag(raw: &str, line_no: usize) -> Result<bool> {
    match raw {
        "true" => Ok(true),
        "false" | "" => Ok(false),
        other => Err(PlannerError::malformed(line_no, format!("bad flag {other:?}"))),
    }
}

fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '^' => out.push_str("\\^"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(field: &str, line_no: usize) -> Result<String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('^') => out.push('^'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            other => {
                let seq = other.map(String::from).unwrap_or_default();
                return Err(PlannerError::malformed(
                    line_no,
                    format!("bad escape sequence \\{seq}"),
                ));
            }
        }
    }
    Ok(out)
}

/// Destination of journal records.
pub trait JournalSink: Send {
    fn append(&mut self, record: &Record) -> Result<()>;
}

/// Journal stored in a plain text file, one record per line.
pub struct FileJournal {
    file: File,
}

impl FileJournal {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { file })
    }
}

impl JournalSink for FileJournal {
    fn append(&mut self, record: &Record) -> Result<()> {
        let mut line = record.encode();
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

/// Reads every line of a journal file. A missing file is an empty journal.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        debug!("no journal at {}, starting empty", path.display());
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}

/// In-memory journal whose lines stay readable through any clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl JournalSink for MemoryJournal {
    fn append(&mut self, record: &Record) -> Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.encode());
        Ok(())
    }
}

/// State rebuilt from a journal.
#[derive(Debug, Default)]
pub struct Recovered {
    pub scheduler: AlarmScheduler,
    pub notifications: NotificationStore,
}

/// Rebuilds scheduler and store state from journal lines.
///
/// Records are applied in file order. Nothing is re-validated against the
/// scheduling rules and no side effects run. Deleting a title that is not
/// present is fatal.
pub fn replay<I, S>(lines: I) -> Result<Recovered>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut state = Recovered::default();

    for (idx, line) in lines.into_iter().enumerate() {
        let line_no = idx + 1;
        let line = line.as_ref();
        if line.trim().is_empty() {
            continue;
        }

        match Record::decode(line, line_no)? {
            Record::AlarmAdd {
                title,
                fire_time,
                weather,
                news,
            } => {
                let alarm = Alarm {
                    title,
                    fire_time,
                    weather,
                    news,
                };
                state.scheduler.insert(alarm).map_err(|e| {
                    PlannerError::malformed(line_no, format!("cannot restore alarm: {e}"))
                })?;
            }
            Record::AlarmDel { title } => {
                state.scheduler.cancel(&title).map_err(|_| {
                    PlannerError::malformed(
                        line_no,
                        format!("alarm_del for unknown alarm {title:?}"),
                    )
                })?;
            }
            Record::NotifAdd { title, content } => {
                state.notifications.add(title, content);
            }
            Record::NotifDel { title } => {
                state.notifications.remove(&title).map_err(|_| {
                    PlannerError::malformed(
                        line_no,
                        format!("notif_del for unknown notification {title:?}"),
                    )
                })?;
            }
        }
    }

    debug!(
        "replayed journal: {} pending alarms, {} active notifications",
        state.scheduler.len(),
        state.notifications.active_len()
    );
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Notification;

    fn time(s: &str) -> DateTime<Local> {
        utils::parse_alarm_time(s).unwrap()
    }

    #[test]
    fn encodes_the_documented_layout() {
        let add = Record::AlarmAdd {
            title: "test".into(),
            fire_time: time("2030-01-01T10:00"),
            weather: true,
            news: false,
        };
        assert_eq!(add.encode(), "alarm_add ^ test ^ 2030-01-01T10:00 ^ true ^ false");
        assert_eq!(
            Record::NotifDel { title: "Nice".into() }.encode(),
            "notif_del ^ Nice"
        );
    }

    #[test]
    fn content_with_delimiter_survives() {
        let record = Record::NotifAdd {
            title: "a^b".into(),
            content: "x ^ y\\z\nnext line ^".into(),
        };
        let line = record.encode();
        assert!(!line.contains('\n'));
        assert_eq!(line.matches(DELIMITER).count(), 2);
        assert_eq!(Record::decode(&line, 1).unwrap(), record);
    }

    #[test]
    fn accepts_empty_flags() {
        let record = Record::decode("alarm_add ^ t ^ 2030-01-01T10:00 ^  ^ true", 1).unwrap();
        assert!(matches!(record, Record::AlarmAdd { weather: false, news: true, .. }));
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in [
            "alarm_added ^ t",
            "alarm_del",
            "notif_add ^ only title",
            "alarm_add ^ t ^ not a time ^ true ^ true",
            "alarm_add ^ t ^ 2030-01-01T10:00 ^ yes ^ true",
            "notif_del ^ bad \\q escape",
        ] {
            assert!(
                matches!(Record::decode(line, 7), Err(PlannerError::MalformedLog { line: 7, .. })),
                "{line}"
            );
        }
    }

    #[test]
    fn replay_rebuilds_alarms_and_notifications() {
        let lines = [
            "alarm_add ^ wake ^ 2030-01-01T07:00 ^ true ^ true",
            "alarm_add ^ lunch ^ 2030-01-01T12:00 ^ false ^ false",
            "notif_add ^ Nice ^ Very Nice",
            "",
            "notif_add ^ Hello ^ World",
            "alarm_del ^ wake",
            "notif_del ^ Nice",
        ];
        let state = replay(lines).unwrap();

        let pending = state.scheduler.list_pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "lunch");
        assert_eq!(
            state.notifications.list_active(),
            vec![Notification::new("Hello", "World")]
        );
        assert!(state.notifications.seen("Nice", "Very Nice"));
    }

    #[test]
    fn replay_restores_past_alarms_without_validation() {
        let state = replay(["alarm_add ^ old ^ 2001-01-01T10:00 ^ false ^ false"]).unwrap();
        assert_eq!(state.scheduler.len(), 1);
    }

    #[test]
    fn replay_rejects_deletes_of_unknown_titles() {
        let err = replay(["notif_add ^ a ^ b", "notif_del ^ c"]).unwrap_err();
        assert!(matches!(err, PlannerError::MalformedLog { line: 2, .. }));

        let err = replay(["alarm_del ^ ghost"]).unwrap_err();
        assert!(matches!(err, PlannerError::MalformedLog { line: 1, .. }));
    }

    #[test]
    fn replay_rejects_duplicate_pending_alarm() {
        let err = replay([
            "alarm_add ^ t ^ 2030-01-01T07:00 ^ true ^ true",
            "alarm_add ^ t ^ 2030-01-02T07:00 ^ true ^ true",
        ])
        .unwrap_err();
        assert!(matches!(err, PlannerError::MalformedLog { line: 2, .. }));
    }

    #[test]
    fn replay_is_deterministic() {
        let lines = vec![
            "alarm_add ^ b ^ 2030-01-01T08:00 ^ true ^ false".to_string(),
            "alarm_add ^ a ^ 2030-01-01T08:00 ^ false ^ true".to_string(),
            "notif_add ^ one ^ 1".to_string(),
            "notif_add ^ two ^ 2".to_string(),
            "notif_del ^ one".to_string(),
            "notif_add ^ one ^ 1".to_string(),
        ];
        let first = replay(&lines).unwrap();
        let second = replay(&lines).unwrap();
        assert_eq!(first.scheduler.list_pending(), second.scheduler.list_pending());
        assert_eq!(
            first.notifications.list_active(),
            second.notifications.list_active()
        );
        assert_eq!(
            first.notifications.list_active(),
            vec![Notification::new("two", "2")]
        );
    }

    #[test]
    fn file_journal_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("journal.log");
        {
            let mut journal = FileJournal::open(&path).unwrap();
            journal.append(&Record::NotifAdd { title: "a".into(), content: "b".into() }).unwrap();
        }
        let mut journal = FileJournal::open(&path).unwrap();
        journal.append(&Record::NotifDel { title: "a".into() }).unwrap();

        assert_eq!(read_lines(&path).unwrap(), vec!["notif_add ^ a ^ b", "notif_del ^ a"]);
        assert!(read_lines(&dir.path().join("missing.log")).unwrap().is_empty());
    }
}
