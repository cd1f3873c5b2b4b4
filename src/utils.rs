use crate::error::PlannerError;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};
use tracing::error;

/// Format of alarm times, both in requests and in the journal.
pub const ALARM_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Offset added to a fire time when it is shown to the user.
pub const DISPLAY_OFFSET_SECS: i64 = 60;

/// Parses a duration such as `"1h 30m"` or `"45s"` into seconds.
pub fn get_seconds(time_str: &str) -> Result<u64, PlannerError> {
    let mut total = 0;

    for part in time_str.split_whitespace() {
        let Some((idx, unit)) = part.char_indices().last() else {
            continue;
        };
        let value_str = &part[..idx];

        let value: u64 = value_str.parse().map_err(|e| {
            error!("error while parsing duration {time_str:?}: {e}");
            PlannerError::Config(format!("invalid duration {time_str:?}"))
        })?;

        match unit {
            'h' => total += value * 3600,
            'm' => total += value * 60,
            's' => total += value,
            _ => {
                error!("error while parsing duration: invalid time unit, possible value: h, m, s");
                return Err(PlannerError::Config(format!(
                    "invalid duration unit in {time_str:?}"
                )));
            }
        }
    }

    Ok(total)
}

/// Parses a local `YYYY-MM-DDTHH:MM` alarm time.
pub fn parse_alarm_time(alarm_time: &str) -> Result<DateTime<Local>, PlannerError> {
    let naive = NaiveDateTime::parse_from_str(alarm_time.trim(), ALARM_TIME_FORMAT)
        .map_err(|_| PlannerError::InvalidTime(alarm_time.to_string()))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| PlannerError::InvalidTime(alarm_time.to_string()))
}

pub fn format_alarm_time(fire_time: &DateTime<Local>) -> String {
    fire_time.format(ALARM_TIME_FORMAT).to_string()
}

/// Human readable line shown next to a pending alarm.
pub fn describe_fire_time(fire_time: &DateTime<Local>) -> String {
    let shown = *fire_time + Duration::seconds(DISPLAY_OFFSET_SECS);
    shown.format("Set to go off at %H:%M on %d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_from_mixed_units() {
        assert_eq!(get_seconds("1h 30m 15s").unwrap(), 5415);
        assert_eq!(get_seconds("45s").unwrap(), 45);
        assert_eq!(get_seconds("").unwrap(), 0);
    }

    #[test]
    fn seconds_reject_unknown_unit_and_garbage() {
        assert!(get_seconds("3d").is_err());
        assert!(get_seconds("xm").is_err());
        assert!(get_seconds("5").is_err());
    }

    #[test]
    fn alarm_time_parses_and_formats_back() {
        let t = parse_alarm_time("2030-01-01T10:00").unwrap();
        assert_eq!(format_alarm_time(&t), "2030-01-01T10:00");
    }

    #[test]
    fn alarm_time_rejects_garbage() {
        assert!(matches!(
            parse_alarm_time("wkijdowi"),
            Err(PlannerError::InvalidTime(_))
        ));
        assert!(parse_alarm_time("2030-13-01T10:00").is_err());
    }

    #[test]
    fn description_adds_one_minute() {
        let t = parse_alarm_time("2030-01-01T10:00").unwrap();
        assert_eq!(describe_fire_time(&t), "Set to go off at 10:01 on 01/01/2030");

        let t = parse_alarm_time("2030-12-31T23:59").unwrap();
        assert_eq!(describe_fire_time(&t), "Set to go off at 00:00 on 01/01/2031");
    }
}
