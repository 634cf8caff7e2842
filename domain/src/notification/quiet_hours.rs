use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use entity_api::notification_preferences;
use log::*;

/// A user's channel preferences, with defaults for users that never saved any.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPreferences {
    pub channel_email: bool,
    pub channel_in_app: bool,
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
    pub quiet_hours_timezone: String,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            channel_email: true,
            channel_in_app: true,
            quiet_hours_start: None,
            quiet_hours_end: None,
            quiet_hours_timezone: "UTC".to_string(),
        }
    }
}

impl From<notification_preferences::Model> for NotificationPreferences {
    fn from(model: notification_preferences::Model) -> Self {
        Self {
            channel_email: model.channel_email,
            channel_in_app: model.channel_in_app,
            quiet_hours_start: model.quiet_hours_start,
            quiet_hours_end: model.quiet_hours_end,
            quiet_hours_timezone: model.quiet_hours_timezone,
        }
    }
}

impl NotificationPreferences {
    /// Whether `now` falls inside the quiet-hours window in the user's time zone.
    ///
    /// Windows may wrap midnight (22:00 to 08:00). A window whose start equals
    /// its end is empty. Unparseable times or zones are treated as "not quiet".
    pub fn is_quiet_at(&self, now: DateTime<Utc>) -> bool {
        let (Some(start), Some(end)) = (&self.quiet_hours_start, &self.quiet_hours_end) else {
            return false;
        };

        let (Some(start), Some(end)) = (minute_of_day(start), minute_of_day(end)) else {
            warn!("Ignoring unparseable quiet hours {start:?}..{end:?}");
            return false;
        };

        let tz: Tz = match self.quiet_hours_timezone.parse() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(
                    "Ignoring quiet hours with unknown time zone {:?}",
                    self.quiet_hours_timezone
                );
                return false;
            }
        };

        let local = now.with_timezone(&tz);
        let current = local.hour() * 60 + local.minute();

        if start > end {
            current >= start || current < end
        } else {
            start <= current && current < end
        }
    }
}

fn minute_of_day(value: &str) -> Option<u32> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
        .map(|time| time.hour() * 60 + time.minute())
}
