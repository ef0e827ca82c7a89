use std::env;

use chrono::{NaiveTime, Weekday};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub schedule: ScheduleSettings,
}

/// Organization-level scheduling defaults. Weekdays share one window,
/// Saturday has its own shorter window, Sunday is closed.
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub weekday_start: NaiveTime,
    pub weekday_end: NaiveTime,
    pub saturday_start: NaiveTime,
    pub saturday_end: NaiveTime,
    pub slot_minutes: i32,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            weekday_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            weekday_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            saturday_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            saturday_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            slot_minutes: 30,
            break_start: NaiveTime::from_hms_opt(12, 0, 0),
            break_end: NaiveTime::from_hms_opt(13, 30, 0),
        }
    }
}

impl ScheduleSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            weekday_start: parse_time_var("SCHEDULE_WEEKDAY_START", defaults.weekday_start),
            weekday_end: parse_time_var("SCHEDULE_WEEKDAY_END", defaults.weekday_end),
            saturday_start: parse_time_var("SCHEDULE_SATURDAY_START", defaults.saturday_start),
            saturday_end: parse_time_var("SCHEDULE_SATURDAY_END", defaults.saturday_end),
            slot_minutes: env::var("SCHEDULE_SLOT_MINUTES")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .filter(|minutes| *minutes > 0)
                .unwrap_or(defaults.slot_minutes),
            break_start: parse_optional_time_var("SCHEDULE_BREAK_START", defaults.break_start),
            break_end: parse_optional_time_var("SCHEDULE_BREAK_END", defaults.break_end),
        }
    }

    /// Opening and closing times for a day of the week, or None when closed.
    pub fn day_bounds(&self, weekday: Weekday) -> Option<(NaiveTime, NaiveTime)> {
        match weekday {
            Weekday::Sun => None,
            Weekday::Sat => Some((self.saturday_start, self.saturday_end)),
            _ => Some((self.weekday_start, self.weekday_end)),
        }
    }

    /// Configured non-working window inside the day (lunch break), if any.
    pub fn break_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        match (self.break_start, self.break_end) {
            (Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            schedule: ScheduleSettings::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_time_var(name: &str, default: NaiveTime) -> NaiveTime {
    match env::var(name) {
        Ok(raw) => NaiveTime::parse_from_str(&raw, "%H:%M").unwrap_or_else(|_| {
            warn!("{} is not a valid HH:MM time, using default", name);
            default
        }),
        Err(_) => default,
    }
}

fn parse_optional_time_var(name: &str, default: Option<NaiveTime>) -> Option<NaiveTime> {
    match env::var(name) {
        Ok(raw) if raw.is_empty() || raw.eq_ignore_ascii_case("none") => None,
        Ok(raw) => match NaiveTime::parse_from_str(&raw, "%H:%M") {
            Ok(time) => Some(time),
            Err(_) => {
                warn!("{} is not a valid HH:MM time, using default", name);
                default
            }
        },
        Err(_) => default,
    }
}
