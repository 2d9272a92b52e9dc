//! Periodic sweep configuration.

use serde::{Deserialize, Serialize};

/// Wall-clock cadence and sweep window configuration.
///
/// Hours and days are interpreted in the fixed local offset given by
/// `utc_offset_minutes` (330 = UTC+05:30).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the periodic sweeps are registered.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Local time offset from UTC in minutes.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_minutes: i32,
    /// Local hour of the daily reminder sweep.
    #[serde(default = "default_daily_hour")]
    pub daily_reminder_hour: u32,
    /// Local minute of the daily reminder sweep.
    #[serde(default)]
    pub daily_reminder_minute: u32,
    /// Day of month of the monthly report sweep.
    #[serde(default = "default_monthly_day")]
    pub monthly_report_day: u32,
    /// Local hour of the monthly report sweep.
    #[serde(default = "default_monthly_hour")]
    pub monthly_report_hour: u32,
    /// Local minute of the monthly report sweep.
    #[serde(default)]
    pub monthly_report_minute: u32,
    /// Users without a booking for this many days receive a reminder.
    #[serde(default = "default_inactivity_days")]
    pub inactivity_days: i64,
    /// Look-back window of the monthly report in days.
    #[serde(default = "default_report_window_days")]
    pub report_window_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            utc_offset_minutes: default_utc_offset(),
            daily_reminder_hour: default_daily_hour(),
            daily_reminder_minute: 0,
            monthly_report_day: default_monthly_day(),
            monthly_report_hour: default_monthly_hour(),
            monthly_report_minute: 0,
            inactivity_days: default_inactivity_days(),
            report_window_days: default_report_window_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_utc_offset() -> i32 {
    330
}

fn default_daily_hour() -> u32 {
    19
}

fn default_monthly_day() -> u32 {
    1
}

fn default_monthly_hour() -> u32 {
    1
}

fn default_inactivity_days() -> i64 {
    7
}

fn default_report_window_days() -> i64 {
    30
}
