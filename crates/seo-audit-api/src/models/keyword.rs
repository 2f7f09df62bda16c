//! Recurring keyword-rank checks.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::utils::error::ApiError;
use crate::utils::validation::{push_error, FieldErrors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl FromStr for Frequency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(()),
        }
    }
}

/// When a schedule fires. All times are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSpec {
    pub frequency: Frequency,
    /// 0 = Sunday .. 6 = Saturday; used by weekly schedules.
    pub day_of_week: Option<u32>,
    /// 1..=28; used by monthly schedules.
    pub day_of_month: Option<u32>,
    pub time_of_day: NaiveTime,
}

impl ScheduleSpec {
    /// First firing instant strictly after `after`.
    pub fn next_run_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let today = after.date_naive();
        let at = |date: NaiveDate| date.and_time(self.time_of_day).and_utc();

        match self.frequency {
            Frequency::Daily => {
                let candidate = at(today);
                if candidate > after {
                    candidate
                } else {
                    at(today + Days::new(1))
                }
            }
            Frequency::Weekly => {
                let target = self.day_of_week.unwrap_or(0) % 7;
                (0..=7u64)
                    .map(|offset| today + Days::new(offset))
                    .filter(|date| date.weekday().num_days_from_sunday() == target)
                    .map(at)
                    .find(|candidate| *candidate > after)
                    .unwrap_or_else(|| at(today + Days::new(7)))
            }
            Frequency::Monthly => {
                let day = self.day_of_month.unwrap_or(1).clamp(1, 28);
                let this_month = NaiveDate::from_ymd_opt(today.year(), today.month(), day)
                    .unwrap_or(today);
                let candidate = at(this_month);
                if candidate > after {
                    candidate
                } else {
                    at(this_month + Months::new(1))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSchedule {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub keywords: Vec<String>,
    pub frequency: Frequency,
    pub day_of_week: Option<i16>,
    pub day_of_month: Option<i16>,
    pub time_of_day: NaiveTime,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl KeywordSchedule {
    pub fn spec(&self) -> ScheduleSpec {
        ScheduleSpec {
            frequency: self.frequency,
            day_of_week: self.day_of_week.map(|d| d as u32),
            day_of_month: self.day_of_month.map(|d| d as u32),
            time_of_day: self.time_of_day,
        }
    }
}

/// Insert payload for a schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct NewKeywordSchedule {
    pub domain_id: Uuid,
    pub keywords: Vec<String>,
    pub spec: ScheduleSpec,
    pub next_run_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordRanking {
    pub keyword: String,
    pub position: Option<i32>,
    pub url: Option<String>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduleRequest {
    pub domain_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "must contain between 1 and 100 keywords"))]
    pub keywords: Vec<String>,

    pub frequency: Frequency,

    #[validate(range(min = 0, max = 6, message = "must be between 0 (Sunday) and 6 (Saturday)"))]
    pub day_of_week: Option<u32>,

    #[validate(range(min = 1, max = 28, message = "must be between 1 and 28"))]
    pub day_of_month: Option<u32>,

    #[validate(custom(function = "validate_time_of_day"))]
    pub time_of_day: String,
}

impl CreateScheduleRequest {
    /// Cross-field checks that `validator` attributes cannot express.
    pub fn to_spec(&self) -> Result<ScheduleSpec, ApiError> {
        let mut errors = FieldErrors::new();

        match self.frequency {
            Frequency::Weekly if self.day_of_week.is_none() => {
                push_error(&mut errors, "dayOfWeek", "is required for weekly schedules");
            }
            Frequency::Monthly if self.day_of_month.is_none() => {
                push_error(&mut errors, "dayOfMonth", "is required for monthly schedules");
            }
            _ => {}
        }

        let time_of_day = parse_time_of_day(&self.time_of_day);
        if time_of_day.is_none() {
            push_error(&mut errors, "timeOfDay", "must be HH:MM");
        }

        match time_of_day {
            Some(time_of_day) if errors.is_empty() => Ok(ScheduleSpec {
                frequency: self.frequency,
                day_of_week: self.day_of_week,
                day_of_month: self.day_of_month,
                time_of_day,
            }),
            _ => Err(ApiError::Validation(errors)),
        }
    }

    /// Trimmed, de-duplicated keywords.
    pub fn keywords(&self) -> Vec<String> {
        normalize_keywords(&self.keywords)
    }
}

pub fn normalize_keywords(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for keyword in raw {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !out.contains(&keyword) {
            out.push(keyword);
        }
    }
    out
}

fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

fn validate_time_of_day(raw: &str) -> Result<(), ValidationError> {
    match parse_time_of_day(raw) {
        Some(_) => Ok(()),
        None => {
            let mut err = ValidationError::new("time_of_day");
            err.message = Some("must be HH:MM".into());
            Err(err)
        }
    }
}
