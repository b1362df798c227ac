//! Plan tiers and daily prompt accounting.
//!
//! Days are calendar days in the server's local time zone. A stored count
//! only applies while its `last_prompt_date` falls on the current day.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Plus,
    Pro,
}

impl Plan {
    /// `None` means unlimited
    pub fn daily_limit(&self, limits: &PlanLimits) -> Option<u32> {
        match self {
            Self::Free => Some(limits.free),
            Self::Plus => Some(limits.plus),
            Self::Pro => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Plus => "plus",
            Self::Pro => "pro",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "plus" => Ok(Self::Plus),
            "pro" => Ok(Self::Pro),
            other => Err(format!("unknown plan: {}", other)),
        }
    }
}

/// Daily prompt limits for the bounded tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub free: u32,
    pub plus: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self { free: 10, plus: 50 }
    }
}

pub fn can_make_prompt(plan: Plan, prompts_used_today: u32, limits: &PlanLimits) -> bool {
    match plan.daily_limit(limits) {
        Some(limit) => prompts_used_today < limit,
        None => true,
    }
}

pub fn local_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

/// Local midnight of the day containing `now`, as UTC
pub fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    local_day(now)
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUsage {
    #[serde(default)]
    pub plan: Plan,
    #[serde(default)]
    pub prompts_used_today: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_prompt_date: Option<DateTime<Utc>>,
}

impl UserUsage {
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            ..Default::default()
        }
    }

    /// Count that applies on `today`; zero once the stored day has passed
    pub fn effective_count(&self, today: NaiveDate) -> u32 {
        match self.last_prompt_date {
            Some(last) if local_day(last) >= today => self.prompts_used_today,
            _ => 0,
        }
    }

    pub fn can_make_prompt(&self, today: NaiveDate, limits: &PlanLimits) -> bool {
        can_make_prompt(self.plan, self.effective_count(today), limits)
    }

    /// `None` for unlimited plans
    pub fn remaining(&self, today: NaiveDate, limits: &PlanLimits) -> Option<u32> {
        self.plan
            .daily_limit(limits)
            .map(|limit| limit.saturating_sub(self.effective_count(today)))
    }

    /// Reset-aware increment by exactly one
    pub fn record_prompt(&mut self, now: DateTime<Utc>) {
        self.prompts_used_today = self.effective_count(local_day(now)) + 1;
        self.last_prompt_date = Some(now);
    }
}
