use chrono::NaiveDate;
use taskflow_types::{Plan, PlanLimits, UserUsage};

/// Where a user stands against their plan today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub plan: Plan,
    pub prompts_used_today: u32,
    /// `None` for unlimited plans
    pub daily_limit: Option<u32>,
    pub remaining: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDenied {
    pub plan: Plan,
    pub daily_limit: u32,
    pub remaining: u32,
}

/// Admission check against the plan limits.
///
/// Never increments; counting happens once the relay has finished.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotaGate {
    limits: PlanLimits,
}

impl QuotaGate {
    pub fn new(limits: PlanLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &PlanLimits {
        &self.limits
    }

    pub fn status(&self, usage: &UserUsage, today: NaiveDate) -> QuotaStatus {
        QuotaStatus {
            plan: usage.plan,
            prompts_used_today: usage.effective_count(today),
            daily_limit: usage.plan.daily_limit(&self.limits),
            remaining: usage.remaining(today, &self.limits),
        }
    }

    pub fn check(&self, usage: &UserUsage, today: NaiveDate) -> Result<QuotaStatus, QuotaDenied> {
        let status = self.status(usage, today);

        match status.daily_limit {
            Some(limit) if !usage.can_make_prompt(today, &self.limits) => Err(QuotaDenied {
                plan: status.plan,
                daily_limit: limit,
                remaining: 0,
            }),
            _ => Ok(status),
        }
    }
}
