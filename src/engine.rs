//! The business hours engine
//!
//! Single source of truth for "is window W open at instant T" and for
//! driving agent availability to match. The engine is composed from the two
//! repository ports at construction time, holds no state of its own, and
//! caches nothing across invocations, so overlapping passes each work from
//! their own reads.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Utc, Weekday};
use tracing::{debug, info};

use crate::error::{HoursError, Result};
use crate::model::{AgentId, BusinessHour, BusinessHourId, ScheduledHour};
use crate::repo::{AgentRepository, BusinessHourRepository};
use crate::week::{weekday_name, TimeOfDay, UtcOffset, WeekTime};

/// The engine's operation set. The daemon and the external scheduler talk to
/// this trait; `WeeklyBusinessHours` is the standard implementation.
#[async_trait]
pub trait BusinessHours: Send + Sync {
    /// Validate and persist a definition (create or update by id).
    async fn save_business_hour(&self, record: BusinessHour) -> Result<()>;

    async fn get_business_hour(&self, id: &BusinessHourId) -> Result<BusinessHour>;

    /// Whether the agent may change its own service status right now:
    /// unconstrained, or inside at least one assigned window.
    async fn allow_agent_change_service_status(&self, agent_id: &AgentId) -> Result<bool>;

    /// The distinct boundary tuples the external scheduler must register
    /// triggers for. Deterministic and duplicate-free.
    async fn find_hours_to_create_jobs(&self) -> Result<Vec<ScheduledHour>>;

    /// Scheduler trigger: open windows declaring `time` as a start on `day`
    /// at `offset` and propagate to agent status. Idempotent.
    async fn open_business_hours_by_day_hour_and_utc(
        &self,
        day: Weekday,
        time: TimeOfDay,
        offset: UtcOffset,
    ) -> Result<()>;

    /// Scheduler trigger: close windows declaring `time` as a finish on
    /// `day` at `offset` and propagate to agent status. Idempotent.
    async fn close_business_hours_by_day_and_hour(
        &self,
        day: Weekday,
        time: TimeOfDay,
        offset: UtcOffset,
    ) -> Result<()>;

    /// Clear open-state associations from all agents, then recompute their
    /// statuses. Zero affected agents is a no-op.
    async fn remove_business_hours_from_users(&self) -> Result<()>;

    /// Delete the business hour and detach it from every referencing agent.
    async fn remove_business_hour_by_id(&self, id: &BusinessHourId) -> Result<()>;

    /// Recompute which business hours must be open right now and reconcile
    /// agent status accordingly. Safe at arbitrary cadence.
    async fn open_business_hours_if_needed(&self) -> Result<()>;
}

/// Standard engine: weekly windows, any number of business hours per agent.
pub struct WeeklyBusinessHours {
    hours: Arc<dyn BusinessHourRepository>,
    agents: Arc<dyn AgentRepository>,
}

impl WeeklyBusinessHours {
    pub fn new(hours: Arc<dyn BusinessHourRepository>, agents: Arc<dyn AgentRepository>) -> Self {
        Self { hours, agents }
    }

    /// Reconciliation with the instant injected, so tests control the clock.
    /// `open_business_hours_if_needed` is this at `Utc::now()`.
    ///
    /// The must-be-open set is computed entirely from this invocation's
    /// reads before any agent is touched; a repository failure during the
    /// writes leaves agent state exactly as the clearing pass left it, never
    /// half-opened.
    pub async fn open_business_hours_if_needed_at(&self, now: WeekTime) -> Result<()> {
        self.remove_business_hours_from_users().await?;
        let must_open = self.hours_that_must_be_open(now).await?;
        debug!(
            day = weekday_name(now.day()),
            open = must_open.len(),
            "computed must-be-open set"
        );
        self.agents.open_agents_business_hours(&must_open).await?;
        self.agents
            .update_livechat_status_based_on_business_hours()
            .await?;
        Ok(())
    }

    async fn hours_that_must_be_open(&self, now: WeekTime) -> Result<Vec<BusinessHourId>> {
        let candidates = self.hours.find_active_by_day(now.day()).await?;
        Ok(candidates
            .into_iter()
            .filter(|bh| bh.is_open_at(now))
            .map(|bh| bh.id)
            .collect())
    }
}

#[async_trait]
impl BusinessHours for WeeklyBusinessHours {
    async fn save_business_hour(&self, record: BusinessHour) -> Result<()> {
        record.validate()?;
        self.hours.save(record).await
    }

    async fn get_business_hour(&self, id: &BusinessHourId) -> Result<BusinessHour> {
        self.hours
            .find_by_id(id)
            .await?
            .ok_or_else(|| HoursError::NotFound {
                id: id.to_string(),
            })
    }

    async fn allow_agent_change_service_status(&self, agent_id: &AgentId) -> Result<bool> {
        self.agents.is_agent_within_business_hours(agent_id).await
    }

    async fn find_hours_to_create_jobs(&self) -> Result<Vec<ScheduledHour>> {
        self.hours.find_hours_to_schedule_jobs().await
    }

    async fn open_business_hours_by_day_hour_and_utc(
        &self,
        day: Weekday,
        time: TimeOfDay,
        offset: UtcOffset,
    ) -> Result<()> {
        let opened = self
            .hours
            .open_by_day_time_and_offset(day, time, offset)
            .await?;
        if !opened.is_empty() {
            self.agents.open_agents_business_hours(&opened).await?;
        }
        self.agents
            .update_livechat_status_based_on_business_hours()
            .await?;
        info!(
            day = weekday_name(day),
            time = %time,
            offset = %offset,
            opened = opened.len(),
            "open trigger applied"
        );
        Ok(())
    }

    async fn close_business_hours_by_day_and_hour(
        &self,
        day: Weekday,
        time: TimeOfDay,
        offset: UtcOffset,
    ) -> Result<()> {
        let closed = self
            .hours
            .close_by_day_time_and_offset(day, time, offset)
            .await?;
        if !closed.is_empty() {
            self.agents.close_agents_business_hours(&closed).await?;
        }
        self.agents
            .update_livechat_status_based_on_business_hours()
            .await?;
        info!(
            day = weekday_name(day),
            time = %time,
            offset = %offset,
            closed = closed.len(),
            "close trigger applied"
        );
        Ok(())
    }

    async fn remove_business_hours_from_users(&self) -> Result<()> {
        self.agents.remove_business_hours_from_users().await?;
        self.agents
            .update_livechat_status_based_on_business_hours()
            .await
    }

    async fn remove_business_hour_by_id(&self, id: &BusinessHourId) -> Result<()> {
        if !self.hours.remove_by_id(id).await? {
            return Err(HoursError::NotFound {
                id: id.to_string(),
            });
        }
        let detached = self.agents.remove_business_hour_from_agents(id).await?;
        self.agents
            .update_livechat_status_based_on_business_hours()
            .await?;
        info!(id = id.as_str(), detached, "removed business hour");
        Ok(())
    }

    async fn open_business_hours_if_needed(&self) -> Result<()> {
        self.open_business_hours_if_needed_at(WeekTime::from_utc(Utc::now()))
            .await
    }
}
