//! Repository ports for business hour and agent records
//!
//! The engine owns no storage and no timers; it is composed from these two
//! traits. Production backends live outside this crate; `crate::store` has
//! the in-memory implementations used by the daemon and the test suite.

use async_trait::async_trait;
use chrono::Weekday;

use crate::error::Result;
use crate::model::{Agent, AgentId, BusinessHour, BusinessHourId, ScheduledHour};
use crate::week::{TimeOfDay, UtcOffset};

#[async_trait]
pub trait BusinessHourRepository: Send + Sync {
    /// Create or update by id.
    async fn save(&self, record: BusinessHour) -> Result<()>;

    async fn find_by_id(&self, id: &BusinessHourId) -> Result<Option<BusinessHour>>;

    /// Returns true if a record was removed.
    async fn remove_by_id(&self, id: &BusinessHourId) -> Result<bool>;

    /// Distinct, sorted open/close boundary tuples across all configured
    /// windows. The external scheduler registers one trigger per tuple.
    async fn find_hours_to_schedule_jobs(&self) -> Result<Vec<ScheduledHour>>;

    /// Active records with a work-hour entry for `day`. Backends may project
    /// down to `work_hours` and `timezone`; that is an optimization, not a
    /// correctness requirement.
    async fn find_active_by_day(&self, day: Weekday) -> Result<Vec<BusinessHour>>;

    /// Mark open every active record declaring `time` as a start on `day`
    /// at `offset`; returns the matched ids, sorted. Idempotent.
    async fn open_by_day_time_and_offset(
        &self,
        day: Weekday,
        time: TimeOfDay,
        offset: UtcOffset,
    ) -> Result<Vec<BusinessHourId>>;

    /// Mark closed every active record declaring `time` as a finish on `day`
    /// at `offset`; returns the matched ids, sorted. Idempotent.
    async fn close_by_day_time_and_offset(
        &self,
        day: Weekday,
        time: TimeOfDay,
        offset: UtcOffset,
    ) -> Result<Vec<BusinessHourId>>;
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// True iff the agent has no business-hour constraint or at least one of
    /// its assigned hours is currently open. Unknown agents are simply not
    /// within business hours.
    async fn is_agent_within_business_hours(&self, agent_id: &AgentId) -> Result<bool>;

    /// Add each id to the open-set of every agent assigned to it. Must apply
    /// the whole set atomically: either every agent reflects the update or
    /// none does.
    async fn open_agents_business_hours(&self, ids: &[BusinessHourId]) -> Result<()>;

    /// Remove each id from every agent's open-set. Same atomicity contract.
    async fn close_agents_business_hours(&self, ids: &[BusinessHourId]) -> Result<()>;

    /// Clear every agent's open-set. Affecting zero agents is a no-op, not
    /// an error.
    async fn remove_business_hours_from_users(&self) -> Result<()>;

    /// Detach the id from the membership and open-set of every referencing
    /// agent; returns how many agents were touched.
    async fn remove_business_hour_from_agents(&self, id: &BusinessHourId) -> Result<usize>;

    /// Recompute every agent's livechat status from its membership and
    /// open-set.
    async fn update_livechat_status_based_on_business_hours(&self) -> Result<()>;

    async fn find_agent(&self, agent_id: &AgentId) -> Result<Option<Agent>>;
}
