//! In-memory repositories
//!
//! The production system keeps these records in an external database; these
//! stores back the daemon and the test suite. Lock discipline: a guard is
//! never held across an await (every method locks, mutates, and returns),
//! so each repository operation is atomic and overlapping engine passes
//! cannot observe a half-applied update.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Weekday;

use crate::error::{HoursError, Result};
use crate::model::{
    schedule_hours, Agent, AgentId, BusinessHour, BusinessHourId, LivechatStatus, ScheduledHour,
};
use crate::repo::{AgentRepository, BusinessHourRepository};
use crate::week::{TimeOfDay, UtcOffset};

#[derive(Default)]
pub struct MemoryHourStore {
    records: RwLock<HashMap<BusinessHourId, BusinessHour>>,
}

impl MemoryHourStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<BusinessHourId, BusinessHour>>> {
        self.records
            .read()
            .map_err(|e| HoursError::Repository(format!("hour store lock poisoned: {e}")))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<BusinessHourId, BusinessHour>>> {
        self.records
            .write()
            .map_err(|e| HoursError::Repository(format!("hour store lock poisoned: {e}")))
    }

    /// Flip the stored open flag on active records declaring the boundary.
    /// `start_boundary` selects whether `time` is matched against starts or
    /// finishes.
    fn set_open_by_boundary(
        &self,
        day: Weekday,
        time: TimeOfDay,
        offset: UtcOffset,
        start_boundary: bool,
        open: bool,
    ) -> Result<Vec<BusinessHourId>> {
        let mut records = self.write()?;
        let mut matched: Vec<BusinessHourId> = Vec::new();
        for record in records.values_mut() {
            if !record.active || record.timezone.utc_offset != offset {
                continue;
            }
            let declares = record.work_hours.iter().any(|w| {
                w.day == day
                    && if start_boundary {
                        w.start == time
                    } else {
                        w.finish == time
                    }
            });
            if declares {
                record.open = open;
                matched.push(record.id.clone());
            }
        }
        matched.sort();
        Ok(matched)
    }
}

#[async_trait]
impl BusinessHourRepository for MemoryHourStore {
    async fn save(&self, record: BusinessHour) -> Result<()> {
        self.write()?.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_by_id(&self, id: &BusinessHourId) -> Result<Option<BusinessHour>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn remove_by_id(&self, id: &BusinessHourId) -> Result<bool> {
        Ok(self.write()?.remove(id).is_some())
    }

    async fn find_hours_to_schedule_jobs(&self) -> Result<Vec<ScheduledHour>> {
        Ok(schedule_hours(self.read()?.values()))
    }

    async fn find_active_by_day(&self, day: Weekday) -> Result<Vec<BusinessHour>> {
        let records = self.read()?;
        let mut found: Vec<BusinessHour> = records
            .values()
            .filter(|r| r.active && r.work_hours.iter().any(|w| w.day == day))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn open_by_day_time_and_offset(
        &self,
        day: Weekday,
        time: TimeOfDay,
        offset: UtcOffset,
    ) -> Result<Vec<BusinessHourId>> {
        self.set_open_by_boundary(day, time, offset, true, true)
    }

    async fn close_by_day_time_and_offset(
        &self,
        day: Weekday,
        time: TimeOfDay,
        offset: UtcOffset,
    ) -> Result<Vec<BusinessHourId>> {
        self.set_open_by_boundary(day, time, offset, false, false)
    }
}

#[derive(Default)]
pub struct MemoryAgentStore {
    agents: RwLock<HashMap<AgentId, Agent>>,
}

impl MemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<AgentId, Agent>>> {
        self.agents
            .read()
            .map_err(|e| HoursError::Repository(format!("agent store lock poisoned: {e}")))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<AgentId, Agent>>> {
        self.agents
            .write()
            .map_err(|e| HoursError::Repository(format!("agent store lock poisoned: {e}")))
    }

    /// Agent identities come from the external user-management system; the
    /// daemon shell and tests play that role through this method. Not part
    /// of the repository port; the engine never creates agents.
    pub fn upsert_agent(&self, agent: Agent) -> Result<()> {
        self.write()?.insert(agent.id.clone(), agent);
        Ok(())
    }

    pub fn agent_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[async_trait]
impl AgentRepository for MemoryAgentStore {
    async fn is_agent_within_business_hours(&self, agent_id: &AgentId) -> Result<bool> {
        Ok(self
            .read()?
            .get(agent_id)
            .map(Agent::within_business_hours)
            .unwrap_or(false))
    }

    async fn open_agents_business_hours(&self, ids: &[BusinessHourId]) -> Result<()> {
        let mut agents = self.write()?;
        for agent in agents.values_mut() {
            for id in ids {
                if agent.business_hour_ids.contains(id) {
                    agent.open_business_hour_ids.insert(id.clone());
                }
            }
        }
        Ok(())
    }

    async fn close_agents_business_hours(&self, ids: &[BusinessHourId]) -> Result<()> {
        let mut agents = self.write()?;
        for agent in agents.values_mut() {
            for id in ids {
                agent.open_business_hour_ids.remove(id);
            }
        }
        Ok(())
    }

    async fn remove_business_hours_from_users(&self) -> Result<()> {
        let mut agents = self.write()?;
        for agent in agents.values_mut() {
            agent.open_business_hour_ids.clear();
        }
        Ok(())
    }

    async fn remove_business_hour_from_agents(&self, id: &BusinessHourId) -> Result<usize> {
        let mut agents = self.write()?;
        let mut affected = 0;
        for agent in agents.values_mut() {
            let assigned = agent.business_hour_ids.remove(id);
            let open = agent.open_business_hour_ids.remove(id);
            if assigned || open {
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn update_livechat_status_based_on_business_hours(&self) -> Result<()> {
        let mut agents = self.write()?;
        for agent in agents.values_mut() {
            agent.livechat_status = if agent.within_business_hours() {
                LivechatStatus::Available
            } else {
                LivechatStatus::Unavailable
            };
        }
        Ok(())
    }

    async fn find_agent(&self, agent_id: &AgentId) -> Result<Option<Agent>> {
        Ok(self.read()?.get(agent_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Timezone, WorkHour};

    fn window(id: &str, day: Weekday, start: &str, finish: &str, offset: f64) -> BusinessHour {
        BusinessHour {
            id: id.into(),
            name: format!("{id} desk"),
            active: true,
            work_hours: vec![WorkHour {
                day,
                start: start.parse().unwrap(),
                finish: finish.parse().unwrap(),
            }],
            timezone: Timezone::fixed("Test", UtcOffset::from_hours(offset).unwrap()),
            open: false,
        }
    }

    #[tokio::test]
    async fn test_save_find_remove_round_trip() {
        let store = MemoryHourStore::new();
        let bh = window("bh1", Weekday::Mon, "09:00", "17:00", 0.0);

        store.save(bh.clone()).await.unwrap();
        assert_eq!(store.find_by_id(&"bh1".into()).await.unwrap(), Some(bh));
        assert!(store.remove_by_id(&"bh1".into()).await.unwrap());
        assert!(!store.remove_by_id(&"bh1".into()).await.unwrap());
        assert_eq!(store.find_by_id(&"bh1".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_find_active_by_day_filters_and_sorts() {
        let store = MemoryHourStore::new();
        store
            .save(window("b", Weekday::Mon, "09:00", "17:00", 0.0))
            .await
            .unwrap();
        store
            .save(window("a", Weekday::Mon, "10:00", "16:00", 0.0))
            .await
            .unwrap();
        store
            .save(window("c", Weekday::Tue, "09:00", "17:00", 0.0))
            .await
            .unwrap();
        let mut inactive = window("d", Weekday::Mon, "09:00", "17:00", 0.0);
        inactive.active = false;
        store.save(inactive).await.unwrap();

        let found = store.find_active_by_day(Weekday::Mon).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_open_close_by_boundary() {
        let store = MemoryHourStore::new();
        store
            .save(window("bh1", Weekday::Mon, "09:00", "17:00", 0.0))
            .await
            .unwrap();
        // Same start, different offset: must not match
        store
            .save(window("bh2", Weekday::Mon, "09:00", "17:00", -5.0))
            .await
            .unwrap();

        let nine: TimeOfDay = "09:00".parse().unwrap();
        let five: TimeOfDay = "17:00".parse().unwrap();

        let opened = store
            .open_by_day_time_and_offset(Weekday::Mon, nine, UtcOffset::UTC)
            .await
            .unwrap();
        assert_eq!(opened, vec![BusinessHourId::new("bh1")]);
        assert!(store.find_by_id(&"bh1".into()).await.unwrap().unwrap().open);
        assert!(!store.find_by_id(&"bh2".into()).await.unwrap().unwrap().open);

        // Re-opening asserts the same state
        let reopened = store
            .open_by_day_time_and_offset(Weekday::Mon, nine, UtcOffset::UTC)
            .await
            .unwrap();
        assert_eq!(reopened, vec![BusinessHourId::new("bh1")]);

        // Close matches finishes, not starts
        let closed = store
            .close_by_day_time_and_offset(Weekday::Mon, nine, UtcOffset::UTC)
            .await
            .unwrap();
        assert!(closed.is_empty());
        let closed = store
            .close_by_day_time_and_offset(Weekday::Mon, five, UtcOffset::UTC)
            .await
            .unwrap();
        assert_eq!(closed, vec![BusinessHourId::new("bh1")]);
        assert!(!store.find_by_id(&"bh1".into()).await.unwrap().unwrap().open);
    }

    #[tokio::test]
    async fn test_trigger_never_touches_inactive_records() {
        let store = MemoryHourStore::new();
        let mut inactive = window("bh1", Weekday::Mon, "09:00", "17:00", 0.0);
        inactive.active = false;
        store.save(inactive).await.unwrap();

        let opened = store
            .open_by_day_time_and_offset(Weekday::Mon, "09:00".parse().unwrap(), UtcOffset::UTC)
            .await
            .unwrap();
        assert!(opened.is_empty());
    }

    #[tokio::test]
    async fn test_agent_open_set_bookkeeping() {
        let store = MemoryAgentStore::new();
        store
            .upsert_agent(Agent::new("a1").assigned_to("bh1").assigned_to("bh2"))
            .unwrap();
        store.upsert_agent(Agent::new("a2").assigned_to("bh3")).unwrap();

        // Opening bh1 affects only agents assigned to it
        store
            .open_agents_business_hours(&["bh1".into()])
            .await
            .unwrap();
        store
            .update_livechat_status_based_on_business_hours()
            .await
            .unwrap();

        assert!(store
            .is_agent_within_business_hours(&"a1".into())
            .await
            .unwrap());
        assert!(!store
            .is_agent_within_business_hours(&"a2".into())
            .await
            .unwrap());

        // Opening an id an agent is not assigned to does nothing
        let a2 = store.find_agent(&"a2".into()).await.unwrap().unwrap();
        assert!(a2.open_business_hour_ids.is_empty());

        store
            .close_agents_business_hours(&["bh1".into()])
            .await
            .unwrap();
        store
            .update_livechat_status_based_on_business_hours()
            .await
            .unwrap();
        assert!(!store
            .is_agent_within_business_hours(&"a1".into())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unconstrained_agent_always_within_hours() {
        let store = MemoryAgentStore::new();
        store.upsert_agent(Agent::new("free")).unwrap();
        assert!(store
            .is_agent_within_business_hours(&"free".into())
            .await
            .unwrap());

        store
            .update_livechat_status_based_on_business_hours()
            .await
            .unwrap();
        let agent = store.find_agent(&"free".into()).await.unwrap().unwrap();
        assert_eq!(agent.livechat_status, LivechatStatus::Available);
    }

    #[tokio::test]
    async fn test_unknown_agent_not_within_hours() {
        let store = MemoryAgentStore::new();
        assert!(!store
            .is_agent_within_business_hours(&"ghost".into())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_remove_business_hours_from_users_on_empty_store() {
        let store = MemoryAgentStore::new();
        // Zero agents affected is a no-op, not an error
        store.remove_business_hours_from_users().await.unwrap();
        store
            .update_livechat_status_based_on_business_hours()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_remove_business_hour_from_agents_detaches_everywhere() {
        let store = MemoryAgentStore::new();
        let mut a1 = Agent::new("a1").assigned_to("bh1");
        a1.open_business_hour_ids.insert("bh1".into());
        store.upsert_agent(a1).unwrap();
        store.upsert_agent(Agent::new("a2").assigned_to("bh1").assigned_to("bh2")).unwrap();
        store.upsert_agent(Agent::new("a3")).unwrap();

        let affected = store
            .remove_business_hour_from_agents(&"bh1".into())
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let a1 = store.find_agent(&"a1".into()).await.unwrap().unwrap();
        assert!(a1.business_hour_ids.is_empty());
        assert!(a1.open_business_hour_ids.is_empty());

        let a2 = store.find_agent(&"a2".into()).await.unwrap().unwrap();
        assert_eq!(a2.business_hour_ids.len(), 1);

        // Second pass touches nobody
        let affected = store
            .remove_business_hour_from_agents(&"bh1".into())
            .await
            .unwrap();
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn test_schedule_query_is_deterministic() {
        let store = MemoryHourStore::new();
        store
            .save(window("z", Weekday::Fri, "08:00", "18:00", 2.0))
            .await
            .unwrap();
        store
            .save(window("a", Weekday::Mon, "09:00", "17:00", 0.0))
            .await
            .unwrap();

        let first = store.find_hours_to_schedule_jobs().await.unwrap();
        let second = store.find_hours_to_schedule_jobs().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }
}
