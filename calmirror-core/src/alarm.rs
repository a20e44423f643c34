//! Per-user alarm data overlaid onto cached events.
//!
//! Alarms belong to the user, not to the mirrored source, so they are kept
//! outside the event cache and merged in at read time.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::account::AccountKey;
use crate::error::{MirrorError, MirrorResult};
use crate::event::{EventId, Reminder};

pub trait AlarmSource: Send + Sync {
    fn alarms_for(
        &self,
        account: &AccountKey,
        ids: &[EventId],
    ) -> MirrorResult<HashMap<EventId, Vec<Reminder>>>;
}

/// No stored alarms for anyone.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAlarms;

impl AlarmSource for NoAlarms {
    fn alarms_for(
        &self,
        _account: &AccountKey,
        _ids: &[EventId],
    ) -> MirrorResult<HashMap<EventId, Vec<Reminder>>> {
        Ok(HashMap::new())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAlarmSource {
    alarms: Mutex<HashMap<(AccountKey, EventId), Vec<Reminder>>>,
}

impl MemoryAlarmSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, account: AccountKey, id: EventId, reminders: Vec<Reminder>) -> MirrorResult<()> {
        self.alarms
            .lock()
            .map_err(|_| MirrorError::Storage("alarm store mutex poisoned".into()))?
            .insert((account, id), reminders);
        Ok(())
    }
}

impl AlarmSource for MemoryAlarmSource {
    fn alarms_for(
        &self,
        account: &AccountKey,
        ids: &[EventId],
    ) -> MirrorResult<HashMap<EventId, Vec<Reminder>>> {
        let alarms = self
            .alarms
            .lock()
            .map_err(|_| MirrorError::Storage("alarm store mutex poisoned".into()))?;

        Ok(ids
            .iter()
            .filter_map(|id| {
                alarms
                    .get(&(*account, id.clone()))
                    .map(|reminders| (id.clone(), reminders.clone()))
            })
            .collect())
    }
}
