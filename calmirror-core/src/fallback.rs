//! Degraded access for accounts whose source cannot even be set up.
//!
//! Nothing here touches the lease or the refresher: every query answers
//! empty and carries the error that put the account in this state.

use chrono::{DateTime, Utc};

use crate::access::CalendarAccess;
use crate::account::AccountKey;
use crate::error::{MirrorError, MirrorResult, Warning};
use crate::event::{Event, EventId};
use crate::projection::{Projection, QueryParams, UpdatesResult};

pub struct FallbackAccess {
    key: AccountKey,
    error: Warning,
}

impl FallbackAccess {
    pub fn new(key: AccountKey, error: &MirrorError) -> Self {
        FallbackAccess {
            key,
            error: Warning::from_error(error),
        }
    }

    pub fn error(&self) -> &Warning {
        &self.error
    }

    fn empty<T: Default>(&self) -> MirrorResult<Projection<T>> {
        Ok(Projection::new(T::default(), vec![self.error.clone()]))
    }
}

impl CalendarAccess for FallbackAccess {
    fn account(&self) -> AccountKey {
        self.key
    }

    fn get_event(&self, _id: &EventId, _params: &QueryParams) -> MirrorResult<Projection<Event>> {
        Err(MirrorError::Unavailable(self.error.message.clone()))
    }

    fn get_events(
        &self,
        ids: &[EventId],
        _params: &QueryParams,
    ) -> MirrorResult<Projection<Vec<Option<Event>>>> {
        Ok(Projection::new(vec![None; ids.len()], vec![self.error.clone()]))
    }

    fn get_events_for_account(&self, _params: &QueryParams) -> MirrorResult<Projection<Vec<Event>>> {
        self.empty()
    }

    fn get_change_exceptions(
        &self,
        _series_uid: &str,
        _params: &QueryParams,
    ) -> MirrorResult<Projection<Vec<Event>>> {
        self.empty()
    }

    fn search_events(&self, _pattern: &str, _params: &QueryParams) -> MirrorResult<Projection<Vec<Event>>> {
        self.empty()
    }

    fn get_updated_since(
        &self,
        _since: DateTime<Utc>,
        _params: &QueryParams,
    ) -> MirrorResult<Projection<UpdatesResult>> {
        self.empty()
    }
}
