//! Zero-downtime dataset reload
//!
//! Rendezvous between query workers and a reloader. Workers register
//! in-flight queries against the active region; the reloader prepares a
//! new region, waits until the query counter drains, then swaps the
//! active region identifier. Readers never block each other; only the
//! swap itself blocks them briefly.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::RouteData;

struct RegionState {
    in_flight: usize,
    region_id: u64,
    active: Arc<dyn RouteData>,
}

pub struct SharedRegions {
    /// At most one reload prepares at a time.
    pending_update: Mutex<()>,
    state: Mutex<RegionState>,
    no_running_queries: Condvar,
}

impl SharedRegions {
    pub fn new(initial: Arc<dyn RouteData>) -> Self {
        Self {
            pending_update: Mutex::new(()),
            state: Mutex::new(RegionState {
                in_flight: 0,
                region_id: 0,
                active: initial,
            }),
            no_running_queries: Condvar::new(),
        }
    }

    /// Register a query and pin the active region for its duration.
    pub fn begin_query(self: &Arc<Self>) -> QueryTicket {
        let mut state = self.state.lock();
        state.in_flight += 1;
        QueryTicket {
            data: Arc::clone(&state.active),
            region_id: state.region_id,
            regions: Arc::clone(self),
        }
    }

    /// Swap in a freshly prepared dataset once all in-flight queries have
    /// drained. Returns the new region identifier.
    pub fn reload(&self, fresh: Arc<dyn RouteData>) -> u64 {
        let _pending = self.pending_update.lock();
        let mut state = self.state.lock();
        while state.in_flight > 0 {
            self.no_running_queries.wait(&mut state);
        }
        state.region_id += 1;
        state.active = fresh;
        state.region_id
    }

    pub fn active_region_id(&self) -> u64 {
        self.state.lock().region_id
    }

    fn finish_query(&self) {
        let mut state = self.state.lock();
        state.in_flight -= 1;
        if state.in_flight == 0 {
            self.no_running_queries.notify_all();
        }
    }
}

/// Pins one region for the lifetime of one query.
pub struct QueryTicket {
    data: Arc<dyn RouteData>,
    region_id: u64,
    regions: Arc<SharedRegions>,
}

impl QueryTicket {
    pub fn data(&self) -> &Arc<dyn RouteData> {
        &self.data
    }

    pub fn region_id(&self) -> u64 {
        self.region_id
    }
}

impl Drop for QueryTicket {
    fn drop(&mut self) {
        self.regions.finish_query();
    }
}
