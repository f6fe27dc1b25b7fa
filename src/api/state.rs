use std::sync::Arc;

use crate::calculate::LeaderboardAssembler;
use crate::storage::TimeSeriesStore;
use crate::sync::SyncOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TimeSeriesStore>,
    pub assembler: LeaderboardAssembler,
    pub orchestrator: Arc<SyncOrchestrator>,

    /// Default for `/api/leaderboard` when `all` is not given
    pub hide_unplayed: bool,

    pub cors_origin: String,
}

impl AppState {
    pub fn new(store: Arc<dyn TimeSeriesStore>, orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            assembler: LeaderboardAssembler::new(Arc::clone(&store)),
            store,
            orchestrator,
            hide_unplayed: true,
            cors_origin: "*".to_string(),
        }
    }
}
