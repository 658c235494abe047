//! Shared application state for the Fire Command Router and the
//! operator status surface (spec §4.E, §4.J).

use std::sync::Arc;

use crate::config::Config;
use crate::ea_ipc::EaIpc;
use crate::observation::ObservationClient;
use crate::store::Store;
use crate::streams::StreamClient;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub stream: StreamClient,
    pub observation: ObservationClient,
    pub ea_ipc: Arc<EaIpc>,
    pub cfg: Arc<Config>,
}
