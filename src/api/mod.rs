pub mod heartbeat;
pub mod state;
pub mod status;

pub use state::AppState;
