pub mod engine;
pub mod recompute;

pub use recompute::{spawn_player_value_recompute, spawn_team_record_recompute};
