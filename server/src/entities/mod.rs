//! Server-side entity definitions.

pub mod player;
pub mod effects;
mod enemy;

pub use player::{PlayerRecord, now_secs};
pub use effects::{Effect, EffectLedger};
pub use enemy::EnemySnapshot;
