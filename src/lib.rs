pub mod canvas;
pub mod color;
pub mod config;
pub mod easing;
pub mod effects;
pub mod engine;
pub mod entity;
pub mod error;
pub mod event;
pub mod frame;
pub mod geometry;
pub mod gradient;
pub mod motion;
pub mod scene;
pub mod stage;
pub mod terminal;

pub use canvas::{Canvas, IngestOptions};
pub use color::{Color, ColorMode, Rgb};
pub use easing::Easing;
pub use engine::{Director, EffectIterator};
pub use entity::EntityId;
pub use error::EngineError;
pub use event::{Action, Trigger};
pub use frame::Frame;
pub use geometry::{Anchor, Coord};
pub use gradient::{Direction, Gradient};
pub use motion::{Path, Waypoint};
pub use scene::{Scene, SyncMode, Visual};
pub use stage::{Grouping, Stage};
