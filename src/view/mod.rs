/// View subsystem: projection of document snapshots into display lines and
/// their terminal rendering. Reads immutable state only; user interaction
/// flows back through commands, never through direct mutation.
pub mod renderer;
pub mod view_model;

pub use renderer::{RenderParams, View};
pub use view_model::ViewModel;
