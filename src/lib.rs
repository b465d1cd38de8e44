pub mod canvas;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod command;
pub mod config;
pub mod error;
pub mod ir;
pub mod layout;
pub mod matrix;
pub mod render;
pub mod store;
pub mod theme;

pub use canvas::{Advance, AdvanceCandidate, Canvas, MoveOutcome, NodeDeletion};
#[cfg(feature = "cli")]
pub use cli::run;
pub use codec::{AppendReport, LoadReport, WorkflowDocument};
pub use command::{BatchKind, Command, CommandOutput};
pub use error::{CommandError, DocumentError, TransitionError};
pub use store::GraphStore;
