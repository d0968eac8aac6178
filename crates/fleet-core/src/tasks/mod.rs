//! Task ledger and lease protocol

mod ledger;
mod model;
mod templates;

pub use ledger::{ClaimOutcome, ExpiredClaim, NewTask, TaskLedger};
pub(crate) use ledger::refresh_board;
pub use model::{Claim, ClaimStatus, FileConflict, HistoryEntry, Task, TaskBoard, TaskStatus};
pub use templates::Template;
