//! Bulk file operation engine for ferryfile.
//!
//! An [`Engine`] runs one copy, move or delete on a dedicated worker thread.
//! Progress, the current item, halts and the final summary are reported to
//! an [`Observer`]. Whenever an action cannot proceed the worker stops and
//! waits for a [`UserResponse`](ferryfile_core::UserResponse) delivered
//! through the engine's [`Control`] handle.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ferryfile_core::{EngineConfig, FsEntry};
//! use ferryfile_ops::{ChannelObserver, Engine, OperationEvent, OperationRequest};
//!
//! let (observer, mut events) = ChannelObserver::new();
//! let request = OperationRequest::copy(vec![FsEntry::new("photos")], "backup/");
//! let mut engine = Engine::new(request, EngineConfig::unattended(), Arc::new(observer));
//! engine.start().unwrap();
//!
//! while let Some(event) = events.blocking_recv() {
//!     if let OperationEvent::Finished(summary) = event {
//!         println!("{}", summary.summary());
//!         break;
//!     }
//! }
//! ```

mod control;
mod delete;
mod engine;
mod flatten;
mod observer;
mod operation;
mod progress;
mod protocol;
mod transfer;
mod worker;

pub use control::{Control, Responder};
pub use engine::{Engine, EngineError};
pub use flatten::{
    DestinationPlan, TransferPlan, WorkItem, enumerate_for_delete, has_trailing_separator, plan_destination,
    plan_transfer,
};
pub use observer::{ChannelObserver, Observer, OperationEvent};
pub use operation::{OperationKind, OperationRequest};
pub use progress::{OperationSummary, Outcome, ProgressSnapshot, eta_seconds, percent, throughput};
pub use protocol::{HaltEvent, ProtocolError};
