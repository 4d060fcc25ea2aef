//! Background worker: lifecycle, routing and the host-side driver
//!
//! - [`WorkerController`] handles install, activate and fetch for one
//!   manifest generation
//! - [`Router`] picks cache-first or network pass-through per request
//! - [`Registration`] drives generations through [`WorkerState`]

pub mod controller;
pub mod event;
pub mod registration;
pub mod routing;
pub mod state;

pub use controller::{ActivateReport, InstallReport, WorkerController};
pub use event::{ExtendableEvent, FetchEvent, LifecycleEvent, Served, ServedFrom};
pub use registration::{Registration, UpdateOutcome, WorkerHandle};
pub use routing::{Route, Router};
pub use state::WorkerState;
