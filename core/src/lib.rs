#![warn(
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented
)]
#![allow(
    clippy::needless_continue,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::struct_field_names,
    clippy::module_name_repetitions
)]

pub mod emitter;
pub mod instrumentation;
pub mod io;
pub mod listeners;
pub mod net;
pub mod policies;
pub mod reconcile;
pub mod resources;
pub mod settings;
pub mod snapshot;
pub mod status;
pub mod sync;
pub mod task;
