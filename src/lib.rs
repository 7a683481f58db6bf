// Library root
// -----------
// This crate exposes the transfer core behind the `tcstore` binary, so
// the workflows can be driven and tested without the terminal UI.
//
// Module responsibilities:
// - `auth`: token issuance against the identity endpoint.
// - `storage`: container check and object PUT/list/DELETE.
// - `progress`: bounded fan-out of per-object tasks with progress callbacks.
// - `transfer`: the upload-files, upload-directory, list and delete-all
//   workflows built from the three above.
// - `walk`: maps local files and directory trees to object names.
// - `config`: persisted settings with an explicit `save`.
// - `ui`: interactive menu, prompts and progress bar.
pub mod auth;
pub mod config;
pub mod error;
pub mod progress;
pub mod storage;
pub mod transfer;
pub mod ui;
pub mod walk;

pub use error::{Result, TransferError};
