//! # picname
//!
//! Bulk image renamer. Point it at a folder of photos and every supported
//! image gets a descriptive name chosen by a vision-capable chat model:
//! the image is shrunk and re-encoded, sent inline with a naming prompt to an
//! OpenAI-compatible `/v1/chat/completions` endpoint, and the answer becomes
//! the new file name.
//!
//! # Architecture: One Job per Image
//!
//! ```text
//! source/ ─discover─▶ paths ─▶ rayon pool ─▶ ImageJob per path
//!                                               │
//!            compress (imaging) ─▶ ask (api) ─▶ sanitize (naming) ─▶ place (target)
//!                                               │
//!                       counters + ledger + RenameEvent (output)
//!                                               │
//!                          BatchSummary ─▶ CSV report (report)
//! ```
//!
//! Jobs are independent. A failure in one image is counted, logged and
//! recorded in the ledger; it never stops the others. Cancellation is
//! cooperative: jobs that have not started skip themselves, jobs already in
//! flight finish normally.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`batch`] | Discovers images, runs the pool, drains outcomes, returns totals |
//! | [`job`] | The per-image pipeline and its failure taxonomy |
//! | [`imaging`] | Decode, downscale and re-encode images for upload |
//! | [`api`] | Chat-completions request/response handling over `reqwest` |
//! | [`naming`] | Turns model text into a safe file stem |
//! | [`target`] | Destination folders, collision-free names, move/copy |
//! | [`ledger`] | Thread-safe record of original → suggested names |
//! | [`counter`] | Shared counters, the active-job guard and the cancel flag |
//! | [`report`] | Writes the ledger as a CSV report |
//! | [`config`] | `picname.toml` loading, layering and validation |
//! | [`output`] | Progress events and their text formatting |
//!
//! # Design Decisions
//!
//! ## Snapshot Config
//!
//! [`batch::run`] takes the [`config::RenameConfig`] by value and freezes it
//! behind an `Arc` for the whole run. Nothing a job does can change what the
//! next job sees.
//!
//! ## Traits at the Edges
//!
//! The image codec, the naming client, the progress sink and the report
//! writer are traits. The batch logic is tested with in-memory mocks and never
//! needs real pixels or a network.
//!
//! ## Events, Not Prints
//!
//! Workers never write to stdout. They emit [`output::RenameEvent`]s; the CLI
//! forwards them over a channel to one printer thread, so lines never
//! interleave.

pub mod api;
pub mod batch;
pub mod config;
pub mod counter;
pub mod imaging;
pub mod job;
pub mod ledger;
pub mod naming;
pub mod output;
pub mod report;
pub mod target;

#[cfg(test)]
pub(crate) mod test_helpers;
