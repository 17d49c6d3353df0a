//! Fairground Environment Abstraction Layer
//!
//! This crate provides the seams between the Fairground fairness engine and
//! the ledger it runs on, so that the same engine runs against a **live**
//! chain adapter or the deterministic **simulation** in `fairground_sim`.
//!
//! # Core Concept: Capabilities, not globals
//!
//! Everything the engine learns from the outside world comes through a trait:
//! - Chain position and timestamp (`LedgerContext`)
//! - Cheap native lookback of recent position hashes (`LedgerContext::native_hash`)
//! - Extended lookback through an optional history service (`HistoryService`)
//!
//! A missing history service is a normal runtime condition, not an error:
//! the engine holds `Option<Arc<dyn HistoryService>>` and degrades.
//!
//! # Example
//!
//! ```ignore
//! use fairground_env::{LedgerContext, HistoryService};
//!
//! fn seed_position<Ctx: LedgerContext>(ctx: &Ctx, delay: u64) -> u64 {
//!     // Commit to a position that cannot be known yet
//!     ctx.current_position() + delay
//! }
//! ```

mod context;
mod error;
mod history;
mod types;

pub use context::LedgerContext;
pub use error::EnvError;
pub use history::{HistoryController, HistoryService};
pub use types::{Hash, ParticipantId, RoundId, ZERO_HASH};
