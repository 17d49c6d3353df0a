//! Fairground Deterministic Simulation Harness
//!
//! This crate drives the Fairground engines through complete game rounds
//! on a simulated ledger whose every hash is derived from one 64-bit seed.
//!
//! # Core Principle: Controlled History
//!
//! Everything a resolver could observe is under the harness's control:
//! - **Position**: The chain only advances when a scenario advances it
//! - **History**: Position hashes are a pure function of (seed, position)
//! - **Service faults**: The extended-history service can be removed or made to fail
//! - **Participants**: Keys, secrets, choices and stakes come from seeded ChaCha streams
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       SimGame                           │
//! │  ┌───────────────────┐      ┌────────────────────────┐  │
//! │  │ CommitmentLedger  │      │ EntropySource          │  │
//! │  │ commit / reveal / │      │ native ─► extended     │  │
//! │  │ forfeit           │      │                        │  │
//! │  └───────────────────┘      └──────┬──────────┬──────┘  │
//! │                                    │          │         │
//! │                             ┌──────▼───┐ ┌────▼──────┐  │
//! │                             │ SimLedger│ │SimHistory │  │
//! │                             └──────────┘ └───────────┘  │
//! │        derive_seed ─► derive_outcome_set ─► report      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use fairground_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 16).run(ScenarioId::Griefing);
//! assert!(result.passed);
//! ```

mod context;
mod game;
mod history;
mod keys;
mod runner;
pub mod scenarios;

pub use context::{SimLedger, BLOCK_TIME_SECS};
pub use game::{GameError, RoundReport, SimGame, DEFAULT_RESOLUTION_DELAY, GAME_DOMAIN};
pub use history::SimHistoryService;
pub use keys::DeterministicKeyProvider;
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
