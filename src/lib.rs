//! # Health Copilot
//!
//! Evidence-grounded answers to health and biomedical questions.
//!
//! An offline build turns corpus files into a flat inner-product index;
//! at query time the engine retrieves the closest chunks, optionally fans
//! out to live literature sources, and asks a completion service for an
//! answer that cites its evidence.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Corpus files│──▶│ Chunk+Embed │──▶│ index.hcvi + │
//! │ json/jsonl/ │   │  (indexer)  │   │  meta.json   │
//! │ csv         │   └─────────────┘   └──────┬───────┘
//! └─────────────┘                            │
//!                                            ▼
//!     ┌──────────────┐   route()    ┌─────────────────┐
//!     │ Live sources │◀─────────────│     Engine      │
//!     │ EPMC/arXiv/  │              │ retrieve/answer │
//!     │ Wikipedia/...│              └────────┬────────┘
//!     └──────────────┘                       ▼
//!                                   ┌─────────────────┐
//!                                   │ Completion API  │
//!                                   └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! copilot build                           # index data/corpora
//! copilot search "metformin" --k 5
//! copilot answer "what is diabetes"
//! copilot route "treatment for migraine"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`corpus`] | Corpus file loading |
//! | [`embedding`] | Embedding providers |
//! | [`indexer`] | Index build and artifact persistence |
//! | [`completion`] | Completion-service clients |
//! | [`sources`] | Live retrieval sources |
//! | [`router`] | Query planning and fan-out |
//! | [`engine`] | Query-time engine |
//! | [`commands`] | CLI command implementations |
//! | [`logging`] | Tracing setup |

pub mod commands;
pub mod completion;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod engine;
pub mod indexer;
pub mod logging;
pub mod router;
pub mod sources;
