//! Pipeline stages for PDF table extraction.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own with generated PDFs and canned model replies.
//!
//! ## Data Flow
//!
//! ```text
//! load ──▶ detect ──▶ split ──▶ extract ──▶ write
//! (lopdf)  (model)   (lopdf)   (model)    (JSON files)
//! ```
//!
//! 1. [`load`]: read and parse the PDF, count pages
//! 2. [`detect`]: ask the model for table page ranges (long documents only)
//! 3. [`split`]: validate ranges and cut one sub-document per range
//! 4. [`extract`]: ask the model for the tables of each unit, parse strictly
//! 5. [`write`]: deterministic artifact names and atomic JSON writes
//!
//! Supporting modules: [`response`] pulls the JSON out of free-text replies,
//! [`retry`] wraps every model call in a timeout and backoff loop, [`llm`]
//! and [`encode`] implement the model capability over `edgequake-llm`.

pub mod detect;
pub mod encode;
pub mod extract;
pub mod llm;
pub mod load;
pub mod response;
pub mod retry;
pub mod split;
pub mod write;
