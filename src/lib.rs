//! Solver for leading-zero-bit proof of work challenges.
//!
//! A challenge is a difficulty plus an ordered list of `(label, value)` entries.
//! The solver searches for the smallest nonce such that the SHA-256 digest of
//! the canonical payload `{"data":[["label",value],...],"nonce":N}` starts with
//! `difficulty` zero bits.

use thiserror::Error;

pub mod block;
pub mod client;
pub mod pow;

pub use block::{encode_payload, BlockData, Entry, PayloadTemplate, Scalar};
pub use client::{Challenge, ChallengeClient, SubmitOutcome, Submission};
pub use pow::{
    has_leading_zero_bits, leading_zero_bits, verify, Digest, Searcher, Solution, DIGEST_BITS,
};

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search was cancelled")]
    Cancelled,
    #[error("no nonce found in the whole candidate range")]
    Exhausted,
    #[error("a search worker panicked")]
    WorkerPanicked,
}

pub type Result<T> = std::result::Result<T, Error>;
