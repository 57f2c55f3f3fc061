use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use sha2::{Digest as _, Sha256};
use tracing::{debug, info, trace};

use crate::block::{encode_payload, BlockData, PayloadTemplate};
use crate::{Error, Result};

pub const DIGEST_LENGTH: usize = 32;
pub const DIGEST_BITS: u32 = DIGEST_LENGTH as u32 * 8;

/// How many attempts a worker makes between checks of the stop signal
const STOP_POLL_INTERVAL: u64 = 1024;

/// Held in the shared result slot until some worker finds a solution.
/// It is never tried as a candidate.
const NO_SOLUTION: u64 = u64::max_value();

/// SHA-256 output of a canonical payload
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; DIGEST_LENGTH]);

impl Digest {
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        let mut digest = [0; DIGEST_LENGTH];
        digest.copy_from_slice(&Sha256::digest(bytes.as_ref()));
        Digest(digest)
    }

    pub fn from_bytes(bytes: [u8; DIGEST_LENGTH]) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

/// True iff the first `difficulty` bits of `digest` are zero, most significant
/// bit of byte 0 first. A difficulty above 256 can never be met.
pub fn has_leading_zero_bits(digest: &Digest, difficulty: u32) -> bool {
    if difficulty > DIGEST_BITS {
        return false;
    }
    let full_bytes = (difficulty / 8) as usize;
    let remaining_bits = difficulty % 8;

    if digest.0[..full_bytes].iter().any(|&b| b != 0) {
        return false;
    }
    if remaining_bits > 0 {
        let mask = 0xffu8 << (8 - remaining_bits);
        if digest.0[full_bytes] & mask != 0 {
            return false;
        }
    }
    true
}

/// Number of leading zero bits in `digest`, from 0 to 256
pub fn leading_zero_bits(digest: &Digest) -> u32 {
    let mut count = 0;
    for &b in digest.0.iter() {
        count += b.leading_zeros();
        if b != 0 {
            break;
        }
    }
    count
}

/// Independently re-derive whether `nonce` solves `block` at `difficulty`
pub fn verify(block: &BlockData, nonce: u64, difficulty: u32) -> Result<bool> {
    let payload = encode_payload(block, nonce)?;
    Ok(has_leading_zero_bits(&Digest::of(&payload), difficulty))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u64,
    pub digest: Digest,
    pub payload: String,
    /// Candidates hashed across all workers, including ones past the winner
    pub attempts: u64,
}

#[derive(Clone)]
pub struct Searcher<'a> {
    block: &'a BlockData,
    difficulty: u32,
    threads_count: u32,
    stop: Arc<AtomicBool>,
}

impl<'a> Searcher<'a> {
    pub fn new(block: &'a BlockData, difficulty: u32) -> Self {
        Searcher {
            block,
            difficulty,
            threads_count: 1,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_threads(mut self, threads_count: u32) -> Self {
        self.threads_count = threads_count.max(1);
        self
    }

    pub fn with_all_cores(self) -> Self {
        let cores = num_cpus::get() as u32;
        self.with_threads(cores)
    }

    /// Once `stop` is set, workers give up and `run` returns `Error::Cancelled`
    pub fn with_stop_signal(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Search for the smallest nonce whose payload digest meets the difficulty.
    ///
    /// With more than one thread, worker `i` tries `i, i + n, i + 2n, ...`.
    /// Workers publish hits with `fetch_min` and stop once their next candidate
    /// is past the best hit, so the result matches a single threaded search.
    pub fn run(&self) -> Result<Solution> {
        let template = PayloadTemplate::new(self.block)?;
        let best = Arc::new(AtomicU64::new(NO_SOLUTION));
        let started = Instant::now();

        info!(
            difficulty = self.difficulty,
            threads = self.threads_count,
            entries = self.block.len(),
            "searching for nonce"
        );

        let outcomes = if self.threads_count == 1 {
            vec![find_nonce_threaded(
                0,
                1,
                self.difficulty,
                template,
                &best,
                &self.stop,
            )]
        } else {
            let handles: Vec<_> = (0..self.threads_count)
                .map(|start| {
                    let template = template.clone();
                    let best = best.clone();
                    let stop = self.stop.clone();
                    let step = self.threads_count;
                    let difficulty = self.difficulty;
                    thread::spawn(move || {
                        find_nonce_threaded(
                            u64::from(start),
                            u64::from(step),
                            difficulty,
                            template,
                            &best,
                            &stop,
                        )
                    })
                })
                .collect();

            let mut outcomes = Vec::with_capacity(handles.len());
            for handle in handles {
                outcomes.push(handle.join().map_err(|_| Error::WorkerPanicked)?);
            }
            outcomes
        };

        let attempts: u64 = outcomes.iter().map(|o| o.attempts).sum();
        if outcomes.iter().any(|o| o.interrupted) {
            return Err(Error::Cancelled);
        }

        let nonce = best.load(Ordering::SeqCst);
        if nonce == NO_SOLUTION {
            return Err(Error::Exhausted);
        }

        let payload = encode_payload(self.block, nonce)?;
        let digest = Digest::of(&payload);

        let elapsed = started.elapsed();
        let hashrate = attempts as f64 / elapsed.as_secs_f64().max(1e-9);
        info!(
            nonce,
            attempts,
            elapsed_ms = elapsed.as_millis() as u64,
            hashrate = hashrate as u64,
            leading_zero_bits = leading_zero_bits(&digest),
            digest = %digest,
            "nonce found"
        );

        Ok(Solution {
            nonce,
            digest,
            payload,
            attempts,
        })
    }
}

struct WorkerOutcome {
    attempts: u64,
    interrupted: bool,
}

fn find_nonce_threaded(
    start: u64,
    step: u64,
    difficulty: u32,
    mut template: PayloadTemplate,
    best: &AtomicU64,
    stop: &AtomicBool,
) -> WorkerOutcome {
    debug!(start, step, "worker started");
    let mut attempts = 0;

    for nonce in (start..NO_SOLUTION).step_by(step as usize) {
        if nonce >= best.load(Ordering::Relaxed) {
            break;
        }
        if attempts % STOP_POLL_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
            debug!(start, attempts, "worker stopped by signal");
            return WorkerOutcome {
                attempts,
                interrupted: true,
            };
        }

        let digest = Digest::of(template.render(nonce));
        attempts += 1;
        trace!(nonce, digest = %digest, "attempt");

        if has_leading_zero_bits(&digest, difficulty) {
            best.fetch_min(nonce, Ordering::SeqCst);
            break;
        }
    }

    debug!(start, attempts, "worker finished");
    WorkerOutcome {
        attempts,
        interrupted: false,
    }
}
