//! Collaborators the engine needs from the outside world: randomness,
//! wall-clock time and id generation. Production implementations live next
//! to deterministic ones used by tests and replays.

use chrono::{DateTime, Utc};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Source of unbiased integers.
pub trait RandomSource {
    /// Uniform integer in `[0, n)`.
    fn uniform(&mut self, n: usize) -> usize;
}

/// Uniform draw in `[0, n)` by rejection sampling.
///
/// Raw words at or above the largest multiple of `n` are discarded so every
/// residue is equally likely. Ranges of size 0 or 1 yield 0.
pub fn uniform_below<R: RngCore + ?Sized>(rng: &mut R, n: u64) -> u64 {
    if n <= 1 {
        return 0;
    }
    let zone = u64::MAX - (u64::MAX % n);
    loop {
        let v = rng.next_u64();
        if v < zone {
            return v % n;
        }
    }
}

/// Any `RngCore` as a `RandomSource`.
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: RngCore> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: RngCore> RandomSource for RngSource<R> {
    fn uniform(&mut self, n: usize) -> usize {
        uniform_below(&mut self.rng, n as u64) as usize
    }
}

/// Operating-system CSPRNG; what live rounds use.
pub type OsRandom = RngSource<OsRng>;

impl Default for OsRandom {
    fn default() -> Self {
        RngSource::new(OsRng)
    }
}

/// Reproducible source for tests and simulations.
pub fn seeded(seed: u64) -> RngSource<StdRng> {
    RngSource::new(StdRng::seed_from_u64(seed))
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

pub trait IdGenerator {
    fn new_id(&mut self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn new_id(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// `"<prefix>-1"`, `"<prefix>-2"`, ...
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: 1,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn new_id(&mut self) -> String {
        let id = format!("{}-{}", self.prefix, self.next);
        self.next += 1;
        id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
