//! Deterministic randomness: seeded streams and the text-to-seed hash.
//!
//! A match is identified by a single `u64` seed. Maze generation and the
//! layout builder each draw from their own stream, derived from that seed with
//! a keyed HMAC so neither consumer can shift the other's sequence.

use hmac::{Hmac, Mac};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Domain tag for the procedural maze stream.
pub const MAZE_STREAM: &[u8] = b"labyrace/maze";
/// Domain tag for the layout builder stream.
pub const BUILDER_STREAM: &[u8] = b"labyrace/builder";

const TEXT_SEED_DOMAIN: u64 = 0x6c61_6279_7261_6365;

/// Hash free-form text (a typed seed, a room code) into a numeric seed.
#[must_use]
pub fn hash_seed(text: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(TEXT_SEED_DOMAIN);
    hasher.write(text.trim().as_bytes());
    hasher.finish()
}

/// Derive an independent stream seed for `domain_tag` from a user seed.
#[must_use]
pub fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed ^ hash_seed(&String::from_utf8_lossy(domain_tag));
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Seeded generator with draw accounting.
///
/// Cloning copies the full stream position, so a cloned build branch replays
/// exactly the draws its parent would have made.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: ChaCha20Rng,
    draws: u64,
}

impl DeterministicRng {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            draws: 0,
        }
    }

    /// Generator for a seed typed as text.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::from_seed(hash_seed(text))
    }

    /// Generator for one named stream of a match seed.
    #[must_use]
    pub fn for_stream(user_seed: u64, domain_tag: &[u8]) -> Self {
        Self::from_seed(derive_stream_seed(user_seed, domain_tag))
    }

    /// Number of draws performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.r#gen::<f64>()
    }

    /// Uniform index in `0..span`; returns 0 for an empty span without drawing.
    pub fn below(&mut self, span: usize) -> usize {
        if span == 0 {
            return 0;
        }
        self.draws = self.draws.saturating_add(1);
        self.rng.gen_range(0..span)
    }

    /// Uniform integer in `lo..=hi`; returns `lo` when the range is empty.
    pub fn range_inclusive(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        self.draws = self.draws.saturating_add(1);
        self.rng.gen_range(lo..=hi)
    }

    /// Shuffle in place using this stream.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        self.draws = self.draws.saturating_add(1);
        items.shuffle(&mut self.rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_seeds_replay_identical_draws() {
        let mut a = DeterministicRng::from_seed(42);
        let mut b = DeterministicRng::from_seed(42);
        for _ in 0..16 {
            assert_eq!(a.below(1000), b.below(1000));
        }
        assert_eq!(a.draws(), 16);
    }

    #[test]
    fn text_seeds_are_trimmed_and_stable() {
        assert_eq!(hash_seed("orange42"), hash_seed("  orange42 "));
        assert_ne!(hash_seed("orange42"), hash_seed("orange43"));
    }

    #[test]
    fn streams_are_domain_separated() {
        let maze = derive_stream_seed(7, MAZE_STREAM);
        let builder = derive_stream_seed(7, BUILDER_STREAM);
        assert_ne!(maze, builder);
        assert_eq!(maze, derive_stream_seed(7, MAZE_STREAM));
    }

    #[test]
    fn clone_preserves_stream_position() {
        let mut rng = DeterministicRng::from_seed(9);
        rng.next_unit();
        let mut twin = rng.clone();
        assert_eq!(rng.range_inclusive(0, 100), twin.range_inclusive(0, 100));
    }

    #[test]
    fn empty_ranges_do_not_draw() {
        let mut rng = DeterministicRng::from_seed(1);
        assert_eq!(rng.below(0), 0);
        assert_eq!(rng.range_inclusive(5, 5), 5);
        assert_eq!(rng.draws(), 0);
    }
}
