//! RNG capability seam

/// Deterministic uniform source shared by the samplers and the producer.
///
/// Implementations must produce bit-identical streams for a given seed
/// across platforms; the algorithm is fixed, not borrowed from a standard
/// library.
pub trait Rng {
    /// Next uniform draw in [0, 1).
    fn uniform(&mut self) -> f64;

    /// Fully re-initialize the generator state from `seed`.
    fn seed(&mut self, seed: u64);
}
