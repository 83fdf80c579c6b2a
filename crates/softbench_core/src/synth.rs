//! Seeded, streaming synthesis of softmax input vectors.
//!
//! Values are produced in order by [`VectorSynth`], so a writer can pull one batch at a
//! time and never hold a full 10^8 element vector in memory. Batch boundaries do not
//! affect the generated sequence.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::catalog::DistributionClass;

/// Vectors longer than this get the fixed outlier probes in the `extreme` class.
pub const EXTREME_PROBE_THRESHOLD: usize = 100;
/// Large positive, large negative and exact zero exponent arguments, at indices 0, 1, 2.
pub const EXTREME_PROBES: [f32; 3] = [1000.0, -1000.0, 0.0];

const RANDOM_RANGE: (f64, f64) = (-10.0, 10.0);
const EXTREME_RANGE: (f64, f64) = (-100.0, 100.0);
const SMALL_RANGE: (f64, f64) = (-1e-3, 1e-3);
const FALLBACK_RANGE: (f64, f64) = (-5.0, 5.0);
const ASCENDING_SPAN: (f64, f64) = (-5.0, 5.0);
const UNIFORM_VALUE: f32 = 1.0;

/// Streaming generator for one input vector.
#[derive(Debug, Clone)]
pub struct VectorSynth {
    class: DistributionClass,
    len: usize,
    position: usize,
    rng: ChaCha20Rng,
}

impl VectorSynth {
    pub fn new(class: DistributionClass, len: usize, seed: u64) -> Self {
        Self {
            class,
            len,
            position: 0,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    /// Clears `buf` and refills it with up to `max` of the next values. Returns how many were written.
    pub fn next_batch(&mut self, buf: &mut Vec<f32>, max: usize) -> usize {
        buf.clear();
        let count = max.min(self.remaining());
        buf.reserve(count);
        for _ in 0..count {
            let value = self.next_value();
            buf.push(value);
        }
        count
    }

    fn next_value(&mut self) -> f32 {
        let index = self.position;
        self.position += 1;
        match self.class {
            DistributionClass::Random => uniform(&mut self.rng, RANDOM_RANGE),
            DistributionClass::Extreme => {
                // The draw still happens for probe slots so the rest of the sequence
                // does not shift when the threshold is crossed.
                let value = uniform(&mut self.rng, EXTREME_RANGE);
                if self.len > EXTREME_PROBE_THRESHOLD && index < EXTREME_PROBES.len() {
                    EXTREME_PROBES[index]
                } else {
                    value
                }
            }
            DistributionClass::Uniform => UNIFORM_VALUE,
            DistributionClass::Ascending => linspace_at(index, self.len, ASCENDING_SPAN),
            DistributionClass::SmallValues => uniform(&mut self.rng, SMALL_RANGE),
            DistributionClass::Default => uniform(&mut self.rng, FALLBACK_RANGE),
        }
    }
}

/// Generates a whole vector at once. Convenient for small sizes and tests.
pub fn generate_values(class: DistributionClass, len: usize, seed: u64) -> Vec<f32> {
    let mut synth = VectorSynth::new(class, len, seed);
    let mut values = Vec::with_capacity(len);
    synth.next_batch(&mut values, len);
    values
}

/// Resolves the seed for one catalog entry.
///
/// With a base seed the entry's name is mixed in, so an entry regenerated on its own
/// reproduces the same bytes as when the whole catalog is generated.
pub fn case_seed(base: Option<u64>, name: &str) -> u64 {
    match base {
        Some(base) => base ^ fnv1a64(name.as_bytes()),
        None => rand::random(),
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, (low, high): (f64, f64)) -> f32 {
    rng.gen_range(low..high) as f32
}

fn linspace_at(index: usize, len: usize, (start, stop): (f64, f64)) -> f32 {
    if len <= 1 {
        return start as f32;
    }
    if index + 1 == len {
        return stop as f32;
    }
    let step = (stop - start) / (len - 1) as f64;
    (start + index as f64 * step) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_classes_stay_in_range() {
        let cases = [
            (DistributionClass::Random, RANDOM_RANGE),
            (DistributionClass::SmallValues, SMALL_RANGE),
            (DistributionClass::Default, FALLBACK_RANGE),
        ];
        for (class, (low, high)) in cases {
            let values = generate_values(class, 4096, 0xC0FFEE);
            assert_eq!(values.len(), 4096);
            assert!(
                values
                    .iter()
                    .all(|&v| (low as f32) <= v && v <= (high as f32)),
                "{class} produced a value outside [{low}, {high}]"
            );
        }
    }

    #[test]
    fn extreme_probes_only_above_threshold() {
        let values = generate_values(DistributionClass::Extreme, 101, 9);
        assert_eq!(&values[..3], &EXTREME_PROBES);
        assert!(values[3..].iter().all(|v| v.abs() <= 100.0));

        let values = generate_values(DistributionClass::Extreme, 100, 9);
        assert!(values.iter().all(|v| v.abs() <= 100.0));
    }

    #[test]
    fn uniform_is_exactly_one() {
        let values = generate_values(DistributionClass::Uniform, 1000, 1);
        assert!(values.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn ascending_hits_both_endpoints() {
        let values = generate_values(DistributionClass::Ascending, 1001, 0);
        assert_eq!(values[0], -5.0);
        assert!(values[500].abs() < 1e-6);
        assert_eq!(values[1000], 5.0);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));

        assert_eq!(generate_values(DistributionClass::Ascending, 1, 0), vec![-5.0]);
        assert_eq!(
            generate_values(DistributionClass::Ascending, 2, 0),
            vec![-5.0, 5.0]
        );
    }

    #[test]
    fn batch_size_does_not_change_sequence() {
        let whole = generate_values(DistributionClass::Extreme, 1234, 77);
        let mut synth = VectorSynth::new(DistributionClass::Extreme, 1234, 77);
        let mut streamed = Vec::new();
        let mut batch = Vec::new();
        while synth.next_batch(&mut batch, 97) > 0 {
            streamed.extend_from_slice(&batch);
        }
        assert_eq!(whole, streamed);
        assert_eq!(synth.remaining(), 0);
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let a = generate_values(DistributionClass::Random, 256, 0xA11CE);
        let b = generate_values(DistributionClass::Random, 256, 0xA11CE);
        let c = generate_values(DistributionClass::Random, 256, 0xA11CF);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn case_seed_depends_on_name_when_based() {
        assert_eq!(case_seed(Some(42), "small_random"), case_seed(Some(42), "small_random"));
        assert_ne!(case_seed(Some(42), "small_random"), case_seed(Some(42), "ascending"));
    }
}
