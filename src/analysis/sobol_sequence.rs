//! Sobol low-discrepancy sequence.
//!
//! Gray-code construction (Antonov & Saleev) with the Joe & Kuo
//! `new-joe-kuo-6.21201` direction numbers, 32-bit resolution. The first
//! point is the origin. An optional digital shift XORs every coordinate with
//! a fixed random word, which keeps the low-discrepancy structure while
//! decorrelating repeated runs.

use crate::model::EeiError;

const BITS: usize = 32;

/// Primitive polynomial data for dimensions 2..=10: (degree s, coefficient
/// word a, initial direction integers m_1..m_s).
const JOE_KUO: [(u32, u32, &[u32]); 9] = [
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
    (5, 4, &[1, 1, 5, 5, 5]),
    (5, 7, &[1, 1, 7, 11, 19]),
];

/// Highest supported dimension.
pub const MAX_DIMENSIONS: usize = JOE_KUO.len() + 1;

/// An iterator over points of the unit hypercube `[0, 1)^d`.
#[derive(Debug, Clone)]
pub struct SobolSequence {
    directions: Vec<[u32; BITS]>,
    state: Vec<u32>,
    shift: Vec<u32>,
    index: u64,
}

impl SobolSequence {
    /// Creates an unscrambled sequence of dimension `dims`.
    pub fn new(dims: usize) -> Result<Self, EeiError> {
        Self::with_shift(dims, vec![0; dims])
    }

    /// Creates a sequence whose coordinates are XORed with `shift`.
    pub fn with_shift(dims: usize, shift: Vec<u32>) -> Result<Self, EeiError> {
        if dims == 0 || dims > MAX_DIMENSIONS {
            return Err(EeiError::Analysis(format!(
                "Sobol sequence supports 1 to {} dimensions, got {}",
                MAX_DIMENSIONS, dims
            )));
        }
        if shift.len() != dims {
            return Err(EeiError::Analysis(format!(
                "digital shift has {} words for {} dimensions",
                shift.len(),
                dims
            )));
        }

        let directions = (0..dims).map(direction_numbers).collect();
        Ok(Self {
            directions,
            state: vec![0; dims],
            shift,
            index: 0,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.state.len()
    }

    /// Discards the next `n` points.
    pub fn skip_points(&mut self, n: u64) {
        for _ in 0..n {
            if self.advance().is_none() {
                break;
            }
        }
    }

    /// Returns the current point and moves the state to the next one.
    fn advance(&mut self) -> Option<Vec<f64>> {
        if self.index >= (1u64 << BITS) - 1 {
            return None;
        }
        let scale = 1.0 / (1u64 << BITS) as f64;
        let point = self
            .state
            .iter()
            .zip(&self.shift)
            .map(|(&x, &s)| f64::from(x ^ s) * scale)
            .collect();

        // Gray code: flip the direction number at the lowest zero bit of index.
        let bit = (!self.index).trailing_zeros() as usize;
        for (x, v) in self.state.iter_mut().zip(&self.directions) {
            *x ^= v[bit];
        }
        self.index += 1;
        Some(point)
    }
}

impl Iterator for SobolSequence {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

/// Direction numbers v_1..v_32 for a zero-based dimension, left-aligned in
/// a 32-bit word.
fn direction_numbers(dim: usize) -> [u32; BITS] {
    let mut v = [0u32; BITS];
    if dim == 0 {
        for (k, slot) in v.iter_mut().enumerate() {
            *slot = 1 << (BITS - 1 - k);
        }
        return v;
    }

    let (s, a, m) = JOE_KUO[dim - 1];
    let s = s as usize;
    for k in 0..s {
        v[k] = m[k] << (BITS - 1 - k);
    }
    for k in s..BITS {
        let mut value = v[k - s] ^ (v[k - s] >> s);
        for l in 1..s {
            if (a >> (s - 1 - l)) & 1 == 1 {
                value ^= v[k - l];
            }
        }
        v[k] = value;
    }
    v
}
