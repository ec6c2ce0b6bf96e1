//! Encoders that lift domain values into SDM bit-vector space.
//!
//! Three codecs are provided, one per input kind:
//!
//! - **Text** — positional multi-hash: each character sets three bit
//!   positions derived from `(char, position)` with distinct mixing
//!   constants. Density grows with text length; decoding is diagnostic
//!   only (the hash is not invertible).
//! - **Scalar** — thermometer code: a value in `[min, max]` sets a prefix
//!   of the vector proportional to its normalised magnitude. Monotone and
//!   tolerant of single-bit noise.
//! - **Sequence** — segmented thermometer: the vector is split into equal
//!   segments, one per element, each thermometer-coded from `[-1, 1]`.
//!
//! [`Encoding`] and [`Value`] expose the same codecs as a variant set for
//! hosts that marshal dynamically typed input.

use crate::error::{Result, SdmError};
use crate::store::SparseMemory;
use crate::vector::BitVector;

/// Default maximum sequence length (characters or elements).
pub const DEFAULT_SEQUENCE_LENGTH: usize = 32;

/// Encoding variants for dynamically typed input.
#[derive(Clone, Copy, Debug)]
pub enum Encoding {
    /// Positional multi-hash text encoding
    Text,
    /// Thermometer code over `[min, max]`
    Scalar { min: f32, max: f32 },
    /// Segmented thermometer over `[-1, 1]` elements
    Sequence,
}

/// A domain value to encode, or the result of a decode.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Text(String),
    Scalar(f32),
    Sequence(Vec<f32>),
}

/// Bidirectional mapping between domain values and bit-vectors.
#[derive(Clone, Copy, Debug)]
pub struct Encoder {
    vector_dim: usize,
    sequence_length: usize,
}

impl Encoder {
    /// Create an encoder producing vectors of the given dimensionality.
    pub fn new(vector_dim: usize) -> Self {
        Self {
            vector_dim,
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
        }
    }

    /// Create an encoder matching a store's configured dimension.
    pub fn for_store(store: &SparseMemory) -> Self {
        Self::new(store.config().dim())
    }

    /// Override the maximum sequence length.
    pub fn with_sequence_length(mut self, sequence_length: usize) -> Self {
        self.sequence_length = sequence_length;
        self
    }

    /// The dimensionality of produced vectors.
    pub fn dimensions(&self) -> usize {
        self.vector_dim
    }

    /// Encode a dynamically typed value. The value kind must match the
    /// encoding variant.
    pub fn encode(&self, value: &Value, encoding: Encoding) -> Result<BitVector> {
        match (encoding, value) {
            (Encoding::Text, Value::Text(text)) => Ok(self.encode_text(text)),
            (Encoding::Scalar { min, max }, Value::Scalar(x)) => {
                Ok(self.encode_scalar(*x, min, max))
            }
            (Encoding::Sequence, Value::Sequence(seq)) => Ok(self.encode_sequence(seq)),
            (Encoding::Text, _) => Err(SdmError::EncodingMismatch { expected: "text" }),
            (Encoding::Scalar { .. }, _) => Err(SdmError::EncodingMismatch { expected: "scalar" }),
            (Encoding::Sequence, _) => Err(SdmError::EncodingMismatch { expected: "sequence" }),
        }
    }

    /// Decode a vector under the given encoding variant.
    pub fn decode(&self, vector: &BitVector, encoding: Encoding) -> Value {
        match encoding {
            Encoding::Text => Value::Text(self.decode_text(vector)),
            Encoding::Scalar { min, max } => Value::Scalar(self.decode_scalar(vector, min, max)),
            Encoding::Sequence => Value::Sequence(self.decode_sequence(vector)),
        }
    }

    /// Encode text as a positional multi-hash vector.
    ///
    /// Each of the first `sequence_length` bytes sets three bit positions
    /// computed from `(byte, position)` with distinct multiplicative
    /// constants, OR-combined into the output.
    pub fn encode_text(&self, text: &str) -> BitVector {
        let d = self.vector_dim;
        let mut bits = vec![0u8; d];

        for (i, c) in text.bytes().take(self.sequence_length).enumerate() {
            let c = c as usize;
            // Three hashes per character for redundancy
            bits[(c * 17 + i * 31) % d] = 1;
            bits[(c * 23 + i * 47) % d] = 1;
            bits[(c * 41 + i * 53) % d] = 1;
        }

        BitVector::from_bits(bits)
    }

    /// Diagnostic inverse of [`encode_text`](Encoder::encode_text).
    ///
    /// The positional hash is not invertible; this reports the number of
    /// set bits for observability only.
    pub fn decode_text(&self, vector: &BitVector) -> String {
        format!("Decoded_{}_bits", vector.count_ones())
    }

    /// Thermometer-encode a scalar from `[min, max]`.
    ///
    /// The value is clamped, normalised to `[0, 1]`, and the bits
    /// `[0, ⌊normalised · (D−1)⌋]` are set.
    pub fn encode_scalar(&self, value: f32, min: f32, max: f32) -> BitVector {
        let d = self.vector_dim;
        let normalized = ((value - min) / (max - min)).clamp(0.0, 1.0);
        let position = (normalized * (d - 1) as f32) as usize;

        let mut bits = vec![0u8; d];
        for bit in bits.iter_mut().take(position + 1) {
            *bit = 1;
        }
        BitVector::from_bits(bits)
    }

    /// Decode a thermometer-coded scalar: the highest set bit determines
    /// the normalised magnitude.
    pub fn decode_scalar(&self, vector: &BitVector, min: f32, max: f32) -> f32 {
        let mut highest = 0usize;
        for (i, &bit) in vector.bits().iter().enumerate() {
            if bit == 1 {
                highest = i;
            }
        }
        let normalized = highest as f32 / (self.vector_dim - 1) as f32;
        min + normalized * (max - min)
    }

    /// Encode a sequence of `[-1, 1]` values as a segmented thermometer.
    ///
    /// The vector is partitioned into `sequence_length` segments of
    /// `D / sequence_length` bits; element `k` fills a prefix of segment
    /// `k` proportional to its normalised value. An empty sequence yields
    /// the zero vector.
    pub fn encode_sequence(&self, sequence: &[f32]) -> BitVector {
        let d = self.vector_dim;
        let mut bits = vec![0u8; d];
        if sequence.is_empty() {
            return BitVector::from_bits(bits);
        }

        let segment = d / self.sequence_length;
        for (k, &value) in sequence.iter().take(self.sequence_length).enumerate() {
            let normalized = ((value + 1.0) / 2.0).clamp(0.0, 1.0);
            let fill = (normalized * segment as f32) as usize;
            let start = k * segment;
            for bit in bits.iter_mut().skip(start).take(fill) {
                *bit = 1;
            }
        }

        BitVector::from_bits(bits)
    }

    /// Decode a segmented thermometer back to `sequence_length` values.
    ///
    /// Each segment's active-bit fraction maps back onto `[-1, 1]`.
    pub fn decode_sequence(&self, vector: &BitVector) -> Vec<f32> {
        let segment = self.vector_dim / self.sequence_length;
        let mut sequence = Vec::with_capacity(self.sequence_length);

        for k in 0..self.sequence_length {
            let start = k * segment;
            let active = vector.bits()[start..start + segment]
                .iter()
                .filter(|&&b| b == 1)
                .count();
            let normalized = if segment == 0 {
                0.0
            } else {
                active as f32 / segment as f32
            };
            sequence.push(normalized * 2.0 - 1.0);
        }

        sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_deterministic() {
        let encoder = Encoder::new(128);
        let a = encoder.encode_text("HELLO");
        let b = encoder.encode_text("HELLO");
        assert_eq!(a, b);
        assert_eq!(a.dimensions(), 128);
        assert!(a.count_ones() > 0);
    }

    #[test]
    fn test_text_density_grows_with_length() {
        let encoder = Encoder::new(256);
        let short = encoder.encode_text("AB");
        let long = encoder.encode_text("ABCDEFGHIJKLMNOP");
        assert!(long.count_ones() > short.count_ones());
    }

    #[test]
    fn test_text_truncates_at_sequence_length() {
        let encoder = Encoder::new(128).with_sequence_length(4);
        let a = encoder.encode_text("ABCD");
        let b = encoder.encode_text("ABCDEFGH");
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_text_reports_bit_count() {
        let encoder = Encoder::new(128);
        let v = BitVector::from_positions(128, &[0, 5, 9]);
        assert_eq!(encoder.decode_text(&v), "Decoded_3_bits");
    }

    #[test]
    fn test_scalar_round_trip_within_step() {
        let encoder = Encoder::new(64);
        let (min, max) = (-100.0, 100.0);
        let step = (max - min) / 63.0;

        for x in [-100.0f32, -33.3, 0.0, 12.5, 50.0, 99.0, 100.0] {
            let decoded = encoder.decode_scalar(&encoder.encode_scalar(x, min, max), min, max);
            assert!(
                (decoded - x).abs() <= step,
                "x={} decoded={} step={}",
                x,
                decoded,
                step
            );
        }
    }

    #[test]
    fn test_scalar_boundary_values() {
        let encoder = Encoder::new(64);
        let (min, max) = (-100.0, 100.0);
        for x in [-100.0f32, 0.0, 50.0, 100.0] {
            let decoded = encoder.decode_scalar(&encoder.encode_scalar(x, min, max), min, max);
            assert!((decoded - x).abs() <= 3.2, "x={} decoded={}", x, decoded);
        }
    }

    #[test]
    fn test_scalar_clamps_out_of_range() {
        let encoder = Encoder::new(64);
        let over = encoder.encode_scalar(500.0, 0.0, 100.0);
        let top = encoder.encode_scalar(100.0, 0.0, 100.0);
        assert_eq!(over, top);

        let under = encoder.encode_scalar(-500.0, 0.0, 100.0);
        let bottom = encoder.encode_scalar(0.0, 0.0, 100.0);
        assert_eq!(under, bottom);
    }

    #[test]
    fn test_scalar_monotone() {
        let encoder = Encoder::new(64);
        let low = encoder.encode_scalar(10.0, 0.0, 100.0);
        let high = encoder.encode_scalar(50.0, 0.0, 100.0);
        assert!(low.count_ones() < high.count_ones());
    }

    #[test]
    fn test_empty_sequence_is_zero_vector() {
        let encoder = Encoder::new(64);
        let v = encoder.encode_sequence(&[]);
        assert_eq!(v, BitVector::zeros(64));
    }

    #[test]
    fn test_sequence_round_trip_bound() {
        let encoder = Encoder::new(64).with_sequence_length(8);
        // Segments are 8 bits wide, so per-element error is bounded by 2/8
        let input = [-1.0f32, -0.6, -0.2, 0.0, 0.3, 0.7, 0.9, 1.0];
        let decoded = encoder.decode_sequence(&encoder.encode_sequence(&input));

        assert_eq!(decoded.len(), 8);
        for (x, y) in input.iter().zip(&decoded) {
            assert!((x - y).abs() <= 0.25, "x={} decoded={}", x, y);
        }
    }

    #[test]
    fn test_sequence_decode_length_is_fixed() {
        let encoder = Encoder::new(64).with_sequence_length(8);
        // Short input: remaining segments decode to the bottom of the range
        let decoded = encoder.decode_sequence(&encoder.encode_sequence(&[0.5]));
        assert_eq!(decoded.len(), 8);
        assert!(decoded[7] <= -1.0 + 1e-6);

        // Long input truncates
        let long: Vec<f32> = (0..20).map(|i| (i as f32 / 20.0) * 2.0 - 1.0).collect();
        assert_eq!(encoder.decode_sequence(&encoder.encode_sequence(&long)).len(), 8);
    }

    #[test]
    fn test_variant_dispatch() {
        let encoder = Encoder::new(64);

        let v = encoder
            .encode(&Value::Scalar(25.0), Encoding::Scalar { min: 0.0, max: 100.0 })
            .unwrap();
        match encoder.decode(&v, Encoding::Scalar { min: 0.0, max: 100.0 }) {
            Value::Scalar(x) => assert!((x - 25.0).abs() <= 100.0 / 63.0),
            other => panic!("expected scalar, got {:?}", other),
        }

        let err = encoder
            .encode(&Value::Text("hi".into()), Encoding::Sequence)
            .unwrap_err();
        assert!(matches!(err, SdmError::EncodingMismatch { expected: "sequence" }));
    }

    #[test]
    fn test_for_store_matches_dimension() {
        let config = crate::config::SdmConfig {
            vector_dim: 64,
            ..Default::default()
        };
        let store = SparseMemory::with_seed(config, 1);
        let encoder = Encoder::for_store(&store);
        assert_eq!(encoder.dimensions(), 64);
    }
}
