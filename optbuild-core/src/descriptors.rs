//! Descriptors turn input strings into fixed-length numeric vectors.

use crate::error::{OptbuildError, Result};
use serde::{Deserialize, Serialize};

/// A featurizer applied to the input column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "parameters")]
pub enum Descriptor {
    /// Character n-grams of length `1..=n`, hashed into `n_bits` slots.
    HashedNgramFingerprint {
        #[serde(default = "default_ngram")]
        n: usize,
        #[serde(default = "default_n_bits")]
        n_bits: usize,
        /// Count occurrences instead of setting bits.
        #[serde(default)]
        counts: bool,
    },
    /// The input already holds a numeric vector (whitespace, `;` or `,` separated).
    Precomputed {},
    /// Concatenation of several descriptors.
    Composite { descriptors: Vec<Descriptor> },
}

/// Widest fingerprint accepted; every row allocates `n_bits` values.
pub const MAX_N_BITS: usize = 1 << 20;

fn default_ngram() -> usize {
    3
}

fn default_n_bits() -> usize {
    1024
}

impl Descriptor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HashedNgramFingerprint { .. } => "HashedNgramFingerprint",
            Self::Precomputed {} => "Precomputed",
            Self::Composite { .. } => "Composite",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::HashedNgramFingerprint { n, n_bits, .. } => {
                if *n == 0 || *n_bits == 0 || *n_bits > MAX_N_BITS {
                    return Err(OptbuildError::validation(format!(
                        "HashedNgramFingerprint needs n >= 1 and 1 <= n_bits <= {}, got n={} n_bits={}",
                        MAX_N_BITS, n, n_bits
                    )));
                }
                Ok(())
            }
            Self::Precomputed {} => Ok(()),
            Self::Composite { descriptors } => {
                if descriptors.is_empty() {
                    return Err(OptbuildError::validation(
                        "Composite descriptor needs at least one member",
                    ));
                }
                descriptors.iter().try_for_each(Descriptor::validate)
            }
        }
    }

    /// Featurize every input into one row of the design matrix.
    pub fn featurize(&self, inputs: &[String]) -> Result<Vec<Vec<f64>>> {
        match self {
            Self::HashedNgramFingerprint { n, n_bits, counts } => {
                self.validate()?;
                Ok(inputs
                    .iter()
                    .map(|input| hashed_ngrams(input, *n, *n_bits, *counts))
                    .collect())
            }
            Self::Precomputed {} => precomputed(inputs),
            Self::Composite { descriptors } => {
                let mut rows = vec![Vec::new(); inputs.len()];
                for descriptor in descriptors {
                    for (row, part) in rows.iter_mut().zip(descriptor.featurize(inputs)?) {
                        row.extend(part);
                    }
                }
                Ok(rows)
            }
        }
    }
}

fn hashed_ngrams(input: &str, n: usize, n_bits: usize, counts: bool) -> Vec<f64> {
    let chars: Vec<char> = input.chars().collect();
    let mut bits = vec![0.0; n_bits];
    let mut buf = String::new();
    for len in 1..=n.min(chars.len()) {
        for window in chars.windows(len) {
            buf.clear();
            buf.extend(window);
            let slot = (fnv1a(buf.as_bytes()) % n_bits as u64) as usize;
            if counts {
                bits[slot] += 1.0;
            } else {
                bits[slot] = 1.0;
            }
        }
    }
    bits
}

/// 64-bit FNV-1a; stable across platforms and releases.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ b as u64).wrapping_mul(PRIME))
}

fn precomputed(inputs: &[String]) -> Result<Vec<Vec<f64>>> {
    let mut rows = Vec::with_capacity(inputs.len());
    for (idx, input) in inputs.iter().enumerate() {
        let row = input
            .split(|c: char| c.is_whitespace() || c == ';' || c == ',')
            .filter(|tok| !tok.is_empty())
            .map(|tok| match tok.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(v),
                Ok(_) => Err(format!("non-finite value '{}'", tok)),
                Err(e) => Err(e.to_string()),
            })
            .collect::<std::result::Result<Vec<f64>, String>>()
            .map_err(|e| {
                OptbuildError::descriptor(format!("row {}: '{}': {}", idx + 1, input, e))
            })?;
        if row.is_empty() {
            return Err(OptbuildError::descriptor(format!(
                "row {}: empty precomputed vector",
                idx + 1
            )));
        }
        if let Some(first) = rows.first().map(Vec::len) {
            if row.len() != first {
                return Err(OptbuildError::descriptor(format!(
                    "row {}: expected {} values, found {}",
                    idx + 1,
                    first,
                    row.len()
                )));
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_fingerprint_shape_and_determinism() {
        let d = Descriptor::HashedNgramFingerprint {
            n: 2,
            n_bits: 32,
            counts: false,
        };
        let x = d.featurize(&inputs(&["CCO", "CCO", "c1ccccc1"])).unwrap();
        assert_eq!(x.len(), 3);
        assert!(x.iter().all(|row| row.len() == 32));
        assert_eq!(x[0], x[1]);
        assert!(x[0].iter().all(|&v| v == 0.0 || v == 1.0));
        assert!(x[0].iter().sum::<f64>() >= 1.0);
    }

    #[test]
    fn test_fingerprint_counts() {
        let d = Descriptor::HashedNgramFingerprint {
            n: 1,
            n_bits: 4096,
            counts: true,
        };
        let x = d.featurize(&inputs(&["CCC"])).unwrap();
        assert_eq!(x[0].iter().sum::<f64>(), 3.0);
        assert_eq!(x[0].iter().cloned().fold(0.0, f64::max), 3.0);
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_precomputed_parses_mixed_separators() {
        let x = Descriptor::Precomputed {}
            .featurize(&inputs(&["1.0 2.5;3", "4,5,6"]))
            .unwrap();
        assert_eq!(x, vec![vec![1.0, 2.5, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_precomputed_rejects_ragged_rows() {
        let err = Descriptor::Precomputed {}
            .featurize(&inputs(&["1 2", "3"]))
            .unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_precomputed_rejects_non_finite_values() {
        for bad in ["2 nan", "inf 1", "1 -inf", "NaN 0"] {
            let err = Descriptor::Precomputed {}
                .featurize(&inputs(&["1 2", bad]))
                .unwrap_err();
            assert!(matches!(err, OptbuildError::Descriptor(_)), "{}", bad);
            assert!(err.to_string().contains("row 2"), "{}", err);
        }
    }

    #[test]
    fn test_fingerprint_width_is_bounded() {
        let wide = Descriptor::HashedNgramFingerprint {
            n: 3,
            n_bits: MAX_N_BITS + 1,
            counts: false,
        };
        assert!(matches!(wide.validate(), Err(OptbuildError::Validation(_))));
        assert!(wide.featurize(&inputs(&["CCO"])).is_err());

        let widest = Descriptor::HashedNgramFingerprint {
            n: 1,
            n_bits: MAX_N_BITS,
            counts: false,
        };
        assert!(widest.validate().is_ok());
    }

    #[test]
    fn test_composite_concatenates() {
        let d = Descriptor::Composite {
            descriptors: vec![
                Descriptor::Precomputed {},
                Descriptor::HashedNgramFingerprint {
                    n: 1,
                    n_bits: 8,
                    counts: false,
                },
            ],
        };
        let x = d.featurize(&inputs(&["1 2"])).unwrap();
        assert_eq!(x[0].len(), 10);
        assert_eq!(&x[0][..2], &[1.0, 2.0]);
    }

    #[test]
    fn test_serde_shape() {
        let d: Descriptor = serde_json::from_value(serde_json::json!({
            "name": "HashedNgramFingerprint",
            "parameters": {"n_bits": 128}
        }))
        .unwrap();
        assert_eq!(
            d,
            Descriptor::HashedNgramFingerprint {
                n: 3,
                n_bits: 128,
                counts: false
            }
        );
        let json = serde_json::to_value(Descriptor::Precomputed {}).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Precomputed", "parameters": {}})
        );
    }

    #[test]
    fn test_validate_rejects_empty_composite() {
        let d = Descriptor::Composite {
            descriptors: vec![],
        };
        assert!(d.validate().is_err());
    }
}
