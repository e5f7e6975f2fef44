use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::operation::{OpKind, Operation};
use crate::types::Value;

/// Value written by generated `write` operations unless overridden.
pub const DEFAULT_WRITE_VALUE: Value = 1;

/// Relative weight of one operation category inside a mix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MixWeight {
    pub op: OpKind,
    pub weight: f64,
}

/// Named weighted distribution over operation categories.
///
/// Weights are relative; they are normalized by their sum when sampled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadMix {
    pub name: String,
    pub weights: Vec<MixWeight>,
}

impl WorkloadMix {
    pub fn new(name: impl Into<String>, weights: impl IntoIterator<Item = (OpKind, f64)>) -> Self {
        Self {
            name: name.into(),
            weights: weights
                .into_iter()
                .map(|(op, weight)| MixWeight { op, weight })
                .collect(),
        }
    }

    /// Builds a mix from weights listed in [`OpKind::ALL`] order.
    pub fn from_weights(name: impl Into<String>, weights: [f64; 7]) -> Self {
        Self::new(name, OpKind::ALL.into_iter().zip(weights))
    }

    /// The three mixes measured by the benchmark.
    pub fn presets() -> [WorkloadMix; 3] {
        [
            Self::from_weights("a-given", [10.0, 10.0, 10.0, 10.0, 40.0, 5.0, 15.0]),
            Self::from_weights("b-equal", [1.0; 7]),
            Self::from_weights("c-skewed", [60.0, 5.0, 5.0, 5.0, 5.0, 5.0, 15.0]),
        ]
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    /// Normalized probability of `op`, summing duplicate entries.
    pub fn probability(&self, op: OpKind) -> f64 {
        let total = self.total_weight();
        if !total.is_finite() || total <= 0.0 {
            return 0.0;
        }
        self.weights
            .iter()
            .filter(|w| w.op == op)
            .map(|w| w.weight)
            .sum::<f64>()
            / total
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.weights.is_empty() {
            return Err(ConfigError::EmptyMix {
                mix: self.name.clone(),
            });
        }
        if let Some(bad) = self
            .weights
            .iter()
            .find(|w| !w.weight.is_finite() || w.weight < 0.0)
        {
            return Err(ConfigError::InvalidWeight {
                mix: self.name.clone(),
                kind: bad.op,
                weight: bad.weight,
            });
        }
        let total = self.total_weight();
        if !total.is_finite() {
            return Err(ConfigError::NonFiniteTotalWeight {
                mix: self.name.clone(),
            });
        }
        if total <= 0.0 {
            return Err(ConfigError::ZeroTotalWeight {
                mix: self.name.clone(),
            });
        }
        Ok(())
    }
}

/// Draws operations independently from a [`WorkloadMix`].
///
/// The generator holds no randomness of its own; callers pass the RNG so a
/// seeded [`StdRng`](rand::rngs::StdRng) reproduces a sequence exactly.
#[derive(Debug, Clone)]
pub struct WorkloadGenerator {
    mix_name: String,
    kinds: Vec<OpKind>,
    dist: WeightedIndex<f64>,
    write_value: Value,
}

impl WorkloadGenerator {
    pub fn new(mix: &WorkloadMix) -> Result<Self, ConfigError> {
        mix.validate()?;
        let dist = WeightedIndex::new(mix.weights.iter().map(|w| w.weight)).map_err(|err| {
            ConfigError::Distribution {
                mix: mix.name.clone(),
                reason: err.to_string(),
            }
        })?;

        Ok(Self {
            mix_name: mix.name.clone(),
            kinds: mix.weights.iter().map(|w| w.op).collect(),
            dist,
            write_value: DEFAULT_WRITE_VALUE,
        })
    }

    pub fn with_write_value(mut self, value: Value) -> Self {
        self.write_value = value;
        self
    }

    pub fn mix_name(&self) -> &str {
        &self.mix_name
    }

    pub fn next_op<R: Rng + ?Sized>(&self, rng: &mut R) -> Operation {
        self.kinds[self.dist.sample(rng)].to_operation(self.write_value)
    }

    /// Exactly `count` independently drawn operations.
    pub fn generate<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Operation> {
        (0..count).map(|_| self.next_op(rng)).collect()
    }

    /// One independent sequence per worker, drawn from the same RNG stream.
    pub fn generate_per_worker<R: Rng + ?Sized>(
        &self,
        workers: usize,
        count: usize,
        rng: &mut R,
    ) -> Vec<Vec<Operation>> {
        (0..workers).map(|_| self.generate(count, rng)).collect()
    }
}

/// Convenience wrapper: validate `mix` and draw `count` operations from it.
pub fn generate<R: Rng + ?Sized>(
    mix: &WorkloadMix,
    count: usize,
    rng: &mut R,
) -> Result<Vec<Operation>, ConfigError> {
    Ok(WorkloadGenerator::new(mix)?.generate(count, rng))
}
