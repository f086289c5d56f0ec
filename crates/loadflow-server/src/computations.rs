//! Named computations that can be submitted as tasks.
//!
//! The scheduler never looks inside a computation: it receives the request
//! body as JSON and hands back whatever JSON the computation returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail};
use serde::Deserialize;
use serde_json::Value;

pub trait Computation: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs to completion on a blocking thread.
    fn run(&self, input: Value) -> anyhow::Result<Value>;
}

#[derive(Clone, Default)]
pub struct ComputationRegistry {
    computations: HashMap<&'static str, Arc<dyn Computation>>,
}

impl ComputationRegistry {
    pub fn new(
        computations: impl IntoIterator<Item = Arc<dyn Computation>>,
    ) -> anyhow::Result<Self> {
        let mut mapped = HashMap::new();
        for computation in computations {
            let name = computation.name();
            if mapped.insert(name, computation).is_some() {
                bail!("duplicate computation registration for '{name}'");
            }
        }
        Ok(Self {
            computations: mapped,
        })
    }

    /// Registry with the generic computations shipped with the server.
    pub fn with_builtins() -> anyhow::Result<Self> {
        Self::new(builtins())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Computation>> {
        self.computations.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.computations.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

pub fn builtins() -> Vec<Arc<dyn Computation>> {
    vec![Arc::new(Echo), Arc::new(Delay)]
}

/// Returns its input unchanged.
pub struct Echo;

impl Computation for Echo {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn run(&self, input: Value) -> anyhow::Result<Value> {
        Ok(input)
    }
}

/// Longest sleep a `delay` request may ask for.
pub const MAX_DELAY_MILLIS: u64 = 60_000;

/// Blocks for `millis` (at most [`MAX_DELAY_MILLIS`]) and then returns `value`.
pub struct Delay;

#[derive(Debug, Deserialize)]
struct DelayInput {
    millis: u64,
    #[serde(default)]
    value: Value,
}

impl Computation for Delay {
    fn name(&self) -> &'static str {
        "delay"
    }

    fn run(&self, input: Value) -> anyhow::Result<Value> {
        let input: DelayInput = serde_json::from_value(input)
            .map_err(|error| anyhow!("invalid delay input: {error}"))?;
        if input.millis > MAX_DELAY_MILLIS {
            bail!(
                "invalid delay input: {} ms exceeds the {MAX_DELAY_MILLIS} ms limit",
                input.millis
            );
        }
        std::thread::sleep(Duration::from_millis(input.millis));
        Ok(input.value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::{Computation, ComputationRegistry, Delay, Echo, MAX_DELAY_MILLIS};

    #[test]
    fn builtins_are_listed_in_name_order() {
        let registry = ComputationRegistry::with_builtins().unwrap();
        assert_eq!(registry.names(), vec!["delay", "echo"]);
        assert!(registry.get("echo").is_some());
        assert!(registry.get("power-flow").is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let computations: Vec<Arc<dyn Computation>> = vec![Arc::new(Echo), Arc::new(Echo)];
        let error = ComputationRegistry::new(computations).err().unwrap();
        assert!(error.to_string().contains("echo"));
    }

    #[test]
    fn delay_returns_value_and_rejects_malformed_input() {
        let output = Delay.run(json!({"millis": 1, "value": [1, 2]})).unwrap();
        assert_eq!(output, json!([1, 2]));

        let error = Delay.run(json!({"value": 3})).unwrap_err();
        assert!(error.to_string().starts_with("invalid delay input"));
    }

    #[test]
    fn delay_rejects_sleeps_beyond_the_limit() {
        let error = Delay
            .run(json!({"millis": MAX_DELAY_MILLIS + 1, "value": 1}))
            .unwrap_err();
        assert!(error.to_string().contains("exceeds"));

        let registry = ComputationRegistry::with_builtins().unwrap();
        assert!(registry.get("delay").is_some());
    }
}
