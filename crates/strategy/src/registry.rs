use std::collections::BTreeMap;

use tracing::info;

use common::{Result, ScheduleConfigError};

use crate::context::RunContext;
use crate::insider_ceo::InsiderCeo;
use crate::Strategy;

type Constructor = Box<dyn Fn(&RunContext) -> Result<Box<dyn Strategy>> + Send + Sync>;

/// Maps strategy names to constructors.
pub struct StrategyRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(InsiderCeo::NAME, InsiderCeo::build);
        registry
    }
}

impl StrategyRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&RunContext) -> Result<Box<dyn Strategy>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.to_string(), Box::new(constructor));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn build(
        &self,
        name: &str,
        ctx: &RunContext,
    ) -> std::result::Result<Box<dyn Strategy>, ScheduleConfigError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ScheduleConfigError::UnknownStrategy(name.to_string()))?;
        let strategy = constructor(ctx).map_err(|e| ScheduleConfigError::Build {
            strategy: name.to_string(),
            reason: e.to_string(),
        })?;
        info!(name, "Built strategy");
        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_strategies_are_registered() {
        let registry = StrategyRegistry::default();
        assert!(registry.contains("insider_ceo"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["insider_ceo"]);
    }

    #[test]
    fn unknown_name_is_a_config_error() {
        let registry = StrategyRegistry::empty();
        let ctx = crate::runner::tests::context(std::path::Path::new("/tmp"));
        assert!(matches!(
            registry.build("nope", &ctx),
            Err(ScheduleConfigError::UnknownStrategy(name)) if name == "nope"
        ));
    }

    #[test]
    fn constructor_failure_names_the_strategy() {
        let mut registry = StrategyRegistry::empty();
        registry.register("broken", |_| Err(common::Error::Config("missing key".into())));
        let ctx = crate::runner::tests::context(std::path::Path::new("/tmp"));
        match registry.build("broken", &ctx) {
            Err(ScheduleConfigError::Build { strategy, reason }) => {
                assert_eq!(strategy, "broken");
                assert!(reason.contains("missing key"));
            }
            other => panic!("unexpected: {:?}", other.map(|s| s.name().to_string())),
        }
    }
}
