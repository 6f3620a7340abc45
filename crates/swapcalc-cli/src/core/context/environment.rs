use std::collections::hash_map::IntoIter;
use std::collections::HashMap;
use std::ops::Deref;

use serde_json::Value;

use crate::constants::ENVIRONMENT_PREFIX;
use crate::core::Error;

/// Variables that can be set from the environment, with the configuration path they fill.
const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("profile", "profile"),
    ("verbosity", "verbosity"),
    ("price_provider", "price.provider"),
    ("price_endpoint", "price.endpoint"),
    ("price_api_key", "price.api_key"),
];

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct JSONPath(Vec<String>);

impl Deref for JSONPath {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl JSONPath {
    pub fn from_str(s: &str) -> Self {
        JSONPath(s.split(".").map(|x| x.to_lowercase().to_string()).collect())
    }
}

#[derive(Debug, Default)]
pub struct Variables(HashMap<JSONPath, Value>);

impl IntoIterator for Variables {
    type Item = (JSONPath, Value);
    type IntoIter = IntoIter<JSONPath, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Variables {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(&JSONPath::from_str(key))
    }

    pub fn insert(&mut self, path: &str, value: impl Into<Value>) {
        self.0.insert(JSONPath::from_str(path), value.into());
    }

    /// Removes a variable that is not part of the configuration itself.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.0.remove(&JSONPath::from_str(key))
    }

    /// Reads every `SWAPCALC_*` variable of the process environment.
    pub fn from_environment() -> Result<Self, Error> {
        let variables = envy::prefixed(ENVIRONMENT_PREFIX)
            .from_env::<HashMap<String, String>>()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        Ok(Self::resolve(variables))
    }

    /// Maps raw `name -> value` pairs onto configuration paths. Unknown names are ignored.
    pub fn resolve(variables: HashMap<String, String>) -> Self {
        let mut resolved = Self::default();
        for (name, value) in variables {
            let name = name.to_lowercase();
            match ENVIRONMENT_VARIABLES.iter().find(|(x, _)| *x == name) {
                Some((_, path)) => resolved.insert(path, Value::String(value)),
                None => tracing::debug!(%name, "ignoring unknown environment variable"),
            }
        }

        resolved
    }
}
