use std::fs;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use swapcalc_prices::Configuration as PriceConfiguration;

use crate::core::context::environment::{JSONPath, Variables};
use crate::core::Error;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerbosityConfiguration {
    Debug,
    #[default]
    Info,
}

impl FromStr for VerbosityConfiguration {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(VerbosityConfiguration::Debug),
            "info" => Ok(VerbosityConfiguration::Info),
            _ => Ok(VerbosityConfiguration::Debug),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub verbosity: VerbosityConfiguration,
    #[serde(default)]
    pub price: PriceConfiguration,
}

impl Configuration {
    pub fn from_profile(profile: &Profile) -> Result<Self, Error> {
        let data = serde_json::to_string(&profile.0).map_err(|e| Error::Configuration(e.to_string()))?;

        serde_json::from_str(&data).map_err(|e| Error::Configuration(e.to_string()))
    }
}

/// Raw configuration tree, merged layer by layer before being deserialized.
#[derive(Clone, Debug, Deserialize)]
pub struct Profile(Map<String, Value>);

impl Profile {
    pub fn empty() -> Self {
        Self(Map::new())
    }

    pub fn from_configuration(configuration: &Configuration) -> Result<Self, Error> {
        match serde_json::to_value(configuration).map_err(|e| Error::Configuration(e.to_string()))? {
            Value::Object(variables) => Ok(Self(variables)),
            _ => Err(Error::Configuration("configuration is not an object".to_string())),
        }
    }

    pub fn from_file(path: &str) -> Result<Self, Error> {
        let data = fs::read(path).map_err(|e| Error::Configuration(format!("{}: {}", path, e)))?;
        let variables: Map<String, Value> = serde_json::from_slice(&data).map_err(|e| Error::Configuration(format!("{}: {}", path, e)))?;

        Ok(Self(variables))
    }

    pub fn merge(&mut self, profile: &Profile) {
        #[rustfmt::skip]
        fn merge_rec(profile: &mut Map<String, Value>, other: &Map<String, Value>) {
            for (k, v) in other {
                match (profile.get_mut(k), v) {
                    (Some(Value::Object(a_obj)), Value::Object(b_obj)) => { merge_rec(a_obj, b_obj); },
                    _ => { profile.insert(k.clone(), v.clone()); },
                }
            }
        }

        merge_rec(&mut self.0, &profile.0)
    }

    pub fn insert_variables(&mut self, variables: Variables) -> Result<(), Error> {
        for (key, value) in variables.into_iter() {
            self.insert_variable(key, value)?
        }

        Ok(())
    }

    pub fn insert_variable(&mut self, path: JSONPath, value: Value) -> Result<(), Error> {
        fn insert_rec(object: &mut Map<String, Value>, path: &[String], value: Value) -> Result<(), Error> {
            let Some((head, tail)) = path.split_first() else {
                return Ok(());
            };

            if tail.is_empty() {
                object.insert(head.to_string(), value);
                return Ok(());
            }

            let inner = object
                .entry(head.to_string())
                .or_insert(Value::Object(Map::new()))
                .as_object_mut()
                .ok_or(Error::Configuration(format!("could not merge variable {} in configuration", head)))?;

            insert_rec(inner, tail, value)
        }

        insert_rec(&mut self.0, &path, value)
    }
}
