use clap::Args;
use serde_json::Value;

use crate::core::context::configuration::{Configuration, Profile};
use crate::core::context::environment::Variables;
use crate::core::Error;

pub mod configuration;
pub mod environment;

/// Flags shared by every command. They override the profile and the environment.
#[derive(Args, Clone, Debug, Default)]
pub struct ContextParameters {
    #[clap(long, global = true, help = "Path to a JSON configuration profile")]
    pub profile: Option<String>,

    #[clap(long, global = true, help = "Log verbosity (info or debug)")]
    pub verbosity: Option<String>,

    #[clap(long, global = true, help = "Price service endpoint")]
    pub endpoint: Option<String>,

    #[clap(long, global = true, help = "Price service API key")]
    pub api_key: Option<String>,
}

impl ContextParameters {
    fn variables(&self) -> Variables {
        let mut variables = Variables::default();
        let flags = [
            ("profile", &self.profile),
            ("verbosity", &self.verbosity),
            ("price.endpoint", &self.endpoint),
            ("price.api_key", &self.api_key),
        ];

        for (path, value) in flags {
            if let Some(value) = value {
                variables.insert(path, Value::String(value.clone()));
            }
        }

        variables
    }
}

#[derive(Clone, Debug)]
pub struct Context {
    pub configuration: Configuration,
}

impl Context {
    pub fn new(configuration: Configuration) -> Context {
        Context { configuration }
    }

    pub fn load(parameters: &ContextParameters) -> Result<Self, Error> {
        Self::from_layers(Variables::from_environment()?, parameters.variables())
    }

    /// Builds the configuration from defaults, then the profile file, then the environment, then the flags.
    pub fn from_layers(mut environment: Variables, mut arguments: Variables) -> Result<Self, Error> {
        let mut complete_profile = Profile::from_configuration(&Configuration::default())?;

        let from_arguments = arguments.take("profile");
        let from_environment = environment.take("profile");
        let profile_path = from_arguments
            .or(from_environment)
            .and_then(|x| x.as_str().map(str::to_string))
            .filter(|x| !x.is_empty());

        if let Some(path) = profile_path {
            complete_profile.merge(&Profile::from_file(&path)?);
        }

        complete_profile.insert_variables(environment)?;
        complete_profile.insert_variables(arguments)?;

        Configuration::from_profile(&complete_profile).map(Self::new)
    }

    pub fn price_client(&self) -> Result<swapcalc_prices::Client, Error> {
        swapcalc_prices::Client::new(&self.configuration.price).map_err(|e| Error::Configuration(e.to_string()))
    }
}
