//! Environment registry: maps the `--environment` name to a factory.

use arena_core::{CountingEnvironment, Environment, EnvironmentError};
use std::sync::Arc;

pub type EnvironmentFactory =
    Arc<dyn Fn(&str) -> Result<Box<dyn Environment>, EnvironmentError> + Send + Sync>;

pub fn lookup(name: &str) -> Option<EnvironmentFactory> {
    match name {
        "test" => Some(Arc::new(|config| {
            CountingEnvironment::from_config(config).map(|env| Box::new(env) as Box<dyn Environment>)
        })),
        _ => None,
    }
}

pub fn available() -> Vec<&'static str> {
    vec!["test"]
}
