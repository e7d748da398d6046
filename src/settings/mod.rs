//! Application settings
//!
//! Dispatcher limits, event bus sizing and the environment facts handed to
//! `Enrich` transforms.

mod loader;

pub use loader::load_config;

use agora_core::DispatcherConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub event_bus: EventBusConfig,
    /// Add host facts (os, arch, workdir) to the dispatcher environment
    #[serde(default = "default_true")]
    pub include_environment: bool,
}

/// Event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> usize {
    256
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherConfig::default(),
            event_bus: EventBusConfig::default(),
            include_environment: true,
        }
    }
}

impl AppConfig {
    /// Dispatcher settings with host facts merged in when enabled.
    ///
    /// Facts set explicitly in configuration win over detected ones.
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        let mut dispatcher = self.dispatcher.clone();
        if self.include_environment {
            let mut facts = BTreeMap::from([
                ("os".to_string(), std::env::consts::OS.to_string()),
                ("arch".to_string(), std::env::consts::ARCH.to_string()),
                (
                    "workdir".to_string(),
                    dispatcher.workdir.display().to_string(),
                ),
            ]);
            facts.extend(std::mem::take(&mut dispatcher.environment));
            dispatcher.environment = facts;
        }
        dispatcher
    }
}
