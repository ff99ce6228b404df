//! Process settings, loaded the way the teacher loads them: a `Settings`
//! struct deriving `serde::Deserialize`, implementing
//! `blockscout_service_launcher::launcher::ConfigSettings` (env-prefixed
//! overrides via the `config` crate), built once at startup via
//! `Settings::build()`.

use std::path::PathBuf;

use blockscout_service_launcher::launcher::ConfigSettings;
use blockscout_service_launcher::tracing::{JaegerSettings, TracingSettings};
use serde::{Deserialize, Serialize};

use crate::config::SignerConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Path to the `chains.json`-shaped file describing mainnet, this
    /// agent's own S-chain, and its sibling S-chains (`spec.md` §6).
    pub chains_config: PathBuf,

    /// Which signer backend the agent submits transactions with
    /// (`spec.md` §4.5, §6).
    pub signer: SignerConfig,

    #[serde(default)]
    pub m2s: crate::config::DirectionOptions,
    #[serde(default)]
    pub s2m: crate::config::DirectionOptions,
    #[serde(default)]
    pub s2s: crate::config::DirectionOptions,

    /// Optional external signature-collector service URL. Omitted in test
    /// mode, where the stub collector is used instead (`spec.md` §4.6).
    #[serde(default)]
    pub signature_collector_url: Option<String>,

    #[serde(default)]
    pub tracing: TracingSettings,
    #[serde(default)]
    pub jaeger: JaegerSettings,
}

impl ConfigSettings for Settings {
    const SERVICE_NAME: &'static str = "IMA_RELAY";
}
