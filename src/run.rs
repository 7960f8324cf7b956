//! Per-run settings, threaded explicitly into every pass.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::graph::StringTypeMapping;

/// How string cases turn into enums.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash,
    Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EnumInference {
    /// Never make enums.
    None,
    /// Every set of observed cases becomes an enum.
    All,
    /// Decide per string from the case statistics.
    #[default]
    Infer,
}

impl EnumInference {
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::All => "all",
            Self::Infer => "infer",
        }
    }
}

impl fmt::Display for EnumInference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EnumInference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "all" => Ok(Self::All),
            "infer" => Ok(Self::Infer),
            other => Err(format!("unknown enum inference mode `{other}` (expected none, all or infer)")),
        }
    }
}

/// Everything a pass may depend on besides the graph itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunContext {
    pub string_type_mapping: StringTypeMapping,
    pub enum_inference: EnumInference,
    /// Log every old → new binding made by a rewrite.
    pub debug_print_reconstitution: bool,
}

impl RunContext {
    pub fn new(string_type_mapping: StringTypeMapping, enum_inference: EnumInference) -> Self {
        Self { string_type_mapping, enum_inference, debug_print_reconstitution: false }
    }

    pub fn with_tracing(mut self, on: bool) -> Self {
        self.debug_print_reconstitution = on;
        self
    }
}
