use crate::builder::BuildStats;
use serde::Serialize;

/// Opening marker every generated file starts with.
pub const PHP_OPEN_TAG: &str = "<?php\n";

#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub output: String,
    pub stats: BuildStats,
}
