use std::collections::BTreeMap;
use std::f64::consts::PI;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{ProxyError, Result};

/// Parameters a named preset fills into the plot form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionPreset {
    pub function: &'static str,
    pub x_start: f64,
    pub x_end: f64,
    pub step: f64,
}

static PRESETS: Lazy<BTreeMap<&'static str, FunctionPreset>> = Lazy::new(|| {
    BTreeMap::from([
        (
            "Volosov",
            FunctionPreset {
                function: "0.01 * x ** 2 + 50 * cos(x)",
                x_start: -10.0 * PI,
                x_end: 10.0 * PI,
                step: PI / 4.0,
            },
        ),
        (
            "Vasiliev",
            FunctionPreset {
                function: "(1 / x) * sin(x) * 50",
                x_start: -10.0,
                x_end: 10.0,
                step: 0.1,
            },
        ),
        (
            "Suryaninova",
            FunctionPreset {
                function: "x * sin(x) * sin(1000000 * x)",
                x_start: -15.0,
                x_end: 15.0,
                step: 0.3,
            },
        ),
    ])
});

pub fn get_parameters(name: &str) -> Result<&'static FunctionPreset> {
    PRESETS
        .get(name)
        .ok_or_else(|| ProxyError::PresetNotFound(name.to_string()))
}

pub fn names() -> impl Iterator<Item = &'static str> {
    PRESETS.keys().copied()
}
