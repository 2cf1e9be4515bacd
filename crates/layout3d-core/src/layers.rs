use crate::model::LayerKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("layer '{name}' ({layer}/{datatype}): z_top {z_top} is below z_bottom {z_bottom}")]
    InvertedZRange {
        name: String,
        layer: u16,
        datatype: u16,
        z_bottom: f64,
        z_top: f64,
    },

    #[error("layer '{name}': z range must be finite")]
    NonFiniteZ { name: String },

    #[error("layer {layer}/{datatype} is mapped by both '{first}' and '{second}'")]
    DuplicateMapping {
        layer: u16,
        datatype: u16,
        first: String,
        second: String,
    },

    #[error("invalid color '{0}', expected #RRGGBB")]
    InvalidColor(String),

    #[error("layer '{name}' needs either z_end or thickness")]
    MissingTop { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn parse_hex(s: &str) -> Result<Self, ConfigError> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ConfigError::InvalidColor(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ConfigError::InvalidColor(s.to_string()))
        };
        Ok(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    pub fn to_unit(self) -> [f64; 3] {
        [
            f64::from(self.r) / 255.0,
            f64::from(self.g) / 255.0,
            f64::from(self.b) / 255.0,
        ]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgb::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRule {
    pub source_layer: u16,
    pub source_datatype: u16,
    pub name: String,
    pub z_bottom: f64,
    pub z_top: f64,
    pub material: String,
    pub color: Rgb,
    pub enabled: bool,
}

impl LayerRule {
    pub fn key(&self) -> LayerKey {
        LayerKey::new(self.source_layer, self.source_datatype)
    }

    pub fn thickness(&self) -> f64 {
        self.z_top - self.z_bottom
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.z_bottom.is_finite() || !self.z_top.is_finite() {
            return Err(ConfigError::NonFiniteZ {
                name: self.name.clone(),
            });
        }
        if self.z_top < self.z_bottom {
            return Err(ConfigError::InvertedZRange {
                name: self.name.clone(),
                layer: self.source_layer,
                datatype: self.source_datatype,
                z_bottom: self.z_bottom,
                z_top: self.z_top,
            });
        }
        Ok(())
    }
}

/// Validated, immutable layer stack. Shapes whose `(layer, datatype)` has no rule
/// are not part of the 3D model.
#[derive(Debug, Clone, Default)]
pub struct LayerStackTable {
    rules: Vec<LayerRule>,
    index: HashMap<LayerKey, usize>,
}

impl LayerStackTable {
    pub fn new(rules: Vec<LayerRule>) -> Result<Self, ConfigError> {
        let mut index = HashMap::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            rule.validate()?;
            if let Some(&prev) = index.get(&rule.key()) {
                let first: &LayerRule = &rules[prev];
                return Err(ConfigError::DuplicateMapping {
                    layer: rule.source_layer,
                    datatype: rule.source_datatype,
                    first: first.name.clone(),
                    second: rule.name.clone(),
                });
            }
            index.insert(rule.key(), i);
        }
        Ok(Self { rules, index })
    }

    pub fn rules(&self) -> &[LayerRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn lookup_index(&self, key: LayerKey) -> Option<usize> {
        self.index.get(&key).copied()
    }

    pub fn lookup(&self, key: LayerKey) -> Option<&LayerRule> {
        self.lookup_index(key).map(|i| &self.rules[i])
    }

    pub fn enabled_rules(&self) -> impl Iterator<Item = &LayerRule> {
        self.rules.iter().filter(|r| r.enabled)
    }
}

fn default_enabled() -> bool {
    true
}

/// One entry of a layer stack file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerEntry {
    pub gds_layer: u16,
    #[serde(default)]
    pub gds_datatype: u16,
    pub name: String,
    pub z_start: f64,
    #[serde(default)]
    pub z_end: Option<f64>,
    #[serde(default)]
    pub thickness: Option<f64>,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub color: Rgb,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl LayerEntry {
    /// `z_end` wins over `z_start + thickness` when both are given.
    pub fn to_rule(&self) -> Result<LayerRule, ConfigError> {
        let z_top = match (self.z_end, self.thickness) {
            (Some(z_end), _) => z_end,
            (None, Some(t)) => self.z_start + t,
            (None, None) => {
                return Err(ConfigError::MissingTop {
                    name: self.name.clone(),
                })
            }
        };
        Ok(LayerRule {
            source_layer: self.gds_layer,
            source_datatype: self.gds_datatype,
            name: self.name.clone(),
            z_bottom: self.z_start,
            z_top,
            material: self.material.clone(),
            color: self.color,
            enabled: self.enabled,
        })
    }
}

/// A layer stack file: `{ "project"?, "units"?, "layers": [..] }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerStackConfig {
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    pub layers: Vec<LayerEntry>,
}

impl LayerStackConfig {
    pub fn into_table(self) -> Result<LayerStackTable, ConfigError> {
        let rules = self
            .layers
            .iter()
            .map(LayerEntry::to_rule)
            .collect::<Result<Vec<_>, _>>()?;
        LayerStackTable::new(rules)
    }
}
