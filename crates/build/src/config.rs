//! Pass configuration schemas and resolved configurations
//!
//! Passes are configured with a dictionary of named options. Each pass type
//! declares a [`ConfigSchema`] listing its options with a typed default; the
//! registry resolves author-supplied values against it exactly once, when the
//! pass instance is created.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Structured value written as a constructor call
    Object(ConfigObject),
}

impl ConfigValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Object(_) => "object",
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value:?}"),
            Self::String(value) => write!(f, "'{value}'"),
            Self::Object(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<ConfigObject> for ConfigValue {
    fn from(value: ConfigObject) -> Self {
        Self::Object(value)
    }
}

/// Named group of fields, such as `RTXDIOptions(mode=..., spatialIterations=5)`
///
/// Serialized as a map with a single entry from the type name to the fields:
///
/// ```yaml
/// options:
///   RTXDIOptions:
///     mode: SpatiotemporalResampling
///     spatialIterations: 5
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigObject {
    pub type_name: String,
    pub fields: ConfigMap,
}

impl ConfigObject {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            fields: ConfigMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.fields.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.fields.get(key)
    }
}

impl fmt::Display for ConfigObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.type_name)?;
        for (index, (key, value)) in self.fields.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        write!(f, ")")
    }
}

impl Serialize for ConfigObject {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.type_name, &self.fields)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConfigObject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ConfigObjectVisitor;

        impl<'de> Visitor<'de> for ConfigObjectVisitor {
            type Value = ConfigObject;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map with a single type name entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let Some((type_name, fields)) = access.next_entry::<String, ConfigMap>()? else {
                    return Err(serde::de::Error::invalid_length(0, &self));
                };
                if access.next_key::<String>()?.is_some() {
                    return Err(serde::de::Error::invalid_length(2, &self));
                }
                Ok(ConfigObject { type_name, fields })
            }
        }

        deserializer.deserialize_map(ConfigObjectVisitor)
    }
}

/// Ordered key/value map, preserving the order in which keys were written
///
/// Used both for author-supplied overrides and for resolved configurations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an existing value in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        let index = self.entries.iter().position(|(existing, _)| existing == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(existing, _)| existing == key).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl Serialize for ConfigMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ConfigMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ConfigMapVisitor;

        impl<'de> Visitor<'de> for ConfigMapVisitor {
            type Value = ConfigMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of configuration options")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(ConfigMap::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = ConfigMap::new();
                while let Some((key, value)) = access.next_entry::<String, ConfigValue>()? {
                    map.insert(key, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_any(ConfigMapVisitor)
    }
}

/// Value type and constraints of a configuration option
#[derive(Debug, Clone, PartialEq)]
pub enum OptionKind {
    Bool,
    Int { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    String,
    Enum(Vec<String>),
    /// Constructor value whose fields follow a nested schema
    Object { type_name: String, schema: ConfigSchema },
}

/// A named option with its typed default
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOption {
    pub name: String,
    pub kind: OptionKind,
    pub default: ConfigValue,
}

/// Reasons a configuration value is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown option '{key}'")]
    UnknownKey { key: String },
    #[error("option '{key}' expects {expected}, found {found} {value}", found = .value.type_name())]
    TypeMismatch { key: String, expected: &'static str, value: ConfigValue },
    #[error("option '{key}' value {value} is outside [{min}, {max}]")]
    OutOfRange { key: String, value: ConfigValue, min: String, max: String },
    #[error("option '{key}' value {value} is not one of {variants:?}")]
    InvalidVariant { key: String, value: String, variants: Vec<String> },
    #[error("option '{key}' expects a {expected} value, found {found}")]
    WrongObjectType { key: String, expected: String, found: String },
}

impl ConfigError {
    /// Qualifies the offending key with the option holding it, as in `options.mode`
    fn within(mut self, parent: &str) -> Self {
        let key = match &mut self {
            Self::UnknownKey { key }
            | Self::TypeMismatch { key, .. }
            | Self::OutOfRange { key, .. }
            | Self::InvalidVariant { key, .. }
            | Self::WrongObjectType { key, .. } => key,
        };
        *key = format!("{parent}.{key}");
        self
    }
}

/// Named options accepted by a pass type, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSchema {
    options: Vec<ConfigOption>,
}

impl ConfigSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn option(mut self, name: &str, kind: OptionKind, default: ConfigValue) -> Self {
        self.options.retain(|option| option.name != name);
        self.options.push(ConfigOption {
            name: name.to_string(),
            kind,
            default,
        });
        self
    }

    pub fn bool(self, name: &str, default: bool) -> Self {
        self.option(name, OptionKind::Bool, ConfigValue::Bool(default))
    }

    pub fn int(self, name: &str, default: i64) -> Self {
        self.option(name, OptionKind::Int { min: None, max: None }, ConfigValue::Int(default))
    }

    pub fn int_range(self, name: &str, default: i64, min: i64, max: i64) -> Self {
        self.option(name, OptionKind::Int { min: Some(min), max: Some(max) }, ConfigValue::Int(default))
    }

    pub fn float(self, name: &str, default: f64) -> Self {
        self.option(name, OptionKind::Float { min: None, max: None }, ConfigValue::Float(default))
    }

    pub fn float_range(self, name: &str, default: f64, min: f64, max: f64) -> Self {
        self.option(name, OptionKind::Float { min: Some(min), max: Some(max) }, ConfigValue::Float(default))
    }

    pub fn string(self, name: &str, default: &str) -> Self {
        self.option(name, OptionKind::String, ConfigValue::String(default.to_string()))
    }

    pub fn enumeration(self, name: &str, default: &str, variants: &[&str]) -> Self {
        let variants = variants.iter().map(|variant| variant.to_string()).collect();
        self.option(name, OptionKind::Enum(variants), ConfigValue::String(default.to_string()))
    }

    /// Option whose value is a `type_name(...)` constructor with fields declared by `schema`
    pub fn object(self, name: &str, type_name: &str, schema: ConfigSchema) -> Self {
        let default = ConfigObject {
            type_name: type_name.to_string(),
            fields: schema.defaults(),
        };
        let kind = OptionKind::Object {
            type_name: type_name.to_string(),
            schema,
        };
        self.option(name, kind, ConfigValue::Object(default))
    }

    /// Every option at its default value
    pub fn defaults(&self) -> ConfigMap {
        self.options.iter().map(|option| (option.name.clone(), option.default.clone())).collect()
    }

    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    pub fn get(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|option| option.name == name)
    }

    /// Resolves author-supplied overrides against this schema
    ///
    /// The result holds every declared option, in declaration order, with
    /// defaults replaced by the validated overrides.
    pub fn resolve(&self, overrides: &ConfigMap) -> Result<PassConfig, ConfigError> {
        for (key, _) in overrides.iter() {
            if self.get(key).is_none() {
                return Err(ConfigError::UnknownKey { key: key.to_string() });
            }
        }

        let mut values = ConfigMap::new();
        for option in &self.options {
            let value = match overrides.get(&option.name) {
                Some(value) => check_value(option, value)?,
                None => option.default.clone(),
            };
            values.insert(option.name.clone(), value);
        }
        Ok(PassConfig { values })
    }
}

fn check_value(option: &ConfigOption, value: &ConfigValue) -> Result<ConfigValue, ConfigError> {
    let key = || option.name.clone();
    match (&option.kind, value) {
        (OptionKind::Bool, ConfigValue::Bool(_)) => Ok(value.clone()),
        (OptionKind::Int { min, max }, ConfigValue::Int(v)) => {
            if min.is_some_and(|min| *v < min) || max.is_some_and(|max| *v > max) {
                return Err(ConfigError::OutOfRange {
                    key: key(),
                    value: value.clone(),
                    min: min.map_or("-inf".to_string(), |min| min.to_string()),
                    max: max.map_or("inf".to_string(), |max| max.to_string()),
                });
            }
            Ok(value.clone())
        }
        (OptionKind::Float { min, max }, ConfigValue::Float(v)) => check_float(option, *v, *min, *max, value),
        (OptionKind::Float { min, max }, ConfigValue::Int(v)) => check_float(option, *v as f64, *min, *max, value),
        (OptionKind::String, ConfigValue::String(_)) => Ok(value.clone()),
        (OptionKind::Enum(variants), ConfigValue::String(v)) => {
            if variants.iter().any(|variant| variant == v) {
                Ok(value.clone())
            } else {
                Err(ConfigError::InvalidVariant {
                    key: key(),
                    value: v.clone(),
                    variants: variants.clone(),
                })
            }
        }
        (OptionKind::Object { type_name, schema }, ConfigValue::Object(object)) => {
            if object.type_name != *type_name {
                return Err(ConfigError::WrongObjectType {
                    key: key(),
                    expected: type_name.clone(),
                    found: object.type_name.clone(),
                });
            }
            let resolved = schema.resolve(&object.fields).map_err(|e| e.within(&option.name))?;
            Ok(ConfigValue::Object(ConfigObject {
                type_name: type_name.clone(),
                fields: resolved.values,
            }))
        }
        (kind, _) => Err(ConfigError::TypeMismatch {
            key: key(),
            expected: match kind {
                OptionKind::Bool => "bool",
                OptionKind::Int { .. } => "int",
                OptionKind::Float { .. } => "float",
                OptionKind::String => "string",
                OptionKind::Enum(_) => "enum variant",
                OptionKind::Object { .. } => "object",
            },
            value: value.clone(),
        }),
    }
}

fn check_float(option: &ConfigOption, v: f64, min: Option<f64>, max: Option<f64>, value: &ConfigValue) -> Result<ConfigValue, ConfigError> {
    if v.is_nan() || min.is_some_and(|min| v < min) || max.is_some_and(|max| v > max) {
        return Err(ConfigError::OutOfRange {
            key: option.name.clone(),
            value: value.clone(),
            min: min.map_or("-inf".to_string(), |min| format!("{min:?}")),
            max: max.map_or("inf".to_string(), |max| format!("{max:?}")),
        });
    }
    Ok(ConfigValue::Float(v))
}

/// Configuration of a pass instance after schema resolution
///
/// Read-only for passes; values are already validated against the schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PassConfig {
    values: ConfigMap,
}

impl PassConfig {
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            ConfigValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            ConfigValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            ConfigValue::Float(value) => Some(*value),
            ConfigValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            ConfigValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_object(&self, key: &str) -> Option<&ConfigObject> {
        match self.get(key)? {
            ConfigValue::Object(value) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter()
    }
}
