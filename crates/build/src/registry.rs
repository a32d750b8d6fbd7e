//! Registry of pass types
//!
//! The registry is an explicit object handed to whoever builds graphs; there is
//! no process-wide table. It maps a type name to the declared [`PassType`] and
//! creates validated [`PassInstance`]s from author-supplied configuration.

use crate::config::ConfigMap;
use crate::error::CompileError;
use crate::graph::PassInstance;
use crate::pass_type::PassType;
use std::collections::HashMap;
use std::sync::Arc;

/// Errors raised while registering pass types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("pass type '{type_name}' is already registered with a different schema")]
    SchemaConflict { type_name: String },
}

/// Maps pass type names to their declared schemas
#[derive(Debug, Clone, Default)]
pub struct PassRegistry {
    types: Vec<Arc<PassType>>,
    by_name: HashMap<String, usize>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every type in the standard catalog
    pub fn with_standard_types() -> Self {
        let mut registry = Self::new();
        for pass_type in crate::catalog::standard_pass_types() {
            // Catalog names are unique
            let _ = registry.register(pass_type);
        }
        registry
    }

    /// Registers a pass type
    ///
    /// Registering an identical type again is a no-op.
    pub fn register(&mut self, pass_type: PassType) -> Result<Arc<PassType>, RegistryError> {
        if let Some(&index) = self.by_name.get(pass_type.name()) {
            let existing = &self.types[index];
            if **existing == pass_type {
                return Ok(Arc::clone(existing));
            }
            return Err(RegistryError::SchemaConflict {
                type_name: pass_type.name().to_string(),
            });
        }

        tracing::debug!(pass_type = pass_type.name(), "registered pass type");
        let pass_type = Arc::new(pass_type);
        self.by_name.insert(pass_type.name().to_string(), self.types.len());
        self.types.push(Arc::clone(&pass_type));
        Ok(pass_type)
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<PassType>> {
        self.by_name.get(type_name).map(|&index| &self.types[index])
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.by_name.contains_key(type_name)
    }

    /// Registered types in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<PassType>> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Creates an enabled pass instance with its configuration resolved against the type's schema
    pub fn create(&self, type_name: &str, instance_name: &str, config: ConfigMap) -> Result<PassInstance, CompileError> {
        let pass_type = self.get(type_name).ok_or_else(|| CompileError::UnknownPassType {
            type_name: type_name.to_string(),
        })?;

        if !is_valid_instance_name(instance_name) {
            return Err(CompileError::InvalidInstanceName {
                name: instance_name.to_string(),
            });
        }

        let resolved = pass_type.config_schema().resolve(&config).map_err(|source| CompileError::InvalidConfig {
            instance: instance_name.to_string(),
            source,
        })?;

        Ok(PassInstance::new(Arc::clone(pass_type), instance_name, resolved, config))
    }
}

/// Instance names are identifiers: `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_instance_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, ConfigSchema, ConfigValue};
    use crate::pass_type::OutputSocket;
    use crate::resource::{Format, ResourceKind};

    fn tone_mapper() -> PassType {
        PassType::new("ToneMapper")
            .input("src", ResourceKind::Texture)
            .output(OutputSocket::new("dst", ResourceKind::Texture, Format::Rgba8Unorm))
            .config(ConfigSchema::new().bool("autoExposure", false).float_range("exposureCompensation", 0.0, -12.0, 12.0))
    }

    #[test]
    fn test_identical_registration_is_noop() {
        let mut registry = PassRegistry::new();
        registry.register(tone_mapper()).unwrap();
        registry.register(tone_mapper()).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_conflicting_registration_fails() {
        let mut registry = PassRegistry::new();
        registry.register(tone_mapper()).unwrap();
        let conflicting = PassType::new("ToneMapper").input("src", ResourceKind::Texture);
        assert_eq!(
            registry.register(conflicting),
            Err(RegistryError::SchemaConflict {
                type_name: "ToneMapper".to_string()
            })
        );
    }

    #[test]
    fn test_create_resolves_configuration() {
        let mut registry = PassRegistry::new();
        registry.register(tone_mapper()).unwrap();

        let instance = registry.create("ToneMapper", "ToneMapper", ConfigMap::new().with("autoExposure", true)).unwrap();
        assert_eq!(instance.config().get_bool("autoExposure"), Some(true));
        assert_eq!(instance.config().get_float("exposureCompensation"), Some(0.0));
        assert_eq!(instance.overrides().len(), 1);
        assert!(instance.is_enabled());
    }

    #[test]
    fn test_create_rejects_bad_input() {
        let mut registry = PassRegistry::new();
        registry.register(tone_mapper()).unwrap();

        assert_eq!(
            registry.create("Missing", "X", ConfigMap::new()).unwrap_err(),
            CompileError::UnknownPassType {
                type_name: "Missing".to_string()
            }
        );
        assert!(matches!(registry.create("ToneMapper", "1st", ConfigMap::new()), Err(CompileError::InvalidInstanceName { .. })));
        assert!(matches!(registry.create("ToneMapper", "", ConfigMap::new()), Err(CompileError::InvalidInstanceName { .. })));

        let err = registry.create("ToneMapper", "Tm", ConfigMap::new().with("exposureCompensation", 20.0)).unwrap_err();
        match err {
            CompileError::InvalidConfig { instance, source } => {
                assert_eq!(instance, "Tm");
                assert!(matches!(source, ConfigError::OutOfRange { ref key, .. } if key == "exposureCompensation"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = registry.create("ToneMapper", "Tm", ConfigMap::new().with("autoExposure", ConfigValue::Int(1))).unwrap_err();
        assert!(matches!(err, CompileError::InvalidConfig { source: ConfigError::TypeMismatch { .. }, .. }));
    }

    #[test]
    fn test_instance_names() {
        assert!(is_valid_instance_name("GBufferRT"));
        assert!(is_valid_instance_name("_pass2"));
        assert!(!is_valid_instance_name("Tone Mapper"));
        assert!(!is_valid_instance_name("a.b"));
    }
}
