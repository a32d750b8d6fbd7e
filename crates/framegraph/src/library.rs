//! Pass library: pass type schemas plus the factories that build pass objects

use crate::executor::RuntimeError;
use crate::pass::{NullPass, Pass};
use framegraph_build::compiler::ScheduledPass;
use framegraph_build::config::ConfigMap;
use framegraph_build::{CompileError, PassConfig, PassInstance, PassRegistry, PassType, RegistryError, catalog};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a pass object from its resolved configuration
pub type PassFactory<R> = Box<dyn Fn(&PassConfig) -> Box<dyn Pass<R>> + Send + Sync>;

/// Registry of pass types that can be instantiated at run time
///
/// Owns the [`PassRegistry`] used to build graphs, so every type that can
/// appear in a graph built through the library also has a factory.
pub struct PassLibrary<R> {
    registry: PassRegistry,
    factories: HashMap<String, PassFactory<R>>,
}

impl<R: 'static> PassLibrary<R> {
    pub fn new() -> Self {
        Self {
            registry: PassRegistry::new(),
            factories: HashMap::new(),
        }
    }

    /// A library of the standard pass types, each backed by a [`NullPass`]
    pub fn with_standard_passes() -> Self {
        let mut library = Self::new();
        for pass_type in catalog::standard_pass_types() {
            let shared = Arc::new(pass_type.clone());
            // Catalog names are unique
            let _ = library.register(pass_type, move |_: &PassConfig| Box::new(NullPass::new(Arc::clone(&shared))) as Box<dyn Pass<R>>);
        }
        library
    }

    /// Registers a pass type with the factory building its instances
    ///
    /// A later registration under the same name replaces the factory, provided
    /// the schema is identical.
    pub fn register<F>(&mut self, pass_type: PassType, factory: F) -> Result<Arc<PassType>, RegistryError>
    where
        F: Fn(&PassConfig) -> Box<dyn Pass<R>> + Send + Sync + 'static,
    {
        let registered = self.registry.register(pass_type)?;
        tracing::debug!(pass_type = registered.name(), "registered pass factory");
        self.factories.insert(registered.name().to_string(), Box::new(factory));
        Ok(registered)
    }

    /// Registers a factory, taking the schema from a throwaway instance's [`Pass::reflect`]
    ///
    /// That instance is built from an empty configuration.
    pub fn register_reflected<F>(&mut self, factory: F) -> Result<Arc<PassType>, RegistryError>
    where
        F: Fn(&PassConfig) -> Box<dyn Pass<R>> + Send + Sync + 'static,
    {
        let pass_type = factory(&PassConfig::default()).reflect();
        self.register(pass_type, factory)
    }

    pub fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Creates a pass instance for a graph; see [`PassRegistry::create`]
    pub fn create(&self, type_name: &str, instance_name: &str, config: ConfigMap) -> Result<PassInstance, CompileError> {
        self.registry.create(type_name, instance_name, config)
    }

    /// Builds the pass object for a scheduled pass
    pub fn instantiate(&self, pass: &ScheduledPass) -> Result<Box<dyn Pass<R>>, RuntimeError> {
        let factory = self.factories.get(&pass.type_name).ok_or_else(|| RuntimeError::UnknownPassType {
            type_name: pass.type_name.clone(),
        })?;
        Ok(factory(&pass.config))
    }
}

impl<R: 'static> Default for PassLibrary<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::{FrameContext, PassError, PassResources};
    use framegraph_build::{ConfigSchema, Format, OutputSocket, ResourceKind};

    struct Clear {
        value: i64,
    }

    impl Pass<u32> for Clear {
        fn reflect(&self) -> PassType {
            PassType::new("Clear")
                .output(OutputSocket::new("dst", ResourceKind::Texture, Format::R32Uint))
                .config(ConfigSchema::new().int("value", 0))
        }

        fn execute(&mut self, resources: &mut PassResources<'_, u32>, _config: &PassConfig, _frame: &FrameContext) -> Result<(), PassError> {
            *resources.require_output("dst")? = self.value as u32;
            Ok(())
        }
    }

    fn clear_factory(config: &PassConfig) -> Box<dyn Pass<u32>> {
        Box::new(Clear {
            value: config.get_int("value").unwrap_or(0),
        })
    }

    #[test]
    fn test_register_reflected_uses_reflected_schema() {
        let mut library = PassLibrary::<u32>::new();
        let pass_type = library.register_reflected(clear_factory).unwrap();
        assert_eq!(pass_type.name(), "Clear");
        assert!(library.contains("Clear"));
        assert!(library.registry().get("Clear").unwrap().find_output("dst").is_some());

        // Identical schema again is fine
        library.register_reflected(clear_factory).unwrap();
        assert_eq!(library.registry().len(), 1);
    }

    #[test]
    fn test_conflicting_schema_is_rejected() {
        let mut library = PassLibrary::<u32>::new();
        library.register_reflected(clear_factory).unwrap();
        let conflicting = PassType::new("Clear").output(OutputSocket::new("dst", ResourceKind::Texture, Format::R32Float));
        assert!(matches!(library.register(conflicting, clear_factory), Err(RegistryError::SchemaConflict { .. })));
    }

    #[test]
    fn test_instantiate_uses_resolved_config() {
        let mut library = PassLibrary::<u32>::new();
        library.register_reflected(clear_factory).unwrap();

        let mut graph = framegraph_build::RenderGraph::new("Clear");
        graph.add_pass(library.create("Clear", "C", ConfigMap::new().with("value", 7i64)).unwrap()).unwrap();
        graph.mark_output("C.dst").unwrap();
        let schedule = framegraph_build::compile(&graph).unwrap();

        let mut pass = library.instantiate(&schedule.passes[0]).unwrap();
        let mut target = 0u32;
        let mut resources = PassResources::new(Vec::new(), vec![("dst", &mut target)]);
        pass.execute(&mut resources, &schedule.passes[0].config, &FrameContext::new(0)).unwrap();
        assert_eq!(target, 7);
    }

    #[test]
    fn test_standard_passes_cover_catalog() {
        let library = PassLibrary::<u32>::with_standard_passes();
        for pass_type in catalog::standard_pass_types() {
            assert!(library.contains(pass_type.name()));
        }
    }
}
