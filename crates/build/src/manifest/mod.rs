//! Graph manifests
//!
//! A [`GraphManifest`] is the serialized form of a [`RenderGraph`]. It can be
//! written as YAML, JSON, or in the script dialect used by the authoring tools
//! (see [`script`]). Manifests only name pass types; they are checked against a
//! [`PassRegistry`] when turned into a graph.

pub mod script;

use crate::config::ConfigMap;
use crate::error::CompileError;
use crate::graph::RenderGraph;
use crate::registry::PassRegistry;
use crate::resource::Extent;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while reading or writing manifests
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid YAML manifest: {0}")]
    Yaml(#[from] serde_norway::Error),
    #[error("invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Graph(#[from] CompileError),
}

/// Serialization formats a manifest can be stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Yaml,
    Json,
    Script,
}

impl ManifestFormat {
    /// Picks the format from a file extension, defaulting to YAML
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|extension| extension.to_str()) {
            Some("json") => Self::Json,
            Some("py") => Self::Script,
            _ => Self::Yaml,
        }
    }
}

/// A pass instance declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassDecl {
    pub instance: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "enabled_by_default", skip_serializing_if = "is_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub config: ConfigMap,
}

fn enabled_by_default() -> bool {
    true
}

fn is_enabled(enabled: &bool) -> bool {
    *enabled
}

/// An edge declaration, both ends written `"Pass.socket"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeDecl {
    pub src: String,
    pub dst: String,
}

/// Declarative description of a render graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_extent: Option<Extent>,
    #[serde(default)]
    pub passes: Vec<PassDecl>,
    #[serde(default)]
    pub edges: Vec<EdgeDecl>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl GraphManifest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reference_extent: None,
            passes: Vec::new(),
            edges: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn from_yaml(yaml_content: &str) -> Result<Self, ManifestError> {
        Ok(serde_norway::from_str(yaml_content)?)
    }

    pub fn from_json(json_content: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(json_content)?)
    }

    pub fn from_script(source: &str) -> Result<Self, ManifestError> {
        script::parse(source)
    }

    pub fn parse(content: &str, format: ManifestFormat) -> Result<Self, ManifestError> {
        match format {
            ManifestFormat::Yaml => Self::from_yaml(content),
            ManifestFormat::Json => Self::from_json(content),
            ManifestFormat::Script => Self::from_script(content),
        }
    }

    /// Loads a manifest file, choosing the format from its extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content, ManifestFormat::from_path(&path))
    }

    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        Ok(serde_norway::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String, ManifestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_script(&self) -> String {
        script::emit(self)
    }

    pub fn emit(&self, format: ManifestFormat) -> Result<String, ManifestError> {
        match format {
            ManifestFormat::Yaml => self.to_yaml(),
            ManifestFormat::Json => self.to_json(),
            ManifestFormat::Script => Ok(self.to_script()),
        }
    }

    /// Builds a graph, creating every pass through `registry`
    ///
    /// Passes are added first, then edges, then output marks, each in
    /// declaration order; the first failing operation aborts.
    pub fn to_graph(&self, registry: &PassRegistry) -> Result<RenderGraph, CompileError> {
        let mut graph = RenderGraph::new(&self.name);
        if let Some(extent) = self.reference_extent {
            graph.set_reference_extent(extent);
        }
        for pass in &self.passes {
            let instance = registry.create(&pass.type_name, &pass.instance, pass.config.clone())?;
            graph.add_pass(instance.with_enabled(pass.enabled))?;
        }
        for edge in &self.edges {
            graph.add_edge(&edge.src, &edge.dst)?;
        }
        for output in &self.outputs {
            graph.mark_output(output)?;
        }
        Ok(graph)
    }

    /// Describes an existing graph; only author-supplied configuration values are kept
    pub fn from_graph(graph: &RenderGraph) -> Self {
        let extent = graph.reference_extent();
        Self {
            name: graph.name().to_string(),
            reference_extent: (extent != Extent::default()).then_some(extent),
            passes: graph
                .passes()
                .iter()
                .map(|pass| PassDecl {
                    instance: pass.name().to_string(),
                    type_name: pass.type_name().to_string(),
                    enabled: pass.is_enabled(),
                    config: pass.overrides().clone(),
                })
                .collect(),
            edges: graph
                .edges()
                .iter()
                .map(|edge| EdgeDecl {
                    src: edge.src.to_string(),
                    dst: edge.dst.to_string(),
                })
                .collect(),
            outputs: graph.outputs().iter().map(|output| output.to_string()).collect(),
        }
    }

    /// Compares two manifests ignoring declaration order
    pub fn is_equivalent(&self, other: &Self) -> bool {
        fn sorted_passes(manifest: &GraphManifest) -> Vec<(&str, &str, bool, Vec<(&str, &crate::config::ConfigValue)>)> {
            let mut passes: Vec<_> = manifest
                .passes
                .iter()
                .map(|pass| {
                    let mut config: Vec<_> = pass.config.iter().collect();
                    config.sort_by(|a, b| a.0.cmp(b.0));
                    (pass.instance.as_str(), pass.type_name.as_str(), pass.enabled, config)
                })
                .collect();
            passes.sort_by(|a, b| a.0.cmp(b.0));
            passes
        }

        fn sorted<T: Ord + Clone>(items: &[T]) -> Vec<T> {
            let mut items = items.to_vec();
            items.sort();
            items
        }

        self.name == other.name
            && self.reference_extent.unwrap_or_default() == other.reference_extent.unwrap_or_default()
            && sorted_passes(self) == sorted_passes(other)
            && sorted(&self.edges) == sorted(&other.edges)
            && sorted(&self.outputs) == sorted(&other.outputs)
    }
}

/// Loads a manifest file and builds its graph
pub fn load_graph<P: AsRef<Path>>(path: P, registry: &PassRegistry) -> Result<RenderGraph, ManifestError> {
    let manifest = GraphManifest::from_file(path)?;
    Ok(manifest.to_graph(registry)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;

    const MINIMAL: &str = r#"
name: MinimalPathTracerShadowMap
passes:
  - instance: VBufferRT
    type: VBufferRT
    config:
      sampleCount: 16
      useDOF: true
  - instance: MinimalPathTracerShadowMap
    type: MinimalPathTracerShadowMap
    config:
      maxBounces: 3
  - instance: AccumulatePass
    type: AccumulatePass
  - instance: ToneMapper
    type: ToneMapper
    config:
      exposureCompensation: 0.0
      operator: Aces
edges:
  - { src: VBufferRT.vbuffer, dst: MinimalPathTracerShadowMap.vbuffer }
  - { src: VBufferRT.viewW, dst: MinimalPathTracerShadowMap.viewW }
  - { src: MinimalPathTracerShadowMap.color, dst: AccumulatePass.input }
  - { src: AccumulatePass.output, dst: ToneMapper.src }
outputs:
  - ToneMapper.dst
  - AccumulatePass.output
"#;

    #[test]
    fn test_parse_yaml_manifest() {
        let manifest = GraphManifest::from_yaml(MINIMAL).unwrap();
        assert_eq!(manifest.name, "MinimalPathTracerShadowMap");
        assert_eq!(manifest.passes.len(), 4);
        assert!(manifest.passes.iter().all(|pass| pass.enabled));
        assert_eq!(manifest.passes[0].config.get("sampleCount"), Some(&ConfigValue::Int(16)));
        assert_eq!(manifest.passes[3].config.get("exposureCompensation"), Some(&ConfigValue::Float(0.0)));
        assert_eq!(manifest.edges[3], EdgeDecl {
            src: "AccumulatePass.output".to_string(),
            dst: "ToneMapper.src".to_string(),
        });
        assert_eq!(manifest.reference_extent, None);
    }

    #[test]
    fn test_manifest_builds_graph() {
        let registry = PassRegistry::with_standard_types();
        let manifest = GraphManifest::from_yaml(MINIMAL).unwrap();
        let graph = manifest.to_graph(&registry).unwrap();
        assert_eq!(graph.passes().len(), 4);
        assert_eq!(graph.edges().len(), 4);
        assert_eq!(graph.outputs().len(), 2);
        assert_eq!(graph.pass("ToneMapper").unwrap().config().get_bool("clamp"), Some(true));

        let described = GraphManifest::from_graph(&graph);
        assert_eq!(described, manifest);
    }

    #[test]
    fn test_manifest_reports_graph_errors() {
        let registry = PassRegistry::with_standard_types();
        let mut manifest = GraphManifest::from_yaml(MINIMAL).unwrap();
        manifest.edges.push(EdgeDecl {
            src: "VBufferRT.mvec".to_string(),
            dst: "ToneMapper.src".to_string(),
        });
        assert!(matches!(manifest.to_graph(&registry), Err(CompileError::InputAlreadyBound { .. })));

        let mut manifest = GraphManifest::from_yaml(MINIMAL).unwrap();
        manifest.passes[0].type_name = "VBufferRaster".to_string();
        assert!(matches!(manifest.to_graph(&registry), Err(CompileError::UnknownPassType { .. })));
    }

    #[test]
    fn test_yaml_and_json_round_trip() {
        let mut manifest = GraphManifest::from_yaml(MINIMAL).unwrap();
        manifest.reference_extent = Some(Extent::new(1280, 720));
        manifest.passes[2].enabled = false;

        let yaml = manifest.to_yaml().unwrap();
        assert!(yaml.contains("enabled: false"));
        assert_eq!(GraphManifest::from_yaml(&yaml).unwrap(), manifest);

        let json = manifest.to_json().unwrap();
        assert_eq!(GraphManifest::from_json(&json).unwrap(), manifest);
    }

    #[test]
    fn test_equivalence_ignores_order() {
        let manifest = GraphManifest::from_yaml(MINIMAL).unwrap();
        let mut shuffled = manifest.clone();
        shuffled.passes.reverse();
        shuffled.edges.reverse();
        shuffled.outputs.reverse();
        assert!(manifest.is_equivalent(&shuffled));

        shuffled.outputs.pop();
        assert!(!manifest.is_equivalent(&shuffled));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ManifestFormat::from_path("graphs/a.yaml"), ManifestFormat::Yaml);
        assert_eq!(ManifestFormat::from_path("graphs/a.json"), ManifestFormat::Json);
        assert_eq!(ManifestFormat::from_path("scripts/a.py"), ManifestFormat::Script);
    }
}
