use framegraph_build::predefined::PREDEFINED_GRAPHS;
use framegraph_build::{CompiledSchedule, ConfigValue, GraphManifest, PassRegistry, RenderGraph, compile, load_graph};
use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn load(name: &str) -> RenderGraph {
    let (_, path) = PREDEFINED_GRAPHS.iter().find(|(graph, _)| *graph == name).unwrap();
    load_graph(workspace_root().join(path), &PassRegistry::with_standard_types()).unwrap()
}

fn order(schedule: &CompiledSchedule) -> Vec<&str> {
    schedule.passes.iter().map(|pass| pass.instance.as_str()).collect()
}

fn has_edge(schedule: &CompiledSchedule, edge: &str) -> bool {
    schedule.edges.iter().any(|e| e.to_string() == edge)
}

#[test]
fn every_predefined_graph_compiles() {
    let registry = PassRegistry::with_standard_types();
    for (name, path) in PREDEFINED_GRAPHS {
        let graph = load_graph(workspace_root().join(path), &registry).unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(graph.name(), *name);
        let schedule = compile(&graph).unwrap_or_else(|e| panic!("{name}: {e}"));
        assert!(!schedule.passes.is_empty());
        assert!(!schedule.outputs.is_empty(), "{name} has no marked outputs");
        assert!(schedule.physical_bytes() <= schedule.logical_bytes());
    }
}

#[test]
fn disabled_upscaler_and_accumulator_pass_through() {
    let graph = load("ReSTIRFG_NRD_DEBUG");
    let schedule = compile(&graph).unwrap();

    assert_eq!(order(&schedule), vec!["GBufferRT", "ReSTIR_FG", "NRD", "ModulateIllumination", "ToneMapper"]);
    assert!(has_edge(&schedule, "ModulateIllumination.output -> ToneMapper.src"));
    assert!(schedule.pass("DLSSPass").is_none());
    assert!(schedule.pass("AccumulatePass").is_none());

    let tone_mapper = schedule.pass("ToneMapper").unwrap();
    assert_eq!(tone_mapper.config.get_float("exposureCompensation"), Some(1.2999999523162842));
    let gbuffer = schedule.pass("GBufferRT").unwrap();
    assert_eq!(gbuffer.config.get_str("cull"), Some("CullBack"));
    assert_eq!(gbuffer.config.get_str("texLOD"), Some("Mip0"));
}

#[test]
fn re_enabling_the_upscaler_restores_its_wiring() {
    let mut graph = load("ReSTIRFG_NRD_DEBUG");
    graph.set_enabled("DLSSPass", true).unwrap();
    let schedule = compile(&graph).unwrap();

    let dlss = schedule.position("DLSSPass").unwrap();
    assert!(schedule.position("ModulateIllumination").unwrap() < dlss);
    assert!(dlss < schedule.position("ToneMapper").unwrap());
    assert!(has_edge(&schedule, "DLSSPass.output -> ToneMapper.src"));
    assert!(has_edge(&schedule, "GBufferRT.depth -> DLSSPass.depth"));
}

#[test]
fn transparency_branches_share_the_path_tracer_output() {
    let schedule = compile(&load("TransparencyPathTracer")).unwrap();

    assert!(has_edge(&schedule, "TransparencyPathTracer.outColor -> ToneMapper.src"));
    assert!(has_edge(&schedule, "TransparencyPathTracer.outColor -> DLSSPass.color"));
    assert!(schedule.position("DLSSPass").unwrap() < schedule.position("ToneMapper0").unwrap());

    let color = schedule.resource_of(&"TransparencyPathTracer.outColor".parse().unwrap()).unwrap();
    let last_reader = schedule.position("ToneMapper").unwrap().max(schedule.position("DLSSPass").unwrap());
    assert_eq!(color.last_use, last_reader);
    assert_eq!(schedule.outputs.len(), 2);
}

#[test]
fn marked_accumulation_lives_to_the_end() {
    let schedule = compile(&load("MinimalPathTracerShadowMap")).unwrap();
    assert_eq!(order(&schedule), vec!["VBufferRT", "MinimalPathTracerShadowMap", "AccumulatePass", "ToneMapper"]);

    let accumulated = schedule.output("AccumulatePass.output").unwrap();
    let resource = &schedule.resources[accumulated.resource];
    assert!(resource.marked);
    assert_eq!(resource.last_use, schedule.passes.len() - 1);
}

#[test]
fn legacy_wireframe_script() {
    let schedule = compile(&load("Wireframe")).unwrap();
    assert_eq!(order(&schedule), vec!["Wireframe"]);
    assert!(schedule.output("Wireframe.Out").is_some());
    assert_eq!(schedule.allocations.len(), 1);
}

#[test]
fn predefined_graphs_survive_script_round_trip() {
    for (name, path) in PREDEFINED_GRAPHS {
        let manifest = GraphManifest::from_file(workspace_root().join(path)).unwrap();
        let reparsed = GraphManifest::from_script(&manifest.to_script()).unwrap();
        assert!(manifest.is_equivalent(&reparsed), "{name} changed after a script round trip");
    }
}

#[test]
fn photon_denoising_graph_skips_the_disabled_accumulator() {
    let schedule = compile(&load("Photon_ReSTIR_NRD_DLSS")).unwrap();

    assert!(schedule.pass("AccumulatePass").is_none());
    assert!(has_edge(&schedule, "DLSSPass.output -> ToneMapper.src"));
    let accumulated = schedule.output("AccumulatePass.output").unwrap();
    assert_eq!(schedule.resources[accumulated.resource].producer.to_string(), "DLSSPass.output");

    let denoisers = schedule.passes.iter().filter(|pass| pass.type_name == "NRD").count();
    assert_eq!(denoisers, 5);
    let before = |a: &str, b: &str| schedule.position(a).unwrap() < schedule.position(b).unwrap();
    assert!(before("PhotonReSTIR", "CompositeReStirNRD"));
    assert!(before("NRDReflectionMotionVectors", "NRDDeltaReflection"));
    assert!(before("NRDTransmissionMotionVectors", "NRDDeltaTransmission"));
    assert!(before("ModulateIllumination", "DLSSPass"));
    assert!(before("DLSSPass", "ToneMapper"));

    let options = schedule.pass("RTXDIPass").unwrap().config.get_object("options").unwrap();
    assert_eq!(options.type_name, "RTXDIOptions");
    assert_eq!(options.get("mode"), Some(&ConfigValue::String("SpatiotemporalResampling".to_string())));
    assert_eq!(options.get("depthThreshold"), Some(&ConfigValue::Float(0.10000000149011612)));
    assert_eq!(options.get("spatialIterations"), Some(&ConfigValue::Int(5)));
}

#[test]
fn vpl_graphs_composite_before_tone_mapping() {
    let schedule = compile(&load("VPL_PhotonReSTIR")).unwrap();
    assert!(has_edge(&schedule, "Composite.out -> ToneMapper.src"));
    assert!(has_edge(&schedule, "RTXDIPass.color -> Composite.A"));
    assert!(has_edge(&schedule, "PhotonReSTIRVPL.color -> Composite.B"));

    let schedule = compile(&load("VPL_PhotonReSTIRTransmission")).unwrap();
    assert!(has_edge(&schedule, "Composite0.out -> ToneMapper.src"));
    assert!(schedule.position("Composite").unwrap() < schedule.position("Composite0").unwrap());
    assert_eq!(schedule.pass("Composite0").unwrap().config.get_str("mode"), Some("Multiply"));
    assert_eq!(schedule.pass("Composite").unwrap().config.get_str("outputFormat"), Some("RGBA32Float"));
}

#[test]
fn restir_exp_denoises_diffuse_only_output() {
    let schedule = compile(&load("ReStirExp")).unwrap();
    assert_eq!(order(&schedule), vec!["GBufferRaster", "ReStirExp", "NRD", "ToneMapper"]);
    assert!(has_edge(&schedule, "NRD.filteredDiffuseRadianceHitDist -> ToneMapper.src"));
    assert!(schedule.resource_of(&"NRD.filteredSpecularRadianceHitDist".parse().unwrap()).is_none());
    assert_eq!(schedule.pass("GBufferRaster").unwrap().config.get_str("cull"), Some("CullBack"));
}
