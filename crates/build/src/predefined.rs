//! Predefined render graphs.
//!
//! Maps each predefined graph's name to its manifest under the workspace root.
//! Every entry is expected to compile against
//! [`PassRegistry::with_standard_types`](crate::registry::PassRegistry::with_standard_types).

/// Predefined graph manifests, mapping a graph name to its manifest file.
///
/// Manifests are either YAML or written in the script dialect (`.py`); the
/// format is picked from the extension.
pub const PREDEFINED_GRAPHS: &[(&str, &str)] = &[
    // Path tracers
    ("MinimalPathTracerShadowMap", "graphs/minimal_path_tracer_shadow_map.yaml"),
    ("TransparencyPathTracer", "graphs/transparency_path_tracer.yaml"),
    // Reservoir resampling with and without denoising
    ("ReSTIR_GI", "graphs/restir_gi.yaml"),
    ("ReSTIRFG_NRD_DEBUG", "graphs/restir_fg_nrd_debug.py"),
    ("ReStirExp", "graphs/restir_exp_denoise.py"),
    // Photon resampling, composited or denoised
    ("Photon_ReSTIR_NRD_DLSS", "graphs/photon_restir_nrd_dlss.py"),
    ("VPL_PhotonReSTIR", "graphs/vpl_photon_restir.py"),
    ("VPL_PhotonReSTIRTransmission", "graphs/vpl_photon_restir_transmission.py"),
    // Debug views
    ("Wireframe", "graphs/wireframe.py"),
];
