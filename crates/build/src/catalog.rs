//! Schemas of the standard pass types
//!
//! These are the pass types referenced by the predefined graphs under `graphs/`.
//! Only their interfaces live here; implementations are supplied at run time
//! through the pass library.

use crate::config::ConfigSchema;
use crate::pass_type::{OutputSocket, PassType};
use crate::resource::{Format, OutputSize, ResourceKind};

use ResourceKind::{Depth, Texture};

fn texture(name: &str, format: Format) -> OutputSocket {
    OutputSocket::new(name, Texture, format)
}

fn output_size(schema: ConfigSchema) -> ConfigSchema {
    schema.enumeration(OutputSize::OPTION, "Default", OutputSize::VARIANTS)
}

/// Options shared by the ray traced V-buffer and G-buffer passes
fn gbuffer_options() -> ConfigSchema {
    output_size(ConfigSchema::new())
        .enumeration("samplePattern", "Center", &["Center", "DirectX", "Halton", "Stratified"])
        .int_range("sampleCount", 16, 1, 1024)
        .bool("useAlphaTest", true)
        .bool("adjustShadingNormals", true)
        .bool("forceCullMode", false)
        .enumeration("cull", "Back", &["None", "Front", "Back", "CullNone", "CullFront", "CullBack"])
        .bool("useTraceRayInline", false)
        .bool("useDOF", true)
}

pub fn vbuffer_rt() -> PassType {
    PassType::new("VBufferRT")
        .output(texture("vbuffer", Format::Rg32Uint))
        .output(OutputSocket::new("depth", Depth, Format::D32Float).optional())
        .output(texture("mvec", Format::Rg32Float).optional())
        .output(texture("viewW", Format::Rgba32Float).optional())
        .output(texture("time", Format::R32Uint).optional())
        .output(texture("mask", Format::R32Float).optional())
        .config(gbuffer_options())
}

pub fn gbuffer_rt() -> PassType {
    PassType::new("GBufferRT")
        .output(texture("posW", Format::Rgba32Float).optional())
        .output(texture("normW", Format::Rgba32Float).optional())
        .output(texture("tangentW", Format::Rgba32Float).optional())
        .output(texture("faceNormalW", Format::Rgba32Float).optional())
        .output(texture("texC", Format::Rg32Float).optional())
        .output(texture("mtlData", Format::Rgba32Uint).optional())
        .output(texture("vbuffer", Format::Rg32Uint).optional())
        .output(OutputSocket::new("depth", Depth, Format::D32Float).optional())
        .output(texture("linearZ", Format::Rg32Float).optional())
        .output(texture("mvec", Format::Rg32Float).optional())
        .output(texture("mvecW", Format::Rgba16Float).optional())
        .output(texture("normWRoughnessMaterialID", Format::Rgba16Float).optional())
        .output(texture("viewW", Format::Rgba32Float).optional())
        .output(texture("diffuseOpacity", Format::Rgba32Float).optional())
        .output(texture("specRough", Format::Rgba32Float).optional())
        .output(texture("emissive", Format::Rgba32Float).optional())
        .config(gbuffer_options().enumeration("texLOD", "Mip0", &["Mip0", "RayCones", "RayDiffs"]))
}

pub fn gbuffer_raster() -> PassType {
    PassType::new("GBufferRaster")
        .output(texture("posW", Format::Rgba32Float).optional())
        .output(texture("normW", Format::Rgba32Float).optional())
        .output(texture("tangentW", Format::Rgba32Float).optional())
        .output(texture("faceNormalW", Format::Rgba32Float).optional())
        .output(texture("texC", Format::Rg32Float).optional())
        .output(texture("texGrads", Format::Rgba16Float).optional())
        .output(texture("mtlData", Format::Rgba32Uint).optional())
        .output(texture("vbuffer", Format::Rg32Uint).optional())
        .output(OutputSocket::new("depth", Depth, Format::D32Float))
        .output(texture("mvec", Format::Rg32Float).optional())
        .output(texture("viewW", Format::Rgba32Float).optional())
        .output(texture("diffuseOpacity", Format::Rgba32Float).optional())
        .output(texture("specRough", Format::Rgba32Float).optional())
        .output(texture("emissive", Format::Rgba32Float).optional())
        .config(gbuffer_options())
}

/// V-buffer of the photon mapping passes, with the guide buffers their denoisers read
pub fn vbuffer_pm() -> PassType {
    const GUIDES: &[(&str, Format)] = &[
        ("mvec", Format::Rg32Float),
        ("viewW", Format::Rgba32Float),
        ("linearDepth", Format::R32Float),
        ("throughput", Format::Rgba32Float),
        ("emissive", Format::Rgba32Float),
        ("NRDMask", Format::R32Float),
        ("FirstHitLinZ", Format::R32Float),
        ("normWRoughMat", Format::Rgba16Float),
        ("NRDDiffuseReflectance", Format::Rgba16Float),
        ("NRDSpecularReflectance", Format::Rgba16Float),
        ("NRDFirstPosW", Format::Rgba32Float),
        ("NRDDeltaReflectionHitDistance", Format::R32Float),
        ("NRDDeltaReflectionNormWRoughMat", Format::Rgba16Float),
        ("NRDDeltaReflectionReflectance", Format::Rgba16Float),
        ("NRDDeltaReflectionEmission", Format::Rgba16Float),
        ("NRDDeltaTransmissionPosW", Format::Rgba32Float),
        ("NRDDeltaTransmissionNormWRoughMat", Format::Rgba16Float),
        ("NRDDeltaTransmissionReflectance", Format::Rgba16Float),
        ("NRDDeltaTransmissionEmission", Format::Rgba16Float),
    ];

    let mut pass_type = PassType::new("VBufferPM")
        .output(texture("vbuffer", Format::Rg32Uint))
        .output(OutputSocket::new("depth", Depth, Format::D32Float).optional());
    for (name, format) in GUIDES {
        pass_type = pass_type.output(texture(name, *format).optional());
    }
    pass_type.config(
        output_size(ConfigSchema::new())
            .int_range("samplePattern", 0, 0, 3)
            .float_range("specRoughCutoff", 0.5, 0.0, 1.0)
            .int_range("sampleCount", 16, 1, 1024)
            .bool("useAlphaTest", true)
            .bool("adjustShadingNormals", true),
    )
}

pub fn rtxdi_pass() -> PassType {
    let options = ConfigSchema::new()
        .enumeration(
            "mode",
            "SpatiotemporalResampling",
            &["NoResampling", "SpatialResampling", "TemporalResampling", "SpatiotemporalResampling"],
        )
        .int_range("presampledTileCount", 128, 1, 1024)
        .int_range("presampledTileSize", 1024, 256, 8192)
        .bool("storeCompactLightInfo", true)
        .int_range("localLightCandidateCount", 24, 0, 256)
        .int_range("infiniteLightCandidateCount", 8, 0, 256)
        .int_range("envLightCandidateCount", 8, 0, 256)
        .int_range("brdfCandidateCount", 1, 0, 256)
        .float_range("brdfCutoff", 0.0, 0.0, 1.0)
        .bool("testCandidateVisibility", true)
        .enumeration("biasCorrection", "Basic", &["Off", "Basic", "Pairwise", "RayTraced"])
        .float_range("depthThreshold", 0.1, 0.0, 1.0)
        .float_range("normalThreshold", 0.5, 0.0, 1.0)
        .float_range("samplingRadius", 30.0, 0.0, 200.0)
        .int_range("spatialSampleCount", 1, 1, 32)
        .int_range("spatialIterations", 5, 0, 10)
        .int_range("maxHistoryLength", 20, 0, 100)
        .float_range("boilingFilterStrength", 0.0, 0.0, 1.0)
        .float_range("rayEpsilon", 1.0e-3, 0.0, 1.0)
        .bool("useEmissiveTextures", false)
        .bool("enableVisibilityShortcut", false)
        .bool("enablePermutationSampling", false);

    PassType::new("RTXDIPass")
        .input("vbuffer", Texture)
        .optional_input("texGrads", Texture)
        .optional_input("mvec", Texture)
        .optional_input("viewDir", Texture)
        .optional_input("pathLength", Texture)
        .output(texture("color", Format::Rgba32Float).optional())
        .output(texture("emission", Format::Rgba32Float).optional())
        .output(texture("diffuseIllumination", Format::Rgba32Float).optional())
        .output(texture("diffuseReflectance", Format::Rgba32Float).optional())
        .output(texture("specularIllumination", Format::Rgba32Float).optional())
        .output(texture("specularReflectance", Format::Rgba32Float).optional())
        .config(ConfigSchema::new().object("options", "RTXDIOptions", options))
}

/// Photon based reservoir resampling
pub fn photon_restir() -> PassType {
    PassType::new("PhotonReSTIR")
        .input("VBuffer", Texture)
        .optional_input("MVec", Texture)
        .optional_input("View", Texture)
        .optional_input("RayDistance", Texture)
        .output(texture("color", Format::Rgba32Float).optional())
        .output(texture("diffuseIllumination", Format::Rgba32Float).optional())
        .output(texture("specularIllumination", Format::Rgba32Float).optional())
}

/// Photon resampling over virtual point lights
pub fn photon_restir_vpl() -> PassType {
    PassType::new("PhotonReSTIRVPL")
        .input("VBuffer", Texture)
        .optional_input("MVec", Texture)
        .optional_input("View", Texture)
        .optional_input("RayDepth", Texture)
        .output(texture("color", Format::Rgba32Float))
}

pub fn restir_exp() -> PassType {
    PassType::new("ReStirExp")
        .input("vbuffer", Texture)
        .optional_input("mVec", Texture)
        .optional_input("view", Texture)
        .optional_input("linZ", Texture)
        .output(texture("color", Format::Rgba32Float).optional())
        .output(texture("diffuseReflectance", Format::Rgba16Float).optional())
        .output(texture("specularReflectance", Format::Rgba16Float).optional())
}

/// Splits resampled lighting into the radiance/hit distance signals the denoisers expect
pub fn composite_restir_nrd() -> PassType {
    const INPUTS: &[&str] = &[
        "ReStirDiffuse",
        "ReStirSpecular",
        "PhotonReStirDiffuse",
        "PhotonReStirSpecular",
        "NRDMask",
        "throughput",
        "DeltaReflectionReflectance",
        "DeltaReflectionEmission",
        "TransmissionReflectance",
        "TransmissionEmission",
    ];
    const OUTPUTS: &[&str] = &[
        "NRDDiffuseRadianceHitDistance",
        "NRDSpecularRadianceHitDistance",
        "NRDDeltaReflectionRadianceHitDistance",
        "NRDDeltaTransmissionRadianceHitDistance",
    ];

    let mut pass_type = PassType::new("CompositeReStirNRD");
    for input in INPUTS {
        pass_type = pass_type.optional_input(input, Texture);
    }
    for output in OUTPUTS {
        pass_type = pass_type.output(texture(output, Format::Rgba16Float).optional());
    }
    pass_type
}

/// Blends two images; when disabled, `A` passes through
pub fn composite() -> PassType {
    PassType::new("Composite")
        .optional_input("A", Texture)
        .optional_input("B", Texture)
        .output(texture("out", Format::Rgba32Float))
        .bypass("A", "out")
        .config(
            ConfigSchema::new()
                .enumeration("mode", "Add", &["Add", "Multiply"])
                .float("scaleA", 1.0)
                .float("scaleB", 1.0)
                .enumeration("outputFormat", "Unknown", &["Unknown", "RGBA32Float", "RGBA16Float", "RGBA8Unorm"]),
        )
}

pub fn tone_mapper() -> PassType {
    PassType::new("ToneMapper")
        .input("src", Texture)
        .output(texture("dst", Format::Rgba8Unorm))
        .config(
            output_size(ConfigSchema::new())
                .bool("useSceneMetadata", true)
                .float_range("exposureCompensation", 0.0, -12.0, 12.0)
                .bool("autoExposure", false)
                .float_range("filmSpeed", 100.0, 1.0, 6400.0)
                .bool("whiteBalance", false)
                .float_range("whitePoint", 6500.0, 1905.0, 25000.0)
                .enumeration("operator", "Aces", &["Linear", "Reinhard", "ReinhardModified", "HejiHableAlu", "HableUc2", "Aces"])
                .bool("clamp", true)
                .float_range("whiteMaxLuminance", 1.0, 0.1, 1.0e4)
                .float_range("whiteScale", 11.2, 0.0, 100.0)
                .float_range("fNumber", 1.0, 0.1, 100.0)
                .float_range("shutter", 1.0, 0.1, 1.0e4)
                .enumeration("exposureMode", "AperturePriority", &["AperturePriority", "ShutterPriority"]),
        )
}

pub fn accumulate_pass() -> PassType {
    PassType::new("AccumulatePass")
        .input("input", Texture)
        .output(texture("output", Format::Rgba32Float))
        .config(
            output_size(ConfigSchema::new())
                .bool("autoReset", true)
                .enumeration("precisionMode", "Single", &["Double", "Single", "SingleCompensated"])
                .int_range("maxFrameCount", 0, 0, i64::from(u32::MAX))
                .enumeration("overflowMode", "Stop", &["Stop", "Reset", "EMA"])
                .int_range("subFrameCount", 0, 0, i64::from(u32::MAX))
                .int_range("maxAccumulatedFrames", 0, 0, i64::from(u32::MAX)),
        )
}

/// Upscaler; when disabled its color input passes straight through to its output
pub fn dlss_pass() -> PassType {
    PassType::new("DLSSPass")
        .input("color", Texture)
        .input("depth", Depth)
        .input("mvec", Texture)
        .output(texture("output", Format::Rgba32Float))
        .bypass("color", "output")
        .config(
            output_size(ConfigSchema::new())
                .enumeration("profile", "Balanced", &["MaxPerf", "Balanced", "MaxQuality"])
                .enumeration("motionVectorScale", "Relative", &["Absolute", "Relative"])
                .bool("isHDR", true)
                .bool("useJitteredMV", false)
                .float_range("sharpness", 0.0, -1.0, 1.0)
                .float_range("exposure", 0.0, -10.0, 10.0),
        )
}

pub fn nrd() -> PassType {
    let schema = output_size(ConfigSchema::new())
        .enumeration(
            "method",
            "RelaxDiffuseSpecular",
            &["RelaxDiffuseSpecular", "RelaxDiffuse", "ReblurDiffuseSpecular", "SpecularReflectionMv", "SpecularDeltaMv"],
        )
        .bool("worldSpaceMotion", true)
        .float("disocclusionThreshold", 2.0)
        .float("maxIntensity", 1000.0)
        .float("diffusePrepassBlurRadius", 16.0)
        .float("specularPrepassBlurRadius", 16.0)
        .int("diffuseMaxAccumulatedFrameNum", 31)
        .int("specularMaxAccumulatedFrameNum", 31)
        .int("diffuseMaxFastAccumulatedFrameNum", 2)
        .int("specularMaxFastAccumulatedFrameNum", 2)
        .float("diffusePhiLuminance", 2.0)
        .float("specularPhiLuminance", 1.0)
        .float_range("diffuseLobeAngleFraction", 0.8, 0.0, 1.0)
        .float_range("specularLobeAngleFraction", 0.9, 0.0, 1.0)
        .float_range("roughnessFraction", 0.5, 0.0, 1.0)
        .float("diffuseHistoryRejectionNormalThreshold", 0.0)
        .float("specularVarianceBoost", 1.0)
        .float("specularLobeAngleSlack", 10.0)
        .float("disocclusionFixEdgeStoppingNormalPower", 8.0)
        .float("disocclusionFixMaxRadius", 32.0)
        .int("disocclusionFixNumFramesToFix", 4)
        .float("historyClampingColorBoxSigmaScale", 2.0)
        .int("spatialVarianceEstimationHistoryThreshold", 4)
        .int_range("atrousIterationNum", 6, 2, 8)
        .float("minLuminanceWeight", 0.0)
        .float("depthThreshold", 0.02)
        .float("luminanceEdgeStoppingRelaxation", 0.5)
        .float("normalEdgeStoppingRelaxation", 0.3)
        .float("roughnessEdgeStoppingRelaxation", 0.3)
        .bool("enableAntiFirefly", false)
        .bool("enableReprojectionTestSkippingWithoutMotion", false)
        .bool("enableSpecularVirtualHistoryClamping", false)
        .bool("enableRoughnessEdgeStopping", true)
        .bool("enableMaterialTestForDiffuse", false)
        .bool("enableMaterialTestForSpecular", false);

    PassType::new("NRD")
        .optional_input("diffuseRadianceHitDist", Texture)
        .optional_input("specularRadianceHitDist", Texture)
        .optional_input("specularHitDist", Texture)
        .optional_input("viewZ", Texture)
        .optional_input("normWRoughnessMaterialID", Texture)
        .input("mvec", Texture)
        .optional_input("deltaPrimaryPosW", Texture)
        .optional_input("deltaSecondaryPosW", Texture)
        .output(texture("filteredDiffuseRadianceHitDist", Format::Rgba16Float).optional())
        .output(texture("filteredSpecularRadianceHitDist", Format::Rgba16Float).optional())
        .output(texture("reflectionMvec", Format::Rg16Float).optional())
        .output(texture("deltaMvec", Format::Rg16Float).optional())
        .config(schema)
}

pub fn modulate_illumination() -> PassType {
    const TERMS: &[&str] = &[
        "emission",
        "diffuseReflectance",
        "diffuseRadiance",
        "specularReflectance",
        "specularRadiance",
        "deltaReflectionEmission",
        "deltaReflectionReflectance",
        "deltaReflectionRadiance",
        "deltaTransmissionEmission",
        "deltaTransmissionReflectance",
        "deltaTransmissionRadiance",
        "residualRadiance",
    ];

    let mut pass_type = PassType::new("ModulateIllumination");
    let mut schema = ConfigSchema::new();
    for (index, term) in TERMS.iter().enumerate() {
        pass_type = pass_type.optional_input(term, Texture);
        let mut option = format!("use{term}");
        // useEmission, useDiffuseReflectance, ...
        option.replace_range(3..4, &term[..1].to_uppercase());
        schema = schema.bool(&option, index < 5);
    }
    pass_type.output(texture("output", Format::Rgba32Float)).config(output_size(schema))
}

pub fn minimal_path_tracer_shadow_map() -> PassType {
    PassType::new("MinimalPathTracerShadowMap")
        .input("vbuffer", Texture)
        .optional_input("viewW", Texture)
        .output(texture("color", Format::Rgba32Float))
        .config(ConfigSchema::new().int_range("maxBounces", 3, 0, 10).bool("computeDirect", true).bool("useImportanceSampling", true))
}

pub fn restir_gi() -> PassType {
    PassType::new("ReSTIR_GI")
        .input("vbuffer", Texture)
        .optional_input("mvec", Texture)
        .optional_input("viewW", Texture)
        .optional_input("rayDist", Texture)
        .output(texture("color", Format::Rgba16Float))
        .output(texture("diffuseIllumination", Format::Rgba16Float).optional())
        .output(texture("diffuseReflectance", Format::Rgba16Float).optional())
        .output(texture("specularIllumination", Format::Rgba16Float).optional())
        .output(texture("specularReflectance", Format::Rgba16Float).optional())
        .config(ConfigSchema::new().bool("useReducedReservoirFormat", false).int_range("spatialSamples", 1, 0, 8))
}

pub fn restir_fg() -> PassType {
    PassType::new("ReSTIR_FG")
        .input("vbuffer", Texture)
        .optional_input("mvec", Texture)
        .optional_input("viewW", Texture)
        .optional_input("rayDist", Texture)
        .output(texture("color", Format::Rgba32Float).optional())
        .output(texture("diffuseRadiance", Format::Rgba16Float).optional())
        .output(texture("specularRadiance", Format::Rgba16Float).optional())
        .output(texture("emission", Format::Rgba16Float).optional())
        .output(texture("diffuseReflectance", Format::Rgba16Float).optional())
        .output(texture("specularReflectance", Format::Rgba16Float).optional())
}

pub fn transparency_path_tracer() -> PassType {
    PassType::new("TransparencyPathTracer")
        .input("vbuffer", Texture)
        .optional_input("viewW", Texture)
        .output(texture("outColor", Format::Rgba32Float))
}

pub fn wireframe() -> PassType {
    PassType::new("Wireframe").output(texture("Out", Format::Rgba32Float))
}

/// Every standard pass type, in a stable order
pub fn standard_pass_types() -> Vec<PassType> {
    vec![
        vbuffer_rt(),
        gbuffer_rt(),
        gbuffer_raster(),
        vbuffer_pm(),
        rtxdi_pass(),
        photon_restir(),
        photon_restir_vpl(),
        restir_exp(),
        composite_restir_nrd(),
        composite(),
        tone_mapper(),
        accumulate_pass(),
        dlss_pass(),
        nrd(),
        modulate_illumination(),
        minimal_path_tracer_shadow_map(),
        restir_gi(),
        restir_fg(),
        transparency_path_tracer(),
        wireframe(),
    ]
}
