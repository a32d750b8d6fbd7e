//! Resource model shared by pass schemas, the compiler and the runtime
//!
//! Every logical resource flowing along an edge is described by a [`ResourceDesc`]:
//! the kind of resource a socket carries, its element format and its size class.
//! The compiler resolves each output socket to a concrete descriptor, and only
//! resources with equal descriptors may ever share one physical allocation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of resource carried by a socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Sampled or storage image
    Texture,
    /// Depth attachment
    Depth,
    /// Untyped linear buffer
    Buffer,
}

/// Producer/consumer kind pairs that are compatible without being identical.
const CONVERTIBLE_KINDS: &[(ResourceKind, ResourceKind)] = &[(ResourceKind::Depth, ResourceKind::Texture)];

impl ResourceKind {
    /// Returns true if a resource of this kind may be bound to a socket of kind `consumer`
    pub fn can_feed(self, consumer: ResourceKind) -> bool {
        self == consumer || CONVERTIBLE_KINDS.contains(&(self, consumer))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Texture => write!(f, "texture"),
            Self::Depth => write!(f, "depth"),
            Self::Buffer => write!(f, "buffer"),
        }
    }
}

/// Element format of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Format {
    Rgba32Float,
    Rgba16Float,
    Rgba8Unorm,
    Rg32Float,
    Rg16Float,
    R32Float,
    R32Uint,
    Rg32Uint,
    Rgba32Uint,
    D32Float,
    /// Raw bytes, used by buffers
    Raw,
}

impl Format {
    /// Size of a single element (texel, or byte for [`Format::Raw`])
    pub fn bytes_per_element(&self) -> u64 {
        match self {
            Self::Rgba32Float | Self::Rgba32Uint => 16,
            Self::Rgba16Float | Self::Rg32Float | Self::Rg32Uint => 8,
            Self::Rgba8Unorm | Self::Rg16Float | Self::R32Float | Self::R32Uint | Self::D32Float => 4,
            Self::Raw => 1,
        }
    }
}

/// Two-dimensional size in texels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Applies a per-axis scale factor, never shrinking an axis below one texel
    pub fn scaled(&self, x: ScaleFactor, y: ScaleFactor) -> Self {
        Self {
            width: x.apply(self.width),
            height: y.apply(self.height),
        }
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl From<(u32, u32)> for Extent {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl From<Extent> for (u32, u32) {
    fn from(extent: Extent) -> Self {
        (extent.width, extent.height)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Size bucket of a resource; physical allocations are only shared within one class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Image { width: u32, height: u32 },
    Buffer { bytes: u64 },
}

impl SizeClass {
    pub fn image(extent: Extent) -> Self {
        Self::Image {
            width: extent.width,
            height: extent.height,
        }
    }

    /// Number of elements described by this size class
    pub fn element_count(&self) -> u64 {
        match *self {
            Self::Image { width, height } => width as u64 * height as u64,
            Self::Buffer { bytes } => bytes,
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image { width, height } => write!(f, "{width}x{height}"),
            Self::Buffer { bytes } => write!(f, "{bytes} bytes"),
        }
    }
}

/// Fully resolved description of a logical or physical resource
///
/// Field order matters: the derived ordering sorts by format first, then by
/// size class, which is the order the aliasing pass walks resources in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceDesc {
    pub format: Format,
    pub size: SizeClass,
    pub kind: ResourceKind,
}

impl ResourceDesc {
    pub fn image(kind: ResourceKind, format: Format, extent: Extent) -> Self {
        Self {
            format,
            size: SizeClass::image(extent),
            kind,
        }
    }

    pub fn buffer(bytes: u64) -> Self {
        Self {
            format: Format::Raw,
            size: SizeClass::Buffer { bytes },
            kind: ResourceKind::Buffer,
        }
    }

    /// Number of bytes backing a resource with this description
    pub fn size_in_bytes(&self) -> u64 {
        self.size.element_count() * self.format.bytes_per_element()
    }
}

impl fmt::Display for ResourceDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} {}", self.kind, self.format, self.size)
    }
}

/// Represents a rational scale factor as a fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScaleFactor {
    pub numerator: u32,
    pub denominator: u32,
}

impl ScaleFactor {
    pub const UNITY: Self = Self::new(1, 1);

    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self { numerator, denominator }
    }

    /// Scales `value`, rounding down but never below one
    pub fn apply(&self, value: u32) -> u32 {
        let scaled = value as u64 * self.numerator as u64 / self.denominator.max(1) as u64;
        scaled.clamp(1, u32::MAX as u64) as u32
    }
}

/// How the size class of an output socket is derived
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SizePolicy {
    /// Same as the graph's reference extent (subject to the `outputSize` option)
    Reference,
    /// Reference extent scaled per axis
    Scaled(ScaleFactor, ScaleFactor),
    /// Absolute extent
    Fixed(Extent),
    /// Same size class as whatever is bound to the named input socket
    MatchInput(String),
    /// Linear buffer of the given byte length
    Bytes(u64),
}

/// Values of the conventional `outputSize` configuration option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputSize {
    Default,
    Full,
    Half,
    Quarter,
    Double,
    Fixed,
}

impl OutputSize {
    /// Name of the configuration option carrying this value
    pub const OPTION: &'static str = "outputSize";

    pub const VARIANTS: &'static [&'static str] = &["Default", "Full", "Half", "Quarter", "Double", "Fixed"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Default" => Some(Self::Default),
            "Full" => Some(Self::Full),
            "Half" => Some(Self::Half),
            "Quarter" => Some(Self::Quarter),
            "Double" => Some(Self::Double),
            "Fixed" => Some(Self::Fixed),
            _ => None,
        }
    }

    /// Scale applied to reference-sized outputs
    pub fn scale(&self) -> ScaleFactor {
        match self {
            Self::Default | Self::Full | Self::Fixed => ScaleFactor::UNITY,
            Self::Half => ScaleFactor::new(1, 2),
            Self::Quarter => ScaleFactor::new(1, 4),
            Self::Double => ScaleFactor::new(2, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_never_collapses_to_zero() {
        assert_eq!(ScaleFactor::new(1, 4).apply(2), 1);
        assert_eq!(ScaleFactor::new(1, 2).apply(1920), 960);
        assert_eq!(Extent::new(1920, 1080).scaled(ScaleFactor::new(2, 1), ScaleFactor::new(1, 2)), Extent::new(3840, 540));
    }

    #[test]
    fn test_kind_compatibility() {
        assert!(ResourceKind::Texture.can_feed(ResourceKind::Texture));
        assert!(ResourceKind::Depth.can_feed(ResourceKind::Texture));
        assert!(!ResourceKind::Texture.can_feed(ResourceKind::Depth));
        assert!(!ResourceKind::Buffer.can_feed(ResourceKind::Texture));
    }

    #[test]
    fn test_desc_sizes() {
        let desc = ResourceDesc::image(ResourceKind::Texture, Format::Rgba32Float, Extent::new(4, 2));
        assert_eq!(desc.size_in_bytes(), 4 * 2 * 16);
        assert_eq!(ResourceDesc::buffer(64).size_in_bytes(), 64);
    }

    #[test]
    fn test_desc_orders_by_format_then_size() {
        let small = ResourceDesc::image(ResourceKind::Texture, Format::Rgba32Float, Extent::new(2, 2));
        let large = ResourceDesc::image(ResourceKind::Texture, Format::Rgba32Float, Extent::new(4, 4));
        let other = ResourceDesc::image(ResourceKind::Texture, Format::R32Float, Extent::new(1, 1));
        let mut descs = vec![other, large, small];
        descs.sort();
        assert_eq!(descs, vec![small, large, other]);
    }

    #[test]
    fn test_output_size_option() {
        assert_eq!(OutputSize::parse("Half").map(|s| s.scale()), Some(ScaleFactor::new(1, 2)));
        assert_eq!(OutputSize::parse("Default").map(|s| s.scale()), Some(ScaleFactor::UNITY));
        assert_eq!(OutputSize::parse("Triple"), None);
    }
}
