//! Enumerations mirroring the Metal-shaped surface this project exposes.
//!
//! Numeric values for [`PixelFormat`] and [`VertexFormat`] intentionally match
//! Apple's public `MTLPixelFormat`/`MTLVertexFormat` constant space: callers
//! porting descriptors from real Metal code expect the raw discriminants to
//! line up.

use bitflags::bitflags;

/// A half-open range, as used by `replaceRegion`, `fillBuffer`, and texture
/// view level/layer selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Range {
    pub start: u64,
    pub length: u64,
}

impl Range {
    pub const fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    pub const fn end(&self) -> u64 {
        self.start + self.length
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplePosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureSwizzle {
    Zero = 0,
    One = 1,
    Red = 2,
    Green = 3,
    Blue = 4,
    Alpha = 5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureSwizzleChannels {
    pub red: TextureSwizzle,
    pub green: TextureSwizzle,
    pub blue: TextureSwizzle,
    pub alpha: TextureSwizzle,
}

impl Default for TextureSwizzleChannels {
    fn default() -> Self {
        Self {
            red: TextureSwizzle::Red,
            green: TextureSwizzle::Green,
            blue: TextureSwizzle::Blue,
            alpha: TextureSwizzle::Alpha,
        }
    }
}

/// Pixel format, numbered to match `MTLPixelFormat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PixelFormat {
    Invalid = 0,
    A8Unorm = 1,
    R8Unorm = 10,
    R8UnormSrgb = 11,
    R8Snorm = 12,
    R8Uint = 13,
    R8Sint = 14,
    R16Unorm = 20,
    R16Snorm = 22,
    R16Uint = 23,
    R16Sint = 24,
    R16Float = 25,
    RG8Unorm = 30,
    RG8UnormSrgb = 31,
    RG8Snorm = 32,
    RG8Uint = 33,
    RG8Sint = 34,
    B5G6R5Unorm = 40,
    A1BGR5Unorm = 41,
    ABGR4Unorm = 42,
    BGR5A1Unorm = 43,
    R32Uint = 53,
    R32Sint = 54,
    R32Float = 55,
    RG16Unorm = 60,
    RG16Snorm = 62,
    RG16Uint = 63,
    RG16Sint = 64,
    RG16Float = 65,
    RGBA8Unorm = 70,
    RGBA8UnormSrgb = 71,
    RGBA8Snorm = 72,
    RGBA8Uint = 73,
    RGBA8Sint = 74,
    BGRA8Unorm = 80,
    BGRA8UnormSrgb = 81,
    RGB10A2Unorm = 90,
    RGB10A2Uint = 91,
    RG11B10Float = 92,
    RGB9E5Float = 93,
    BGR10A2Unorm = 94,
    RG32Uint = 103,
    RG32Sint = 104,
    RG32Float = 105,
    RGBA16Unorm = 110,
    RGBA16Snorm = 112,
    RGBA16Uint = 113,
    RGBA16Sint = 114,
    RGBA16Float = 115,
    RGBA32Uint = 123,
    RGBA32Sint = 124,
    RGBA32Float = 125,
    BC1RGBA = 130,
    BC1RGBASrgb = 131,
    BC2RGBA = 132,
    BC2RGBASrgb = 133,
    BC3RGBA = 134,
    BC3RGBASrgb = 135,
    BC4RUnorm = 140,
    BC4RSnorm = 141,
    BC5RGUnorm = 142,
    BC5RGSnorm = 143,
    BC6HRGBFloat = 150,
    BC6HRGBUfloat = 151,
    BC7RGBAUnorm = 152,
    BC7RGBAUnormSrgb = 153,
    Depth16Unorm = 250,
    Depth32Float = 252,
    Stencil8 = 253,
    Depth24UnormStencil8 = 255,
    Depth32FloatStencil8 = 260,
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Invalid
    }
}

impl PixelFormat {
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            PixelFormat::Depth16Unorm
                | PixelFormat::Depth32Float
                | PixelFormat::Depth24UnormStencil8
                | PixelFormat::Depth32FloatStencil8
        )
    }

    pub fn is_stencil(self) -> bool {
        matches!(
            self,
            PixelFormat::Stencil8
                | PixelFormat::Depth24UnormStencil8
                | PixelFormat::Depth32FloatStencil8
        )
    }

    pub fn is_depth_or_stencil(self) -> bool {
        self.is_depth() || self.is_stencil()
    }

    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            PixelFormat::BC1RGBA
                | PixelFormat::BC1RGBASrgb
                | PixelFormat::BC2RGBA
                | PixelFormat::BC2RGBASrgb
                | PixelFormat::BC3RGBA
                | PixelFormat::BC3RGBASrgb
                | PixelFormat::BC4RUnorm
                | PixelFormat::BC4RSnorm
                | PixelFormat::BC5RGUnorm
                | PixelFormat::BC5RGSnorm
                | PixelFormat::BC6HRGBFloat
                | PixelFormat::BC6HRGBUfloat
                | PixelFormat::BC7RGBAUnorm
                | PixelFormat::BC7RGBAUnormSrgb
        )
    }

    /// Bytes occupied by one texel (or, for compressed formats, one block).
    pub fn bytes_per_block(self) -> u32 {
        use PixelFormat::*;
        match self {
            Invalid => 0,
            A8Unorm | R8Unorm | R8UnormSrgb | R8Snorm | R8Uint | R8Sint | Stencil8 => 1,
            R16Unorm | R16Snorm | R16Uint | R16Sint | R16Float | RG8Unorm | RG8UnormSrgb
            | RG8Snorm | RG8Uint | RG8Sint | B5G6R5Unorm | A1BGR5Unorm | ABGR4Unorm
            | BGR5A1Unorm | Depth16Unorm => 2,
            R32Uint | R32Sint | R32Float | RG16Unorm | RG16Snorm | RG16Uint | RG16Sint
            | RG16Float | RGBA8Unorm | RGBA8UnormSrgb | RGBA8Snorm | RGBA8Uint | RGBA8Sint
            | BGRA8Unorm | BGRA8UnormSrgb | RGB10A2Unorm | RGB10A2Uint | RG11B10Float
            | RGB9E5Float | BGR10A2Unorm | Depth32Float | Depth24UnormStencil8 => 4,
            RG32Uint | RG32Sint | RG32Float | RGBA16Unorm | RGBA16Snorm | RGBA16Uint
            | RGBA16Sint | RGBA16Float | Depth32FloatStencil8 => 8,
            RGBA32Uint | RGBA32Sint | RGBA32Float => 16,
            BC1RGBA | BC1RGBASrgb | BC4RUnorm | BC4RSnorm => 8,
            BC2RGBA | BC2RGBASrgb | BC3RGBA | BC3RGBASrgb | BC5RGUnorm | BC5RGSnorm
            | BC6HRGBFloat | BC6HRGBUfloat | BC7RGBAUnorm | BC7RGBAUnormSrgb => 16,
        }
    }
}

/// Vertex attribute format, numbered to match `MTLVertexFormat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexFormat {
    Invalid = 0,
    UChar2 = 1,
    UChar3 = 2,
    UChar4 = 3,
    Char2 = 4,
    Char3 = 5,
    Char4 = 6,
    UChar2Normalized = 7,
    UChar3Normalized = 8,
    UChar4Normalized = 9,
    Char2Normalized = 10,
    Char3Normalized = 11,
    Char4Normalized = 12,
    UShort2 = 13,
    UShort3 = 14,
    UShort4 = 15,
    Short2 = 16,
    Short3 = 17,
    Short4 = 18,
    UShort2Normalized = 19,
    UShort3Normalized = 20,
    UShort4Normalized = 21,
    Short2Normalized = 22,
    Short3Normalized = 23,
    Short4Normalized = 24,
    Half2 = 25,
    Half3 = 26,
    Half4 = 27,
    Float = 28,
    Float2 = 29,
    Float3 = 30,
    Float4 = 31,
    Int = 32,
    Int2 = 33,
    Int3 = 34,
    Int4 = 35,
    UInt = 36,
    UInt2 = 37,
    UInt3 = 38,
    UInt4 = 39,
}

impl VertexFormat {
    pub fn size_bytes(self) -> u32 {
        use VertexFormat::*;
        match self {
            Invalid => 0,
            UChar2 | Char2 | UChar2Normalized | Char2Normalized => 2,
            UChar3 | Char3 | UChar3Normalized | Char3Normalized => 3,
            UChar4 | Char4 | UChar4Normalized | Char4Normalized => 4,
            UShort2 | Short2 | UShort2Normalized | Short2Normalized | Half2 => 4,
            UShort3 | Short3 | UShort3Normalized | Short3Normalized | Half3 => 6,
            UShort4 | Short4 | UShort4Normalized | Short4Normalized | Half4 => 8,
            Float | Int | UInt => 4,
            Float2 | Int2 | UInt2 => 8,
            Float3 | Int3 | UInt3 => 12,
            Float4 | Int4 | UInt4 => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VertexStepFunction {
    Constant = 0,
    PerVertex = 1,
    PerInstance = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureType {
    Type1D,
    Type1DArray,
    Type2D,
    Type2DArray,
    Type2DMultisample,
    TypeCube,
    TypeCubeArray,
    Type3D,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TextureUsage: u32 {
        const UNKNOWN         = 0x0000;
        const SHADER_READ     = 0x0001;
        const SHADER_WRITE    = 0x0002;
        const RENDER_TARGET   = 0x0004;
        const PIXEL_FORMAT_VIEW = 0x0010;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CPUCacheMode {
    DefaultCache = 0,
    WriteCombined = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StorageMode {
    Shared = 0,
    Managed = 1,
    Private = 2,
    Memoryless = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HazardTrackingMode {
    Default = 0,
    Untracked = 1,
    Tracked = 2,
}

/// How a [`Buffer`](crate) or texture was requested to be allocated.
///
/// Metal packs cache mode / storage mode / hazard tracking into bitfields of
/// one `MTLResourceOptions` value; we keep the fields split out (clearer to
/// construct in Rust) and provide the packed constructor for API parity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceOptions {
    pub cpu_cache_mode: CPUCacheMode,
    pub storage_mode: StorageMode,
    pub hazard_tracking_mode: HazardTrackingMode,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            cpu_cache_mode: CPUCacheMode::DefaultCache,
            storage_mode: StorageMode::Shared,
            hazard_tracking_mode: HazardTrackingMode::Default,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionType {
    Vertex = 0,
    Fragment = 1,
    Kernel = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrimitiveType {
    Point = 0,
    Line = 1,
    LineStrip = 2,
    Triangle = 3,
    TriangleStrip = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrimitiveTopologyClass {
    Unspecified = 0,
    Point = 1,
    Line = 2,
    Triangle = 3,
}

impl From<PrimitiveType> for PrimitiveTopologyClass {
    fn from(p: PrimitiveType) -> Self {
        match p {
            PrimitiveType::Point => PrimitiveTopologyClass::Point,
            PrimitiveType::Line | PrimitiveType::LineStrip => PrimitiveTopologyClass::Line,
            PrimitiveType::Triangle | PrimitiveType::TriangleStrip => {
                PrimitiveTopologyClass::Triangle
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IndexType {
    UInt16 = 0,
    UInt32 = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CullMode {
    None = 0,
    Front = 1,
    Back = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Winding {
    Clockwise = 0,
    CounterClockwise = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DepthClipMode {
    Clip = 0,
    Clamp = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TriangleFillMode {
    Fill = 0,
    Lines = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompareFunction {
    Never = 0,
    Less = 1,
    Equal = 2,
    LessEqual = 3,
    Greater = 4,
    NotEqual = 5,
    GreaterEqual = 6,
    Always = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StencilOperation {
    Keep = 0,
    Zero = 1,
    Replace = 2,
    IncrementClamp = 3,
    DecrementClamp = 4,
    Invert = 5,
    IncrementWrap = 6,
    DecrementWrap = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SamplerMinMagFilter {
    Nearest = 0,
    Linear = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SamplerMipFilter {
    NotMipmapped = 0,
    Nearest = 1,
    Linear = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SamplerAddressMode {
    ClampToEdge = 0,
    MirrorClampToEdge = 1,
    Repeat = 2,
    MirrorRepeat = 3,
    ClampToZero = 4,
    ClampToBorderColor = 5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SamplerBorderColor {
    TransparentBlack = 0,
    OpaqueBlack = 1,
    OpaqueWhite = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    SourceColor = 2,
    OneMinusSourceColor = 3,
    SourceAlpha = 4,
    OneMinusSourceAlpha = 5,
    DestinationColor = 6,
    OneMinusDestinationColor = 7,
    DestinationAlpha = 8,
    OneMinusDestinationAlpha = 9,
    SourceAlphaSaturated = 10,
    BlendColor = 11,
    OneMinusBlendColor = 12,
    BlendAlpha = 13,
    OneMinusBlendAlpha = 14,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlendOperation {
    Add = 0,
    Subtract = 1,
    ReverseSubtract = 2,
    Min = 3,
    Max = 4,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ColorWriteMask: u8 {
        const NONE  = 0b0000;
        const RED   = 0b1000;
        const GREEN = 0b0100;
        const BLUE  = 0b0010;
        const ALPHA = 0b0001;
        const ALL   = 0b1111;
    }
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        ColorWriteMask::ALL
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoadAction {
    DontCare = 0,
    Load = 1,
    Clear = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StoreAction {
    DontCare = 0,
    Store = 1,
    MultisampleResolve = 2,
    StoreAndMultisampleResolve = 3,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ResourceUsage: u8 {
        const READ   = 0b001;
        const WRITE  = 0b010;
        const SAMPLE = 0b100;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RenderStages: u8 {
        const VERTEX   = 0b0001;
        const FRAGMENT = 0b0010;
        const TILE     = 0b0100;
        const MESH     = 0b1000;
    }
}

bitflags! {
    /// Unimplemented in the Runtime (spec.md §9 Open Questions); kept as a
    /// closed type so the blit encoder's public signature can name it and
    /// reject a non-empty set explicitly rather than silently ignoring it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BlitOption: u8 {
        const NONE = 0;
        const DEPTH_FROM_STENCIL = 0b001;
        const STENCIL_FROM_DEPTH = 0b010;
        const ROW_LINEAR_PVRTC = 0b100;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DispatchType {
    Serial,
    Concurrent,
}

/// A binding's resource kind, as seen by a `Library`'s `FunctionInfo`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BindingType {
    Buffer,
    VertexInput,
    Texture,
    Sampler,
}

/// How a texture binding is accessed by the function that declares it —
/// determines whether its descriptor type is `SAMPLED_IMAGE` or
/// `STORAGE_IMAGE` (spec.md §4.6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureAccessType {
    Sample,
    Read,
    ReadWrite,
    Write,
}
