//! Metal-to-Vulkan translation tables.
//!
//! One function per enumeration, mirroring `wgpu-hal`'s `vulkan::conv`
//! module: a flat `match` per case, returning [`BadEnumValue`] for anything
//! that isn't a recognized discriminant (never for a recognized one missing
//! a mapping — every variant below is mapped).

use ash::vk;

use crate::enums::*;
use crate::error::BadEnumValue;

fn bad(what: &'static str, value: i64) -> BadEnumValue {
    BadEnumValue { what, value }
}

pub fn pixel_format_to_vk(format: PixelFormat) -> Result<vk::Format, BadEnumValue> {
    use PixelFormat::*;
    Ok(match format {
        Invalid => return Err(bad("PixelFormat", 0)),
        A8Unorm => vk::Format::UNDEFINED,
        R8Unorm => vk::Format::R8_UNORM,
        R8UnormSrgb => vk::Format::R8_SRGB,
        R8Snorm => vk::Format::R8_SNORM,
        R8Uint => vk::Format::R8_UINT,
        R8Sint => vk::Format::R8_SINT,
        R16Unorm => vk::Format::R16_UNORM,
        R16Snorm => vk::Format::R16_SNORM,
        R16Uint => vk::Format::R16_UINT,
        R16Sint => vk::Format::R16_SINT,
        R16Float => vk::Format::R16_SFLOAT,
        RG8Unorm => vk::Format::R8G8_UNORM,
        RG8UnormSrgb => vk::Format::R8G8_SRGB,
        RG8Snorm => vk::Format::R8G8_SNORM,
        RG8Uint => vk::Format::R8G8_UINT,
        RG8Sint => vk::Format::R8G8_SINT,
        B5G6R5Unorm => vk::Format::R5G6B5_UNORM_PACK16,
        A1BGR5Unorm => vk::Format::A1R5G5B5_UNORM_PACK16,
        ABGR4Unorm => vk::Format::R4G4B4A4_UNORM_PACK16,
        BGR5A1Unorm => vk::Format::B5G5R5A1_UNORM_PACK16,
        R32Uint => vk::Format::R32_UINT,
        R32Sint => vk::Format::R32_SINT,
        R32Float => vk::Format::R32_SFLOAT,
        RG16Unorm => vk::Format::R16G16_UNORM,
        RG16Snorm => vk::Format::R16G16_SNORM,
        RG16Uint => vk::Format::R16G16_UINT,
        RG16Sint => vk::Format::R16G16_SINT,
        RG16Float => vk::Format::R16G16_SFLOAT,
        RGBA8Unorm => vk::Format::R8G8B8A8_UNORM,
        RGBA8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        RGBA8Snorm => vk::Format::R8G8B8A8_SNORM,
        RGBA8Uint => vk::Format::R8G8B8A8_UINT,
        RGBA8Sint => vk::Format::R8G8B8A8_SINT,
        BGRA8Unorm => vk::Format::B8G8R8A8_UNORM,
        BGRA8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        RGB10A2Unorm => vk::Format::A2B10G10R10_UNORM_PACK32,
        RGB10A2Uint => vk::Format::A2B10G10R10_UINT_PACK32,
        RG11B10Float => vk::Format::B10G11R11_UFLOAT_PACK32,
        RGB9E5Float => vk::Format::E5B9G9R9_UFLOAT_PACK32,
        BGR10A2Unorm => vk::Format::A2R10G10B10_UNORM_PACK32,
        RG32Uint => vk::Format::R32G32_UINT,
        RG32Sint => vk::Format::R32G32_SINT,
        RG32Float => vk::Format::R32G32_SFLOAT,
        RGBA16Unorm => vk::Format::R16G16B16A16_UNORM,
        RGBA16Snorm => vk::Format::R16G16B16A16_SNORM,
        RGBA16Uint => vk::Format::R16G16B16A16_UINT,
        RGBA16Sint => vk::Format::R16G16B16A16_SINT,
        RGBA16Float => vk::Format::R16G16B16A16_SFLOAT,
        RGBA32Uint => vk::Format::R32G32B32A32_UINT,
        RGBA32Sint => vk::Format::R32G32B32A32_SINT,
        RGBA32Float => vk::Format::R32G32B32A32_SFLOAT,
        BC1RGBA => vk::Format::BC1_RGBA_UNORM_BLOCK,
        BC1RGBASrgb => vk::Format::BC1_RGBA_SRGB_BLOCK,
        BC2RGBA => vk::Format::BC2_UNORM_BLOCK,
        BC2RGBASrgb => vk::Format::BC2_SRGB_BLOCK,
        BC3RGBA => vk::Format::BC3_UNORM_BLOCK,
        BC3RGBASrgb => vk::Format::BC3_SRGB_BLOCK,
        BC4RUnorm => vk::Format::BC4_UNORM_BLOCK,
        BC4RSnorm => vk::Format::BC4_SNORM_BLOCK,
        BC5RGUnorm => vk::Format::BC5_UNORM_BLOCK,
        BC5RGSnorm => vk::Format::BC5_SNORM_BLOCK,
        BC6HRGBFloat => vk::Format::BC6H_SFLOAT_BLOCK,
        BC6HRGBUfloat => vk::Format::BC6H_UFLOAT_BLOCK,
        BC7RGBAUnorm => vk::Format::BC7_UNORM_BLOCK,
        BC7RGBAUnormSrgb => vk::Format::BC7_SRGB_BLOCK,
        Depth16Unorm => vk::Format::D16_UNORM,
        Depth32Float => vk::Format::D32_SFLOAT,
        Stencil8 => vk::Format::S8_UINT,
        Depth24UnormStencil8 => vk::Format::D24_UNORM_S8_UINT,
        Depth32FloatStencil8 => vk::Format::D32_SFLOAT_S8_UINT,
    })
}

pub fn vertex_format_to_vk(format: VertexFormat) -> Result<vk::Format, BadEnumValue> {
    use VertexFormat::*;
    Ok(match format {
        Invalid => return Err(bad("VertexFormat", 0)),
        UChar2 => vk::Format::R8G8_UINT,
        UChar3 => vk::Format::R8G8B8_UINT,
        UChar4 => vk::Format::R8G8B8A8_UINT,
        Char2 => vk::Format::R8G8_SINT,
        Char3 => vk::Format::R8G8B8_SINT,
        Char4 => vk::Format::R8G8B8A8_SINT,
        UChar2Normalized => vk::Format::R8G8_UNORM,
        UChar3Normalized => vk::Format::R8G8B8_UNORM,
        UChar4Normalized => vk::Format::R8G8B8A8_UNORM,
        Char2Normalized => vk::Format::R8G8_SNORM,
        Char3Normalized => vk::Format::R8G8B8_SNORM,
        Char4Normalized => vk::Format::R8G8B8A8_SNORM,
        UShort2 => vk::Format::R16G16_UINT,
        UShort3 => vk::Format::R16G16B16_UINT,
        UShort4 => vk::Format::R16G16B16A16_UINT,
        Short2 => vk::Format::R16G16_SINT,
        Short3 => vk::Format::R16G16B16_SINT,
        Short4 => vk::Format::R16G16B16A16_SINT,
        UShort2Normalized => vk::Format::R16G16_UNORM,
        UShort3Normalized => vk::Format::R16G16B16_UNORM,
        UShort4Normalized => vk::Format::R16G16B16A16_UNORM,
        Short2Normalized => vk::Format::R16G16_SNORM,
        Short3Normalized => vk::Format::R16G16B16_SNORM,
        Short4Normalized => vk::Format::R16G16B16A16_SNORM,
        Half2 => vk::Format::R16G16_SFLOAT,
        Half3 => vk::Format::R16G16B16_SFLOAT,
        Half4 => vk::Format::R16G16B16A16_SFLOAT,
        Float => vk::Format::R32_SFLOAT,
        Float2 => vk::Format::R32G32_SFLOAT,
        Float3 => vk::Format::R32G32B32_SFLOAT,
        Float4 => vk::Format::R32G32B32A32_SFLOAT,
        Int => vk::Format::R32_SINT,
        Int2 => vk::Format::R32G32_SINT,
        Int3 => vk::Format::R32G32B32_SINT,
        Int4 => vk::Format::R32G32B32A32_SINT,
        UInt => vk::Format::R32_UINT,
        UInt2 => vk::Format::R32G32_UINT,
        UInt3 => vk::Format::R32G32B32_UINT,
        UInt4 => vk::Format::R32G32B32A32_UINT,
    })
}

pub fn compare_function_to_vk(compare: CompareFunction) -> vk::CompareOp {
    match compare {
        CompareFunction::Never => vk::CompareOp::NEVER,
        CompareFunction::Less => vk::CompareOp::LESS,
        CompareFunction::Equal => vk::CompareOp::EQUAL,
        CompareFunction::LessEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareFunction::Greater => vk::CompareOp::GREATER,
        CompareFunction::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareFunction::GreaterEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareFunction::Always => vk::CompareOp::ALWAYS,
    }
}

pub fn stencil_operation_to_vk(op: StencilOperation) -> vk::StencilOp {
    match op {
        StencilOperation::Keep => vk::StencilOp::KEEP,
        StencilOperation::Zero => vk::StencilOp::ZERO,
        StencilOperation::Replace => vk::StencilOp::REPLACE,
        StencilOperation::IncrementClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOperation::DecrementClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOperation::Invert => vk::StencilOp::INVERT,
        StencilOperation::IncrementWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOperation::DecrementWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

pub fn blend_factor_to_vk(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SourceColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSourceColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::SourceAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSourceAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DestinationColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDestinationColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::DestinationAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDestinationAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::SourceAlphaSaturated => vk::BlendFactor::SRC_ALPHA_SATURATE,
        BlendFactor::BlendColor => vk::BlendFactor::CONSTANT_COLOR,
        BlendFactor::OneMinusBlendColor => vk::BlendFactor::ONE_MINUS_CONSTANT_COLOR,
        BlendFactor::BlendAlpha => vk::BlendFactor::CONSTANT_ALPHA,
        BlendFactor::OneMinusBlendAlpha => vk::BlendFactor::ONE_MINUS_CONSTANT_ALPHA,
    }
}

pub fn blend_operation_to_vk(op: BlendOperation) -> vk::BlendOp {
    match op {
        BlendOperation::Add => vk::BlendOp::ADD,
        BlendOperation::Subtract => vk::BlendOp::SUBTRACT,
        BlendOperation::ReverseSubtract => vk::BlendOp::REVERSE_SUBTRACT,
        BlendOperation::Min => vk::BlendOp::MIN,
        BlendOperation::Max => vk::BlendOp::MAX,
    }
}

pub fn color_write_mask_to_vk(mask: ColorWriteMask) -> vk::ColorComponentFlags {
    let mut out = vk::ColorComponentFlags::empty();
    if mask.contains(ColorWriteMask::RED) {
        out |= vk::ColorComponentFlags::R;
    }
    if mask.contains(ColorWriteMask::GREEN) {
        out |= vk::ColorComponentFlags::G;
    }
    if mask.contains(ColorWriteMask::BLUE) {
        out |= vk::ColorComponentFlags::B;
    }
    if mask.contains(ColorWriteMask::ALPHA) {
        out |= vk::ColorComponentFlags::A;
    }
    out
}

pub fn cull_mode_to_vk(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

pub fn winding_to_vk(winding: Winding) -> vk::FrontFace {
    match winding {
        Winding::Clockwise => vk::FrontFace::CLOCKWISE,
        Winding::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
    }
}

pub fn index_type_to_vk(ty: IndexType) -> vk::IndexType {
    match ty {
        IndexType::UInt16 => vk::IndexType::UINT16,
        IndexType::UInt32 => vk::IndexType::UINT32,
    }
}

pub fn primitive_type_to_vk(ty: PrimitiveType) -> vk::PrimitiveTopology {
    match ty {
        PrimitiveType::Point => vk::PrimitiveTopology::POINT_LIST,
        PrimitiveType::Line => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveType::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        PrimitiveType::Triangle => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveType::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

pub fn sampler_min_mag_filter_to_vk(filter: SamplerMinMagFilter) -> vk::Filter {
    match filter {
        SamplerMinMagFilter::Nearest => vk::Filter::NEAREST,
        SamplerMinMagFilter::Linear => vk::Filter::LINEAR,
    }
}

pub fn sampler_mip_filter_to_vk(filter: SamplerMipFilter) -> vk::SamplerMipmapMode {
    match filter {
        SamplerMipFilter::NotMipmapped | SamplerMipFilter::Nearest => {
            vk::SamplerMipmapMode::NEAREST
        }
        SamplerMipFilter::Linear => vk::SamplerMipmapMode::LINEAR,
    }
}

pub fn sampler_address_mode_to_vk(mode: SamplerAddressMode) -> vk::SamplerAddressMode {
    match mode {
        SamplerAddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        SamplerAddressMode::MirrorClampToEdge => vk::SamplerAddressMode::MIRROR_CLAMP_TO_EDGE,
        SamplerAddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
        SamplerAddressMode::MirrorRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        // Vulkan has no hardware "clamp to transparent zero"; clamp-to-border
        // with a transparent black border is the closest equivalent.
        SamplerAddressMode::ClampToZero => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        SamplerAddressMode::ClampToBorderColor => vk::SamplerAddressMode::CLAMP_TO_BORDER,
    }
}

pub fn sampler_border_color_to_vk(color: SamplerBorderColor) -> vk::BorderColor {
    match color {
        SamplerBorderColor::TransparentBlack => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        SamplerBorderColor::OpaqueBlack => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        SamplerBorderColor::OpaqueWhite => vk::BorderColor::FLOAT_OPAQUE_WHITE,
    }
}

pub fn texture_type_to_vk_image_type(ty: TextureType) -> vk::ImageType {
    match ty {
        TextureType::Type1D | TextureType::Type1DArray => vk::ImageType::TYPE_1D,
        TextureType::Type2D
        | TextureType::Type2DArray
        | TextureType::Type2DMultisample
        | TextureType::TypeCube
        | TextureType::TypeCubeArray => vk::ImageType::TYPE_2D,
        TextureType::Type3D => vk::ImageType::TYPE_3D,
    }
}

pub fn texture_type_to_vk_view_type(ty: TextureType) -> vk::ImageViewType {
    match ty {
        TextureType::Type1D => vk::ImageViewType::TYPE_1D,
        TextureType::Type1DArray => vk::ImageViewType::TYPE_1D_ARRAY,
        TextureType::Type2D | TextureType::Type2DMultisample => vk::ImageViewType::TYPE_2D,
        TextureType::Type2DArray => vk::ImageViewType::TYPE_2D_ARRAY,
        TextureType::TypeCube => vk::ImageViewType::CUBE,
        TextureType::TypeCubeArray => vk::ImageViewType::CUBE_ARRAY,
        TextureType::Type3D => vk::ImageViewType::TYPE_3D,
    }
}

pub fn swizzle_to_vk(swizzle: TextureSwizzle) -> vk::ComponentSwizzle {
    match swizzle {
        TextureSwizzle::Zero => vk::ComponentSwizzle::ZERO,
        TextureSwizzle::One => vk::ComponentSwizzle::ONE,
        TextureSwizzle::Red => vk::ComponentSwizzle::R,
        TextureSwizzle::Green => vk::ComponentSwizzle::G,
        TextureSwizzle::Blue => vk::ComponentSwizzle::B,
        TextureSwizzle::Alpha => vk::ComponentSwizzle::A,
    }
}

pub fn swizzle_channels_to_vk(channels: TextureSwizzleChannels) -> vk::ComponentMapping {
    vk::ComponentMapping {
        r: swizzle_to_vk(channels.red),
        g: swizzle_to_vk(channels.green),
        b: swizzle_to_vk(channels.blue),
        a: swizzle_to_vk(channels.alpha),
    }
}

/// Aspect mask implied by a pixel format, used whenever an image or image
/// view is created or barriered.
pub fn pixel_format_to_aspect(format: PixelFormat) -> vk::ImageAspectFlags {
    match format {
        PixelFormat::Depth24UnormStencil8 | PixelFormat::Depth32FloatStencil8 => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        PixelFormat::Stencil8 => vk::ImageAspectFlags::STENCIL,
        PixelFormat::Depth16Unorm | PixelFormat::Depth32Float => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

pub fn render_stages_to_vk(stages: RenderStages) -> vk::PipelineStageFlags {
    let mut out = vk::PipelineStageFlags::empty();
    if stages.contains(RenderStages::VERTEX) {
        out |= vk::PipelineStageFlags::VERTEX_SHADER;
    }
    if stages.contains(RenderStages::FRAGMENT) {
        out |= vk::PipelineStageFlags::FRAGMENT_SHADER;
    }
    if stages.contains(RenderStages::MESH) {
        out |= vk::PipelineStageFlags::MESH_SHADER_EXT;
    }
    // Metal's "tile" stage (tile shaders / programmable blending) has no
    // direct Vulkan 1.3 core equivalent; tessellation control is used as a
    // stand-in the way spec.md §4.9 directs.
    if stages.contains(RenderStages::TILE) {
        out |= vk::PipelineStageFlags::TESSELLATION_CONTROL_SHADER;
    }
    out
}

pub fn resource_usage_to_vk_access(usage: ResourceUsage) -> vk::AccessFlags {
    let mut out = vk::AccessFlags::empty();
    if usage.contains(ResourceUsage::READ) || usage.contains(ResourceUsage::SAMPLE) {
        out |= vk::AccessFlags::SHADER_READ;
    }
    if usage.contains(ResourceUsage::WRITE) {
        out |= vk::AccessFlags::SHADER_WRITE;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_non_invalid_pixel_format_maps() {
        let formats = [
            PixelFormat::R8Unorm,
            PixelFormat::RGBA8Unorm,
            PixelFormat::BGRA8Unorm,
            PixelFormat::RGBA16Float,
            PixelFormat::RGBA32Float,
            PixelFormat::BC7RGBAUnorm,
            PixelFormat::Depth32FloatStencil8,
        ];
        for format in formats {
            pixel_format_to_vk(format).unwrap();
        }
    }

    #[test]
    fn invalid_pixel_format_errors() {
        assert!(pixel_format_to_vk(PixelFormat::Invalid).is_err());
    }

    #[test]
    fn depth_stencil_aspect_includes_both_planes() {
        let aspect = pixel_format_to_aspect(PixelFormat::Depth24UnormStencil8);
        assert!(aspect.contains(vk::ImageAspectFlags::DEPTH));
        assert!(aspect.contains(vk::ImageAspectFlags::STENCIL));
    }
}
