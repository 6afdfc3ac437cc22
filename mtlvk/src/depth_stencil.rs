//! `DepthStencilState`: a value record materialized via dynamic-state
//! commands at record time rather than baked into a pipeline (spec.md §3).

use air_types::{CompareFunction, StencilOperation};

#[derive(Clone, Copy, Debug)]
pub struct StencilDescriptor {
    pub stencil_compare_function: CompareFunction,
    pub stencil_failure_operation: StencilOperation,
    pub depth_failure_operation: StencilOperation,
    pub depth_stencil_pass_operation: StencilOperation,
    pub read_mask: u32,
    pub write_mask: u32,
}

impl Default for StencilDescriptor {
    fn default() -> Self {
        Self {
            stencil_compare_function: CompareFunction::Always,
            stencil_failure_operation: StencilOperation::Keep,
            depth_failure_operation: StencilOperation::Keep,
            depth_stencil_pass_operation: StencilOperation::Keep,
            read_mask: 0xff,
            write_mask: 0xff,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DepthStencilState {
    pub depth_compare_function: CompareFunction,
    pub depth_write_enabled: bool,
    pub front_face_stencil: Option<StencilDescriptor>,
    pub back_face_stencil: Option<StencilDescriptor>,
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self {
            depth_compare_function: CompareFunction::Always,
            depth_write_enabled: false,
            front_face_stencil: None,
            back_face_stencil: None,
        }
    }
}
