//! Shader modules and graphics pipelines
//!
//! A [`Pipeline`] is declared once (vertex layout, shaders, descriptor set
//! layouts, fixed-function state) and compiled with [`Pipeline::create`].
//! Viewport and scissor are baked in, so the renderer destroys and recreates
//! every pipeline when the swapchain extent changes.

use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

use ash::{vk, Device};

use super::descriptor::DescriptorSetLayout;
use super::vertex_descriptor::VertexDescriptor;
use super::{VulkanContext, VulkanError, VulkanResult};

const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Decode a SPIR-V blob into words, checking size and magic number
pub fn spirv_words(bytes: &[u8]) -> VulkanResult<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| VulkanError::InitializationFailed(format!("Invalid SPIR-V: {e}")))?;
    if words.first() != Some(&SPIRV_MAGIC) {
        return Err(VulkanError::InitializationFailed(
            "Invalid SPIR-V: bad magic number".to_string(),
        ));
    }
    Ok(words)
}

/// Compiled shader stage
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create from SPIR-V bytes
    pub fn from_bytes(context: &VulkanContext, bytes: &[u8]) -> VulkanResult<Self> {
        let words = spirv_words(bytes)?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

        let device = context.device().clone();
        let module = unsafe { device.create_shader_module(&create_info, None)? };
        Ok(Self { device, module })
    }

    /// Load a SPIR-V file
    pub fn from_file(context: &VulkanContext, path: impl AsRef<Path>) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            let reason = format!("Failed to read shader {}: {e}", path.display());
            VulkanError::InitializationFailed(reason)
        })?;
        Self::from_bytes(context, &bytes)
    }

    /// Module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
    }
}

/// Fixed-function state chosen per pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFunctionState {
    /// Depth comparison
    pub depth_compare: vk::CompareOp,
    /// Fill, line or point rasterization
    pub polygon_mode: vk::PolygonMode,
    /// Faces to cull
    pub cull_mode: vk::CullModeFlags,
    /// Alpha blending on, depth writes off
    pub transparent: bool,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            depth_compare: vk::CompareOp::LESS,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            transparent: false,
        }
    }
}

impl FixedFunctionState {
    /// Color blend state for the single color attachment
    pub fn blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        if self.transparent {
            vk::PipelineColorBlendAttachmentState {
                blend_enable: vk::TRUE,
                src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
                dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
                color_blend_op: vk::BlendOp::ADD,
                src_alpha_blend_factor: vk::BlendFactor::ONE,
                dst_alpha_blend_factor: vk::BlendFactor::ZERO,
                alpha_blend_op: vk::BlendOp::ADD,
                color_write_mask: vk::ColorComponentFlags::RGBA,
            }
        } else {
            vk::PipelineColorBlendAttachmentState {
                blend_enable: vk::FALSE,
                color_write_mask: vk::ColorComponentFlags::RGBA,
                ..Default::default()
            }
        }
    }

    /// Whether fragments write depth
    pub fn depth_write(&self) -> bool {
        !self.transparent
    }
}

/// Graphics pipeline bound to one vertex layout and an ordered list of set layouts
pub struct Pipeline {
    device: Device,
    bindings: Vec<vk::VertexInputBindingDescription>,
    attributes: Vec<vk::VertexInputAttributeDescription>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    state: FixedFunctionState,
    vertex_shader: ShaderModule,
    fragment_shader: ShaderModule,
    handles: Option<(vk::Pipeline, vk::PipelineLayout)>,
}

impl Pipeline {
    /// Declare a pipeline; slot `i` of `set_layouts` is descriptor set `i`
    ///
    /// The set layouts are referenced, not owned, and must outlive the pipeline.
    pub fn new(
        context: &VulkanContext,
        vertex_descriptor: &VertexDescriptor,
        vertex_shader: ShaderModule,
        fragment_shader: ShaderModule,
        set_layouts: &[&DescriptorSetLayout],
    ) -> Self {
        Self {
            device: context.device().clone(),
            bindings: vertex_descriptor.binding_descriptions(),
            attributes: vertex_descriptor.attribute_descriptions(),
            set_layouts: set_layouts.iter().map(|l| l.handle()).collect(),
            state: FixedFunctionState::default(),
            vertex_shader,
            fragment_shader,
            handles: None,
        }
    }

    /// Replace the fixed-function state used by the next [`create`](Self::create)
    pub fn set_advanced_features(
        &mut self,
        depth_compare: vk::CompareOp,
        polygon_mode: vk::PolygonMode,
        cull_mode: vk::CullModeFlags,
        transparent: bool,
    ) {
        self.state = FixedFunctionState {
            depth_compare,
            polygon_mode,
            cull_mode,
            transparent,
        };
    }

    /// Fixed-function state
    pub fn state(&self) -> FixedFunctionState {
        self.state
    }

    /// Whether the pipeline blends
    pub fn is_transparent(&self) -> bool {
        self.state.transparent
    }

    /// Whether [`create`](Self::create) has run since the last destroy
    pub fn is_created(&self) -> bool {
        self.handles.is_some()
    }

    /// Compile for `render_pass` with a static viewport covering `extent`
    pub fn create(
        &mut self,
        render_pass: vk::RenderPass,
        extent: vk::Extent2D,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<()> {
        self.destroy();

        let stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(self.vertex_shader.handle())
                .name(ENTRY_POINT)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(self.fragment_shader.handle())
                .name(ENTRY_POINT)
                .build(),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&self.bindings)
            .vertex_attribute_descriptions(&self.attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(self.state.polygon_mode)
            .line_width(1.0)
            .cull_mode(self.state.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(samples);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(self.state.depth_write())
            .depth_compare_op(self.state.depth_compare)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachments = [self.state.blend_attachment()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&self.set_layouts);
        let layout = unsafe { self.device.create_pipeline_layout(&layout_info, None)? };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let created = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        let pipeline = match created {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                unsafe { self.device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::Api(err));
            }
        };

        log::debug!(
            "Created pipeline for {}x{} ({:?}, transparent: {})",
            extent.width,
            extent.height,
            samples,
            self.state.transparent
        );
        self.handles = Some((pipeline, layout));
        Ok(())
    }

    /// Release the compiled pipeline and its layout; safe to call repeatedly
    ///
    /// The descriptor set layouts stay alive with their owners.
    pub fn destroy(&mut self) {
        if let Some((pipeline, layout)) = self.handles.take() {
            unsafe {
                self.device.destroy_pipeline(pipeline, None);
                self.device.destroy_pipeline_layout(layout, None);
            }
        }
    }

    /// Pipeline handle, null before [`create`](Self::create)
    pub fn handle(&self) -> vk::Pipeline {
        self.handles.map(|(pipeline, _)| pipeline).unwrap_or_default()
    }

    /// Pipeline layout, null before [`create`](Self::create)
    pub fn layout(&self) -> vk::PipelineLayout {
        self.handles.map(|(_, layout)| layout).unwrap_or_default()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spirv_words_checks_magic_and_length() {
        let mut blob = SPIRV_MAGIC.to_le_bytes().to_vec();
        blob.extend_from_slice(&42u32.to_le_bytes());
        assert_eq!(spirv_words(&blob).unwrap(), vec![0x0723_0203, 42]);

        assert!(spirv_words(&blob[..5]).is_err());
        assert!(spirv_words(&[0u8; 8]).is_err());
    }

    #[test]
    fn test_transparent_state_blends_without_depth_writes() {
        let state = FixedFunctionState {
            transparent: true,
            ..FixedFunctionState::default()
        };
        let blend = state.blend_attachment();

        assert_eq!(blend.blend_enable, vk::TRUE);
        assert_eq!(blend.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert!(!state.depth_write());
    }

    #[test]
    fn test_opaque_defaults() {
        let state = FixedFunctionState::default();
        assert_eq!(state.depth_compare, vk::CompareOp::LESS);
        assert_eq!(state.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(state.blend_attachment().blend_enable, vk::FALSE);
        assert!(state.depth_write());
    }
}
