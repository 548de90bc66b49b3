// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Render pipelines keyed by the bound shaders, layout and state objects.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use veneer_core::native::{
    BlendDesc, BlendOperation, DepthStencilDesc, IndexFormat, NativeInputLayoutId,
    NativeShaderId, PrimitiveTopology, RasterizerDesc, ShaderStage, TextureFormat,
};

use super::conversions::IntoWgpu;
use super::device::{InputLayoutEntry, ShaderEntry};
use super::shader::{ValidatedShader, CONSTANT_SLOTS, TEXTURE_UNITS};

/// Everything a render pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub vertex_shader: NativeShaderId,
    pub pixel_shader: NativeShaderId,
    pub input_layout: NativeInputLayoutId,
    pub stride: u32,
    pub topology: PrimitiveTopology,
    pub strip_index_format: Option<IndexFormat>,
    pub color_format: TextureFormat,
    pub depth: Option<(TextureFormat, DepthStencilDesc)>,
    pub blend: BlendDesc,
    pub rasterizer: RasterizerDesc,
}

/// Bind group layouts shared by every pipeline, and the placeholders bound to
/// empty slots.
#[derive(Debug)]
pub(crate) struct BindingModel {
    constant_layouts: [wgpu::BindGroupLayout; 2],
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    dummy_uniform: wgpu::Buffer,
    dummy_view: wgpu::TextureView,
    dummy_sampler: wgpu::Sampler,
    max_uniform_binding: u64,
}

impl BindingModel {
    fn new(device: &wgpu::Device) -> Self {
        let uniform_entries: Vec<_> = (0..CONSTANT_SLOTS)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        let constant_layouts = ["Veneer VS Constants", "Veneer PS Constants"].map(|label| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: &uniform_entries,
            })
        });

        let texture_entries: Vec<_> = (0..TEXTURE_UNITS)
            .flat_map(|unit| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: unit * 2 + 1,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Veneer Textures"),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Veneer Pipeline Layout"),
            bind_group_layouts: &[
                &constant_layouts[0],
                &constant_layouts[1],
                &texture_layout,
            ],
            immediate_size: 0,
        });

        let max_uniform_binding = u64::from(device.limits().max_uniform_buffer_binding_size);
        let dummy_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Veneer Unbound Constants"),
            size: max_uniform_binding.min(64 * 1024),
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });
        let dummy_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Veneer Unbound Texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let dummy_view = dummy_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let dummy_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Veneer Unbound Sampler"),
            ..Default::default()
        });

        Self {
            constant_layouts,
            texture_layout,
            pipeline_layout,
            dummy_uniform,
            dummy_view,
            dummy_sampler,
            max_uniform_binding,
        }
    }

    /// Byte size a shader sees when reading `buffer`, or the placeholder.
    pub(crate) fn visible_size(&self, buffer: Option<&wgpu::Buffer>) -> u64 {
        buffer
            .unwrap_or(&self.dummy_uniform)
            .size()
            .min(self.max_uniform_binding)
    }

    /// Builds the constant-buffer group of `stage`. Empty slots read zeros.
    pub(crate) fn constant_bind_group(
        &self,
        device: &wgpu::Device,
        stage: ShaderStage,
        buffers: &[Option<Arc<wgpu::Buffer>>],
    ) -> wgpu::BindGroup {
        let entries: Vec<_> = (0..CONSTANT_SLOTS)
            .map(|slot| {
                let buffer = buffers
                    .get(slot as usize)
                    .and_then(Option::as_deref)
                    .unwrap_or(&self.dummy_uniform);
                wgpu::BindGroupEntry {
                    binding: slot,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: 0,
                        size: NonZeroU64::new(self.visible_size(Some(buffer))),
                    }),
                }
            })
            .collect();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Veneer Constants"),
            layout: &self.constant_layouts[stage.index()],
            entries: &entries,
        })
    }

    /// Builds the texture group. Empty units sample a transparent black texel.
    pub(crate) fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        views: &[Option<Arc<wgpu::TextureView>>],
        samplers: &[Option<Arc<wgpu::Sampler>>],
    ) -> wgpu::BindGroup {
        let entries: Vec<_> = (0..TEXTURE_UNITS)
            .flat_map(|unit| {
                let view = views
                    .get(unit as usize)
                    .and_then(Option::as_deref)
                    .unwrap_or(&self.dummy_view);
                let sampler = samplers
                    .get(unit as usize)
                    .and_then(Option::as_deref)
                    .unwrap_or(&self.dummy_sampler);
                [
                    wgpu::BindGroupEntry {
                        binding: unit * 2,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: unit * 2 + 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ]
            })
            .collect();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Veneer Textures"),
            layout: &self.texture_layout,
            entries: &entries,
        })
    }
}

/// Every pixel-stage input must be produced by the vertex stage with the same value class.
fn check_interface(vertex: &ValidatedShader, pixel: &ValidatedShader) -> Result<(), String> {
    for input in &pixel.inputs {
        match vertex.outputs.iter().find(|o| o.location == input.location) {
            Some(output) if output.kind == input.kind => {}
            Some(output) => {
                return Err(format!(
                    "location {} is written as {:?} but read as {:?}",
                    input.location, output.kind, input.kind
                ));
            }
            None => {
                return Err(format!(
                    "pixel shader reads location {} which the vertex shader never writes",
                    input.location
                ));
            }
        }
    }
    Ok(())
}

fn blend_state(desc: &BlendDesc) -> Option<wgpu::BlendState> {
    if !desc.enabled {
        return None;
    }
    // Min and max ignore the factors; wgpu insists they are One.
    let (src, dst) = match desc.op {
        BlendOperation::Min | BlendOperation::Max => {
            (wgpu::BlendFactor::One, wgpu::BlendFactor::One)
        }
        _ => (desc.src.into_wgpu(), desc.dst.into_wgpu()),
    };
    let component = wgpu::BlendComponent {
        src_factor: src,
        dst_factor: dst,
        operation: desc.op.into_wgpu(),
    };
    Some(wgpu::BlendState {
        color: component,
        alpha: component,
    })
}

fn depth_stencil_state(format: TextureFormat, desc: &DepthStencilDesc) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: format.into_wgpu(),
        depth_write_enabled: desc.depth_test && desc.depth_write,
        depth_compare: if desc.depth_test {
            desc.depth_func.into_wgpu()
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

fn primitive_state(key: &PipelineKey) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: key.topology.into_wgpu(),
        strip_index_format: key.strip_index_format.map(IntoWgpu::into_wgpu),
        front_face: if key.rasterizer.front_ccw {
            wgpu::FrontFace::Ccw
        } else {
            wgpu::FrontFace::Cw
        },
        cull_mode: key.rasterizer.cull.into_wgpu(),
        ..Default::default()
    }
}

/// The shaders and layout named by a [`PipelineKey`].
pub(crate) struct PipelineSources<'a> {
    pub vertex: &'a ShaderEntry,
    pub pixel: &'a ShaderEntry,
    pub layout: &'a InputLayoutEntry,
}

#[derive(Debug)]
pub(crate) struct PipelineCache {
    model: BindingModel,
    pipelines: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
}

impl PipelineCache {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        Self {
            model: BindingModel::new(device),
            pipelines: HashMap::new(),
        }
    }

    pub(crate) fn model(&self) -> &BindingModel {
        &self.model
    }

    pub(crate) fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns the pipeline for `key`, creating it on first use.
    /// ## Errors
    /// A message if the shaders' interfaces do not line up.
    pub(crate) fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: PipelineKey,
        sources: PipelineSources<'_>,
    ) -> Result<Arc<wgpu::RenderPipeline>, String> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(pipeline.clone());
        }
        check_interface(&sources.vertex.info, &sources.pixel.info)?;

        let vertex_buffer = wgpu::VertexBufferLayout {
            array_stride: u64::from(key.stride),
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &sources.layout.attributes,
        };
        let color_target = wgpu::ColorTargetState {
            format: key.color_format.into_wgpu(),
            blend: blend_state(&key.blend),
            write_mask: wgpu::ColorWrites::ALL,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Veneer Pipeline"),
            layout: Some(&self.model.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &sources.vertex.module,
                entry_point: Some(&sources.vertex.info.entry_point),
                compilation_options: Default::default(),
                buffers: &[vertex_buffer],
            },
            primitive: primitive_state(&key),
            depth_stencil: key
                .depth
                .map(|(format, desc)| depth_stencil_state(format, &desc)),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &sources.pixel.module,
                entry_point: Some(&sources.pixel.info.entry_point),
                compilation_options: Default::default(),
                targets: &[Some(color_target)],
            }),
            multiview_mask: None,
            cache: None,
        });
        let pipeline = Arc::new(pipeline);
        self.pipelines.insert(key, pipeline.clone());
        log::debug!(
            "PipelineCache: created pipeline #{} for {:?}/{:?}",
            self.pipelines.len(),
            key.vertex_shader,
            key.pixel_shader
        );
        Ok(pipeline)
    }

    /// Drops every pipeline built from `shader`.
    pub(crate) fn purge_shader(&mut self, shader: NativeShaderId) {
        self.pipelines
            .retain(|key, _| key.vertex_shader != shader && key.pixel_shader != shader);
    }

    /// Drops every pipeline built from `layout`.
    pub(crate) fn purge_layout(&mut self, layout: NativeInputLayoutId) {
        self.pipelines.retain(|key, _| key.input_layout != layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::wgpu::shader::Varying;
    use veneer_core::native::{BlendFactor, CompareFunction, ComponentType};

    fn shader(outputs: Vec<Varying>, inputs: Vec<Varying>) -> ValidatedShader {
        ValidatedShader {
            stage: ShaderStage::Vertex,
            entry_point: "main".to_owned(),
            inputs,
            outputs,
            uniforms: Vec::new(),
        }
    }

    fn varying(location: u32, kind: ComponentType) -> Varying {
        Varying { location, kind }
    }

    #[test]
    fn test_interface_matches_by_location_and_kind() {
        let vs = shader(
            vec![
                varying(0, ComponentType::Float),
                varying(1, ComponentType::Uint),
            ],
            Vec::new(),
        );
        let ps_ok = shader(Vec::new(), vec![varying(1, ComponentType::Uint)]);
        let ps_kind = shader(Vec::new(), vec![varying(0, ComponentType::Sint)]);
        let ps_missing = shader(Vec::new(), vec![varying(2, ComponentType::Float)]);

        assert!(check_interface(&vs, &ps_ok).is_ok());
        assert!(check_interface(&vs, &ps_kind).is_err());
        assert!(check_interface(&vs, &ps_missing).is_err());
    }

    #[test]
    fn test_disabled_depth_test_never_writes() {
        let desc = DepthStencilDesc {
            depth_test: false,
            depth_write: true,
            depth_func: CompareFunction::Less,
        };

        let state = depth_stencil_state(TextureFormat::Depth32Float, &desc);

        assert!(!state.depth_write_enabled);
        assert_eq!(state.depth_compare, wgpu::CompareFunction::Always);
    }

    #[test]
    fn test_min_blend_forces_unit_factors() {
        let desc = BlendDesc {
            enabled: true,
            src: BlendFactor::SrcAlpha,
            dst: BlendFactor::OneMinusSrcAlpha,
            op: BlendOperation::Min,
        };

        let state = blend_state(&desc).unwrap();

        assert_eq!(state.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(state.color.operation, wgpu::BlendOperation::Min);
        assert!(blend_state(&BlendDesc::default()).is_none());
    }
}
