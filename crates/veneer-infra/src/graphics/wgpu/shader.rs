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

//! WGSL validation and interface extraction.
//!
//! Bytecode handed to the wgpu device is WGSL source. Resources follow a fixed
//! binding model:
//! * group 0 - vertex-stage constant buffers, bindings `0..4`
//! * group 1 - pixel-stage constant buffers, bindings `0..4`
//! * group 2 - texture unit `n` at binding `2n`, its sampler at `2n + 1`

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, ImageClass, ImageDimension, ScalarKind, TypeInner};
use veneer_core::native::{ComponentType, NativeError, ShaderBytecode, ShaderStage};

/// Constant-buffer slots per stage.
pub(crate) const CONSTANT_SLOTS: u32 = 4;
/// Texture units of the pixel stage.
pub(crate) const TEXTURE_UNITS: u32 = 16;
/// Bind group holding textures and samplers.
pub(crate) const TEXTURE_GROUP: u32 = 2;

/// A user-defined stage input or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Varying {
    pub location: u32,
    pub kind: ComponentType,
}

/// A uniform block the shader reads, with the byte size it expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UniformBinding {
    pub slot: u32,
    pub size: u64,
}

/// A shader that passed validation, with the interface the pipeline cache checks.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedShader {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub inputs: Vec<Varying>,
    pub outputs: Vec<Varying>,
    pub uniforms: Vec<UniformBinding>,
}

fn rejected(label: &str, reason: impl std::fmt::Display) -> NativeError {
    NativeError::ShaderRejected(format!("{label}: {reason}"))
}

fn component_type(inner: &TypeInner) -> Option<ComponentType> {
    let scalar = match inner {
        TypeInner::Scalar(scalar) => scalar,
        TypeInner::Vector { scalar, .. } => scalar,
        _ => return None,
    };
    match scalar.kind {
        ScalarKind::Float => Some(ComponentType::Float),
        ScalarKind::Uint => Some(ComponentType::Uint),
        ScalarKind::Sint => Some(ComponentType::Sint),
        _ => None,
    }
}

/// Flattens the bindings of an argument or result, descending into structs.
/// Returns `true` if a clip-space position builtin was found.
fn collect_varyings(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&Binding>,
    out: &mut Vec<Varying>,
) -> bool {
    match binding {
        Some(Binding::Location { location, .. }) => {
            if let Some(kind) = component_type(&module.types[ty].inner) {
                out.push(Varying {
                    location: *location,
                    kind,
                });
            }
            false
        }
        Some(Binding::BuiltIn(builtin)) => matches!(builtin, naga::BuiltIn::Position { .. }),
        None => match &module.types[ty].inner {
            TypeInner::Struct { members, .. } => {
                let mut position = false;
                for member in members {
                    position |= collect_varyings(module, member.ty, member.binding.as_ref(), out);
                }
                position
            }
            _ => false,
        },
    }
}

/// Parses and validates WGSL bytecode for `stage`.
/// ## Errors
/// * `NativeError::ShaderRejected` - If the source does not parse or validate, has
///   no entry point for the stage, disagrees with its input signature, or binds
///   resources outside the binding model.
pub(crate) fn validate_wgsl(
    bytecode: &ShaderBytecode,
    stage: ShaderStage,
) -> Result<(ValidatedShader, String), NativeError> {
    let label = bytecode.label.as_deref().unwrap_or("<unnamed>");
    let source = std::str::from_utf8(&bytecode.code)
        .map_err(|e| rejected(label, format!("bytecode is not UTF-8 WGSL: {e}")))?;

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| rejected(label, e.emit_to_string(source)))?;
    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| rejected(label, e))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Pixel => naga::ShaderStage::Fragment,
    };
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.stage == wanted)
        .ok_or_else(|| rejected(label, format!("no {stage:?} entry point")))?;

    let mut inputs = Vec::new();
    for argument in &entry.function.arguments {
        collect_varyings(&module, argument.ty, argument.binding.as_ref(), &mut inputs);
    }
    let mut outputs = Vec::new();
    let writes_position = entry
        .function
        .result
        .as_ref()
        .is_some_and(|result| {
            collect_varyings(&module, result.ty, result.binding.as_ref(), &mut outputs)
        });

    match stage {
        ShaderStage::Vertex => {
            if !writes_position {
                return Err(rejected(label, "vertex entry point does not write a position"));
            }
            for input in &inputs {
                let element = bytecode
                    .input_signature
                    .iter()
                    .find(|e| e.location == input.location)
                    .ok_or_else(|| {
                        rejected(
                            label,
                            format!("input location {} has no signature element", input.location),
                        )
                    })?;
                if element.component_type != input.kind {
                    return Err(rejected(
                        label,
                        format!(
                            "input location {} reads {:?} but the signature declares {:?}",
                            input.location, input.kind, element.component_type
                        ),
                    ));
                }
            }
        }
        ShaderStage::Pixel => {
            if let Some(output) = outputs
                .iter()
                .find(|o| o.location != 0 || o.kind != ComponentType::Float)
            {
                return Err(rejected(
                    label,
                    format!(
                        "pixel output at location {} ({:?}) has no float color target",
                        output.location, output.kind
                    ),
                ));
            }
        }
    }

    let constant_group = match stage {
        ShaderStage::Vertex => 0,
        ShaderStage::Pixel => 1,
    };
    let mut uniforms = Vec::new();
    for (_, var) in module.global_variables.iter() {
        let Some(rb) = &var.binding else { continue };
        let inner = &module.types[var.ty].inner;
        let name = var.name.as_deref().unwrap_or("?");
        match var.space {
            AddressSpace::Uniform if rb.group == constant_group && rb.binding < CONSTANT_SLOTS => {
                uniforms.push(UniformBinding {
                    slot: rb.binding,
                    size: u64::from(inner.size(module.to_ctx())),
                });
            }
            AddressSpace::Handle
                if rb.group == TEXTURE_GROUP && rb.binding < 2 * TEXTURE_UNITS =>
            {
                let fits = if rb.binding % 2 == 0 {
                    matches!(
                        inner,
                        TypeInner::Image {
                            dim: ImageDimension::D2,
                            arrayed: false,
                            class: ImageClass::Sampled {
                                kind: ScalarKind::Float,
                                multi: false
                            },
                        }
                    )
                } else {
                    matches!(inner, TypeInner::Sampler { comparison: false })
                };
                if !fits {
                    return Err(rejected(
                        label,
                        format!(
                            "'{name}' at @group({}) @binding({}) must be a {}",
                            rb.group,
                            rb.binding,
                            if rb.binding % 2 == 0 {
                                "texture_2d<f32>"
                            } else {
                                "sampler"
                            }
                        ),
                    ));
                }
            }
            _ => {
                return Err(rejected(
                    label,
                    format!(
                        "'{name}' at @group({}) @binding({}) is outside the binding model",
                        rb.group, rb.binding
                    ),
                ));
            }
        }
    }

    log::debug!(
        "Validated {stage:?} shader '{label}': entry '{}', {} inputs, {} uniforms",
        entry.name,
        inputs.len(),
        uniforms.len()
    );

    Ok((
        ValidatedShader {
            stage,
            entry_point: entry.name.clone(),
            inputs,
            outputs,
            uniforms,
        },
        source.to_owned(),
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use veneer_core::native::{Semantic, SignatureElement};

    pub(crate) const VERTEX_WGSL: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@group(0) @binding(0) var<uniform> transform: mat4x4<f32>;

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) color: vec4<f32>) -> VsOut {
    var out: VsOut;
    out.pos = transform * vec4<f32>(position, 1.0);
    out.color = color;
    return out;
}
"#;

    pub(crate) const PIXEL_WGSL: &str = r#"
@group(1) @binding(0) var<uniform> tint: vec4<f32>;
@group(2) @binding(0) var tex0: texture_2d<f32>;
@group(2) @binding(1) var samp0: sampler;

@fragment
fn fs_main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color * tint * textureSample(tex0, samp0, vec2<f32>(0.5, 0.5));
}
"#;

    pub(crate) fn position_color_signature() -> Vec<SignatureElement> {
        vec![
            SignatureElement {
                semantic: Semantic::Position,
                semantic_index: 0,
                component_type: ComponentType::Float,
                location: 0,
            },
            SignatureElement {
                semantic: Semantic::Color,
                semantic_index: 0,
                component_type: ComponentType::Float,
                location: 1,
            },
        ]
    }

    #[test]
    fn test_vertex_shader_interface() {
        let bytecode = ShaderBytecode::new(VERTEX_WGSL)
            .with_signature(position_color_signature())
            .with_label("colored.vs");

        let (shader, _) = validate_wgsl(&bytecode, ShaderStage::Vertex).unwrap();

        assert_eq!(shader.entry_point, "vs_main");
        assert_eq!(shader.inputs.len(), 2);
        assert_eq!(
            shader.outputs,
            vec![Varying {
                location: 0,
                kind: ComponentType::Float
            }]
        );
        assert_eq!(shader.uniforms, vec![UniformBinding { slot: 0, size: 64 }]);
    }

    #[test]
    fn test_pixel_shader_interface() {
        let bytecode = ShaderBytecode::new(PIXEL_WGSL).with_label("colored.ps");

        let (shader, _) = validate_wgsl(&bytecode, ShaderStage::Pixel).unwrap();

        assert_eq!(shader.entry_point, "fs_main");
        assert_eq!(shader.uniforms, vec![UniformBinding { slot: 0, size: 16 }]);
    }

    #[test]
    fn test_input_without_signature_is_rejected() {
        let mut signature = position_color_signature();
        signature.pop();
        let bytecode = ShaderBytecode::new(VERTEX_WGSL).with_signature(signature);

        let result = validate_wgsl(&bytecode, ShaderStage::Vertex);

        assert!(matches!(result, Err(NativeError::ShaderRejected(msg)) if msg.contains("location 1")));
    }

    #[test]
    fn test_garbage_is_rejected() {
        let bytecode = ShaderBytecode::new(vec![0x44, 0x58, 0x42, 0x43, 0xff]);

        let result = validate_wgsl(&bytecode, ShaderStage::Pixel);

        assert!(matches!(result, Err(NativeError::ShaderRejected(_))));
    }

    #[test]
    fn test_wrong_stage_is_rejected() {
        let bytecode = ShaderBytecode::new(PIXEL_WGSL);

        let result = validate_wgsl(&bytecode, ShaderStage::Vertex);

        assert!(matches!(result, Err(NativeError::ShaderRejected(msg)) if msg.contains("entry point")));
    }

    #[test]
    fn test_binding_outside_model_is_rejected() {
        let source = r#"
@group(3) @binding(0) var<uniform> extra: vec4<f32>;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return extra;
}
"#;
        let bytecode = ShaderBytecode::new(source);

        let result = validate_wgsl(&bytecode, ShaderStage::Pixel);

        assert!(matches!(result, Err(NativeError::ShaderRejected(msg)) if msg.contains("binding model")));
    }
}
