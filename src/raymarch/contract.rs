//! Kernel interface checks.
//!
//! A raymarch kernel is usable only if its `KernelParams` and
//! `ShapeDescriptor` structs match the Rust layouts member for member, it
//! declares the eight group-0 bindings the backend fills, and its `main`
//! entry point runs 8×8×1 groups. The check runs on naga IR, so it needs no
//! GPU device.

use std::mem::offset_of;

use naga::{AddressSpace, ArraySize, ScalarKind, ShaderStage, TypeInner};

use super::descriptor::{ShapeDescriptor, SHAPE_DESCRIPTOR_STRIDE};
use super::dispatch::WORKGROUP_SIZE;
use super::uniforms::{Uniform, UniformLayout};
use crate::error::VolmarchError;

/// Built-in raymarch kernel.
pub const BUILTIN_KERNEL: &str = include_str!("../../assets/shaders/raymarch.wgsl");

/// Kernel entry point name.
pub const ENTRY_POINT: &str = "main";

/// Resource class a binding slot must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Uniform,
    Storage,
    Texture,
}

const BINDINGS: [(u32, &str, Slot); 8] = [
    (0, "params", Slot::Uniform),
    (1, "shapes", Slot::Storage),
    (2, "voxels", Slot::Storage),
    (3, "source", Slot::Texture),
    (4, "result", Slot::Texture),
    (5, "albedo_quarter", Slot::Texture),
    (6, "mask_quarter", Slot::Texture),
    (7, "depth", Slot::Texture),
];

const SHAPE_FIELDS: [(&str, usize, &str); 16] = [
    ("position", offset_of!(ShapeDescriptor, position), "array<f32, 3>"),
    ("half_extent", offset_of!(ShapeDescriptor, half_extent), "array<f32, 3>"),
    ("color", offset_of!(ShapeDescriptor, color), "array<f32, 3>"),
    ("collider_min", offset_of!(ShapeDescriptor, collider_min), "array<f32, 3>"),
    ("collider_max", offset_of!(ShapeDescriptor, collider_max), "array<f32, 3>"),
    ("shape_kind", offset_of!(ShapeDescriptor, shape_kind), "u32"),
    ("phase_kind", offset_of!(ShapeDescriptor, phase_kind), "u32"),
    ("sigma_absorption", offset_of!(ShapeDescriptor, sigma_absorption), "f32"),
    ("sigma_scatter", offset_of!(ShapeDescriptor, sigma_scatter), "f32"),
    ("feathering_strength", offset_of!(ShapeDescriptor, feathering_strength), "f32"),
    ("asymmetry_g", offset_of!(ShapeDescriptor, asymmetry_g), "f32"),
    ("sparsity", offset_of!(ShapeDescriptor, sparsity), "f32"),
    ("transparency", offset_of!(ShapeDescriptor, transparency), "f32"),
    ("gravity_multiplier", offset_of!(ShapeDescriptor, gravity_multiplier), "f32"),
    ("use_light", offset_of!(ShapeDescriptor, use_light), "u32"),
    ("use_forward_path", offset_of!(ShapeDescriptor, use_forward_path), "u32"),
];

fn mismatch(msg: String) -> VolmarchError {
    VolmarchError::ShaderCompose(format!("kernel interface: {msg}"))
}

/// Parse and validate WGSL kernel source, then check its interface.
///
/// # Errors
///
/// Returns [`VolmarchError::ShaderCompose`] describing the first parse,
/// validation, or interface problem.
pub fn load_kernel(source: &str) -> Result<naga::Module, VolmarchError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| VolmarchError::ShaderCompose(e.emit_to_string(source)))?;
    let _ = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| VolmarchError::ShaderCompose(format!("{e:?}")))?;
    check_interface(&module)?;
    Ok(module)
}

/// Check a parsed kernel against the Rust-side layouts and bindings.
///
/// # Errors
///
/// Returns [`VolmarchError::ShaderCompose`] naming the first mismatch.
pub fn check_interface(module: &naga::Module) -> Result<(), VolmarchError> {
    check_params(module)?;
    check_shape_descriptor(module)?;
    check_bindings(module)?;
    check_entry_point(module)
}

fn struct_members<'m>(
    module: &'m naga::Module,
    name: &str,
) -> Result<(&'m [naga::StructMember], u32), VolmarchError> {
    module
        .types
        .iter()
        .find_map(|(_, ty)| match &ty.inner {
            TypeInner::Struct { members, span } if ty.name.as_deref() == Some(name) => {
                Some((members.as_slice(), *span))
            }
            _ => None,
        })
        .ok_or_else(|| mismatch(format!("struct {name} not declared")))
}

fn scalar_name(scalar: naga::Scalar) -> &'static str {
    match (scalar.kind, scalar.width) {
        (ScalarKind::Float, 4) => "f32",
        (ScalarKind::Uint, 4) => "u32",
        (ScalarKind::Sint, 4) => "i32",
        (ScalarKind::Bool, _) => "bool",
        _ => "<unsupported scalar>",
    }
}

/// WGSL spelling of the member types a kernel interface may use.
fn wgsl_type(module: &naga::Module, ty: naga::Handle<naga::Type>) -> String {
    match &module.types[ty].inner {
        TypeInner::Scalar(scalar) => scalar_name(*scalar).to_owned(),
        TypeInner::Vector { size, scalar } => {
            format!("vec{}<{}>", *size as u8, scalar_name(*scalar))
        }
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => format!(
            "mat{}x{}<{}>",
            *columns as u8,
            *rows as u8,
            scalar_name(*scalar)
        ),
        TypeInner::Array {
            base,
            size: ArraySize::Constant(len),
            ..
        } => format!("array<{}, {len}>", wgsl_type(module, *base)),
        _ => "<unsupported type>".to_owned(),
    }
}

fn check_members<'a>(
    struct_name: &str,
    module: &naga::Module,
    members: &[naga::StructMember],
    expected: impl ExactSizeIterator<Item = (&'a str, usize, &'a str)>,
) -> Result<(), VolmarchError> {
    if members.len() != expected.len() {
        return Err(mismatch(format!(
            "{struct_name} has {} members, expected {}",
            members.len(),
            expected.len()
        )));
    }
    for (member, (name, offset, ty)) in members.iter().zip(expected) {
        let found = member.name.as_deref().unwrap_or("<unnamed>");
        if found != name {
            return Err(mismatch(format!(
                "{struct_name} member '{found}' where '{name}' was expected"
            )));
        }
        if member.offset as usize != offset {
            return Err(mismatch(format!(
                "{struct_name}.{name} at offset {}, expected {offset}",
                member.offset
            )));
        }
        let found_ty = wgsl_type(module, member.ty);
        if found_ty != ty {
            return Err(mismatch(format!(
                "{struct_name}.{name} is {found_ty}, expected {ty}"
            )));
        }
    }
    Ok(())
}

fn check_params(module: &naga::Module) -> Result<(), VolmarchError> {
    let (members, span) = struct_members(module, "KernelParams")?;
    let layout = UniformLayout::kernel_params();
    check_members(
        "KernelParams",
        module,
        members,
        Uniform::ALL
            .iter()
            .map(|u| (u.name(), layout.offset(*u), u.kind().wgsl())),
    )?;
    if span as usize != layout.size() {
        return Err(mismatch(format!(
            "KernelParams is {span} bytes, expected {}",
            layout.size()
        )));
    }
    Ok(())
}

fn check_shape_descriptor(module: &naga::Module) -> Result<(), VolmarchError> {
    let (members, span) = struct_members(module, "ShapeDescriptor")?;
    check_members("ShapeDescriptor", module, members, SHAPE_FIELDS.into_iter())?;
    if span as usize != SHAPE_DESCRIPTOR_STRIDE {
        return Err(mismatch(format!(
            "ShapeDescriptor is {span} bytes, expected {SHAPE_DESCRIPTOR_STRIDE}"
        )));
    }
    Ok(())
}

fn check_bindings(module: &naga::Module) -> Result<(), VolmarchError> {
    for (binding, name, slot) in BINDINGS {
        let global = module
            .global_variables
            .iter()
            .map(|(_, var)| var)
            .find(|var| {
                var.binding
                    .as_ref()
                    .is_some_and(|b| b.group == 0 && b.binding == binding)
            })
            .ok_or_else(|| {
                mismatch(format!("@group(0) @binding({binding}) {name} missing"))
            })?;
        if global.name.as_deref() != Some(name) {
            return Err(mismatch(format!(
                "@binding({binding}) is '{}', expected '{name}'",
                global.name.as_deref().unwrap_or("<unnamed>")
            )));
        }
        let found = match global.space {
            AddressSpace::Uniform => Slot::Uniform,
            AddressSpace::Storage { .. } => Slot::Storage,
            _ => Slot::Texture,
        };
        if found != slot {
            return Err(mismatch(format!(
                "@binding({binding}) {name} is {found:?}, expected {slot:?}"
            )));
        }
    }
    Ok(())
}

fn check_entry_point(module: &naga::Module) -> Result<(), VolmarchError> {
    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == ENTRY_POINT && ep.stage == ShaderStage::Compute)
        .ok_or_else(|| mismatch(format!("compute entry point '{ENTRY_POINT}' missing")))?;
    let expected = [WORKGROUP_SIZE, WORKGROUP_SIZE, 1];
    if entry.workgroup_size != expected {
        return Err(mismatch(format!(
            "workgroup size {:?}, expected {expected:?}",
            entry.workgroup_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rejected(source: &str, needle: &str) {
        match load_kernel(source) {
            Err(VolmarchError::ShaderCompose(msg)) => {
                assert!(msg.contains(needle), "unexpected message: {msg}");
            }
            other => panic!("kernel accepted: {other:?}"),
        }
    }

    #[test]
    fn builtin_kernel_matches_rust_layouts() {
        let module = load_kernel(BUILTIN_KERNEL).unwrap();
        assert_eq!(module.entry_points.len(), 1);
    }

    #[test]
    fn reordered_params_are_rejected() {
        let swapped = BUILTIN_KERNEL.replacen(
            "    time: f32,\n    sharpness: f32,",
            "    sharpness: f32,\n    time: f32,",
            1,
        );
        assert_ne!(swapped, BUILTIN_KERNEL);
        assert_rejected(&swapped, "KernelParams member 'sharpness'");
    }

    #[test]
    fn retyped_param_is_rejected() {
        let retyped = BUILTIN_KERNEL.replacen("    sharpness: f32,", "    sharpness: u32,", 1);
        assert_ne!(retyped, BUILTIN_KERNEL);
        assert_rejected(&retyped, "KernelParams.sharpness is u32, expected f32");
    }

    #[test]
    fn retyped_shape_field_is_rejected() {
        let retyped = BUILTIN_KERNEL
            .replacen("    use_forward_path: u32,", "    use_forward_path: f32,", 1)
            .replacen("shape.use_forward_path == 1u", "shape.use_forward_path == 1.0", 1);
        assert_ne!(retyped, BUILTIN_KERNEL);
        assert_rejected(&retyped, "ShapeDescriptor.use_forward_path is f32, expected u32");
    }

    #[test]
    fn moved_binding_is_rejected() {
        let moved = BUILTIN_KERNEL.replacen(
            "@group(0) @binding(7) var depth",
            "@group(0) @binding(9) var depth",
            1,
        );
        assert_ne!(moved, BUILTIN_KERNEL);
        assert_rejected(&moved, "@binding(7)");
    }

    #[test]
    fn wrong_workgroup_size_is_rejected() {
        let resized = BUILTIN_KERNEL.replacen(
            "@workgroup_size(8, 8, 1)",
            "@workgroup_size(16, 16, 1)",
            1,
        );
        assert_ne!(resized, BUILTIN_KERNEL);
        assert_rejected(&resized, "workgroup size");
    }

    #[test]
    fn unparsable_source_is_rejected() {
        assert!(matches!(
            load_kernel("fn main( {"),
            Err(VolmarchError::ShaderCompose(_))
        ));
    }
}
