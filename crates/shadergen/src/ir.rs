//! Shader intermediate representation and the lowering pass that builds it.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec3;
use scene::{Color, Geometry, Material, RenderMode, SceneObject, SdfNode, Shape, MAX_SDF_DEPTH};

use crate::layout;
use crate::{
    CameraSource, GenerateOptions, ShaderError, ShaderTarget, FUZZY_METAL_ROUGHNESS, GLASS_IOR,
    HIT_EPSILON, MAX_BOUNCES, MAX_DISTANCE, MAX_MARCH_STEPS, SHINY_METAL_ROUGHNESS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `Camera` uniform block
    Camera,
    /// `Frame` uniform block
    Frame,
    /// Running sample sum, offline screen shaders only
    AccumTexture,
    /// `ExportParams` uniform block
    ExportParams,
    /// Storage array the export kernel writes distances to
    ExportValues,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub group: u32,
    pub binding: u32,
    pub name: &'static str,
    pub kind: BindingKind,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    U32(u32),
    F32(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    pub name: &'static str,
    pub value: ConstValue,
}

/// Shared routines, emitted at most once each
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LibraryRoutine {
    Random,
    CameraRay,
    SurfaceHit,
    HitSphere,
    Primitive(Geometry),
    SmoothUnion,
    InverseRotate,
    RepeatDomain,
    March,
    ReflectRough,
    Schlick,
    Scatter(Material),
    Background,
    Trace,
}

/// Routines generated for one object
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectRoutines {
    pub id: u32,
    /// Closed form sphere test, raytrace mode only
    pub analytic_sphere: Option<(Vec3, f32)>,
    /// Distance field for objects that are ray-marched
    pub distance_field: Option<SdfNode>,
    /// Scatter routine and surface color, screen targets only
    pub shading: Option<(Material, Color)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// `vs_main`, full screen triangles
    Vertex,
    /// `fs_main`, one frame straight to the screen
    RealTime,
    /// `fs_trace`, previous sum plus a new sample
    Trace,
    /// `fs_present`, scaled sum to the screen
    Present,
    /// `cs_export`, distance samples over a grid
    Export,
}

impl EntryPoint {
    pub fn name(self) -> &'static str {
        match self {
            EntryPoint::Vertex => "vs_main",
            EntryPoint::RealTime => "fs_main",
            EntryPoint::Trace => "fs_trace",
            EntryPoint::Present => "fs_present",
            EntryPoint::Export => "cs_export",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderIr {
    pub target: ShaderTarget,
    pub camera: CameraSource,
    pub bindings: Vec<Binding>,
    pub constants: Vec<Constant>,
    pub library: BTreeSet<LibraryRoutine>,
    pub objects: BTreeMap<u32, ObjectRoutines>,
    pub entry_points: Vec<EntryPoint>,
}

impl ShaderIr {
    pub fn binding(&self, kind: BindingKind) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.kind == kind)
    }

    pub fn constant(&self, name: &str) -> Option<ConstValue> {
        self.constants.iter().find(|c| c.name == name).map(|c| c.value)
    }

    /// Objects that take part in the ray march, in id order
    pub fn marched(&self) -> impl Iterator<Item = (u32, &SdfNode)> {
        self.objects
            .values()
            .filter_map(|o| o.distance_field.as_ref().map(|node| (o.id, node)))
    }

    /// Objects intersected in closed form, in id order
    pub fn analytic(&self) -> impl Iterator<Item = (u32, Vec3, f32)> + '_ {
        self.objects
            .values()
            .filter_map(|o| o.analytic_sphere.map(|(center, radius)| (o.id, center, radius)))
    }

    pub fn has_entry_point(&self, entry: EntryPoint) -> bool {
        self.entry_points.contains(&entry)
    }
}

/// Builds the IR for `objects`.
///
/// Objects sharing an id are emitted once, using the first occurrence.
///
/// # Errors
///
/// See [`crate::generate`].
pub fn lower(objects: &[SceneObject], options: &GenerateOptions) -> Result<ShaderIr, ShaderError> {
    if options.num_samples == 0 {
        return Err(ShaderError::InvalidSampleCount);
    }

    let screen = options.target == ShaderTarget::Screen;
    // The export kernel samples the composed field, so everything is a distance field.
    let march_everything = !screen || options.render_mode == RenderMode::Sdf;

    let mut library = BTreeSet::new();
    let mut routines = BTreeMap::new();

    for object in objects {
        if routines.contains_key(&object.id) {
            tracing::debug!(id = object.id, "skipping duplicate object id");
            continue;
        }

        let (analytic_sphere, distance_field) = match &object.shape {
            Shape::Sphere { center, radius } if !march_everything => (Some((*center, *radius)), None),
            shape => (None, Some(shape.to_sdf())),
        };

        if analytic_sphere.is_some() {
            library.insert(LibraryRoutine::HitSphere);
        }
        if let Some(node) = &distance_field {
            let depth = node.depth();
            if depth > MAX_SDF_DEPTH {
                return Err(ShaderError::SdfDepthExceeded {
                    id: object.id,
                    depth,
                    max: MAX_SDF_DEPTH,
                });
            }
            collect_sdf_routines(node, &mut library);
        }

        let shading = screen.then(|| {
            library.extend(scatter_routines(object.material));
            (object.material, object.color.clone())
        });

        routines.insert(
            object.id,
            ObjectRoutines {
                id: object.id,
                analytic_sphere,
                distance_field,
                shading,
            },
        );
    }

    if routines.values().any(|o| o.distance_field.is_some()) && screen {
        library.insert(LibraryRoutine::March);
    }

    let mut bindings = Vec::new();
    let entry_points;
    if screen {
        library.extend([
            LibraryRoutine::Random,
            LibraryRoutine::CameraRay,
            LibraryRoutine::SurfaceHit,
            LibraryRoutine::Background,
            LibraryRoutine::Trace,
        ]);

        if options.camera == CameraSource::Uniform {
            bindings.push(binding(layout::CAMERA_BINDING, "camera", BindingKind::Camera));
        }
        bindings.push(binding(layout::FRAME_BINDING, "frame", BindingKind::Frame));

        entry_points = if options.real_time {
            vec![EntryPoint::Vertex, EntryPoint::RealTime]
        } else {
            bindings.push(binding(layout::ACCUM_BINDING, "accum_texture", BindingKind::AccumTexture));
            vec![EntryPoint::Vertex, EntryPoint::Trace, EntryPoint::Present]
        };
    } else {
        bindings.push(binding(layout::EXPORT_PARAMS_BINDING, "params", BindingKind::ExportParams));
        bindings.push(binding(layout::EXPORT_VALUES_BINDING, "export_values", BindingKind::ExportValues));
        entry_points = vec![EntryPoint::Export];
    }

    Ok(ShaderIr {
        target: options.target,
        camera: options.camera,
        bindings,
        constants: constants(options),
        library,
        objects: routines,
        entry_points,
    })
}

fn binding(index: u32, name: &'static str, kind: BindingKind) -> Binding {
    Binding {
        group: layout::GROUP,
        binding: index,
        name,
        kind,
    }
}

fn constants(options: &GenerateOptions) -> Vec<Constant> {
    let c = |name, value| Constant { name, value };
    vec![
        c("MAX_BOUNCES", ConstValue::U32(MAX_BOUNCES)),
        c("MAX_MARCH_STEPS", ConstValue::U32(MAX_MARCH_STEPS)),
        c("HIT_EPSILON", ConstValue::F32(HIT_EPSILON)),
        c("SURFACE_OFFSET", ConstValue::F32(HIT_EPSILON * 4.0)),
        c("MAX_DISTANCE", ConstValue::F32(MAX_DISTANCE)),
        c("FUZZY_METAL_ROUGHNESS", ConstValue::F32(FUZZY_METAL_ROUGHNESS)),
        c("SHINY_METAL_ROUGHNESS", ConstValue::F32(SHINY_METAL_ROUGHNESS)),
        c("GLASS_IOR", ConstValue::F32(GLASS_IOR)),
        c("SAMPLES_PER_DRAW", ConstValue::U32(options.samples_per_draw())),
        c("NO_OBJECT", ConstValue::U32(u32::MAX)),
    ]
}

fn collect_sdf_routines(node: &SdfNode, library: &mut BTreeSet<LibraryRoutine>) {
    match node {
        SdfNode::Primitive(primitive) => {
            library.insert(LibraryRoutine::Primitive(primitive.geometry));
        }
        SdfNode::SmoothUnion { .. } => {
            library.insert(LibraryRoutine::SmoothUnion);
        }
        SdfNode::Rotate { .. } => {
            library.insert(LibraryRoutine::InverseRotate);
        }
        SdfNode::Repeat { .. } => {
            library.insert(LibraryRoutine::RepeatDomain);
        }
        SdfNode::Union(_)
        | SdfNode::Intersection(_)
        | SdfNode::Subtraction { .. }
        | SdfNode::Translate { .. } => {}
    }
    for child in node.children() {
        collect_sdf_routines(child, library);
    }
}

fn scatter_routines(material: Material) -> Vec<LibraryRoutine> {
    let mut out = vec![LibraryRoutine::Scatter(material)];
    match material {
        Material::FuzzyMetal | Material::ShinyMetal => out.push(LibraryRoutine::ReflectRough),
        Material::Glass => out.push(LibraryRoutine::Schlick),
        Material::Lambert | Material::Light => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::Geometry;

    fn object(id: u32, shape: Shape, material: Material) -> SceneObject {
        SceneObject {
            id,
            shape,
            material,
            color: Color::default(),
        }
    }

    fn sphere(id: u32, material: Material) -> SceneObject {
        object(
            id,
            Shape::Sphere {
                center: Vec3::ZERO,
                radius: 1.0,
            },
            material,
        )
    }

    fn boxed(id: u32) -> SceneObject {
        object(
            id,
            Shape::Sdf(SdfNode::primitive(Geometry::Box, Vec3::ZERO, Vec3::ONE)),
            Material::Lambert,
        )
    }

    #[test]
    fn raytrace_mode_keeps_spheres_analytic() {
        let objects = [sphere(0, Material::Lambert), boxed(1)];
        let ir = lower(&objects, &GenerateOptions::default()).unwrap();

        assert_eq!(ir.analytic().count(), 1);
        assert_eq!(ir.marched().map(|(id, _)| id).collect::<Vec<_>>(), vec![1]);
        assert!(ir.library.contains(&LibraryRoutine::HitSphere));
        assert!(ir.library.contains(&LibraryRoutine::March));
        assert!(ir.library.contains(&LibraryRoutine::Primitive(Geometry::Box)));
        assert!(!ir.library.contains(&LibraryRoutine::Primitive(Geometry::Sphere)));
    }

    #[test]
    fn sdf_mode_marches_everything() {
        let objects = [sphere(0, Material::Lambert), boxed(1)];
        let options = GenerateOptions {
            render_mode: RenderMode::Sdf,
            ..GenerateOptions::default()
        };
        let ir = lower(&objects, &options).unwrap();

        assert_eq!(ir.analytic().count(), 0);
        assert_eq!(ir.marched().count(), 2);
        assert!(!ir.library.contains(&LibraryRoutine::HitSphere));
        assert!(ir.library.contains(&LibraryRoutine::Primitive(Geometry::Sphere)));
    }

    #[test]
    fn only_present_materials_get_scatter_routines() {
        let objects = [sphere(0, Material::Glass), sphere(1, Material::Glass), sphere(2, Material::Light)];
        let ir = lower(&objects, &GenerateOptions::default()).unwrap();

        let scatters: Vec<_> = ir
            .library
            .iter()
            .filter(|r| matches!(r, LibraryRoutine::Scatter(_)))
            .collect();
        assert_eq!(
            scatters,
            vec![&LibraryRoutine::Scatter(Material::Glass), &LibraryRoutine::Scatter(Material::Light)]
        );
        assert!(ir.library.contains(&LibraryRoutine::Schlick));
        assert!(!ir.library.contains(&LibraryRoutine::ReflectRough));
    }

    #[test]
    fn duplicate_ids_are_emitted_once() {
        let objects = [sphere(3, Material::Lambert), sphere(3, Material::Glass)];
        let ir = lower(&objects, &GenerateOptions::default()).unwrap();
        assert_eq!(ir.objects.len(), 1);
        assert_eq!(ir.objects[&3].shading.as_ref().map(|(m, _)| *m), Some(Material::Lambert));
    }

    #[test]
    fn bindings_follow_mode() {
        let offline = lower(&[], &GenerateOptions::default()).unwrap();
        assert!(offline.binding(BindingKind::AccumTexture).is_some());
        assert_eq!(
            offline.entry_points,
            vec![EntryPoint::Vertex, EntryPoint::Trace, EntryPoint::Present]
        );

        let realtime = lower(
            &[],
            &GenerateOptions {
                real_time: true,
                num_samples: 16,
                ..GenerateOptions::default()
            },
        )
        .unwrap();
        assert!(realtime.binding(BindingKind::AccumTexture).is_none());
        assert_eq!(realtime.constant("SAMPLES_PER_DRAW"), Some(ConstValue::U32(1)));

        let grid = lower(&[sphere(0, Material::Lambert)], &GenerateOptions::grid()).unwrap();
        assert_eq!(grid.entry_points, vec![EntryPoint::Export]);
        assert!(grid.binding(BindingKind::Camera).is_none());
        assert_eq!(grid.marched().count(), 1);
        assert!(grid.objects[&0].shading.is_none());
    }

    #[test]
    fn invalid_inputs_fail_fast() {
        let options = GenerateOptions {
            num_samples: 0,
            ..GenerateOptions::default()
        };
        assert_eq!(lower(&[], &options), Err(ShaderError::InvalidSampleCount));

        let mut node = SdfNode::primitive(Geometry::Sphere, Vec3::ZERO, Vec3::ONE);
        for _ in 0..MAX_SDF_DEPTH {
            node = SdfNode::Translate {
                offset: Vec3::X,
                child: Box::new(node),
            };
        }
        let deep = object(7, Shape::Sdf(node), Material::Lambert);
        assert!(matches!(
            lower(&[deep], &GenerateOptions::default()),
            Err(ShaderError::SdfDepthExceeded { id: 7, .. })
        ));
    }
}
