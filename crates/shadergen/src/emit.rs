//! Text emission for [`ShaderIr`].

use glam::Vec3;
use scene::expr::float_literal;
use scene::{Color, Geometry, Material, SdfNode};

use crate::ir::{BindingKind, ConstValue, EntryPoint, LibraryRoutine, ShaderIr};
use crate::layout::{self, CameraField};
use crate::{wgsl, CameraSource, ShaderTarget};

/// Renders the IR as WGSL source.
pub fn emit(ir: &ShaderIr) -> String {
    let mut out = String::with_capacity(16 * 1024);
    out.push_str("// Generated by shadergen.\n\n");

    for constant in &ir.constants {
        let value = match constant.value {
            ConstValue::U32(v) => format!("u32 = {v}u"),
            ConstValue::F32(v) => format!("f32 = {}", float_literal(v)),
        };
        out.push_str(&format!("const {}: {value};\n", constant.name));
    }
    out.push('\n');

    match ir.target {
        ShaderTarget::Screen => {
            out.push_str(&camera_struct());
            out.push('\n');
            out.push_str(wgsl::FRAME_STRUCT);
            out.push('\n');
            out.push_str(wgsl::SCREEN_STRUCTS);
        }
        ShaderTarget::Grid => out.push_str(wgsl::EXPORT_PARAMS_STRUCT),
    }
    out.push('\n');

    for binding in &ir.bindings {
        let name = binding.name;
        let declaration = match binding.kind {
            BindingKind::Camera => format!("var<uniform> {name}: Camera"),
            BindingKind::Frame => format!("var<uniform> {name}: Frame"),
            BindingKind::AccumTexture => format!("var {name}: texture_2d<f32>"),
            BindingKind::ExportParams => format!("var<uniform> {name}: ExportParams"),
            BindingKind::ExportValues => format!("var<storage, read_write> {name}: array<f32>"),
        };
        out.push_str(&format!(
            "@group({}) @binding({}) {declaration};\n",
            binding.group, binding.binding
        ));
    }
    out.push('\n');

    if ir.target == ShaderTarget::Screen {
        out.push_str(&active_camera(ir.camera));
        out.push('\n');
    }

    for routine in &ir.library {
        out.push_str(routine_source(*routine));
        out.push('\n');
    }

    for (id, node) in ir.marched() {
        out.push_str(&sdf_object(id, node));
        out.push('\n');
    }
    if ir.marched().next().is_some() {
        out.push_str(&scene_sdf(ir));
        out.push('\n');
    }

    match ir.target {
        ShaderTarget::Screen => {
            out.push_str(&scene_hit(ir));
            out.push('\n');
            for object in ir.objects.values() {
                if let Some((_, color)) = &object.shading {
                    out.push_str(&albedo(object.id, color));
                    out.push('\n');
                }
            }
            out.push_str(&object_scatter(ir));
            out.push('\n');
        }
        ShaderTarget::Grid => {
            out.push_str(&grid_distance(ir));
            out.push('\n');
        }
    }

    for entry in &ir.entry_points {
        match entry {
            EntryPoint::Vertex => out.push_str(wgsl::VS_MAIN),
            EntryPoint::RealTime => out.push_str(wgsl::FS_MAIN),
            EntryPoint::Trace => out.push_str(wgsl::FS_TRACE),
            EntryPoint::Present => out.push_str(wgsl::FS_PRESENT),
            EntryPoint::Export => {
                out.push_str(&format!(
                    "@compute @workgroup_size({})\n",
                    layout::EXPORT_WORKGROUP_SIZE
                ));
                out.push_str(wgsl::CS_EXPORT);
            }
        }
        out.push('\n');
    }

    out
}

fn routine_source(routine: LibraryRoutine) -> &'static str {
    match routine {
        LibraryRoutine::Random => wgsl::RANDOM,
        LibraryRoutine::CameraRay => wgsl::CAMERA_RAY,
        LibraryRoutine::SurfaceHit => wgsl::SURFACE_HIT,
        LibraryRoutine::HitSphere => wgsl::HIT_SPHERE,
        LibraryRoutine::Primitive(Geometry::Sphere) => wgsl::SDF_SPHERE,
        LibraryRoutine::Primitive(Geometry::Box) => wgsl::SDF_BOX,
        LibraryRoutine::Primitive(Geometry::Torus) => wgsl::SDF_TORUS,
        LibraryRoutine::Primitive(Geometry::Cylinder) => wgsl::SDF_CYLINDER,
        LibraryRoutine::SmoothUnion => wgsl::SMOOTH_UNION,
        LibraryRoutine::InverseRotate => wgsl::INVERSE_ROTATE,
        LibraryRoutine::RepeatDomain => wgsl::REPEAT_DOMAIN,
        LibraryRoutine::March => wgsl::MARCH,
        LibraryRoutine::ReflectRough => wgsl::REFLECT_ROUGH,
        LibraryRoutine::Schlick => wgsl::SCHLICK,
        LibraryRoutine::Scatter(Material::Lambert) => wgsl::SCATTER_LAMBERT,
        LibraryRoutine::Scatter(Material::FuzzyMetal) => wgsl::SCATTER_FUZZY_METAL,
        LibraryRoutine::Scatter(Material::ShinyMetal) => wgsl::SCATTER_SHINY_METAL,
        LibraryRoutine::Scatter(Material::Glass) => wgsl::SCATTER_GLASS,
        LibraryRoutine::Scatter(Material::Light) => wgsl::SCATTER_LIGHT,
        LibraryRoutine::Background => wgsl::BACKGROUND,
        LibraryRoutine::Trace => wgsl::TRACE,
    }
}

fn vec3(v: Vec3) -> String {
    format!(
        "vec3f({}, {}, {})",
        float_literal(v.x),
        float_literal(v.y),
        float_literal(v.z)
    )
}

fn camera_struct() -> String {
    let mut out = String::from("struct Camera {\n");
    for field in layout::camera_fields() {
        let member = match field {
            CameraField::Vector(name) => format!("{name}: vec4f"),
            CameraField::Scalar(name) => format!("{name}: f32"),
            CameraField::Padding(i) => format!("_pad{i}: f32"),
        };
        out.push_str(&format!("    {member},\n"));
    }
    out.push_str("};\n");
    out
}

fn active_camera(source: CameraSource) -> String {
    match source {
        CameraSource::Uniform => "fn active_camera() -> Camera {\n    return camera;\n}\n".to_string(),
        CameraSource::Baked(camera) => {
            let words = layout::camera_uniform_words(&camera);
            let mut args = Vec::new();
            let mut offset = 0;
            for field in layout::camera_fields() {
                let n = field.words();
                let slice = &words[offset..offset + n];
                offset += n;
                args.push(match field {
                    CameraField::Vector(_) => format!(
                        "vec4f({}, {}, {}, {})",
                        float_literal(slice[0]),
                        float_literal(slice[1]),
                        float_literal(slice[2]),
                        float_literal(slice[3])
                    ),
                    CameraField::Scalar(_) | CameraField::Padding(_) => float_literal(slice[0]),
                });
            }
            format!(
                "fn active_camera() -> Camera {{\n    return Camera(\n        {}\n    );\n}}\n",
                args.join(",\n        ")
            )
        }
    }
}

/// Emits one object's distance field as a chain of `let` bindings
struct SdfWriter {
    body: String,
    next: usize,
}

impl SdfWriter {
    fn fresh(&mut self, prefix: char) -> String {
        self.next += 1;
        format!("{prefix}{}", self.next)
    }

    fn bind(&mut self, prefix: char, value: &str) -> String {
        let name = self.fresh(prefix);
        self.body.push_str(&format!("    let {name} = {value};\n"));
        name
    }

    /// Emits `node` evaluated at `point` and returns the variable holding its distance
    fn node(&mut self, node: &SdfNode, point: &str) -> String {
        match node {
            SdfNode::Primitive(primitive) => {
                let local = if primitive.position == Vec3::ZERO {
                    point.to_string()
                } else {
                    format!("{point} - {}", vec3(primitive.position))
                };
                let call = format!(
                    "sdf_{}({local}, {})",
                    primitive.geometry.name(),
                    vec3(primitive.dimensions)
                );
                self.bind('d', &call)
            }
            SdfNode::Union(children) => self.fold(children, point, |a, b| format!("min({a}, {b})")),
            SdfNode::Intersection(children) => {
                self.fold(children, point, |a, b| format!("max({a}, {b})"))
            }
            SdfNode::SmoothUnion { k, children } => {
                let k = *k;
                if k > 0.0 {
                    let k = float_literal(k);
                    self.fold(children, point, |a, b| format!("smooth_union({a}, {b}, {k})"))
                } else {
                    self.fold(children, point, |a, b| format!("min({a}, {b})"))
                }
            }
            SdfNode::Subtraction { base, cut } => {
                let base = self.node(base, point);
                let cut = self.node(cut, point);
                self.bind('d', &format!("max({base}, -{cut})"))
            }
            SdfNode::Translate { offset, child } => {
                let moved = self.bind('p', &format!("{point} - {}", vec3(*offset)));
                self.node(child, &moved)
            }
            SdfNode::Rotate { angles, child } => {
                let turned = self.bind('p', &format!("inverse_rotate({point}, {})", vec3(*angles)));
                self.node(child, &turned)
            }
            SdfNode::Repeat { period, child } => {
                let folded = self.bind('p', &format!("repeat_domain({point}, {})", vec3(*period)));
                self.node(child, &folded)
            }
        }
    }

    fn fold(
        &mut self,
        children: &[SdfNode],
        point: &str,
        combine: impl Fn(&str, &str) -> String,
    ) -> String {
        let mut acc: Option<String> = None;
        for child in children {
            let d = self.node(child, point);
            acc = Some(match acc {
                None => d,
                Some(prev) => self.bind('d', &combine(&prev, &d)),
            });
        }
        // Empty combinators are rejected by validation; treat them as empty space.
        acc.unwrap_or_else(|| self.bind('d', "MAX_DISTANCE"))
    }
}

fn sdf_object(id: u32, node: &SdfNode) -> String {
    let mut writer = SdfWriter {
        body: String::new(),
        next: 0,
    };
    let result = writer.node(node, "p0");
    format!(
        "fn sdf_object_{id}(p0: vec3f) -> f32 {{\n{}    return {result};\n}}\n",
        writer.body
    )
}

fn id_literal(id: u32) -> String {
    format!("{id}.0")
}

fn scene_sdf(ir: &ShaderIr) -> String {
    let mut out = String::from("fn scene_sdf(p: vec3f) -> vec2f {\n");
    for (i, (id, _)) in ir.marched().enumerate() {
        if i == 0 {
            out.push_str(&format!(
                "    var best = vec2f(sdf_object_{id}(p), {});\n",
                id_literal(id)
            ));
        } else {
            out.push_str(&format!(
                "    let d{id} = sdf_object_{id}(p);\n    if d{id} < best.x {{\n        best = vec2f(d{id}, {});\n    }}\n",
                id_literal(id)
            ));
        }
    }
    out.push_str("    return best;\n}\n");
    out
}

fn scene_hit(ir: &ShaderIr) -> String {
    let mut out = String::from("fn scene_hit(r: Ray) -> Hit {\n    var closest = no_hit();\n");
    for (id, center, radius) in ir.analytic() {
        let center = vec3(center);
        let radius = float_literal(radius);
        out.push_str(&format!(
            "    let t{id} = hit_sphere({center}, {radius}, r, closest.t);\n    if t{id} > 0.0 {{\n        closest = surface_hit(r, t{id}, (r.origin + t{id} * r.dir - {center}) / {radius}, {id}u);\n    }}\n"
        ));
    }
    if ir.marched().next().is_some() {
        out.push_str("    closest = march(r, closest);\n");
    }
    out.push_str("    return closest;\n}\n");
    out
}

fn albedo(id: u32, color: &Color) -> String {
    let value = match color {
        Color::Literal(rgb) => vec3(*rgb),
        Color::Expression(expr) => format!("vec3f({expr})"),
    };
    format!("fn albedo_{id}(p: vec3f, n: vec3f) -> vec3f {{\n    return {value};\n}}\n")
}

fn scatter_name(material: Material) -> String {
    format!("scatter_{}", material.tag().replace('-', "_"))
}

fn object_scatter(ir: &ShaderIr) -> String {
    let mut out = String::from(
        "fn object_scatter(object_id: u32, r: Ray, hit: Hit) -> Scatter {\n    var result = Scatter(vec3f(0.0), vec3f(0.0), r, true);\n    switch object_id {\n",
    );
    for object in ir.objects.values() {
        if let Some((material, _)) = &object.shading {
            out.push_str(&format!(
                "        case {id}u: {{\n            result = {}(r, hit, albedo_{id}(hit.p, hit.n));\n        }}\n",
                scatter_name(*material),
                id = object.id
            ));
        }
    }
    out.push_str("        default: {}\n    }\n    return result;\n}\n");
    out
}

fn grid_distance(ir: &ShaderIr) -> String {
    let body = if ir.marched().next().is_some() {
        "scene_sdf(p).x"
    } else {
        "MAX_DISTANCE"
    };
    format!("fn grid_distance(p: vec3f) -> f32 {{\n    return {body};\n}}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::SdfPrimitive;

    fn writer_output(node: &SdfNode) -> String {
        sdf_object(4, node)
    }

    #[test]
    fn sdf_tree_becomes_let_chain() {
        let node = SdfNode::Translate {
            offset: Vec3::new(0.0, 1.0, 0.0),
            child: Box::new(SdfNode::Subtraction {
                base: Box::new(SdfNode::primitive(Geometry::Box, Vec3::ZERO, Vec3::ONE)),
                cut: Box::new(SdfNode::primitive(Geometry::Sphere, Vec3::ZERO, Vec3::splat(1.2))),
            }),
        };
        let text = writer_output(&node);
        assert_eq!(
            text,
            "fn sdf_object_4(p0: vec3f) -> f32 {\n\
             \x20   let p1 = p0 - vec3f(0.0, 1.0, 0.0);\n\
             \x20   let d2 = sdf_box(p1, vec3f(1.0, 1.0, 1.0));\n\
             \x20   let d3 = sdf_sphere(p1, vec3f(1.2, 1.2, 1.2));\n\
             \x20   let d4 = max(d2, -d3);\n\
             \x20   return d4;\n\
             }\n"
        );
    }

    #[test]
    fn unions_fold_left() {
        let leaf = |x: f32| {
            SdfNode::Primitive(SdfPrimitive {
                geometry: Geometry::Sphere,
                position: Vec3::new(x, 0.0, 0.0),
                dimensions: Vec3::ONE,
            })
        };
        let node = SdfNode::SmoothUnion {
            k: 0.25,
            children: vec![leaf(0.0), leaf(1.0), leaf(2.0)],
        };
        let text = writer_output(&node);
        assert!(text.contains("let d3 = smooth_union(d1, d2, 0.25);"));
        assert!(text.contains("let d5 = smooth_union(d3, d4, 0.25);"));
        assert!(text.contains("return d5;"));
    }

    #[test]
    fn baked_camera_has_one_argument_per_field() {
        let camera = scene::Camera::build(&scene::CameraSpec::default()).unwrap();
        let text = active_camera(CameraSource::Baked(camera));
        let args = text.matches(",\n").count() + 1;
        assert_eq!(args, layout::camera_fields().len());
        assert!(!text.contains("return camera;"));
    }

    #[test]
    fn scatter_names_are_snake_case() {
        assert_eq!(scatter_name(Material::FuzzyMetal), "scatter_fuzzy_metal");
        assert_eq!(scatter_name(Material::Light), "scatter_light");
    }
}
