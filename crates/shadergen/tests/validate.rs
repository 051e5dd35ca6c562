use glam::Vec3;
use scene::{compile, Camera, CameraSpec, Geometry, Material, RenderMode, SceneObject, SdfNode, Shape};
use shadergen::{generate, CameraSource, GenerateOptions, ShaderTarget};

fn validate_wgsl(label: &str, source: &str) -> naga::Module {
    let module = match naga::front::wgsl::parse_str(source) {
        Ok(m) => m,
        Err(e) => panic!(
            "WGSL parsing error in {label}:\n{error_report}",
            error_report = e.emit_to_string(source)
        ),
    };

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    if let Err(e) = validator.validate(&module) {
        panic!(
            "WGSL validation error in {label}:\n{error_report}",
            error_report = e.emit_to_string(source)
        );
    }
    module
}

fn entry_points(module: &naga::Module) -> Vec<&str> {
    module.entry_points.iter().map(|e| e.name.as_str()).collect()
}

fn function_names(module: &naga::Module) -> Vec<String> {
    module
        .functions
        .iter()
        .filter_map(|(_, f)| f.name.clone())
        .collect()
}

const KITCHEN_SINK: &str = r#"{
  "objectList": [
    { "type": "sphere", "center": [0, -100.5, -1], "radius": 100, "material": "lambert",
      "color": "mix(vec3f(0.2), vec3f(0.8), step(0.5, fract(p.x * 2.0)))" },
    { "type": "sphere", "center": [0, 0, -1], "radius": 0.5, "material": "glass" },
    { "type": "sphere", "center": [1, 0, -1], "radius": 0.5, "material": "fuzzy-metal", "color": [0.8, 0.6, 0.2] },
    { "type": "sdf-torus", "position": [-1, 0, -1], "dimensions": [0.4, 0.1, 0], "material": "shiny-metal",
      "color": "abs(n) * 0.5 + 0.5" },
    { "type": "sdf-cylinder", "position": [0, 2, -2], "dimensions": [0.2, 0.4, 0], "material": "light",
      "color": [6, 6, 6] },
    { "type": "sdf", "material": "lambert", "color": "vec3f(length(p.xz), 0.3, dot(n, vec3f(0, 1, 0)))",
      "geometry": {
        "op": "union", "children": [
          { "op": "subtraction",
            "base": { "op": "box", "position": [2, 0, -2], "dimensions": [0.4, 0.4, 0.4] },
            "cut": { "op": "sphere", "position": [2, 0, -2], "radius": 0.5 } },
          { "op": "rotate", "angles": [0, 45, 30], "child": {
              "op": "intersection", "children": [
                { "op": "box", "dimensions": [0.3, 0.3, 0.3] },
                { "op": "sphere", "radius": 0.4 } ] } },
          { "op": "translate", "offset": [0, -0.4, 0], "child": {
              "op": "repeat", "period": [1.5, 1.5, 1.5], "child": {
                "op": "smooth-union", "k": 0.1, "children": [
                  { "op": "sphere", "radius": 0.1 },
                  { "op": "cylinder", "dimensions": [0.05, 0.3, 0] } ] } } }
        ]
      } }
  ]
}"#;

#[test]
fn kitchen_sink_offline_raytrace_validates() {
    let scene = compile(KITCHEN_SINK).unwrap();
    let source = generate(&scene.objects, &GenerateOptions::default()).unwrap();
    let module = validate_wgsl("offline raytrace", &source);

    assert_eq!(entry_points(&module), vec!["vs_main", "fs_trace", "fs_present"]);
    let functions = function_names(&module);
    for expected in [
        "hit_sphere",
        "march",
        "scatter_lambert",
        "scatter_glass",
        "scatter_fuzzy_metal",
        "scatter_shiny_metal",
        "scatter_light",
        "smooth_union",
        "inverse_rotate",
        "repeat_domain",
        "sdf_object_3",
        "sdf_object_4",
        "sdf_object_5",
    ] {
        assert!(functions.iter().any(|f| f == expected), "missing {expected}");
    }
    // Analytic spheres do not get distance functions in raytrace mode.
    assert!(!functions.iter().any(|f| f == "sdf_object_0"));
}

#[test]
fn sdf_mode_real_time_validates() {
    let scene = compile(KITCHEN_SINK).unwrap();
    let options = GenerateOptions {
        real_time: true,
        render_mode: RenderMode::Sdf,
        ..GenerateOptions::default()
    };
    let source = generate(&scene.objects, &options).unwrap();
    let module = validate_wgsl("real-time sdf", &source);

    assert_eq!(entry_points(&module), vec!["vs_main", "fs_main"]);
    let functions = function_names(&module);
    assert!(!functions.iter().any(|f| f == "hit_sphere"));
    for id in 0..6 {
        let name = format!("sdf_object_{id}");
        assert_eq!(functions.iter().filter(|f| **f == name).count(), 1, "{name}");
    }
    assert!(!source.contains("accum_texture"));
}

#[test]
fn baked_camera_validates_without_camera_binding() {
    let objects = vec![SceneObject {
        id: 0,
        shape: Shape::Sphere {
            center: Vec3::new(0.0, 0.0, -1.0),
            radius: 0.5,
        },
        material: Material::Lambert,
        color: scene::Color::Literal(Vec3::new(0.7, 0.3, 0.3)),
    }];
    let camera = Camera::build(&CameraSpec::default().with_aspect(16.0 / 9.0)).unwrap();
    let options = GenerateOptions {
        camera: CameraSource::Baked(camera),
        num_samples: 4,
        ..GenerateOptions::default()
    };
    let source = generate(&objects, &options).unwrap();
    validate_wgsl("baked camera", &source);
    assert!(!source.contains("var<uniform> camera"));
    assert!(source.contains("const SAMPLES_PER_DRAW: u32 = 4u;"));
}

#[test]
fn empty_scene_validates() {
    for real_time in [false, true] {
        let options = GenerateOptions {
            real_time,
            ..GenerateOptions::default()
        };
        let source = generate(&[], &options).unwrap();
        validate_wgsl("empty scene", &source);
    }
    let source = generate(&[], &GenerateOptions::grid()).unwrap();
    validate_wgsl("empty grid", &source);
}

#[test]
fn grid_target_validates() {
    let objects = vec![
        SceneObject {
            id: 0,
            shape: Shape::Sphere {
                center: Vec3::ZERO,
                radius: 1.0,
            },
            material: Material::Glass,
            color: scene::Color::default(),
        },
        SceneObject {
            id: 1,
            shape: Shape::Sdf(SdfNode::primitive(Geometry::Box, Vec3::X, Vec3::splat(0.5))),
            material: Material::Light,
            color: scene::Color::default(),
        },
    ];
    let options = GenerateOptions {
        target: ShaderTarget::Grid,
        ..GenerateOptions::grid()
    };
    let source = generate(&objects, &options).unwrap();
    let module = validate_wgsl("grid", &source);

    assert_eq!(entry_points(&module), vec!["cs_export"]);
    assert_eq!(module.entry_points[0].workgroup_size, [64, 1, 1]);
    let functions = function_names(&module);
    assert!(functions.iter().any(|f| f == "sdf_object_0"));
    assert!(!functions.iter().any(|f| f.starts_with("scatter_")));
}
