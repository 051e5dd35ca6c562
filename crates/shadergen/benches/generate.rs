use criterion::{criterion_group, criterion_main, Criterion};
use glam::Vec3;
use scene::{Color, Geometry, Material, RenderMode, SceneObject, SdfNode, Shape};
use shadergen::{generate, GenerateOptions};

fn object_list(count: u32) -> Vec<SceneObject> {
    (0..count)
        .map(|id| {
            let x = id as f32 * 1.5;
            let shape = if id % 2 == 0 {
                Shape::Sphere {
                    center: Vec3::new(x, 0.0, -2.0),
                    radius: 0.5,
                }
            } else {
                Shape::Sdf(SdfNode::SmoothUnion {
                    k: 0.2,
                    children: vec![
                        SdfNode::primitive(Geometry::Box, Vec3::new(x, 0.0, -2.0), Vec3::splat(0.3)),
                        SdfNode::primitive(Geometry::Torus, Vec3::new(x, 0.4, -2.0), Vec3::new(0.4, 0.1, 0.0)),
                    ],
                })
            };
            SceneObject {
                id,
                shape,
                material: Material::ALL[id as usize % Material::ALL.len()],
                color: Color::Literal(Vec3::splat(0.7)),
            }
        })
        .collect()
}

fn bench_generate(c: &mut Criterion) {
    let objects = object_list(64);

    c.bench_function("generate_raytrace_offline_64", |b| {
        b.iter(|| generate(&objects, &GenerateOptions::default()).unwrap());
    });

    let sdf = GenerateOptions {
        render_mode: RenderMode::Sdf,
        real_time: true,
        ..GenerateOptions::default()
    };
    c.bench_function("generate_sdf_realtime_64", |b| {
        b.iter(|| generate(&objects, &sdf).unwrap());
    });
}

criterion_group!(benches, bench_generate);
criterion_main!(benches);
