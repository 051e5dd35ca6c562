// Compares the generated export kernel against the CPU distance functions.

#[cfg(feature = "gpu")]
mod wgpu_tests {
    use compute::{export, CancelToken, ComputeError, CpuSampler, ExportSettings, WgpuSampler};
    use glam::Vec3;

    const SCENE: &str = r#"{
      "objectList": [
        { "type": "sphere", "center": [0, 0, 0], "radius": 0.5, "material": "lambert" },
        { "type": "sdf", "material": "glass", "geometry": {
            "op": "subtraction",
            "base": { "op": "box", "position": [0.8, 0, 0], "dimensions": [0.3, 0.3, 0.3] },
            "cut": { "op": "rotate", "angles": [0, 45, 0], "child":
              { "op": "cylinder", "position": [0.8, 0, 0], "dimensions": [0.15, 0.5, 0] } }
        } },
        { "type": "sdf", "material": "light", "geometry": {
            "op": "smooth-union", "k": 0.1, "children": [
              { "op": "torus", "position": [0, 0.8, 0], "dimensions": [0.4, 0.05, 0] },
              { "op": "sphere", "position": [0, 0.8, 0], "radius": 0.1 }
            ]
        } }
      ]
    }"#;

    #[test]
    fn gpu_export_matches_cpu() {
        let scene = scene::compile(SCENE).unwrap();
        let gpu = match WgpuSampler::new(&scene) {
            Ok(sampler) => sampler,
            Err(ComputeError::BackendUnavailable) => {
                eprintln!("no GPU adapter, skipping");
                return;
            }
            Err(e) => panic!("failed to build GPU sampler: {e}"),
        };
        let settings = ExportSettings {
            resolution: 12,
            min_coords: Vec3::splat(-1.2),
            max_coords: Vec3::splat(1.2),
        };

        let expected = export(CpuSampler::new(scene), &settings, |_| {}, &CancelToken::new()).unwrap();
        let actual = export(&gpu, &settings, |_| {}, &CancelToken::new()).unwrap();

        assert_eq!(expected.values.len(), actual.values.len());
        for (i, (e, a)) in expected.values.iter().zip(&actual.values).enumerate() {
            assert!((e - a).abs() < 1e-4, "cell {i}: cpu {e}, gpu {a}");
        }
    }
}
