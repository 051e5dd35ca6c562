// Fixed WGSL text used by the emitter. Distance functions mirror `scene::distance`.

pub const FRAME_STRUCT: &str = "\
struct Frame {
    bg_gradient_bottom: vec4f,
    bg_gradient_top: vec4f,
    resolution: vec2f,
    seed: vec2f,
    one_over_sample_count: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};
";

pub const SCREEN_STRUCTS: &str = "\
struct Ray {
    origin: vec3f,
    dir: vec3f,
};

struct Hit {
    t: f32,
    p: vec3f,
    n: vec3f,
    object_id: u32,
    front_face: bool,
};

struct Scatter {
    attenuation: vec3f,
    emitted: vec3f,
    scattered: Ray,
    absorbed: bool,
};

struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
};
";

pub const EXPORT_PARAMS_STRUCT: &str = "\
struct ExportParams {
    min_coords: vec4f,
    cell_size: vec4f,
    resolution: u32,
    offset: u32,
    count: u32,
    _pad0: u32,
};
";

pub const RANDOM: &str = "\
var<private> rng_state: u32;

fn pcg_hash(input: u32) -> u32 {
    let state = input * 747796405u + 2891336453u;
    let word = ((state >> ((state >> 28u) + 4u)) ^ state) * 277803737u;
    return (word >> 22u) ^ word;
}

fn seed_rng(pixel: vec2f, seed: vec2f) {
    let px = vec2u(pixel);
    let s = bitcast<vec2u>(seed);
    rng_state = pcg_hash(px.x ^ pcg_hash(px.y ^ pcg_hash(s.x ^ pcg_hash(s.y))));
}

fn rand() -> f32 {
    rng_state = pcg_hash(rng_state);
    return f32(rng_state >> 8u) / 16777216.0;
}

fn random_unit_vector() -> vec3f {
    let z = rand() * 2.0 - 1.0;
    let a = rand() * 6.2831855;
    let r = sqrt(max(0.0, 1.0 - z * z));
    return vec3f(r * cos(a), r * sin(a), z);
}

fn random_in_unit_sphere() -> vec3f {
    return random_unit_vector() * pow(rand(), 1.0 / 3.0);
}

fn random_in_unit_disk() -> vec2f {
    let a = rand() * 6.2831855;
    return vec2f(cos(a), sin(a)) * sqrt(rand());
}
";

pub const CAMERA_RAY: &str = "\
fn camera_ray(cam: Camera, s: f32, t: f32) -> Ray {
    let lens = cam.lens_radius * random_in_unit_disk();
    let origin = cam.origin.xyz + cam.u.xyz * lens.x + cam.v.xyz * lens.y;
    let focus_point = cam.lower_left_corner.xyz + s * cam.horizontal.xyz + t * cam.vertical.xyz;
    return Ray(origin, normalize(focus_point - origin));
}
";

pub const SURFACE_HIT: &str = "\
fn no_hit() -> Hit {
    return Hit(MAX_DISTANCE, vec3f(0.0), vec3f(0.0), NO_OBJECT, true);
}

fn surface_hit(r: Ray, t: f32, outward: vec3f, object_id: u32) -> Hit {
    let front = dot(r.dir, outward) < 0.0;
    let n = select(-outward, outward, front);
    return Hit(t, r.origin + t * r.dir, n, object_id, front);
}
";

pub const HIT_SPHERE: &str = "\
fn hit_sphere(center: vec3f, radius: f32, r: Ray, t_max: f32) -> f32 {
    let oc = r.origin - center;
    let half_b = dot(oc, r.dir);
    let c = dot(oc, oc) - radius * radius;
    let disc = half_b * half_b - c;
    if disc < 0.0 {
        return -1.0;
    }
    let root = sqrt(disc);
    var t = -half_b - root;
    if t < HIT_EPSILON || t > t_max {
        t = -half_b + root;
        if t < HIT_EPSILON || t > t_max {
            return -1.0;
        }
    }
    return t;
}
";

pub const SDF_SPHERE: &str = "\
fn sdf_sphere(p: vec3f, dims: vec3f) -> f32 {
    return length(p) - dims.x;
}
";

pub const SDF_BOX: &str = "\
fn sdf_box(p: vec3f, dims: vec3f) -> f32 {
    let q = abs(p) - dims;
    return length(max(q, vec3f(0.0))) + min(max(q.x, max(q.y, q.z)), 0.0);
}
";

pub const SDF_TORUS: &str = "\
fn sdf_torus(p: vec3f, dims: vec3f) -> f32 {
    let q = vec2f(length(p.xz) - dims.x, p.y);
    return length(q) - dims.y;
}
";

pub const SDF_CYLINDER: &str = "\
fn sdf_cylinder(p: vec3f, dims: vec3f) -> f32 {
    let d = abs(vec2f(length(p.xz), p.y)) - dims.xy;
    return min(max(d.x, d.y), 0.0) + length(max(d, vec2f(0.0)));
}
";

pub const SMOOTH_UNION: &str = "\
fn smooth_union(a: f32, b: f32, k: f32) -> f32 {
    let h = clamp(0.5 + 0.5 * (b - a) / k, 0.0, 1.0);
    return mix(b, a, h) - k * h * (1.0 - h);
}
";

pub const INVERSE_ROTATE: &str = "\
fn inverse_rotate(p: vec3f, angles: vec3f) -> vec3f {
    let r = -radians(angles);
    let cz = cos(r.z);
    let sz = sin(r.z);
    var q = vec3f(cz * p.x - sz * p.y, sz * p.x + cz * p.y, p.z);
    let cy = cos(r.y);
    let sy = sin(r.y);
    q = vec3f(cy * q.x + sy * q.z, q.y, -sy * q.x + cy * q.z);
    let cx = cos(r.x);
    let sx = sin(r.x);
    return vec3f(q.x, cx * q.y - sx * q.z, sx * q.y + cx * q.z);
}
";

pub const REPEAT_DOMAIN: &str = "\
fn repeat_domain(p: vec3f, period: vec3f) -> vec3f {
    let folded = p - period * floor(p / period + 0.5);
    return select(p, folded, period > vec3f(0.0));
}
";

pub const MARCH: &str = "\
fn scene_distance(p: vec3f) -> f32 {
    return scene_sdf(p).x;
}

fn sdf_normal(p: vec3f) -> vec3f {
    let e = vec2f(HIT_EPSILON, 0.0);
    return normalize(vec3f(
        scene_distance(p + e.xyy) - scene_distance(p - e.xyy),
        scene_distance(p + e.yxy) - scene_distance(p - e.yxy),
        scene_distance(p + e.yyx) - scene_distance(p - e.yyx)
    ));
}

fn march(r: Ray, closest: Hit) -> Hit {
    var t = 0.0;
    for (var i = 0u; i < MAX_MARCH_STEPS; i += 1u) {
        let p = r.origin + t * r.dir;
        let s = scene_sdf(p);
        let d = abs(s.x);
        if d < HIT_EPSILON {
            return surface_hit(r, t, sdf_normal(p), u32(s.y));
        }
        t += d;
        if t > closest.t {
            break;
        }
    }
    return closest;
}
";

pub const REFLECT_ROUGH: &str = "\
fn reflect_rough(r: Ray, hit: Hit, albedo: vec3f, roughness: f32) -> Scatter {
    let dir = normalize(reflect(r.dir, hit.n) + roughness * random_in_unit_sphere());
    return Scatter(albedo, vec3f(0.0), Ray(hit.p, dir), dot(dir, hit.n) <= 0.0);
}
";

pub const SCHLICK: &str = "\
fn schlick(cosine: f32, ratio: f32) -> f32 {
    var r0 = (1.0 - ratio) / (1.0 + ratio);
    r0 = r0 * r0;
    return r0 + (1.0 - r0) * pow(1.0 - cosine, 5.0);
}
";

pub const SCATTER_LAMBERT: &str = "\
fn scatter_lambert(r: Ray, hit: Hit, albedo: vec3f) -> Scatter {
    var dir = hit.n + random_unit_vector();
    if dot(dir, dir) < 1e-8 {
        dir = hit.n;
    }
    return Scatter(albedo, vec3f(0.0), Ray(hit.p, normalize(dir)), false);
}
";

pub const SCATTER_FUZZY_METAL: &str = "\
fn scatter_fuzzy_metal(r: Ray, hit: Hit, albedo: vec3f) -> Scatter {
    return reflect_rough(r, hit, albedo, FUZZY_METAL_ROUGHNESS);
}
";

pub const SCATTER_SHINY_METAL: &str = "\
fn scatter_shiny_metal(r: Ray, hit: Hit, albedo: vec3f) -> Scatter {
    return reflect_rough(r, hit, albedo, SHINY_METAL_ROUGHNESS);
}
";

pub const SCATTER_GLASS: &str = "\
fn scatter_glass(r: Ray, hit: Hit, albedo: vec3f) -> Scatter {
    let ratio = select(GLASS_IOR, 1.0 / GLASS_IOR, hit.front_face);
    let cos_theta = min(dot(-r.dir, hit.n), 1.0);
    let sin_theta = sqrt(1.0 - cos_theta * cos_theta);
    var dir: vec3f;
    if ratio * sin_theta > 1.0 || schlick(cos_theta, ratio) > rand() {
        dir = reflect(r.dir, hit.n);
    } else {
        dir = refract(r.dir, hit.n, ratio);
    }
    return Scatter(albedo, vec3f(0.0), Ray(hit.p, dir), false);
}
";

pub const SCATTER_LIGHT: &str = "\
fn scatter_light(r: Ray, hit: Hit, albedo: vec3f) -> Scatter {
    return Scatter(vec3f(0.0), albedo, r, true);
}
";

pub const BACKGROUND: &str = "\
fn background(dir: vec3f) -> vec3f {
    let t = 0.5 * (dir.y + 1.0);
    return mix(frame.bg_gradient_bottom.xyz, frame.bg_gradient_top.xyz, t);
}
";

pub const TRACE: &str = "\
fn trace(primary: Ray) -> vec3f {
    var r = primary;
    var throughput = vec3f(1.0);
    var radiance = vec3f(0.0);
    for (var bounce = 0u; bounce < MAX_BOUNCES; bounce += 1u) {
        let hit = scene_hit(r);
        if hit.object_id == NO_OBJECT {
            return radiance + throughput * background(r.dir);
        }
        let s = object_scatter(hit.object_id, r, hit);
        radiance += throughput * s.emitted;
        if s.absorbed {
            return radiance;
        }
        throughput *= s.attenuation;
        let side = select(-hit.n, hit.n, dot(s.scattered.dir, hit.n) > 0.0);
        r = Ray(hit.p + side * SURFACE_OFFSET, s.scattered.dir);
    }
    return radiance;
}

fn render_sample(pixel: vec2f) -> vec3f {
    let cam = active_camera();
    let s = (floor(pixel.x) + rand()) / frame.resolution.x;
    let t = 1.0 - (floor(pixel.y) + rand()) / frame.resolution.y;
    return trace(camera_ray(cam, s, t));
}

fn sample_pixel(pixel: vec2f) -> vec3f {
    seed_rng(pixel, frame.seed);
    var color = vec3f(0.0);
    for (var i = 0u; i < SAMPLES_PER_DRAW; i += 1u) {
        color += render_sample(pixel);
    }
    return color / f32(SAMPLES_PER_DRAW);
}

fn to_display(color: vec3f) -> vec4f {
    return vec4f(sqrt(max(color, vec3f(0.0))), 1.0);
}
";

pub const VS_MAIN: &str = "\
@vertex
fn vs_main(@location(0) position: vec2f) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4f(position, 0.0, 1.0);
    out.uv = position * 0.5 + 0.5;
    return out;
}
";

pub const FS_MAIN: &str = "\
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4f {
    return to_display(sample_pixel(input.position.xy));
}
";

pub const FS_TRACE: &str = "\
@fragment
fn fs_trace(input: VertexOutput) -> @location(0) vec4f {
    let previous = textureLoad(accum_texture, vec2i(input.position.xy), 0);
    return vec4f(previous.xyz + sample_pixel(input.position.xy), 1.0);
}
";

pub const FS_PRESENT: &str = "\
@fragment
fn fs_present(input: VertexOutput) -> @location(0) vec4f {
    let sum = textureLoad(accum_texture, vec2i(input.position.xy), 0).xyz;
    return to_display(sum * frame.one_over_sample_count);
}
";

/// Body of the export kernel; the emitter prefixes the stage and workgroup attributes.
pub const CS_EXPORT: &str = "\
fn cs_export(@builtin(global_invocation_id) gid: vec3u) {
    if gid.x >= params.count {
        return;
    }
    let index = params.offset + gid.x;
    let res = params.resolution;
    let i = index % res;
    let j = (index / res) % res;
    let k = index / (res * res);
    let cell = vec3f(f32(i), f32(j), f32(k)) + 0.5;
    export_values[gid.x] = grid_distance(params.min_coords.xyz + cell * params.cell_size.xyz);
}
";
