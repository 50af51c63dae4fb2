/// WGSL for the lit pass (`vs_main`/`fs_main`) and the shadow depth pass
/// (`vs_shadow`). Both consume the same vertex and instance layouts.
pub const SCENE_SHADER: &str = r#"
const PI: f32 = 3.141592653589793;

struct Globals {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    // xyz position, w intensity
    light_pos: vec4<f32>,
    // xyz direction, w range (0 = unbounded)
    light_dir: vec4<f32>,
    // rgb linear color, w decay exponent
    light_color: vec4<f32>,
    // outer cone cos, inner cone cos, shadow bias, light enabled
    light_cone: vec4<f32>,
    // rgb ambient, w shadows enabled
    ambient: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var shadow_map: texture_depth_2d;
@group(1) @binding(1)
var shadow_sampler: sampler_comparison;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    @location(6) normal_0: vec4<f32>,
    @location(7) normal_1: vec4<f32>,
    @location(8) normal_2: vec4<f32>,
    @location(9) color: vec4<f32>,
    // x receive shadow
    @location(10) flags: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec4<f32>,
    @location(3) receive_shadow: f32,
};

fn model_matrix(instance: InstanceInput) -> mat4x4<f32> {
    return mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
}

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let world = model_matrix(instance) * vec4<f32>(vertex.position, 1.0);
    let normal_matrix = mat3x3<f32>(
        instance.normal_0.xyz,
        instance.normal_1.xyz,
        instance.normal_2.xyz,
    );

    var out: VertexOutput;
    out.clip_position = globals.view_proj * world;
    out.world_pos = world.xyz;
    out.world_normal = normal_matrix * vertex.normal;
    out.color = instance.color;
    out.receive_shadow = instance.flags.x;
    return out;
}

@vertex
fn vs_shadow(vertex: VertexInput, instance: InstanceInput) -> @builtin(position) vec4<f32> {
    return globals.light_view_proj * model_matrix(instance) * vec4<f32>(vertex.position, 1.0);
}

// Fraction of the 3x3 neighbourhood that is lit. Points outside the
// light frustum are treated as lit.
fn shadow_factor(world_pos: vec3<f32>) -> f32 {
    let light_clip = globals.light_view_proj * vec4<f32>(world_pos, 1.0);
    let ndc = light_clip.xyz / light_clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5);
    let depth_ref = ndc.z + globals.light_cone.z;
    let texel = 1.0 / vec2<f32>(textureDimensions(shadow_map));

    var lit = 0.0;
    for (var y = -1; y <= 1; y = y + 1) {
        for (var x = -1; x <= 1; x = x + 1) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            lit = lit + textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, depth_ref);
        }
    }
    lit = lit / 9.0;

    let inside = light_clip.w > 0.0
        && all(uv >= vec2<f32>(0.0))
        && all(uv <= vec2<f32>(1.0))
        && ndc.z <= 1.0;
    return select(1.0, lit, inside);
}

@fragment
fn fs_main(in: VertexOutput, @builtin(front_facing) front_facing: bool) -> @location(0) vec4<f32> {
    var n = normalize(in.world_normal);
    if (!front_facing) {
        n = -n;
    }
    let base = in.color.rgb;
    var color = globals.ambient.rgb * base;

    if (globals.light_cone.w > 0.5) {
        let to_light = globals.light_pos.xyz - in.world_pos;
        let dist = length(to_light);
        let l = to_light / max(dist, 1e-4);
        let n_dot_l = max(dot(n, l), 0.0);

        let cos_angle = dot(-l, normalize(globals.light_dir.xyz));
        let spot = smoothstep(globals.light_cone.x, globals.light_cone.y, cos_angle);

        var attenuation = globals.light_pos.w / max(pow(dist, globals.light_color.w), 0.01);
        let range = globals.light_dir.w;
        if (range > 0.0) {
            let cutoff = saturate(1.0 - pow(dist / range, 4.0));
            attenuation = attenuation * cutoff * cutoff;
        }

        var shadow = 1.0;
        if (in.receive_shadow > 0.5 && globals.ambient.w > 0.5) {
            shadow = shadow_factor(in.world_pos);
        }

        color = color + base * globals.light_color.rgb * (n_dot_l * spot * attenuation * shadow / PI);
    }

    return vec4<f32>(color, in.color.a);
}
"#;
