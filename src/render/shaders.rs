use super::device::{ShaderSource, UniformDecl};

pub(crate) const PRELUDE: &str = r#"
struct Globals {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    camera_position: vec4<f32>,
    // x is 1.0 when a panorama is bound to group 3.
    environment: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    tint: vec4<f32>,
}

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

@group(3) @binding(0)
var environment_map: texture_2d<f32>;

@group(3) @binding(1)
var environment_sampler: sampler;
"#;

/// Builds the `Material` uniform struct for the declared uniforms.
pub(crate) fn material_block(uniforms: &[UniformDecl]) -> String {
    let mut block = String::from("struct Material {\n");
    for decl in uniforms {
        block.push_str(&format!("    {}: vec4<f32>,\n", decl.name));
    }
    // WGSL rejects empty structs.
    block.push_str("    _padding: vec4<f32>,\n}\n\n@group(2) @binding(0)\nvar<uniform> material: Material;\n");
    block
}

/// Bytes occupied by the material block of a program.
pub(crate) fn material_block_size(uniforms: &[UniformDecl]) -> u64 {
    ((uniforms.len() + 1) * 16) as u64
}

/// `PRELUDE + material block + vertex + fragment`.
pub(crate) fn assemble(source: &ShaderSource) -> String {
    let mut wgsl = String::from(PRELUDE);
    wgsl.push_str(&material_block(source.uniforms));
    wgsl.push_str(source.vertex);
    wgsl.push_str(source.fragment);
    wgsl
}

macro_rules! environment_fn {
    () => {
        r#"
fn panorama_uv(dir: vec3<f32>) -> vec2<f32> {
    return vec2<f32>(
        atan2(dir.z, dir.x) / (2.0 * 3.14159265) + 0.5,
        0.5 - asin(clamp(dir.y, -1.0, 1.0)) / 3.14159265
    );
}

fn environment(direction: vec3<f32>) -> vec3<f32> {
    let dir = normalize(direction);
    if (globals.environment.x > 0.5) {
        return textureSampleLevel(environment_map, environment_sampler, panorama_uv(dir), 0.0).rgb;
    }
    return procedural_sky(dir);
}

fn procedural_sky(dir: vec3<f32>) -> vec3<f32> {
    let zenith = vec3<f32>(0.22, 0.42, 0.78);
    let horizon = vec3<f32>(0.86, 0.89, 0.93);
    let ground = vec3<f32>(0.32, 0.29, 0.26);
    let sun_dir = normalize(vec3<f32>(0.5, 0.45, 0.5));
    var sky: vec3<f32>;
    if (dir.y >= 0.0) {
        sky = mix(horizon, zenith, pow(dir.y, 0.6));
    } else {
        sky = mix(horizon, ground, pow(-dir.y, 0.4));
    }
    let sun = pow(max(dot(dir, sun_dir), 0.0), 512.0) * 12.0;
    return sky + vec3<f32>(sun);
}
"#
    };
}

const OBJECT_VERTEX: &str = r#"
@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.clip_position = globals.projection * globals.view * world_position;
    out.world_pos = world_position.xyz;
    let normal_matrix = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    );
    out.normal = normalize(normal_matrix * input.normal);
    return out;
}
"#;

const BACKDROP_VERTEX: &str = r#"
@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let rotation_only = mat4x4<f32>(
        vec4<f32>(globals.view[0].xyz, 0.0),
        vec4<f32>(globals.view[1].xyz, 0.0),
        vec4<f32>(globals.view[2].xyz, 0.0),
        vec4<f32>(0.0, 0.0, 0.0, 1.0)
    );
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.clip_position = globals.projection * rotation_only * world_position;
    out.world_pos = world_position.xyz;
    out.normal = input.normal;
    return out;
}
"#;

const BACKDROP_FRAGMENT: &str = concat!(
    environment_fn!(),
    r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(environment(input.world_pos) * object.tint.rgb, 1.0);
}
"#
);

const AMBIENT_FRAGMENT: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let ambient_strength = 0.35;
    let color = ambient_strength * material.lightColor.xyz * material.objectColor.xyz;
    return vec4<f32>(color, object.tint.a);
}
"#;

const PHONG_FRAGMENT: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let light_dir = normalize(material.lightPos.xyz - input.world_pos);
    let view_dir = normalize(material.viewPos.xyz - input.world_pos);
    let reflect_dir = reflect(-light_dir, normal);
    let roughness = material.roughnessValue.x;

    let ambient = 0.1 * material.lightColor.xyz;
    let diffuse = max(dot(normal, light_dir), 0.0) * material.lightColor.xyz;
    let shininess = mix(256.0, 2.0, roughness);
    let specular_strength = 1.0 - roughness;
    let specular = specular_strength * pow(max(dot(view_dir, reflect_dir), 0.0), shininess)
        * material.lightColor.xyz;

    let color = (ambient + diffuse) * material.objectColor.xyz + specular;
    return vec4<f32>(color, object.tint.a);
}
"#;

const IBL_FRAGMENT: &str = concat!(
    environment_fn!(),
    r#"
fn blurred_environment(direction: vec3<f32>, roughness: f32) -> vec3<f32> {
    let average = environment(vec3<f32>(0.0, 1.0, 0.0)) * 0.5
        + environment(vec3<f32>(0.0, -1.0, 0.0)) * 0.2
        + environment(direction) * 0.3;
    return mix(environment(direction), average, roughness * roughness);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let view_dir = normalize(material.viewPos.xyz - input.world_pos);
    let reflect_dir = reflect(-view_dir, normal);
    let roughness = material.roughnessValue.x;
    let metallic = material.metallicValue.x;
    let albedo = material.objectColor.xyz;

    let f0 = mix(vec3<f32>(0.04), albedo, metallic);
    let n_dot_v = max(dot(normal, view_dir), 0.0);
    let fresnel = f0 + (max(vec3<f32>(1.0 - roughness), f0) - f0) * pow(1.0 - n_dot_v, 5.0);

    let irradiance = blurred_environment(normal, 1.0);
    let diffuse = (1.0 - fresnel) * (1.0 - metallic) * albedo * irradiance;
    let specular = fresnel * blurred_environment(reflect_dir, roughness);
    let color = (diffuse + specular) * material.lightColor.xyz;
    return vec4<f32>(color, object.tint.a);
}
"#
);

const CLEARCOAT_FRAGMENT: &str = concat!(
    environment_fn!(),
    r#"
const PI: f32 = 3.14159265;

fn ior_to_f0(ior: f32) -> f32 {
    let r = (ior - 1.0) / (ior + 1.0);
    return r * r;
}

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = max(roughness * roughness, 0.001);
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * d * d);
}

fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let k = (roughness + 1.0) * (roughness + 1.0) / 8.0;
    let gv = n_dot_v / (n_dot_v * (1.0 - k) + k);
    let gl = n_dot_l / (n_dot_l * (1.0 - k) + k);
    return gv * gl;
}

fn fresnel_schlick(cos_theta: f32, f0: vec3<f32>) -> vec3<f32> {
    return f0 + (vec3<f32>(1.0) - f0) * pow(1.0 - cos_theta, 5.0);
}

fn burley_diffuse(n_dot_v: f32, n_dot_l: f32, l_dot_h: f32, roughness: f32) -> f32 {
    let f90 = 0.5 + 2.0 * roughness * l_dot_h * l_dot_h;
    let light_scatter = 1.0 + (f90 - 1.0) * pow(1.0 - n_dot_l, 5.0);
    let view_scatter = 1.0 + (f90 - 1.0) * pow(1.0 - n_dot_v, 5.0);
    return light_scatter * view_scatter / PI;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let view_dir = normalize(material.viewPos.xyz - input.world_pos);
    let light_dir = normalize(material.lightPos.xyz - input.world_pos);
    let half_dir = normalize(view_dir + light_dir);

    let n_dot_v = max(dot(normal, view_dir), 0.0001);
    let n_dot_l = max(dot(normal, light_dir), 0.0);
    let n_dot_h = max(dot(normal, half_dir), 0.0);
    let l_dot_h = max(dot(light_dir, half_dir), 0.0);

    let albedo = material.objectColor.xyz;
    let roughness = material.roughnessValue.x;
    let metallic = material.metallicValue.x;
    let radiance = material.lightColor.xyz;

    // Base layer.
    let f0 = mix(vec3<f32>(ior_to_f0(material.iorValue.x)), albedo, metallic);
    let fresnel = fresnel_schlick(l_dot_h, f0);
    let specular = distribution_ggx(n_dot_h, roughness)
        * geometry_smith(n_dot_v, n_dot_l, roughness)
        * fresnel / (4.0 * n_dot_v * max(n_dot_l, 0.0001));
    let diffuse = (vec3<f32>(1.0) - fresnel) * (1.0 - metallic) * albedo
        * burley_diffuse(n_dot_v, n_dot_l, l_dot_h, roughness);
    let ambient = environment(normal) * albedo * (1.0 - metallic) * 0.15
        + environment(reflect(-view_dir, normal)) * f0 * (1.0 - roughness) * 0.25;
    let base = (diffuse + specular) * radiance * n_dot_l + ambient;

    // Clearcoat layer.
    let coat_weight = material.clearcoatWeightValue.x;
    let coat_roughness = material.clearcoatRoughnessValue.x;
    let coat_f0 = vec3<f32>(ior_to_f0(material.clearcoatIorValue.x));
    let coat_fresnel = fresnel_schlick(n_dot_v, coat_f0) * coat_weight;
    let coat_specular = distribution_ggx(n_dot_h, coat_roughness)
        * geometry_smith(n_dot_v, n_dot_l, coat_roughness)
        / (4.0 * n_dot_v * max(n_dot_l, 0.0001));
    let coat_reflection = environment(reflect(-view_dir, normal)) * (1.0 - coat_roughness);
    let coat = coat_fresnel * (coat_specular * radiance * n_dot_l + coat_reflection);

    let tinted_base = base * mix(vec3<f32>(1.0), material.clearcoatTint.xyz, coat_weight);
    let color = tinted_base * (vec3<f32>(1.0) - coat_fresnel) + coat;
    return vec4<f32>(color, material.alphaValue.x * object.tint.a);
}
"#
);

pub const BACKDROP: ShaderSource = ShaderSource {
    label: "backdrop",
    vertex: BACKDROP_VERTEX,
    fragment: BACKDROP_FRAGMENT,
    uniforms: &[],
};

pub const AMBIENT: ShaderSource = ShaderSource {
    label: "ambient",
    vertex: OBJECT_VERTEX,
    fragment: AMBIENT_FRAGMENT,
    uniforms: &[UniformDecl::vec3("lightColor"), UniformDecl::vec3("objectColor")],
};

pub const PHONG: ShaderSource = ShaderSource {
    label: "phong",
    vertex: OBJECT_VERTEX,
    fragment: PHONG_FRAGMENT,
    uniforms: &[
        UniformDecl::vec3("lightPos"),
        UniformDecl::vec3("lightColor"),
        UniformDecl::vec3("objectColor"),
        UniformDecl::vec3("viewPos"),
        UniformDecl::scalar("roughnessValue"),
    ],
};

pub const IBL: ShaderSource = ShaderSource {
    label: "ibl",
    vertex: OBJECT_VERTEX,
    fragment: IBL_FRAGMENT,
    uniforms: &[
        UniformDecl::vec3("lightColor"),
        UniformDecl::vec3("objectColor"),
        UniformDecl::vec3("viewPos"),
        UniformDecl::scalar("roughnessValue"),
        UniformDecl::scalar("metallicValue"),
    ],
};

pub const CLEARCOAT: ShaderSource = ShaderSource {
    label: "clearcoat",
    vertex: OBJECT_VERTEX,
    fragment: CLEARCOAT_FRAGMENT,
    uniforms: &[
        UniformDecl::vec3("lightPos"),
        UniformDecl::vec3("lightColor"),
        UniformDecl::vec3("objectColor"),
        UniformDecl::vec3("viewPos"),
        UniformDecl::scalar("roughnessValue"),
        UniformDecl::scalar("metallicValue"),
        UniformDecl::scalar("iorValue"),
        UniformDecl::scalar("alphaValue"),
        UniformDecl::scalar("clearcoatWeightValue"),
        UniformDecl::scalar("clearcoatRoughnessValue"),
        UniformDecl::scalar("clearcoatIorValue"),
        UniformDecl::vec3("clearcoatTint"),
    ],
};

/// Looks up a built-in shading model by the name demos refer to it with.
pub fn program(name: &str) -> Option<ShaderSource> {
    match name {
        "ambient" => Some(AMBIENT),
        "phong" => Some(PHONG),
        "ibl" => Some(IBL),
        "clearcoat" => Some(CLEARCOAT),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_block_declares_every_uniform_in_order() {
        let block = material_block(PHONG.uniforms);
        let light = block.find("lightPos: vec4<f32>").unwrap();
        let rough = block.find("roughnessValue: vec4<f32>").unwrap();
        assert!(light < rough);
        assert_eq!(material_block_size(PHONG.uniforms), 6 * 16);
        assert!(material_block(BACKDROP.uniforms).contains("_padding"));
    }

    #[test]
    fn environment_lit_programs_sample_the_panorama() {
        for source in [BACKDROP, IBL, CLEARCOAT] {
            let wgsl = assemble(&source);
            assert!(wgsl.contains("fn environment("), "{}", source.label);
            assert!(wgsl.contains("textureSampleLevel(environment_map"));
            assert!(wgsl.contains("procedural_sky(dir)"));
        }
        assert!(!assemble(&PHONG).contains("fn environment("));
    }

    #[test]
    fn fragments_only_read_declared_uniforms() {
        for source in [AMBIENT, PHONG, IBL, CLEARCOAT] {
            for name in [
                "lightPos",
                "viewPos",
                "roughnessValue",
                "metallicValue",
                "iorValue",
                "alphaValue",
                "clearcoatTint",
            ] {
                if source.fragment.contains(&format!("material.{name}")) {
                    assert!(
                        source.slot_of(name).is_some(),
                        "{} reads undeclared {name}",
                        source.label
                    );
                }
            }
        }
    }
}
