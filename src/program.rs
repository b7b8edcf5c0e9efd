//! Shader variant generation and the program cache.
//!
//! A [`ProgramParameters`] record captures everything that influences the
//! final GLSL pair of one material under one render state. [`Program`]
//! assembles the GLSL: a generated prefix of `#define`s and declarations,
//! followed by the library template with `#include` directives resolved,
//! light-count tokens substituted and annotated loops unrolled.
//! [`ProgramGenerator`] derives a cache key from the parameters and returns
//! a shared [`Program`] per distinct key.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;

use itertools::Itertools;

use chunk;
use material::Material;
use render_state::RenderState;
use shadow::ShadowMapType;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Material names a shader id the library has no entry for.
        UnknownShader(id: String) {
            display("unknown shader id {:?}", id)
            description("unknown shader id")
        }
    }
}

/// How texels of a sampled map are encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureEncoding {
    Linear = 1,
    SRGB = 2,
    RGBE = 3,
    RGBM7 = 4,
    RGBM16 = 5,
    RGBD = 6,
    Gamma = 7,
    LogLuv = 8,
}

fn encoding_index(encoding: Option<TextureEncoding>) -> u32 {
    encoding.map_or(0, |e| e as u32)
}

/// Decode/encode helper naming for each encoding: the GLSL function family
/// and the argument list it is called with.
fn encoding_components(encoding: TextureEncoding) -> (&'static str, &'static str) {
    match encoding {
        TextureEncoding::Linear => ("Linear", "( value )"),
        TextureEncoding::SRGB => ("sRGB", "( value )"),
        TextureEncoding::RGBE => ("RGBE", "( value )"),
        TextureEncoding::RGBM7 => ("RGBM", "( value, 7.0 )"),
        TextureEncoding::RGBM16 => ("RGBM", "( value, 16.0 )"),
        TextureEncoding::RGBD => ("RGBD", "( value, 256.0 )"),
        TextureEncoding::Gamma => ("Gamma", "( value, float( GAMMA_FACTOR ) )"),
        TextureEncoding::LogLuv => ("LogLuv", "( value )"),
    }
}

/// Tone mapping operator applied at the end of lit fragment shaders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToneMapping {
    None = 0,
    Linear = 1,
    Reinhard = 2,
    Uncharted2 = 3,
    Cineon = 4,
    AcesFilmic = 5,
}

impl ToneMapping {
    fn function_name(&self) -> &'static str {
        match *self {
            ToneMapping::None | ToneMapping::Linear => "Linear",
            ToneMapping::Reinhard => "Reinhard",
            ToneMapping::Uncharted2 => "Uncharted2",
            ToneMapping::Cineon => "OptimizedCineon",
            ToneMapping::AcesFilmic => "ACESFilmic",
        }
    }
}

/// How depth is packed into the color target by depth materials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthPacking {
    None = 0,
    Basic = 1,
    Rgba = 2,
}

impl DepthPacking {
    fn glsl_value(&self) -> u32 {
        match *self {
            DepthPacking::None => 0,
            DepthPacking::Basic => 3200,
            DepthPacking::Rgba => 3201,
        }
    }
}

/// Environment map projection and reflect/refract mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvMapMode {
    CubeReflection = 0,
    CubeRefraction = 1,
    EquirectReflection = 2,
    EquirectRefraction = 3,
    CubeUvReflection = 4,
    CubeUvRefraction = 5,
    SphereReflection = 6,
}

/// How the environment sample is combined with the surface color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvMapCombine {
    None = 0,
    Multiply = 1,
    Mix = 2,
    Add = 3,
}

/// Everything that decides which GLSL variant a draw uses.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgramParameters {
    pub glslversion: String,
    pub precision: String,
    pub supports_vertex_textures: bool,

    pub shader_id: String,
    pub vertex: String,
    pub fragment: String,
    /// Bypass all generation and use `vertex`/`fragment` verbatim.
    pub is_raw: bool,
    pub defines: BTreeMap<String, String>,

    pub morph_targets: bool,
    pub morph_normals: bool,
    pub skinning: bool,
    pub use_vertex_texture: bool,
    pub max_bones: u32,

    pub vertex_tangents: bool,
    pub vertex_colors: bool,
    pub vertex_uvs: bool,
    pub uvs_vertex_only: bool,

    pub flat_shading: bool,
    pub double_sided: bool,
    pub flip_sided: bool,
    pub size_attenuation: bool,

    pub map: bool,
    pub matcap: bool,
    pub env_map: bool,
    pub light_map: bool,
    pub ao_map: bool,
    pub emissive_map: bool,
    pub bump_map: bool,
    pub normal_map: bool,
    pub object_space_normal_map: bool,
    pub tangent_space_normal_map: bool,
    pub clearcoat_map: bool,
    pub clearcoat_roughness_map: bool,
    pub clearcoat_normal_map: bool,
    pub displacement_map: bool,
    pub specular_map: bool,
    pub roughness_map: bool,
    pub metalness_map: bool,
    pub alpha_map: bool,
    pub gradient_map: bool,

    pub env_map_mode: EnvMapMode,
    pub combine: EnvMapCombine,

    pub output_encoding: Option<TextureEncoding>,
    pub map_encoding: Option<TextureEncoding>,
    pub matcap_encoding: Option<TextureEncoding>,
    pub env_map_encoding: Option<TextureEncoding>,
    pub emissive_map_encoding: Option<TextureEncoding>,
    pub light_map_encoding: Option<TextureEncoding>,

    pub num_dir_lights: u32,
    pub num_spot_lights: u32,
    pub num_rect_area_lights: u32,
    pub num_point_lights: u32,
    pub num_hemi_lights: u32,
    pub num_dir_light_shadows: u32,
    pub num_spot_light_shadows: u32,
    pub num_point_light_shadows: u32,

    pub num_clipping_planes: u32,
    pub num_clip_intersection: u32,

    pub is_orthographic: bool,

    pub alpha_test: f32,
    pub gamma_factor: f32,

    pub use_fog: bool,
    pub fog: bool,
    pub fog_exp2: bool,

    pub logarithmic_depth_buffer: bool,
    pub renderer_extension_frag_depth: bool,

    pub shadow_map_enabled: bool,
    pub shadow_map_type: ShadowMapType,

    pub depth_packing: DepthPacking,

    pub physically_correct_lights: bool,
    pub tone_mapping: ToneMapping,
    pub dithering: bool,
    pub premultiplied_alpha: bool,
    pub sheen: bool,
    pub instancing: bool,
}

impl Default for ProgramParameters {
    fn default() -> Self {
        ProgramParameters {
            glslversion: "330".to_owned(),
            precision: "highp".to_owned(),
            supports_vertex_textures: true,

            shader_id: String::new(),
            vertex: String::new(),
            fragment: String::new(),
            is_raw: false,
            defines: BTreeMap::new(),

            morph_targets: false,
            morph_normals: false,
            skinning: false,
            use_vertex_texture: false,
            max_bones: 0,

            vertex_tangents: false,
            vertex_colors: false,
            vertex_uvs: false,
            uvs_vertex_only: false,

            flat_shading: false,
            double_sided: false,
            flip_sided: false,
            size_attenuation: false,

            map: false,
            matcap: false,
            env_map: false,
            light_map: false,
            ao_map: false,
            emissive_map: false,
            bump_map: false,
            normal_map: false,
            object_space_normal_map: false,
            tangent_space_normal_map: false,
            clearcoat_map: false,
            clearcoat_roughness_map: false,
            clearcoat_normal_map: false,
            displacement_map: false,
            specular_map: false,
            roughness_map: false,
            metalness_map: false,
            alpha_map: false,
            gradient_map: false,

            env_map_mode: EnvMapMode::CubeReflection,
            combine: EnvMapCombine::None,

            output_encoding: None,
            map_encoding: None,
            matcap_encoding: None,
            env_map_encoding: None,
            emissive_map_encoding: None,
            light_map_encoding: None,

            num_dir_lights: 0,
            num_spot_lights: 0,
            num_rect_area_lights: 0,
            num_point_lights: 0,
            num_hemi_lights: 0,
            num_dir_light_shadows: 0,
            num_spot_light_shadows: 0,
            num_point_light_shadows: 0,

            num_clipping_planes: 0,
            num_clip_intersection: 0,

            is_orthographic: false,

            alpha_test: -1.0,
            gamma_factor: 2.2,

            use_fog: false,
            fog: false,
            fog_exp2: false,

            logarithmic_depth_buffer: false,
            renderer_extension_frag_depth: false,

            shadow_map_enabled: false,
            shadow_map_type: ShadowMapType::Basic,

            depth_packing: DepthPacking::None,

            physically_correct_lights: false,
            tone_mapping: ToneMapping::None,
            dithering: false,
            premultiplied_alpha: false,
            sheen: false,
            instancing: false,
        }
    }
}

/// Recursion bound for `#include` resolution. The chunk graph is supposed
/// to be a DAG; hitting the bound means a cycle, which is logged and left
/// unresolved instead of overflowing the stack.
pub const MAX_INCLUDE_DEPTH: usize = 32;

fn parse_include(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start_matches(|c| c == ' ' || c == '\t');
    let rest = match rest.strip_prefix("#include") {
        Some(r) => r,
        None => return None,
    };
    if !rest.starts_with(' ') {
        return None;
    }
    let rest = rest.trim_start_matches(' ');
    if !rest.starts_with('<') {
        return None;
    }
    let end = rest.find('>')?;
    let name = &rest[1..end];
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '/')
    {
        return None;
    }
    Some((name, &rest[end + 1..]))
}

/// Replaces every `#include <name>` line with the named chunk, recursively.
/// Unknown chunks resolve to nothing; the shader then fails to reference
/// whatever the chunk would have declared, which is the intended, logged
/// degradation.
pub fn resolve_includes(text: &str) -> String {
    resolve_includes_at(text, 0)
}

fn resolve_includes_at(text: &str, depth: usize) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        match parse_include(line) {
            Some((name, trailing)) => {
                if depth >= MAX_INCLUDE_DEPTH {
                    error!(
                        "shader include depth limit ({}) reached at <{}>, leaving unresolved",
                        MAX_INCLUDE_DEPTH, name
                    );
                    out.push_str(line);
                    out.push('\n');
                    continue;
                }
                match chunk::chunk(name) {
                    Some(body) => {
                        out.push_str(&resolve_includes_at(body, depth + 1));
                    }
                    None => {
                        warn!("unknown shader chunk <{}>", name);
                    }
                }
                if !trailing.is_empty() {
                    out.push_str(trailing);
                    out.push('\n');
                }
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

/// Substitutes the per-type light and shadow count tokens with literals.
pub fn replace_light_nums(text: &str, parameters: &ProgramParameters) -> String {
    text.replace(
        "NUM_DIR_LIGHT_SHADOWS",
        &parameters.num_dir_light_shadows.to_string(),
    )
    .replace(
        "NUM_SPOT_LIGHT_SHADOWS",
        &parameters.num_spot_light_shadows.to_string(),
    )
    .replace(
        "NUM_POINT_LIGHT_SHADOWS",
        &parameters.num_point_light_shadows.to_string(),
    )
    .replace("NUM_DIR_LIGHTS", &parameters.num_dir_lights.to_string())
    .replace("NUM_SPOT_LIGHTS", &parameters.num_spot_lights.to_string())
    .replace(
        "NUM_RECT_AREA_LIGHTS",
        &parameters.num_rect_area_lights.to_string(),
    )
    .replace("NUM_POINT_LIGHTS", &parameters.num_point_lights.to_string())
    .replace("NUM_HEMI_LIGHTS", &parameters.num_hemi_lights.to_string())
}

/// Substitutes the clipping plane count tokens.
pub fn replace_clipping_plane_nums(text: &str, parameters: &ProgramParameters) -> String {
    text.replace(
        "NUM_CLIPPING_PLANES",
        &parameters.num_clipping_planes.to_string(),
    )
    .replace(
        "UNION_CLIPPING_PLANES",
        &parameters
            .num_clipping_planes
            .saturating_sub(parameters.num_clip_intersection)
            .to_string(),
    )
}

fn parse_unroll(s: &str) -> Option<(u32, u32, &str, usize)> {
    const END: &str = "#pragma unroll_loop_end";

    let t = s.trim_start();
    if t.len() == s.len() {
        return None;
    }
    let t = t.strip_prefix("for ( int i = ")?;
    let a_end = t.find(|c: char| !c.is_ascii_digit())?;
    if a_end == 0 {
        return None;
    }
    let start: u32 = t[..a_end].parse().ok()?;
    let t = t[a_end..].strip_prefix("; i < ")?;
    let b_end = t.find(|c: char| !c.is_ascii_digit())?;
    if b_end == 0 {
        return None;
    }
    let end: u32 = t[..b_end].parse().ok()?;
    let t = t[b_end..].strip_prefix("; i ++ ) {")?;
    let body_end = t.find('}')?;
    let body = &t[..body_end];
    let t = &t[body_end + 1..];
    let after_ws = t.trim_start();
    if after_ws.len() == t.len() {
        return None;
    }
    let rest = after_ws.strip_prefix(END)?;
    let consumed = s.len() - rest.len();
    Some((start, end, body, consumed))
}

/// Expands `#pragma unroll_loop_start` / `_end` annotated loops. The loop
/// header must be in the canonical chunk form (`for ( int i = A; i < B;
/// i ++ ) {`) with the counts already substituted; each copy of the body
/// gets `[ i ]` and `UNROLLED_LOOP_INDEX` replaced by the iteration index.
/// Anything that does not parse is passed through untouched.
pub fn unroll_loops(text: &str) -> String {
    const START: &str = "#pragma unroll_loop_start";

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(START) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + START.len()..];
        match parse_unroll(tail) {
            Some((start, end, body, consumed)) => {
                for i in start..end {
                    let pass = body.replace("[ i ]", &format!("[ {} ]", i));
                    out.push_str(&pass.replace("UNROLLED_LOOP_INDEX", &i.to_string()));
                }
                rest = &tail[consumed..];
            }
            None => {
                out.push_str(START);
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

fn generate_defines(parameters: &ProgramParameters) -> String {
    parameters
        .defines
        .iter()
        .map(|(name, value)| format!("#define {} {}", name, value))
        .join("\n")
}

fn generate_precision(parameters: &ProgramParameters) -> String {
    let mut s = format!(
        "precision {} float;\nprecision {} int;",
        parameters.precision, parameters.precision
    );
    match parameters.precision.as_str() {
        "highp" => s.push_str("\n#define HIGH_PRECISION"),
        "mediump" => s.push_str("\n#define MEDIUM_PRECISION"),
        "lowp" => s.push_str("\n#define LOW_PRECISION"),
        _ => {}
    }
    s
}

fn env_map_type_define(parameters: &ProgramParameters) -> &'static str {
    if !parameters.env_map {
        return "ENVMAP_TYPE_CUBE";
    }
    match parameters.env_map_mode {
        EnvMapMode::CubeReflection | EnvMapMode::CubeRefraction => "ENVMAP_TYPE_CUBE",
        EnvMapMode::CubeUvReflection | EnvMapMode::CubeUvRefraction => "ENVMAP_TYPE_CUBE_UV",
        EnvMapMode::EquirectReflection | EnvMapMode::EquirectRefraction => "ENVMAP_TYPE_EQUIREC",
        EnvMapMode::SphereReflection => "ENVMAP_TYPE_SPHERE",
    }
}

fn env_map_mode_define(parameters: &ProgramParameters) -> &'static str {
    if !parameters.env_map {
        return "ENVMAP_MODE_REFLECTION";
    }
    match parameters.env_map_mode {
        EnvMapMode::CubeRefraction | EnvMapMode::EquirectRefraction | EnvMapMode::CubeUvRefraction => {
            "ENVMAP_MODE_REFRACTION"
        }
        _ => "ENVMAP_MODE_REFLECTION",
    }
}

fn env_map_blending_define(parameters: &ProgramParameters) -> &'static str {
    if !parameters.env_map {
        return "ENVMAP_BLENDING_NONE";
    }
    match parameters.combine {
        EnvMapCombine::None => "ENVMAP_BLENDING_NONE",
        EnvMapCombine::Multiply => "ENVMAP_BLENDING_MULTIPLY",
        EnvMapCombine::Mix => "ENVMAP_BLENDING_MIX",
        EnvMapCombine::Add => "ENVMAP_BLENDING_ADD",
    }
}

fn shadow_map_type_define(parameters: &ProgramParameters) -> &'static str {
    match parameters.shadow_map_type {
        ShadowMapType::Basic => "SHADOWMAP_TYPE_BASIC",
        ShadowMapType::Pcf => "SHADOWMAP_TYPE_PCF",
        ShadowMapType::PcfSoft => "SHADOWMAP_TYPE_PCF_SOFT",
        ShadowMapType::Vsm => "SHADOWMAP_TYPE_VSM",
    }
}

fn tone_mapping_function(function_name: &str, parameters: &ProgramParameters) -> String {
    format!(
        "vec3 {}( vec3 color ) {{ return {}ToneMapping( color ); }}",
        function_name,
        parameters.tone_mapping.function_name()
    )
}

fn texel_decoding_function(function_name: &str, encoding: TextureEncoding) -> String {
    let (name, component) = encoding_components(encoding);
    format!(
        "vec4 {}( vec4 value ) {{ return {}ToLinear{}; }}",
        function_name, name, component
    )
}

fn texel_encoding_function(function_name: &str, encoding: TextureEncoding) -> String {
    let (name, component) = encoding_components(encoding);
    format!(
        "vec4 {}( vec4 value ) {{ return LinearTo{}{}; }}",
        function_name, name, component
    )
}

/// A generated, immutable GLSL program variant.
#[derive(Debug)]
pub struct Program {
    key: String,
    vertex_glsl: String,
    fragment_glsl: String,
}

impl Program {
    pub fn new(key: &str, parameters: &ProgramParameters) -> Self {
        if parameters.is_raw {
            return Program {
                key: key.to_owned(),
                vertex_glsl: parameters.vertex.clone(),
                fragment_glsl: parameters.fragment.clone(),
            };
        }

        let custom_defines = generate_defines(parameters);
        let precision = generate_precision(parameters);

        let env_map_type = env_map_type_define(parameters);
        let env_map_mode = env_map_mode_define(parameters);
        let env_map_blending = env_map_blending_define(parameters);
        let shadow_map_type = shadow_map_type_define(parameters);

        let mut pv = String::with_capacity(2048);
        let _ = writeln!(pv, "#version {}", parameters.glslversion);
        let _ = writeln!(pv, "{}", precision);
        let _ = writeln!(pv, "{}", custom_defines);
        pv.push_str("#define attribute in\n");
        pv.push_str("#define varying out\n");
        pv.push_str("#define texture2D texture\n");
        pv.push_str("#define textureCube texture\n");

        if parameters.supports_vertex_textures {
            pv.push_str("#define VERTEX_TEXTURES\n");
        }

        let _ = writeln!(pv, "#define GAMMA_FACTOR {}", parameters.gamma_factor);
        let _ = writeln!(pv, "#define MAX_BONES {}", parameters.max_bones);

        if parameters.use_fog && parameters.fog {
            pv.push_str("#define USE_FOG\n");
        }
        if parameters.use_fog && parameters.fog_exp2 {
            pv.push_str("#define FOG_EXP2\n");
        }

        if parameters.map {
            pv.push_str("#define USE_MAP\n");
        }
        if parameters.env_map {
            let _ = writeln!(pv, "#define USE_ENVMAP");
            let _ = writeln!(pv, "#define {}", env_map_type);
            let _ = writeln!(pv, "#define {}", env_map_mode);
            let _ = writeln!(pv, "#define {}", env_map_blending);
        }
        if parameters.light_map {
            pv.push_str("#define USE_LIGHTMAP\n");
        }
        if parameters.ao_map {
            pv.push_str("#define USE_AOMAP\n");
        }
        if parameters.emissive_map {
            pv.push_str("#define USE_EMISSIVEMAP\n");
        }
        if parameters.bump_map {
            pv.push_str("#define USE_BUMPMAP\n");
        }
        if parameters.normal_map {
            pv.push_str("#define USE_NORMALMAP\n");
            if parameters.object_space_normal_map {
                pv.push_str("#define OBJECTSPACE_NORMALMAP\n");
            }
            if parameters.tangent_space_normal_map {
                pv.push_str("#define TANGENTSPACE_NORMALMAP\n");
            }
        }
        if parameters.clearcoat_map {
            pv.push_str("#define USE_CLEARCOATMAP\n");
        }
        if parameters.clearcoat_roughness_map {
            pv.push_str("#define USE_CLEARCOAT_ROUGHNESSMAP\n");
        }
        if parameters.clearcoat_normal_map {
            pv.push_str("#define USE_CLEARCOAT_NORMALMAP\n");
        }
        if parameters.displacement_map && parameters.supports_vertex_textures {
            pv.push_str("#define USE_DISPLACEMENTMAP\n");
        }
        if parameters.specular_map {
            pv.push_str("#define USE_SPECULARMAP\n");
        }
        if parameters.roughness_map {
            pv.push_str("#define USE_ROUGHNESSMAP\n");
        }
        if parameters.metalness_map {
            pv.push_str("#define USE_METALNESSMAP\n");
        }
        if parameters.alpha_map {
            pv.push_str("#define USE_ALPHAMAP\n");
        }

        if parameters.vertex_tangents {
            pv.push_str("#define USE_TANGENT\n");
        }
        if parameters.vertex_colors {
            pv.push_str("#define USE_COLOR\n");
        }
        if parameters.vertex_uvs {
            pv.push_str("#define USE_UV\n");
        }
        if parameters.uvs_vertex_only {
            pv.push_str("#define UVS_VERTEX_ONLY\n");
        }

        if parameters.flat_shading {
            pv.push_str("#define FLAT_SHADED\n");
        }

        if parameters.skinning {
            pv.push_str("#define USE_SKINNING\n");
        }
        if parameters.use_vertex_texture {
            pv.push_str("#define BONE_TEXTURE\n");
        }

        if parameters.morph_targets {
            pv.push_str("#define USE_MORPHTARGETS\n");
        }
        if parameters.morph_normals && !parameters.flat_shading {
            pv.push_str("#define USE_MORPHNORMALS\n");
        }

        if parameters.double_sided {
            pv.push_str("#define DOUBLE_SIDED\n");
        }
        if parameters.flip_sided {
            pv.push_str("#define FLIP_SIDED\n");
        }

        if parameters.shadow_map_enabled {
            let _ = writeln!(pv, "#define USE_SHADOWMAP");
            let _ = writeln!(pv, "#define {}", shadow_map_type);
        }

        if parameters.size_attenuation {
            pv.push_str("#define USE_SIZEATTENUATION\n");
        }

        if parameters.logarithmic_depth_buffer {
            pv.push_str("#define USE_LOGDEPTHBUF\n");
            if parameters.renderer_extension_frag_depth {
                pv.push_str("#define USE_LOGDEPTHBUF_EXT\n");
            }
        }

        if parameters.instancing {
            pv.push_str("#define USE_INSTANCING\n");
            pv.push_str("uniform sampler2D instanceImage;\n");
            pv.push_str("mat4 getInstanceMatrix(){\n");
            pv.push_str("mat4 instanceMat = mat4(texelFetch(instanceImage, ivec2(0, gl_InstanceID), 0),\n");
            pv.push_str("texelFetch(instanceImage, ivec2(1, gl_InstanceID), 0),\n");
            pv.push_str("texelFetch(instanceImage, ivec2(2, gl_InstanceID), 0),\n");
            pv.push_str("texelFetch(instanceImage, ivec2(3, gl_InstanceID), 0)); \n");
            pv.push_str("return instanceMat;} \n");
            pv.push_str("#define instanceMatrix getInstanceMatrix() \n");
        }

        pv.push_str("#define modelMatrix (osg_ViewMatrixInverse*osg_ModelViewMatrix)\n");
        pv.push_str("#define modelViewMatrix (osg_ModelViewMatrix)\n");
        pv.push_str("#define projectionMatrix (osg_ProjectionMatrix)\n");
        pv.push_str("#define viewMatrix (osg_ViewMatrix)\n");
        pv.push_str("#define normalMatrix (osg_NormalMatrix)\n");
        pv.push_str("#define cameraPosition (osg_ViewMatrixInverse[3].xyz)\n");
        if parameters.is_orthographic {
            pv.push_str("#define isOrthographic true\n");
        } else {
            pv.push_str("#define isOrthographic false\n");
        }

        pv.push_str("uniform mat4 osg_ViewMatrixInverse;\n");
        pv.push_str("uniform mat4 osg_ModelViewMatrix;\n");
        pv.push_str("uniform mat4 osg_ProjectionMatrix;\n");
        pv.push_str("uniform mat4 osg_ViewMatrix;\n");
        pv.push_str("uniform mat3 osg_NormalMatrix;\n");
        pv.push_str("uniform mat4 osg_ModelViewProjectionMatrix;\n");

        pv.push_str("attribute vec3 position;\n");
        pv.push_str("attribute vec3 normal;\n");
        pv.push_str("attribute vec2 uv;\n");
        pv.push_str("#ifdef USE_TANGENT\n");
        pv.push_str("\tattribute vec4 tangent;\n");
        pv.push_str("#endif\n");
        pv.push_str("#ifdef USE_COLOR\n");
        pv.push_str("\tattribute vec3 color;\n");
        pv.push_str("#endif\n");
        pv.push_str("#ifdef USE_MORPHTARGETS\n");
        pv.push_str("\tattribute vec3 morphTarget0;\n");
        pv.push_str("\tattribute vec3 morphTarget1;\n");
        pv.push_str("\tattribute vec3 morphTarget2;\n");
        pv.push_str("\tattribute vec3 morphTarget3;\n");
        pv.push_str("\t#ifdef USE_MORPHNORMALS\n");
        pv.push_str("\t\tattribute vec3 morphNormal0;\n");
        pv.push_str("\t\tattribute vec3 morphNormal1;\n");
        pv.push_str("\t\tattribute vec3 morphNormal2;\n");
        pv.push_str("\t\tattribute vec3 morphNormal3;\n");
        pv.push_str("\t#else\n");
        pv.push_str("\t\tattribute vec3 morphTarget4;\n");
        pv.push_str("\t\tattribute vec3 morphTarget5;\n");
        pv.push_str("\t\tattribute vec3 morphTarget6;\n");
        pv.push_str("\t\tattribute vec3 morphTarget7;\n");
        pv.push_str("\t#endif\n");
        pv.push_str("#endif\n");
        pv.push_str("#ifdef USE_SKINNING\n");
        pv.push_str("\tattribute vec4 skinIndex;\n");
        pv.push_str("\tattribute vec4 skinWeight;\n");
        pv.push_str("#endif\n");

        let mut pf = String::with_capacity(2048);
        let _ = writeln!(pf, "#version {}", parameters.glslversion);
        pf.push_str("#define varying in\n");
        pf.push_str("out highp vec4 pc_fragColor;\n");
        pf.push_str("#define gl_FragColor pc_fragColor\n");
        let _ = writeln!(pf, "{}", precision);
        let _ = writeln!(pf, "{}", custom_defines);
        pf.push_str("#define texture2D texture\n");
        pf.push_str("#define textureCube texture\n");

        if parameters.alpha_test > 0.0 {
            let _ = writeln!(pf, "#define ALPHATEST {:.6}", parameters.alpha_test);
        }

        let _ = writeln!(pf, "#define GAMMA_FACTOR {:.6}", parameters.gamma_factor);

        if parameters.use_fog && parameters.fog {
            pf.push_str("#define USE_FOG\n");
        }
        if parameters.use_fog && parameters.fog_exp2 {
            pf.push_str("#define FOG_EXP2\n");
        }

        if parameters.map {
            pf.push_str("#define USE_MAP\n");
        }
        if parameters.matcap {
            pf.push_str("#define USE_MATCAP\n");
        }
        if parameters.env_map {
            let _ = writeln!(pf, "#define USE_ENVMAP");
            let _ = writeln!(pf, "#define {}", env_map_type);
            let _ = writeln!(pf, "#define {}", env_map_mode);
            let _ = writeln!(pf, "#define {}", env_map_blending);
        }
        if parameters.light_map {
            pf.push_str("#define USE_LIGHTMAP\n");
        }
        if parameters.ao_map {
            pf.push_str("#define USE_AOMAP\n");
        }
        if parameters.emissive_map {
            pf.push_str("#define USE_EMISSIVEMAP\n");
        }
        if parameters.bump_map {
            pf.push_str("#define USE_BUMPMAP\n");
        }
        if parameters.normal_map {
            pf.push_str("#define USE_NORMALMAP\n");
            if parameters.object_space_normal_map {
                pf.push_str("#define OBJECTSPACE_NORMALMAP\n");
            }
            if parameters.tangent_space_normal_map {
                pf.push_str("#define TANGENTSPACE_NORMALMAP\n");
            }
        }
        if parameters.clearcoat_map {
            pf.push_str("#define USE_CLEARCOATMAP\n");
        }
        if parameters.clearcoat_roughness_map {
            pf.push_str("#define USE_CLEARCOAT_ROUGHNESSMAP\n");
        }
        if parameters.clearcoat_normal_map {
            pf.push_str("#define USE_CLEARCOAT_NORMALMAP\n");
        }
        if parameters.displacement_map && parameters.supports_vertex_textures {
            pf.push_str("#define USE_DISPLACEMENTMAP\n");
        }
        if parameters.specular_map {
            pf.push_str("#define USE_SPECULARMAP\n");
        }
        if parameters.roughness_map {
            pf.push_str("#define USE_ROUGHNESSMAP\n");
        }
        if parameters.metalness_map {
            pf.push_str("#define USE_METALNESSMAP\n");
        }
        if parameters.alpha_map {
            pf.push_str("#define USE_ALPHAMAP\n");
        }

        if parameters.sheen {
            pf.push_str("#define USE_SHEEN\n");
        }

        if parameters.vertex_tangents {
            pf.push_str("#define USE_TANGENT\n");
        }
        if parameters.vertex_colors {
            pf.push_str("#define USE_COLOR\n");
        }
        if parameters.vertex_uvs {
            pf.push_str("#define USE_UV\n");
        }
        if parameters.uvs_vertex_only {
            pf.push_str("#define UVS_VERTEX_ONLY\n");
        }

        if parameters.gradient_map {
            pf.push_str("#define USE_GRADIENTMAP\n");
        }

        if parameters.flat_shading {
            pf.push_str("#define FLAT_SHADED\n");
        }

        if parameters.double_sided {
            pf.push_str("#define DOUBLE_SIDED\n");
        }
        if parameters.flip_sided {
            pf.push_str("#define FLIP_SIDED\n");
        }

        if parameters.shadow_map_enabled {
            let _ = writeln!(pf, "#define USE_SHADOWMAP");
            let _ = writeln!(pf, "#define {}", shadow_map_type);
        }

        if parameters.premultiplied_alpha {
            pf.push_str("#define PREMULTIPLIED_ALPHA\n");
        }

        if parameters.physically_correct_lights {
            pf.push_str("#define PHYSICALLY_CORRECT_LIGHTS\n");
        }

        if parameters.logarithmic_depth_buffer {
            pf.push_str("#define USE_LOGDEPTHBUF\n");
            if parameters.renderer_extension_frag_depth {
                pf.push_str("#define USE_LOGDEPTHBUF_EXT\n");
            }
        }

        pf.push_str("#define viewMatrix (osg_ViewMatrix)\n");
        pf.push_str("#define cameraPosition (osg_ViewMatrixInverse[3].xyz)\n");
        if parameters.is_orthographic {
            pf.push_str("#define isOrthographic true\n");
        } else {
            pf.push_str("#define isOrthographic false\n");
        }
        pf.push_str("#define normalMatrix (osg_NormalMatrix)\n");

        pf.push_str("#define TEXTURE_LOD_EXT\n");
        pf.push_str("#define textureCubeLodEXT textureLod\n");
        pf.push_str("#define texture2DLodEXT textureLod\n");
        pf.push_str("#define gl_FragDepthEXT gl_FragDepth\n");

        pf.push_str("uniform mat4 osg_ViewMatrixInverse;\n");
        pf.push_str("uniform mat4 osg_ModelViewMatrix;\n");
        pf.push_str("uniform mat4 osg_ProjectionMatrix;\n");
        pf.push_str("uniform mat4 osg_ViewMatrix;\n");
        pf.push_str("uniform mat3 osg_NormalMatrix;\n");

        if parameters.tone_mapping != ToneMapping::None {
            pf.push_str("#define TONE_MAPPING\n");
            let _ = writeln!(pf, "{}", chunk::chunk("tonemapping_pars_fragment").unwrap_or(""));
            let _ = writeln!(pf, "{}", tone_mapping_function("toneMapping", parameters));
        }

        if parameters.dithering {
            pf.push_str("#define DITHERING\n");
        }

        if parameters.output_encoding.is_some()
            || parameters.map_encoding.is_some()
            || parameters.matcap_encoding.is_some()
            || parameters.env_map_encoding.is_some()
            || parameters.emissive_map_encoding.is_some()
            || parameters.light_map_encoding.is_some()
        {
            let _ = writeln!(pf, "{}", chunk::chunk("encodings_pars_fragment").unwrap_or(""));
        }
        if let Some(encoding) = parameters.map_encoding {
            let _ = writeln!(pf, "{}", texel_decoding_function("mapTexelToLinear", encoding));
        }
        if let Some(encoding) = parameters.matcap_encoding {
            let _ = writeln!(pf, "{}", texel_decoding_function("matcapTexelToLinear", encoding));
        }
        if let Some(encoding) = parameters.env_map_encoding {
            let _ = writeln!(pf, "{}", texel_decoding_function("envMapTexelToLinear", encoding));
        }
        if let Some(encoding) = parameters.emissive_map_encoding {
            let _ = writeln!(
                pf,
                "{}",
                texel_decoding_function("emissiveMapTexelToLinear", encoding)
            );
        }
        if let Some(encoding) = parameters.light_map_encoding {
            let _ = writeln!(
                pf,
                "{}",
                texel_decoding_function("lightMapTexelToLinear", encoding)
            );
        }
        if let Some(encoding) = parameters.output_encoding {
            let _ = writeln!(pf, "{}", texel_encoding_function("linearToOutputTexel", encoding));
        }

        if parameters.depth_packing != DepthPacking::None {
            let _ = writeln!(pf, "#define DEPTH_PACKING {}", parameters.depth_packing.glsl_value());
        }

        let mut vertex = resolve_includes(&parameters.vertex);
        vertex = replace_light_nums(&vertex, parameters);
        vertex = replace_clipping_plane_nums(&vertex, parameters);
        vertex = unroll_loops(&vertex);

        let mut fragment = resolve_includes(&parameters.fragment);
        fragment = replace_light_nums(&fragment, parameters);
        fragment = replace_clipping_plane_nums(&fragment, parameters);
        fragment = unroll_loops(&fragment);

        Program {
            key: key.to_owned(),
            vertex_glsl: pv + &vertex,
            fragment_glsl: pf + &fragment,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn vertex_glsl(&self) -> &str {
        &self.vertex_glsl
    }

    pub fn fragment_glsl(&self) -> &str {
        &self.fragment_glsl
    }
}

/// Keyed program cache. Owned by whoever drives rendering; shared programs
/// come back as `Arc` so state sets can hold them across rebuilds.
#[derive(Debug, Default)]
pub struct ProgramGenerator {
    cache: HashMap<String, Arc<Program>>,
}

impl ProgramGenerator {
    pub fn new() -> Self {
        ProgramGenerator {
            cache: HashMap::new(),
        }
    }

    /// Merges render-state-wide and material parameters into one record.
    pub fn parameters(
        material: &Material,
        is_orthographic: bool,
        state: &RenderState,
    ) -> Result<ProgramParameters, Error> {
        use light::LightType;

        let mut p = ProgramParameters::default();
        p.is_orthographic = is_orthographic;

        let caps = state.capabilities();
        p.glslversion = caps.glslversion.clone();
        p.precision = caps.precision.clone();
        p.supports_vertex_textures = caps.supports_vertex_textures;

        p.output_encoding = state.output_encoding();
        p.gamma_factor = state.gamma_factor();
        p.tone_mapping = state.tone_mapping();

        p.num_dir_lights = state.light_num_of_type(LightType::Directional);
        p.num_spot_lights = state.light_num_of_type(LightType::Spot);
        p.num_rect_area_lights = state.light_num_of_type(LightType::RectArea);
        p.num_point_lights = state.light_num_of_type(LightType::Point);
        p.num_hemi_lights = state.light_num_of_type(LightType::Hemisphere);

        p.num_dir_light_shadows = state.shadow_num_of_type(LightType::Directional);
        p.num_spot_light_shadows = state.shadow_num_of_type(LightType::Spot);
        p.num_point_light_shadows = state.shadow_num_of_type(LightType::Point);

        if let Some(fog) = state.fog() {
            p.fog = true;
            p.fog_exp2 = fog.is_exp2();
        }

        if let Some(shadow_map) = state.shadow_map() {
            p.shadow_map_enabled = shadow_map.is_enabled();
            p.shadow_map_type = shadow_map.map_type();
        }

        p.physically_correct_lights = state.physically_correct_lights();

        p.logarithmic_depth_buffer = state.logarithmic_depth_buffer();
        p.renderer_extension_frag_depth = p.logarithmic_depth_buffer;

        p.num_clipping_planes = 0;
        p.num_clip_intersection = 0;

        if let Some(env) = state.background_env() {
            env.contribute_parameters(&mut p);
        }

        material.get_program_parameters(&mut p)?;

        p.vertex_uvs = p.map
            || p.bump_map
            || p.normal_map
            || p.specular_map
            || p.alpha_map
            || p.emissive_map
            || p.roughness_map
            || p.metalness_map
            || p.clearcoat_map
            || p.clearcoat_roughness_map
            || p.clearcoat_normal_map
            || p.displacement_map;

        p.uvs_vertex_only = (p.map
            || p.bump_map
            || p.normal_map
            || p.specular_map
            || p.alpha_map
            || p.emissive_map
            || p.roughness_map
            || p.metalness_map
            || p.clearcoat_normal_map)
            && p.displacement_map;

        Ok(p)
    }

    /// Derives the cache key. Several define-affecting fields (depth
    /// packing, fog, output encoding, flat shading, sidedness) are not
    /// concatenated; the embedded shader text disambiguates most of those
    /// in practice, but parameter sets differing only in such a field
    /// collide. Kept as-is; see the key coverage test.
    pub fn key(parameters: &ProgramParameters) -> String {
        let mut k = String::with_capacity(
            parameters.vertex.len() + parameters.fragment.len() + 128,
        );
        let b = |v: bool| if v { '1' } else { '0' };

        k.push_str(&parameters.shader_id);
        for (name, value) in &parameters.defines {
            let _ = write!(k, "{}{}", name, value);
        }

        let _ = write!(
            k,
            "{}{}{}",
            b(parameters.env_map),
            parameters.env_map_mode as u32,
            encoding_index(parameters.env_map_encoding)
        );
        let _ = write!(k, "{}", parameters.alpha_test);
        let _ = write!(k, "{}", parameters.tone_mapping as u32);
        let _ = write!(
            k,
            "{}{}{}{}",
            b(parameters.map),
            b(parameters.emissive_map),
            b(parameters.displacement_map),
            b(parameters.specular_map)
        );
        let _ = write!(
            k,
            "{}{}{}{}",
            b(parameters.normal_map),
            b(parameters.ao_map),
            b(parameters.roughness_map),
            b(parameters.metalness_map)
        );
        let _ = write!(
            k,
            "{}{}{}",
            b(parameters.clearcoat_map),
            b(parameters.clearcoat_normal_map),
            b(parameters.clearcoat_roughness_map)
        );
        let _ = write!(
            k,
            "{}{}{}{}",
            b(parameters.skinning),
            b(parameters.morph_targets),
            b(parameters.morph_normals),
            parameters.max_bones
        );
        let _ = write!(k, "{}", b(parameters.instancing));
        let _ = write!(k, "{}", b(parameters.sheen));
        let _ = write!(
            k,
            "{}{}",
            b(parameters.shadow_map_enabled),
            parameters.shadow_map_type as u32
        );
        let _ = write!(
            k,
            "{}{}{}",
            parameters.num_dir_light_shadows,
            parameters.num_spot_light_shadows,
            parameters.num_point_light_shadows
        );
        let _ = write!(
            k,
            "{}{}",
            parameters.num_clipping_planes, parameters.num_clip_intersection
        );
        let _ = write!(
            k,
            "{}{}{}{}{}",
            parameters.num_dir_lights,
            parameters.num_point_lights,
            parameters.num_spot_lights,
            parameters.num_rect_area_lights,
            parameters.num_hemi_lights
        );
        k.push_str(&parameters.vertex);
        k.push_str(&parameters.fragment);
        k
    }

    /// Returns the cached program for `key`, creating it on first use.
    pub fn get_or_create(&mut self, key: &str, parameters: &ProgramParameters) -> Arc<Program> {
        if let Some(program) = self.cache.get(key) {
            return program.clone();
        }
        trace!("compiling program variant for {:?}", parameters.shader_id);
        let program = Arc::new(Program::new(key, parameters));
        self.cache.insert(key.to_owned(), program.clone());
        program
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_resolve_recursively_and_idempotently() {
        let resolved = resolve_includes("#include <tonemapping_fragment>\n");
        assert!(resolved.contains("toneMapping( gl_FragColor.rgb )"));
        assert!(!resolved.contains("#include"));
        // already-resolved text passes through unchanged
        assert_eq!(resolve_includes(&resolved), resolved);
    }

    #[test]
    fn unknown_include_resolves_to_nothing() {
        let _ = ::env_logger::builder().is_test(true).try_init();
        let resolved = resolve_includes("a\n#include <no_such_chunk>\nb\n");
        assert_eq!(resolved, "a\nb\n");
    }

    #[test]
    fn malformed_include_is_left_alone() {
        let text = "#include without_brackets\n";
        assert_eq!(resolve_includes(text), text);
    }

    #[test]
    fn light_num_tokens_substitute_shadow_counts_first() {
        let mut p = ProgramParameters::default();
        p.num_dir_lights = 3;
        p.num_dir_light_shadows = 2;
        let out = replace_light_nums("#if NUM_DIR_LIGHT_SHADOWS > 0\n[NUM_DIR_LIGHTS]", &p);
        assert_eq!(out, "#if 2 > 0\n[3]");
    }

    #[test]
    fn clipping_plane_tokens() {
        let mut p = ProgramParameters::default();
        p.num_clipping_planes = 4;
        p.num_clip_intersection = 1;
        let out = replace_clipping_plane_nums("NUM_CLIPPING_PLANES UNION_CLIPPING_PLANES", &p);
        assert_eq!(out, "4 3");

        // an intersection count exceeding the plane count clamps to zero
        p.num_clipping_planes = 1;
        p.num_clip_intersection = 3;
        let out = replace_clipping_plane_nums("UNION_CLIPPING_PLANES", &p);
        assert_eq!(out, "0");
    }

    #[test]
    fn loops_unroll_with_index_substitution() {
        let text = "\
#pragma unroll_loop_start
for ( int i = 0; i < 3; i ++ ) {
	foo( bar[ i ], UNROLLED_LOOP_INDEX );
}
#pragma unroll_loop_end
tail";
        let out = unroll_loops(text);
        assert!(out.contains("foo( bar[ 0 ], 0 );"));
        assert!(out.contains("foo( bar[ 1 ], 1 );"));
        assert!(out.contains("foo( bar[ 2 ], 2 );"));
        assert!(!out.contains("unroll_loop"));
        assert!(!out.contains("[ i ]"));
        assert!(out.ends_with("tail"));
    }

    #[test]
    fn zero_count_loop_unrolls_to_nothing() {
        let text = "\
#pragma unroll_loop_start
for ( int i = 0; i < 0; i ++ ) {
	foo( bar[ i ] );
}
#pragma unroll_loop_end";
        let out = unroll_loops(text);
        assert!(!out.contains("foo"));
        assert!(!out.contains("unroll_loop"));
    }

    #[test]
    fn unparsable_loop_is_passed_through() {
        let text = "#pragma unroll_loop_start\nwhile ( true ) {}\n#pragma unroll_loop_end\n";
        assert_eq!(unroll_loops(text), text);
    }

    #[test]
    fn key_covers_map_but_not_fog() {
        let mut a = ProgramParameters::default();
        a.shader_id = "phong".to_owned();
        a.vertex = "v".to_owned();
        a.fragment = "f".to_owned();

        let mut with_map = a.clone();
        with_map.map = true;
        assert_ne!(ProgramGenerator::key(&a), ProgramGenerator::key(&with_map));

        // fog is a known hole in the key: two variants differing only in
        // fog state collide.
        let mut with_fog = a.clone();
        with_fog.use_fog = true;
        with_fog.fog = true;
        assert_eq!(ProgramGenerator::key(&a), ProgramGenerator::key(&with_fog));
    }

    #[test]
    fn cache_returns_the_same_program_for_the_same_key() {
        let mut generator = ProgramGenerator::new();
        let mut p = ProgramParameters::default();
        p.shader_id = "basic".to_owned();
        p.vertex = "void main() {}\n".to_owned();
        p.fragment = "void main() {}\n".to_owned();
        let key = ProgramGenerator::key(&p);

        let first = generator.get_or_create(&key, &p);
        let second = generator.get_or_create(&key, &p);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(generator.len(), 1);
    }

    #[test]
    fn prefix_carries_feature_defines() {
        let mut p = ProgramParameters::default();
        p.shader_id = "basic".to_owned();
        p.map = true;
        p.env_map = true;
        p.env_map_mode = EnvMapMode::EquirectRefraction;
        p.combine = EnvMapCombine::Mix;
        p.shadow_map_enabled = true;
        p.shadow_map_type = ShadowMapType::Pcf;
        p.tone_mapping = ToneMapping::AcesFilmic;
        p.output_encoding = Some(TextureEncoding::Gamma);
        p.map_encoding = Some(TextureEncoding::SRGB);
        p.alpha_test = 0.5;

        let program = Program::new("k", &p);
        let frag = program.fragment_glsl();
        assert!(frag.contains("#define USE_MAP\n"));
        assert!(frag.contains("#define ENVMAP_TYPE_EQUIREC\n"));
        assert!(frag.contains("#define ENVMAP_MODE_REFRACTION\n"));
        assert!(frag.contains("#define ENVMAP_BLENDING_MIX\n"));
        assert!(frag.contains("#define SHADOWMAP_TYPE_PCF\n"));
        assert!(frag.contains("#define ALPHATEST 0.500000\n"));
        assert!(frag.contains(
            "vec3 toneMapping( vec3 color ) { return ACESFilmicToneMapping( color ); }"
        ));
        assert!(frag.contains("vec4 mapTexelToLinear( vec4 value ) { return sRGBToLinear( value ); }"));
        assert!(frag.contains(
            "vec4 linearToOutputTexel( vec4 value ) { return LinearToGamma( value, float( GAMMA_FACTOR ) ); }"
        ));

        let vert = program.vertex_glsl();
        assert!(vert.contains("#define isOrthographic false\n"));
        assert!(vert.contains("attribute vec3 position;\n"));
    }

    #[test]
    fn raw_parameters_bypass_generation() {
        let mut p = ProgramParameters::default();
        p.is_raw = true;
        p.vertex = "raw vertex".to_owned();
        p.fragment = "raw fragment".to_owned();
        let program = Program::new("k", &p);
        assert_eq!(program.vertex_glsl(), "raw vertex");
        assert_eq!(program.fragment_glsl(), "raw fragment");
    }
}
