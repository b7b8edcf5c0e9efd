//! The material kinds and their per-kind payloads.

use cgmath::Point3;

use material::data::*;
use program::{DepthPacking, ProgramParameters};
use state::{upsert_uniform, Side, Uniform};

/// Unlit color/map material.
#[derive(Clone, Debug, Default)]
pub struct BasicParams {
    pub common: CommonData,
    pub light: LightMapData,
    pub ao: AoData,
    pub specular: SpecularData,
    pub env: EnvData,
}

/// Per-vertex diffuse lighting.
#[derive(Clone, Debug, Default)]
pub struct LambertParams {
    pub common: CommonData,
    pub light: LightMapData,
    pub ao: AoData,
    pub specular: SpecularData,
    pub env: EnvData,
    pub emissive: EmissiveData,
}

/// Per-fragment Blinn-Phong lighting.
#[derive(Clone, Debug, Default)]
pub struct PhongParams {
    pub common: CommonData,
    pub light: LightMapData,
    pub ao: AoData,
    pub specular: SpecularData,
    pub env: EnvData,
    pub emissive: EmissiveData,
    pub bump: BumpData,
    pub normal: NormalData,
    pub displacement: DisplacementData,
    pub shininess: ShininessData,
}

/// Metallic-roughness PBR. [`PhysicalParams`] extends this with clearcoat
/// and sheen; both share the `physical` shader.
#[derive(Clone, Debug, Default)]
pub struct StandardParams {
    pub common: CommonData,
    pub light: LightMapData,
    pub ao: AoData,
    pub specular: SpecularData,
    pub env: EnvData,
    pub emissive: EmissiveData,
    pub bump: BumpData,
    pub normal: NormalData,
    pub displacement: DisplacementData,
    pub roughness: RoughnessData,
    pub metalness: MetalnessData,
}

#[derive(Clone, Debug, Default)]
pub struct PhysicalParams {
    pub standard: StandardParams,
    pub physical: PhysicalData,
}

/// Packs fragment depth into the color target, for shadow maps.
#[derive(Clone, Debug)]
pub struct DepthParams {
    pub depth_packing: DepthPacking,
}

impl Default for DepthParams {
    fn default() -> Self {
        DepthParams {
            depth_packing: DepthPacking::Rgba,
        }
    }
}

/// Packs distance to a reference point, for point-light shadow maps.
#[derive(Clone, Debug)]
pub struct DistanceParams {
    pub near: f32,
    pub far: f32,
    pub reference_position: Point3<f32>,
}

impl Default for DistanceParams {
    fn default() -> Self {
        DistanceParams {
            near: 1.0,
            far: 1000.0,
            reference_position: Point3::new(0.0, 0.0, 0.0),
        }
    }
}

/// Sky box / sky sphere drawn behind everything.
#[derive(Clone, Debug)]
pub struct BackgroundParams {
    pub env: EnvData,
    pub opacity: f32,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        BackgroundParams {
            env: EnvData::default(),
            opacity: 1.0,
        }
    }
}

/// Hand-written GLSL. With `raw` set the sources bypass prefix generation
/// and chunk resolution entirely.
#[derive(Clone, Debug, Default)]
pub struct ShaderParams {
    pub vertex: String,
    pub fragment: String,
    pub raw: bool,
}

/// What a material is, with the per-kind payload inline.
#[derive(Clone, Debug)]
pub enum MaterialKind {
    Basic(BasicParams),
    Lambert(LambertParams),
    Phong(PhongParams),
    Standard(StandardParams),
    Physical(PhysicalParams),
    Depth(DepthParams),
    Distance(DistanceParams),
    CubeBackground(BackgroundParams),
    EquirectBackground(BackgroundParams),
    Shader(ShaderParams),
}

impl MaterialKind {
    /// Shader-library id of this kind, `None` for hand-written shaders.
    pub fn shader_id(&self) -> Option<&'static str> {
        match *self {
            MaterialKind::Basic(_) => Some("basic"),
            MaterialKind::Lambert(_) => Some("lambert"),
            MaterialKind::Phong(_) => Some("phong"),
            MaterialKind::Standard(_) | MaterialKind::Physical(_) => Some("physical"),
            MaterialKind::Depth(_) => Some("depth"),
            MaterialKind::Distance(_) => Some("distance"),
            MaterialKind::CubeBackground(_) => Some("cube"),
            MaterialKind::EquirectBackground(_) => Some("equirect"),
            MaterialKind::Shader(_) => None,
        }
    }

    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        match *self {
            MaterialKind::Basic(ref k) => {
                k.common.contribute_parameters(p);
                k.light.contribute_parameters(p);
                k.ao.contribute_parameters(p);
                k.specular.contribute_parameters(p);
                k.env.contribute_parameters(p);
            }
            MaterialKind::Lambert(ref k) => {
                k.common.contribute_parameters(p);
                k.light.contribute_parameters(p);
                k.ao.contribute_parameters(p);
                k.specular.contribute_parameters(p);
                k.env.contribute_parameters(p);
                k.emissive.contribute_parameters(p);
            }
            MaterialKind::Phong(ref k) => {
                k.common.contribute_parameters(p);
                k.light.contribute_parameters(p);
                k.ao.contribute_parameters(p);
                k.specular.contribute_parameters(p);
                k.env.contribute_parameters(p);
                k.emissive.contribute_parameters(p);
                k.bump.contribute_parameters(p);
                k.normal.contribute_parameters(p);
                k.displacement.contribute_parameters(p);
            }
            MaterialKind::Standard(ref k) => k.contribute_parameters(p),
            MaterialKind::Physical(ref k) => {
                k.standard.contribute_parameters(p);
                k.physical.contribute_parameters(p);
            }
            MaterialKind::Depth(ref k) => {
                p.depth_packing = k.depth_packing;
            }
            MaterialKind::Distance(_) => {}
            MaterialKind::CubeBackground(ref k) => {
                k.env.contribute_parameters(p);
            }
            MaterialKind::EquirectBackground(ref k) => {
                k.env.contribute_parameters(p);
                // the equirect shader samples its environment as `map`
                p.map_encoding = p.env_map_encoding;
            }
            MaterialKind::Shader(ref k) => {
                p.vertex = k.vertex.clone();
                p.fragment = k.fragment.clone();
                p.is_raw = k.raw;
            }
        }
    }

    pub(crate) fn contribute(
        &self,
        side: Side,
        uniforms: &mut Vec<Uniform>,
        textures: &mut TextureList,
    ) {
        match *self {
            MaterialKind::Basic(ref k) => {
                k.common.contribute(uniforms, textures);
                k.light.contribute(uniforms, textures);
                k.ao.contribute(uniforms, textures);
                k.specular.contribute(uniforms, textures);
                k.env.contribute(uniforms, textures);
            }
            MaterialKind::Lambert(ref k) => {
                k.common.contribute(uniforms, textures);
                k.light.contribute(uniforms, textures);
                k.ao.contribute(uniforms, textures);
                k.specular.contribute(uniforms, textures);
                k.env.contribute(uniforms, textures);
                k.emissive.contribute(uniforms, textures);
            }
            MaterialKind::Phong(ref k) => {
                k.common.contribute(uniforms, textures);
                k.light.contribute(uniforms, textures);
                k.ao.contribute(uniforms, textures);
                k.specular.contribute(uniforms, textures);
                k.env.contribute(uniforms, textures);
                k.emissive.contribute(uniforms, textures);
                k.bump.contribute(side, uniforms, textures);
                k.normal.contribute(side, uniforms, textures);
                k.displacement.contribute(uniforms, textures);
                k.shininess.contribute(uniforms);
            }
            MaterialKind::Standard(ref k) => k.contribute(side, uniforms, textures),
            MaterialKind::Physical(ref k) => {
                k.standard.contribute(side, uniforms, textures);
                k.physical.contribute(side, uniforms, textures);
            }
            MaterialKind::Depth(_) => {}
            MaterialKind::Distance(ref k) => {
                upsert_uniform(uniforms, "nearDistance", k.near);
                upsert_uniform(uniforms, "farDistance", k.far);
                upsert_uniform(uniforms, "referencePosition", k.reference_position);
            }
            MaterialKind::CubeBackground(ref k) | MaterialKind::EquirectBackground(ref k) => {
                k.env.contribute(uniforms, textures);
                upsert_uniform(uniforms, "opacity", k.opacity);
            }
            MaterialKind::Shader(_) => {}
        }
    }

    /// Environment data of background kinds.
    pub(crate) fn background_env(&self) -> Option<&EnvData> {
        match *self {
            MaterialKind::CubeBackground(ref k) | MaterialKind::EquirectBackground(ref k) => {
                Some(&k.env)
            }
            _ => None,
        }
    }
}

impl StandardParams {
    fn contribute_parameters(&self, p: &mut ProgramParameters) {
        self.common.contribute_parameters(p);
        self.light.contribute_parameters(p);
        self.ao.contribute_parameters(p);
        self.specular.contribute_parameters(p);
        self.env.contribute_parameters(p);
        self.emissive.contribute_parameters(p);
        self.bump.contribute_parameters(p);
        self.normal.contribute_parameters(p);
        self.displacement.contribute_parameters(p);
        self.roughness.contribute_parameters(p);
        self.metalness.contribute_parameters(p);
    }

    fn contribute(&self, side: Side, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        self.common.contribute(uniforms, textures);
        self.light.contribute(uniforms, textures);
        self.ao.contribute(uniforms, textures);
        self.specular.contribute(uniforms, textures);
        self.env.contribute(uniforms, textures);
        self.emissive.contribute(uniforms, textures);
        self.bump.contribute(side, uniforms, textures);
        self.normal.contribute(side, uniforms, textures);
        self.displacement.contribute(uniforms, textures);
        self.roughness.contribute(uniforms, textures);
        self.metalness.contribute(uniforms, textures);
    }
}
