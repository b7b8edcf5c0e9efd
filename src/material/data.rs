//! Reusable material capabilities.
//!
//! Each struct bundles the maps and factors of one shading feature and
//! knows how to contribute them to program parameters (feature defines)
//! and to the published uniform/texture lists. Material kinds compose
//! these instead of inheriting from each other.

use cgmath::Matrix3;

use color::{self, Color};
use program::{EnvMapCombine, EnvMapMode, ProgramParameters, TextureEncoding};
use state::{upsert_uniform, Side, Uniform};
use texture::Texture;

pub(crate) type TextureList = Vec<(String, Texture)>;

/// Diffuse color, opacity, the base color map and UV transforms.
#[derive(Clone, Debug)]
pub struct CommonData {
    pub color: Color,
    pub opacity: f32,
    pub map: Option<Texture>,
    pub map_encoding: Option<TextureEncoding>,
    pub alpha_map: Option<Texture>,
    pub uv_transform: Matrix3<f32>,
    pub uv2_transform: Matrix3<f32>,
}

impl Default for CommonData {
    fn default() -> Self {
        CommonData {
            color: color::WHITE,
            opacity: 1.0,
            map: None,
            map_encoding: None,
            alpha_map: None,
            uv_transform: Matrix3::from_scale(1.0),
            uv2_transform: Matrix3::from_scale(1.0),
        }
    }
}

impl CommonData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.map = self.map.is_some();
        p.map_encoding = self.map_encoding;
        p.alpha_map = self.alpha_map.is_some();
    }

    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        upsert_uniform(uniforms, "opacity", self.opacity);
        upsert_uniform(uniforms, "diffuse", color::to_linear_rgb(self.color));
        if let Some(ref map) = self.map {
            textures.push(("map".to_owned(), map.clone()));
        }
        if let Some(ref map) = self.alpha_map {
            textures.push(("alphaMap".to_owned(), map.clone()));
        }
        upsert_uniform(uniforms, "uvTransform", self.uv_transform);
        upsert_uniform(uniforms, "uv2Transform", self.uv2_transform);
    }
}

/// Baked light map on the second UV channel.
#[derive(Clone, Debug)]
pub struct LightMapData {
    pub light_map: Option<Texture>,
    pub intensity: f32,
    pub encoding: Option<TextureEncoding>,
}

impl Default for LightMapData {
    fn default() -> Self {
        LightMapData {
            light_map: None,
            intensity: 1.0,
            encoding: None,
        }
    }
}

impl LightMapData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.light_map = self.light_map.is_some();
        p.light_map_encoding = self.encoding;
    }

    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        if let Some(ref map) = self.light_map {
            textures.push(("lightMap".to_owned(), map.clone()));
            upsert_uniform(uniforms, "lightMapIntensity", self.intensity);
        }
    }
}

/// Ambient occlusion map on the second UV channel.
#[derive(Clone, Debug)]
pub struct AoData {
    pub ao_map: Option<Texture>,
    pub intensity: f32,
}

impl Default for AoData {
    fn default() -> Self {
        AoData {
            ao_map: None,
            intensity: 1.0,
        }
    }
}

impl AoData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.ao_map = self.ao_map.is_some();
    }

    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        if let Some(ref map) = self.ao_map {
            textures.push(("aoMap".to_owned(), map.clone()));
            upsert_uniform(uniforms, "aoMapIntensity", self.intensity);
        }
    }
}

/// Specular color and map.
#[derive(Clone, Debug)]
pub struct SpecularData {
    pub specular: Color,
    pub specular_map: Option<Texture>,
}

impl Default for SpecularData {
    fn default() -> Self {
        SpecularData {
            specular: 0x111111,
            specular_map: None,
        }
    }
}

impl SpecularData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.specular_map = self.specular_map.is_some();
    }

    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        if let Some(ref map) = self.specular_map {
            textures.push(("specularMap".to_owned(), map.clone()));
        }
        upsert_uniform(uniforms, "specular", color::to_linear_rgb(self.specular));
    }
}

/// Environment reflection/refraction map.
#[derive(Clone, Debug)]
pub struct EnvData {
    pub env_map: Option<Texture>,
    pub mode: EnvMapMode,
    pub encoding: Option<TextureEncoding>,
    pub combine: EnvMapCombine,
    pub intensity: f32,
    pub reflectivity: f32,
    pub refraction_ratio: f32,
}

impl Default for EnvData {
    fn default() -> Self {
        EnvData {
            env_map: None,
            mode: EnvMapMode::CubeReflection,
            encoding: None,
            combine: EnvMapCombine::None,
            intensity: 1.0,
            reflectivity: 1.0,
            refraction_ratio: 0.98,
        }
    }
}

impl EnvData {
    /// Assigns the map, deriving projection mode from its dimensionality.
    /// Baked environments ship RGBD-encoded.
    pub fn set_map(&mut self, texture: Texture) {
        self.mode = if texture.is_cube() {
            EnvMapMode::CubeReflection
        } else {
            EnvMapMode::EquirectReflection
        };
        self.encoding = Some(TextureEncoding::RGBD);
        self.env_map = Some(texture);
    }

    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        if self.env_map.is_some() {
            p.env_map = true;
            p.env_map_mode = self.mode;
            p.env_map_encoding = self.encoding;
        }
        p.combine = self.combine;
    }

    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        if let Some(ref map) = self.env_map {
            textures.push(("envMap".to_owned(), map.clone()));
            // cube lookups are mirrored relative to 2D ones
            let flip = if map.is_cube() { -1.0f32 } else { 1.0 };
            upsert_uniform(uniforms, "flipEnvMap", flip);
        }
        upsert_uniform(uniforms, "envMapIntensity", self.intensity);
        upsert_uniform(uniforms, "reflectivity", self.reflectivity);
        upsert_uniform(uniforms, "refractionRatio", self.refraction_ratio);
        upsert_uniform(uniforms, "maxMipLevel", 0);
    }
}

/// Emissive color and map.
#[derive(Clone, Debug)]
pub struct EmissiveData {
    pub emissive: Color,
    pub intensity: f32,
    pub emissive_map: Option<Texture>,
    pub encoding: Option<TextureEncoding>,
}

impl Default for EmissiveData {
    fn default() -> Self {
        EmissiveData {
            emissive: color::BLACK,
            intensity: 1.0,
            emissive_map: None,
            encoding: None,
        }
    }
}

impl EmissiveData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.emissive_map = self.emissive_map.is_some();
        p.emissive_map_encoding = self.encoding;
    }

    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        upsert_uniform(
            uniforms,
            "emissive",
            color::to_linear_rgb_scaled(self.emissive, self.intensity),
        );
        if let Some(ref map) = self.emissive_map {
            textures.push(("emissiveMap".to_owned(), map.clone()));
        }
    }
}

/// Bump map perturbing the surface normal by height.
#[derive(Clone, Debug)]
pub struct BumpData {
    pub bump_map: Option<Texture>,
    pub scale: f32,
}

impl Default for BumpData {
    fn default() -> Self {
        BumpData {
            bump_map: None,
            scale: 1.0,
        }
    }
}

impl BumpData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.bump_map = self.bump_map.is_some();
    }

    pub(crate) fn contribute(
        &self,
        side: Side,
        uniforms: &mut Vec<Uniform>,
        textures: &mut TextureList,
    ) {
        if let Some(ref map) = self.bump_map {
            textures.push(("bumpMap".to_owned(), map.clone()));
            let scale = if side == Side::Back { -self.scale } else { self.scale };
            upsert_uniform(uniforms, "bumpScale", scale);
        }
    }
}

/// Which space a normal map's vectors live in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalMapType {
    TangentSpace,
    ObjectSpace,
}

/// Normal map.
#[derive(Clone, Debug)]
pub struct NormalData {
    pub normal_map: Option<Texture>,
    pub map_type: NormalMapType,
    pub scale: [f32; 2],
}

impl Default for NormalData {
    fn default() -> Self {
        NormalData {
            normal_map: None,
            map_type: NormalMapType::TangentSpace,
            scale: [1.0, 1.0],
        }
    }
}

impl NormalData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.normal_map = self.normal_map.is_some();
        p.object_space_normal_map = self.map_type == NormalMapType::ObjectSpace;
        p.tangent_space_normal_map = self.map_type == NormalMapType::TangentSpace;
    }

    pub(crate) fn contribute(
        &self,
        side: Side,
        uniforms: &mut Vec<Uniform>,
        textures: &mut TextureList,
    ) {
        if let Some(ref map) = self.normal_map {
            textures.push(("normalMap".to_owned(), map.clone()));
            let scale = if side == Side::Back {
                [-self.scale[0], -self.scale[1]]
            } else {
                self.scale
            };
            upsert_uniform(uniforms, "normalScale", scale);
        }
    }
}

/// Vertex displacement along the normal.
#[derive(Clone, Debug)]
pub struct DisplacementData {
    pub displacement_map: Option<Texture>,
    pub scale: f32,
    pub bias: f32,
}

impl Default for DisplacementData {
    fn default() -> Self {
        DisplacementData {
            displacement_map: None,
            scale: 1.0,
            bias: 0.0,
        }
    }
}

impl DisplacementData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.displacement_map = self.displacement_map.is_some();
    }

    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        if let Some(ref map) = self.displacement_map {
            textures.push(("displacementMap".to_owned(), map.clone()));
            upsert_uniform(uniforms, "displacementScale", self.scale);
            upsert_uniform(uniforms, "displacementBias", self.bias);
        }
    }
}

/// Clearcoat, sheen and transparency of the physical model.
#[derive(Clone, Debug)]
pub struct PhysicalData {
    pub clearcoat: f32,
    pub clearcoat_roughness: f32,
    pub clearcoat_map: Option<Texture>,
    pub clearcoat_roughness_map: Option<Texture>,
    pub clearcoat_normal_map: Option<Texture>,
    pub clearcoat_normal_scale: [f32; 2],
    pub sheen: Option<Color>,
    pub reflectivity: f32,
    pub transparency: f32,
}

impl Default for PhysicalData {
    fn default() -> Self {
        PhysicalData {
            clearcoat: 0.0,
            clearcoat_roughness: 0.0,
            clearcoat_map: None,
            clearcoat_roughness_map: None,
            clearcoat_normal_map: None,
            clearcoat_normal_scale: [1.0, 1.0],
            sheen: None,
            reflectivity: 0.5,
            transparency: 0.0,
        }
    }
}

impl PhysicalData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.clearcoat_map = self.clearcoat_map.is_some();
        p.clearcoat_roughness_map = self.clearcoat_roughness_map.is_some();
        p.clearcoat_normal_map = self.clearcoat_normal_map.is_some();
        p.sheen = self.sheen.is_some();
    }

    pub(crate) fn contribute(
        &self,
        side: Side,
        uniforms: &mut Vec<Uniform>,
        textures: &mut TextureList,
    ) {
        if let Some(ref map) = self.clearcoat_map {
            textures.push(("clearcoatMap".to_owned(), map.clone()));
        }
        if let Some(ref map) = self.clearcoat_roughness_map {
            textures.push(("clearcoatRoughnessMap".to_owned(), map.clone()));
        }
        if let Some(ref map) = self.clearcoat_normal_map {
            textures.push(("clearcoatNormalMap".to_owned(), map.clone()));
            let scale = if side == Side::Back {
                [-self.clearcoat_normal_scale[0], -self.clearcoat_normal_scale[1]]
            } else {
                self.clearcoat_normal_scale
            };
            upsert_uniform(uniforms, "clearcoatNormalScale", scale);
        }
        if let Some(sheen) = self.sheen {
            upsert_uniform(uniforms, "sheen", color::to_linear_rgb(sheen));
        }
        upsert_uniform(uniforms, "clearcoat", self.clearcoat);
        upsert_uniform(uniforms, "clearcoatRoughness", self.clearcoat_roughness);
        upsert_uniform(uniforms, "reflectivity", self.reflectivity);
        upsert_uniform(uniforms, "transparency", self.transparency);
    }
}

/// Microfacet roughness.
#[derive(Clone, Debug)]
pub struct RoughnessData {
    pub roughness: f32,
    pub roughness_map: Option<Texture>,
}

impl Default for RoughnessData {
    fn default() -> Self {
        RoughnessData {
            roughness: 1.0,
            roughness_map: None,
        }
    }
}

impl RoughnessData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.roughness_map = self.roughness_map.is_some();
    }

    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        if let Some(ref map) = self.roughness_map {
            textures.push(("roughnessMap".to_owned(), map.clone()));
        }
        upsert_uniform(uniforms, "roughness", self.roughness);
    }
}

/// Metalness factor.
#[derive(Clone, Debug)]
pub struct MetalnessData {
    pub metalness: f32,
    pub metalness_map: Option<Texture>,
}

impl Default for MetalnessData {
    fn default() -> Self {
        MetalnessData {
            metalness: 0.0,
            metalness_map: None,
        }
    }
}

impl MetalnessData {
    pub(crate) fn contribute_parameters(&self, p: &mut ProgramParameters) {
        p.metalness_map = self.metalness_map.is_some();
    }

    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>, textures: &mut TextureList) {
        if let Some(ref map) = self.metalness_map {
            textures.push(("metalnessMap".to_owned(), map.clone()));
        }
        upsert_uniform(uniforms, "metalness", self.metalness);
    }
}

/// Blinn-Phong shininess exponent.
#[derive(Clone, Debug)]
pub struct ShininessData {
    pub shininess: f32,
}

impl Default for ShininessData {
    fn default() -> Self {
        ShininessData { shininess: 30.0 }
    }
}

impl ShininessData {
    pub(crate) fn contribute(&self, uniforms: &mut Vec<Uniform>) {
        upsert_uniform(uniforms, "shininess", self.shininess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_map_mode_follows_texture_kind() {
        let mut env = EnvData::default();
        env.set_map(Texture::new_cube(64));
        assert_eq!(env.mode, EnvMapMode::CubeReflection);
        assert_eq!(env.encoding, Some(TextureEncoding::RGBD));

        env.set_map(Texture::new_d2([128, 64]));
        assert_eq!(env.mode, EnvMapMode::EquirectReflection);
    }

    #[test]
    fn back_side_flips_normal_scale() {
        let mut normal = NormalData::default();
        normal.normal_map = Some(Texture::new_d2([4, 4]));
        let mut uniforms = Vec::new();
        let mut textures = Vec::new();
        normal.contribute(Side::Back, &mut uniforms, &mut textures);
        assert_eq!(uniforms[0].name, "normalScale");
        assert_eq!(uniforms[0].value, ::state::UniformValue::Vec2([-1.0, -1.0]));
    }

    #[test]
    fn flip_env_map_sign() {
        let mut env = EnvData::default();
        env.set_map(Texture::new_cube(16));
        let mut uniforms = Vec::new();
        let mut textures = Vec::new();
        env.contribute(&mut uniforms, &mut textures);
        assert_eq!(uniforms[0].name, "flipEnvMap");
        assert_eq!(uniforms[0].value, ::state::UniformValue::Float(-1.0));
        assert_eq!(textures[0].0, "envMap");
    }
}
