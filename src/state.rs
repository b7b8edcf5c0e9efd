//! Uniform values and render state sets.
//!
//! A [`StateSet`] is the unit of state this crate publishes: the cull pass
//! fills camera and material state sets with uniforms, texture bindings, a
//! program and fixed-function attributes, and the host engine applies them
//! when drawing. Setting a uniform that already exists overwrites it in
//! place, so repeated culls converge instead of accumulating.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use cgmath::{Matrix3, Matrix4, Point3, Vector2, Vector3, Vector4};

use program::Program;
use texture::Texture;

/// A uniform value, in the layout it is uploaded in.
#[derive(Clone, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    Vec3Array(Vec<[f32; 3]>),
    Mat4Array(Vec<[[f32; 4]; 4]>),
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Int(v as i32)
    }
}
impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}
impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}
impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}
impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}
impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}
impl From<Vector2<f32>> for UniformValue {
    fn from(v: Vector2<f32>) -> Self {
        UniformValue::Vec2(v.into())
    }
}
impl From<Vector3<f32>> for UniformValue {
    fn from(v: Vector3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}
impl From<Vector4<f32>> for UniformValue {
    fn from(v: Vector4<f32>) -> Self {
        UniformValue::Vec4(v.into())
    }
}
impl From<Point3<f32>> for UniformValue {
    fn from(v: Point3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}
impl From<Matrix3<f32>> for UniformValue {
    fn from(v: Matrix3<f32>) -> Self {
        UniformValue::Mat3(v.into())
    }
}
impl From<Matrix4<f32>> for UniformValue {
    fn from(v: Matrix4<f32>) -> Self {
        UniformValue::Mat4(v.into())
    }
}

/// A named uniform, as materials collect them before publishing.
#[derive(Clone, Debug, PartialEq)]
pub struct Uniform {
    pub name: String,
    pub value: UniformValue,
}

/// Insert-or-overwrite into a uniform list by name.
pub(crate) fn upsert_uniform<V>(list: &mut Vec<Uniform>, name: &str, value: V)
where
    V: Into<UniformValue>,
{
    let value = value.into();
    for u in list.iter_mut() {
        if u.name == name {
            u.value = value;
            return;
        }
    }
    list.push(Uniform {
        name: name.to_owned(),
        value,
    });
}

/// Which triangle sides are rasterized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Front,
    Back,
    Double,
}

/// Source/destination blend factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    One,
    Zero,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Alpha blending state, applied only for transparent materials.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendState {
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl Default for BlendState {
    fn default() -> Self {
        BlendState {
            src: BlendFactor::SrcAlpha,
            dst: BlendFactor::OneMinusSrcAlpha,
        }
    }
}

/// Face culling derived from a material's [`Side`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CullState {
    /// Cull back faces, winding order per `front_ccw`.
    pub front_ccw: bool,
}

/// Sorting bin the state set's drawables go into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderBin {
    Opaque,
    Transparent,
}

/// A program together with its vertex attribute bind locations.
#[derive(Clone, Debug)]
pub struct ProgramBinding {
    pub program: Arc<Program>,
    pub attributes: Vec<(String, u32)>,
}

/// A bag of uniforms, texture bindings and fixed-function state.
#[derive(Clone, Debug, Default)]
pub struct StateSet {
    uniforms: HashMap<String, UniformValue>,
    textures: BTreeMap<usize, Texture>,
    program: Option<ProgramBinding>,
    cull: Option<CullState>,
    blend: Option<BlendState>,
    render_bin: Option<RenderBin>,
    depth_write: Option<bool>,
}

impl StateSet {
    pub fn new() -> Self {
        StateSet::default()
    }

    pub fn set_uniform<V>(&mut self, name: &str, value: V)
    where
        V: Into<UniformValue>,
    {
        self.uniforms.insert(name.to_owned(), value.into());
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Binds a texture to a unit. The sampler uniform pointing at the unit
    /// is set separately by the caller.
    pub fn set_texture(&mut self, unit: usize, texture: Texture) {
        self.textures.insert(unit, texture);
    }

    pub fn texture(&self, unit: usize) -> Option<&Texture> {
        self.textures.get(&unit)
    }

    pub fn textures(&self) -> impl Iterator<Item = (usize, &Texture)> {
        self.textures.iter().map(|(k, v)| (*k, v))
    }

    pub fn clear_textures(&mut self) {
        self.textures.clear();
    }

    pub fn set_program(&mut self, program: Arc<Program>, attributes: &[(String, u32)]) {
        self.program = Some(ProgramBinding {
            program,
            attributes: attributes.to_vec(),
        });
    }

    pub fn program(&self) -> Option<&ProgramBinding> {
        self.program.as_ref()
    }

    pub fn set_cull(&mut self, cull: Option<CullState>) {
        self.cull = cull;
    }

    pub fn cull(&self) -> Option<CullState> {
        self.cull
    }

    pub fn set_blend(&mut self, blend: Option<BlendState>) {
        self.blend = blend;
    }

    pub fn blend(&self) -> Option<BlendState> {
        self.blend
    }

    pub fn set_render_bin(&mut self, bin: RenderBin) {
        self.render_bin = Some(bin);
    }

    pub fn render_bin(&self) -> Option<RenderBin> {
        self.render_bin
    }

    pub fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = Some(enabled);
    }

    pub fn depth_write(&self) -> Option<bool> {
        self.depth_write
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_overwrites_by_name() {
        let mut ss = StateSet::new();
        ss.set_uniform("opacity", 1.0f32);
        ss.set_uniform("opacity", 0.5f32);
        assert_eq!(ss.uniform("opacity"), Some(&UniformValue::Float(0.5)));
        assert_eq!(ss.uniforms().count(), 1);
    }

    #[test]
    fn upsert_keeps_insertion_order() {
        let mut list = Vec::new();
        upsert_uniform(&mut list, "diffuse", [1.0, 0.0, 0.0]);
        upsert_uniform(&mut list, "opacity", 1.0f32);
        upsert_uniform(&mut list, "diffuse", [0.0, 1.0, 0.0]);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "diffuse");
        assert_eq!(list[0].value, UniformValue::Vec3([0.0, 1.0, 0.0]));
    }
}
