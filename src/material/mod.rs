//! Materials.
//!
//! A [`Material`] owns the [`StateSet`] it publishes. `update` regenerates
//! the program when the derived cache key changes and rebuilds the state
//! set when any material property was touched since the last apply;
//! otherwise it is a cheap no-op, so culling the same material every frame
//! converges. `cull` is the per-node entry point: it applies the shadow
//! pass gating and depth-material substitution before updating.

pub mod data;
mod kinds;

pub use self::data::{
    AoData, BumpData, CommonData, DisplacementData, EmissiveData, EnvData, LightMapData,
    MetalnessData, NormalData, NormalMapType, PhysicalData, RoughnessData, ShininessData,
    SpecularData,
};
pub use self::kinds::{
    BackgroundParams, BasicParams, DepthParams, DistanceParams, LambertParams, MaterialKind,
    PhongParams, PhysicalParams, ShaderParams, StandardParams,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use cgmath::Point3;
use mint;

use camera::Camera;
use chunk;
use light::LightType;
use program::{self, Program, ProgramGenerator, ProgramParameters};
use render_state::{RenderState, ShadowPass};
use state::{upsert_uniform, BlendState, CullState, RenderBin, Side, StateSet, Uniform, UniformValue};
use texture::Texture;
use CullContext;

/// Outcome of culling a material-bearing node.
#[derive(Debug)]
pub enum CullResult<'a> {
    /// Drop the subtree for this camera.
    Skip,
    /// Traverse without pushing any state.
    Continue,
    /// Push this state set, traverse, pop.
    Push(&'a StateSet),
}

#[derive(Debug)]
pub struct Material {
    kind: MaterialKind,
    defines: BTreeMap<String, String>,

    side: Side,
    transparent: bool,
    blend: BlendState,
    alpha_test: f32,
    dithering: bool,
    premultiplied_alpha: bool,
    fog: bool,
    flat_shading: bool,

    vertex_tangents: bool,
    vertex_colors: bool,

    skinning: bool,
    max_bones: u32,
    morph_targets: bool,
    morph_normals: bool,
    instancing: bool,

    cast_shadow: bool,
    receive_shadow: bool,

    uniforms: Vec<Uniform>,
    textures: Vec<(String, Texture)>,
    start_texture_unit: usize,
    vertex_attributes: Vec<(String, u32)>,

    cur_version: u64,
    applied_version: u64,
    program: Option<Arc<Program>>,
    state_set: StateSet,
    depth_material: Option<Box<Material>>,
}

fn default_vertex_attributes() -> Vec<(String, u32)> {
    vec![
        ("position".to_owned(), 0),
        ("normal".to_owned(), 1),
        ("color".to_owned(), 2),
        ("uv".to_owned(), 3),
        ("uv2".to_owned(), 4),
    ]
}

impl Material {
    pub fn new(kind: MaterialKind) -> Self {
        Material {
            kind,
            defines: BTreeMap::new(),
            side: Side::Front,
            transparent: false,
            blend: BlendState::default(),
            alpha_test: -1.0,
            dithering: false,
            premultiplied_alpha: false,
            fog: false,
            flat_shading: false,
            vertex_tangents: false,
            vertex_colors: false,
            skinning: false,
            max_bones: 0,
            morph_targets: false,
            morph_normals: false,
            instancing: false,
            cast_shadow: false,
            receive_shadow: false,
            uniforms: Vec::new(),
            textures: Vec::new(),
            start_texture_unit: 0,
            vertex_attributes: default_vertex_attributes(),
            cur_version: 1,
            applied_version: 0,
            program: None,
            state_set: StateSet::new(),
            depth_material: None,
        }
    }

    pub fn basic() -> Self {
        Material::new(MaterialKind::Basic(BasicParams::default()))
    }

    pub fn lambert() -> Self {
        Material::new(MaterialKind::Lambert(LambertParams::default()))
    }

    pub fn phong() -> Self {
        Material::new(MaterialKind::Phong(PhongParams::default()))
    }

    pub fn standard() -> Self {
        Material::new(MaterialKind::Standard(StandardParams::default()))
    }

    pub fn physical() -> Self {
        let mut material = Material::new(MaterialKind::Physical(PhysicalParams::default()));
        material.set_define("PHYSICAL", "");
        material
    }

    pub fn depth() -> Self {
        Material::new(MaterialKind::Depth(DepthParams::default()))
    }

    pub fn distance<P>(near: f32, far: f32, reference_position: P) -> Self
    where
        P: Into<mint::Point3<f32>>,
    {
        Material::new(MaterialKind::Distance(DistanceParams {
            near,
            far,
            reference_position: Point3::from(reference_position.into()),
        }))
    }

    /// Sky box over a cube map. The background never writes depth.
    pub fn cube_background(env_map: Texture) -> Self {
        let mut params = BackgroundParams::default();
        params.env.set_map(env_map);
        let mut material = Material::new(MaterialKind::CubeBackground(params));
        material.state_set.set_depth_write(false);
        material
    }

    /// Sky sphere over an equirectangular map. The background never writes
    /// depth.
    pub fn equirect_background(env_map: Texture) -> Self {
        let mut params = BackgroundParams::default();
        params.env.set_map(env_map);
        let mut material = Material::new(MaterialKind::EquirectBackground(params));
        material.state_set.set_depth_write(false);
        material
    }

    pub fn shader<V, F>(vertex: V, fragment: F) -> Self
    where
        V: Into<String>,
        F: Into<String>,
    {
        Material::new(MaterialKind::Shader(ShaderParams {
            vertex: vertex.into(),
            fragment: fragment.into(),
            raw: false,
        }))
    }

    /// Marks the material dirty so the next update rebuilds its state set.
    pub fn touch(&mut self) {
        self.cur_version += 1;
    }

    pub fn kind(&self) -> &MaterialKind {
        &self.kind
    }

    /// Mutable access to the per-kind payload; marks the material dirty.
    pub fn kind_mut(&mut self) -> &mut MaterialKind {
        self.touch();
        &mut self.kind
    }

    pub fn set_define(&mut self, name: &str, value: &str) {
        self.defines.insert(name.to_owned(), value.to_owned());
        self.touch();
    }

    pub fn remove_define(&mut self, name: &str) {
        if self.defines.remove(name).is_some() {
            self.touch();
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn set_side(&mut self, side: Side) {
        self.side = side;
        self.touch();
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
        self.touch();
    }

    pub fn set_blend(&mut self, blend: BlendState) {
        self.blend = blend;
        self.touch();
    }

    pub fn set_alpha_test(&mut self, cutoff: f32) {
        self.alpha_test = cutoff;
        self.touch();
    }

    pub fn set_dithering(&mut self, dithering: bool) {
        self.dithering = dithering;
        self.touch();
    }

    pub fn set_premultiplied_alpha(&mut self, premultiplied: bool) {
        self.premultiplied_alpha = premultiplied;
        self.touch();
    }

    pub fn set_fog(&mut self, fog: bool) {
        self.fog = fog;
        self.touch();
    }

    pub fn set_flat_shading(&mut self, flat: bool) {
        self.flat_shading = flat;
        self.touch();
    }

    pub fn set_vertex_tangents(&mut self, enabled: bool) {
        self.vertex_tangents = enabled;
        self.touch();
    }

    pub fn set_vertex_colors(&mut self, enabled: bool) {
        self.vertex_colors = enabled;
        self.touch();
    }

    pub fn set_skinning(&mut self, enabled: bool) {
        self.skinning = enabled;
        self.touch();
    }

    pub fn set_max_bones(&mut self, count: u32) {
        self.max_bones = count;
        self.touch();
    }

    pub fn set_morph_targets(&mut self, enabled: bool) {
        self.morph_targets = enabled;
        self.touch();
    }

    pub fn set_morph_normals(&mut self, enabled: bool) {
        self.morph_normals = enabled;
        self.touch();
    }

    pub fn set_instancing(&mut self, enabled: bool) {
        self.instancing = enabled;
        self.touch();
    }

    pub fn cast_shadow(&self) -> bool {
        self.cast_shadow
    }

    pub fn set_cast_shadow(&mut self, cast: bool) {
        self.cast_shadow = cast;
        self.touch();
    }

    pub fn receive_shadow(&self) -> bool {
        self.receive_shadow
    }

    pub fn set_receive_shadow(&mut self, receive: bool) {
        self.receive_shadow = receive;
        self.touch();
    }

    /// Extra uniform published alongside the generated ones.
    pub fn set_uniform<V>(&mut self, name: &str, value: V)
    where
        V: Into<UniformValue>,
    {
        upsert_uniform(&mut self.uniforms, name, value);
        self.touch();
    }

    pub fn remove_uniform(&mut self, name: &str) {
        self.uniforms.retain(|u| u.name != name);
        self.touch();
    }

    /// Extra texture bound by sampler name, replacing an existing binding
    /// of the same name.
    pub fn set_texture(&mut self, name: &str, texture: Texture) {
        for entry in &mut self.textures {
            if entry.0 == name {
                entry.1 = texture;
                self.touch();
                return;
            }
        }
        self.textures.push((name.to_owned(), texture));
        self.touch();
    }

    pub fn remove_texture(&mut self, name: &str) {
        self.textures.retain(|entry| entry.0 != name);
        self.touch();
    }

    /// First texture unit assigned to this material's maps.
    pub fn set_start_texture_unit(&mut self, unit: usize) {
        self.start_texture_unit = unit;
        self.touch();
    }

    pub fn state_set(&self) -> &StateSet {
        &self.state_set
    }

    pub fn program(&self) -> Option<&Arc<Program>> {
        self.program.as_ref()
    }

    /// Fills the material's share of the program parameters.
    pub(crate) fn get_program_parameters(
        &self,
        p: &mut ProgramParameters,
    ) -> Result<(), program::Error> {
        if let Some(id) = self.kind.shader_id() {
            let object = match chunk::shader(id) {
                Some(object) => object,
                None => return Err(program::Error::UnknownShader(id.to_owned())),
            };
            p.shader_id = id.to_owned();
            p.vertex = object.vertex.to_owned();
            p.fragment = object.fragment.to_owned();
        }

        p.defines = self.defines.clone();

        p.dithering = self.dithering;
        p.premultiplied_alpha = self.premultiplied_alpha;
        p.alpha_test = self.alpha_test;

        p.vertex_tangents = self.vertex_tangents;
        p.vertex_colors = self.vertex_colors;

        p.flat_shading = self.flat_shading;
        p.double_sided = self.side == Side::Double;
        p.flip_sided = self.side == Side::Back;

        p.max_bones = self.max_bones;
        p.skinning = self.skinning;
        p.morph_targets = self.morph_targets;
        p.morph_normals = self.morph_normals;

        p.instancing = self.instancing;

        p.use_fog = self.fog;

        self.kind.contribute_parameters(p);
        Ok(())
    }

    /// Regenerates the program and republishes the state set as needed.
    pub fn update(
        &mut self,
        state: &RenderState,
        is_orthographic: bool,
        programs: &mut ProgramGenerator,
    ) -> Result<(), program::Error> {
        let mut state_change = false;

        let parameters = ProgramGenerator::parameters(self, is_orthographic, state)?;
        let key = ProgramGenerator::key(&parameters);
        let program_change = match self.program {
            Some(ref program) => program.key() != key,
            None => true,
        };
        if program_change {
            let program = programs.get_or_create(&key, &parameters);
            self.state_set
                .set_program(program.clone(), &self.vertex_attributes);
            self.program = Some(program);
            state_change = true;
        }

        if self.applied_version != self.cur_version {
            state_change = true;
        }
        if !state_change {
            return Ok(());
        }

        if self.side == Side::Double {
            self.state_set.set_cull(None);
        } else {
            self.state_set.set_cull(Some(CullState {
                front_ccw: self.side != Side::Back,
            }));
        }

        if self.transparent {
            self.state_set.set_blend(Some(self.blend));
            self.state_set.set_render_bin(RenderBin::Transparent);
        } else {
            self.state_set.set_blend(None);
            self.state_set.set_render_bin(RenderBin::Opaque);
        }

        let mut uniforms = Vec::new();
        let mut textures = Vec::new();

        if let Some(env) = state.background_env() {
            env.contribute(&mut uniforms, &mut textures);
        }
        upsert_uniform(&mut uniforms, "receiveShadow", self.receive_shadow);
        self.kind.contribute(self.side, &mut uniforms, &mut textures);

        textures.extend(self.textures.iter().cloned());
        uniforms.extend(self.uniforms.iter().cloned());

        self.state_set.clear_textures();
        let mut unit = self.start_texture_unit;
        for (name, texture) in textures {
            self.state_set.set_uniform(&name, unit as i32);
            self.state_set.set_texture(unit, texture);
            unit += 1;
        }
        for uniform in uniforms {
            self.state_set.set_uniform(&uniform.name, uniform.value);
        }

        self.applied_version = self.cur_version;
        Ok(())
    }

    fn ensure_depth_material(&mut self, pass: &ShadowPass) {
        if self.depth_material.is_some() {
            return;
        }
        let mut depth = if pass.light_type == LightType::Point {
            Material::distance(0.1, pass.camera_far, pass.reference_position)
        } else {
            Material::depth()
        };
        depth.set_max_bones(self.max_bones);
        depth.set_skinning(self.skinning);
        depth.set_morph_targets(self.morph_targets);
        depth.set_morph_normals(self.morph_normals);
        self.depth_material = Some(Box::new(depth));
    }

    /// Per-node cull entry point. Under a shadow pass, casters are drawn
    /// with a substituted depth (or distance) material and everything else
    /// is skipped; variance maps additionally keep receivers so blurred
    /// moments cover them.
    pub fn cull<'a>(
        &'a mut self,
        camera: &Camera,
        ctx: &mut CullContext,
    ) -> Result<CullResult<'a>, program::Error> {
        let state = match camera.render_state() {
            Some(state) => state,
            None => return Ok(CullResult::Continue),
        };
        let state = state.borrow();
        let is_orthographic = camera.projection().is_orthographic();

        if let Some(pass) = state.shadow_pass().cloned() {
            let keep = if pass.vsm {
                self.cast_shadow || self.receive_shadow
            } else {
                self.cast_shadow
            };
            if !keep {
                return Ok(CullResult::Skip);
            }
            self.ensure_depth_material(&pass);
            if let Some(ref mut depth) = self.depth_material {
                depth.update(&state, is_orthographic, ctx.programs)?;
                return Ok(CullResult::Push(depth.state_set()));
            }
            return Ok(CullResult::Skip);
        }

        self.update(&state, is_orthographic, ctx.programs)?;
        Ok(CullResult::Push(self.state_set()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use cgmath::Point3;

    use camera::Projection;
    use light::LightType;
    use program::DepthPacking;
    use BoundingSphere;
    use CullHost;

    fn pass(light_type: LightType, vsm: bool) -> ShadowPass {
        ShadowPass {
            light_type,
            vsm,
            camera_near: 0.1,
            camera_far: 50.0,
            reference_position: Point3::new(1.0, 2.0, 3.0),
        }
    }

    struct NullHost;

    impl CullHost for NullHost {
        fn max_texture_units(&self) -> usize {
            16
        }

        fn scene_bound(&self) -> BoundingSphere {
            BoundingSphere {
                center: mint::Point3 {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                },
                radius: 1.0,
            }
        }

        fn render_shadow_camera(&mut self, _camera: &::camera::ShadowCamera) {}

        fn render_fullscreen(&mut self, _camera: &::camera::ShadowCamera, _state: &StateSet) {}

        fn render_background(&mut self, _eye: mint::Point3<f32>, _state: &StateSet) {}
    }

    fn shadow_camera(light_type: LightType, vsm: bool) -> Camera {
        let mut state = RenderState::new();
        state.set_shadow_pass(pass(light_type, vsm));
        let state = Rc::new(RefCell::new(state));
        let mut camera = Camera::new(Projection::perspective(90.0, 1.0, 0.1, 100.0));
        RenderState::setup_camera(&state, &mut camera);
        camera
    }

    #[test]
    fn update_is_idempotent_until_touched() {
        let mut programs = ProgramGenerator::new();
        let state = RenderState::new();
        let mut material = Material::basic();

        material.update(&state, false, &mut programs).unwrap();
        assert_eq!(programs.len(), 1);
        let first = material.program().unwrap().clone();

        material.update(&state, false, &mut programs).unwrap();
        assert_eq!(programs.len(), 1);
        assert!(Arc::ptr_eq(&first, material.program().unwrap()));
    }

    #[test]
    fn define_change_regenerates_program() {
        let mut programs = ProgramGenerator::new();
        let state = RenderState::new();
        let mut material = Material::basic();

        material.update(&state, false, &mut programs).unwrap();
        material.set_define("USE_FOO", "1");
        material.update(&state, false, &mut programs).unwrap();
        assert_eq!(programs.len(), 2);
    }

    #[test]
    fn textures_take_sequential_units() {
        let mut programs = ProgramGenerator::new();
        let state = RenderState::new();
        let mut material = Material::phong();
        if let MaterialKind::Phong(ref mut k) = *material.kind_mut() {
            k.common.map = Some(Texture::new_d2([4, 4]));
            k.normal.normal_map = Some(Texture::new_d2([4, 4]));
        }
        material.set_start_texture_unit(2);
        material.update(&state, false, &mut programs).unwrap();

        let ss = material.state_set();
        assert!(ss.texture(2).is_some());
        assert!(ss.texture(3).is_some());
        assert_eq!(ss.uniform("map"), Some(&UniformValue::Int(2)));
        assert_eq!(ss.uniform("normalMap"), Some(&UniformValue::Int(3)));
        assert_eq!(ss.uniform("receiveShadow"), Some(&UniformValue::Int(0)));
    }

    #[test]
    fn transparent_material_publishes_blend_state() {
        let mut programs = ProgramGenerator::new();
        let state = RenderState::new();
        let mut material = Material::basic();
        material.set_transparent(true);
        material.update(&state, false, &mut programs).unwrap();
        assert!(material.state_set().blend().is_some());
        assert_eq!(
            material.state_set().render_bin(),
            Some(RenderBin::Transparent)
        );
    }

    #[test]
    fn shadow_pass_cull_gates_on_caster_flags() {
        let mut programs = ProgramGenerator::new();
        let mut host = NullHost;
        let mut ctx = CullContext {
            programs: &mut programs,
            host: &mut host,
        };

        // non-caster: dropped from the shadow pass entirely
        let camera = shadow_camera(LightType::Directional, false);
        let mut material = Material::basic();
        match material.cull(&camera, &mut ctx).unwrap() {
            CullResult::Skip => {}
            other => panic!("expected skip, got {:?}", other),
        }

        // caster: drawn with the substituted depth state set
        material.set_cast_shadow(true);
        match material.cull(&camera, &mut ctx).unwrap() {
            CullResult::Push(ss) => assert!(ss.program().is_some()),
            other => panic!("expected push, got {:?}", other),
        }

        // receive-only stays dropped under a basic pass
        let mut receiver = Material::basic();
        receiver.set_receive_shadow(true);
        match receiver.cull(&camera, &mut ctx).unwrap() {
            CullResult::Skip => {}
            other => panic!("expected skip, got {:?}", other),
        }

        // but survives a vsm pass, so the blurred moments cover it
        let vsm_camera = shadow_camera(LightType::Directional, true);
        match receiver.cull(&vsm_camera, &mut ctx).unwrap() {
            CullResult::Push(_) => {}
            other => panic!("expected push, got {:?}", other),
        }
    }

    #[test]
    fn background_materials_disable_depth_write() {
        let mut programs = ProgramGenerator::new();
        let state = RenderState::new();

        let mut material = Material::cube_background(Texture::new_cube(4));
        assert_eq!(material.state_set().depth_write(), Some(false));
        // a rebuild does not resurrect depth writes
        material.update(&state, false, &mut programs).unwrap();
        assert_eq!(material.state_set().depth_write(), Some(false));

        let material = Material::equirect_background(Texture::new_d2([8, 4]));
        assert_eq!(material.state_set().depth_write(), Some(false));
    }

    #[test]
    fn depth_material_kind_follows_light_type() {
        let mut material = Material::basic();
        material.ensure_depth_material(&pass(LightType::Point, false));
        match material.depth_material {
            Some(ref depth) => match *depth.kind() {
                MaterialKind::Distance(ref k) => {
                    assert_eq!(k.near, 0.1);
                    assert_eq!(k.far, 50.0);
                    assert_eq!(k.reference_position, Point3::new(1.0, 2.0, 3.0));
                }
                ref other => panic!("expected distance material, got {:?}", other),
            },
            None => panic!("no depth material"),
        }

        let mut material = Material::basic();
        material.set_skinning(true);
        material.ensure_depth_material(&pass(LightType::Directional, false));
        match material.depth_material {
            Some(ref depth) => match *depth.kind() {
                MaterialKind::Depth(ref k) => {
                    assert_eq!(k.depth_packing, DepthPacking::Rgba);
                    assert!(depth.skinning);
                }
                ref other => panic!("expected depth material, got {:?}", other),
            },
            None => panic!("no depth material"),
        }
    }

    #[test]
    fn physical_material_defines_physical() {
        let material = Material::physical();
        let mut p = ProgramParameters::default();
        material.get_program_parameters(&mut p).unwrap();
        assert_eq!(p.shader_id, "physical");
        assert_eq!(p.defines.get("PHYSICAL").map(String::as_str), Some(""));
    }
}
