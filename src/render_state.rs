//! Per-camera render state and the cull-time uniform protocol.
//!
//! A [`RenderState`] hangs off a camera and holds everything scene-wide
//! that shading needs: lights, fog, tone mapping, the shadow switch and
//! the background. `on_cull` runs once per frame for that camera and
//! publishes the light uniform arrays, renders shadow maps through the
//! host, and draws the background.

use std::cell::RefCell;
use std::rc::Rc;

use cgmath::{Matrix3, Matrix4, Point3, SquareMatrix, Transform, Vector3};
use vec_map::VecMap;

use camera::Camera;
use color::{self, Color};
use light::{Light, LightKind, LightType};
use material::{EnvData, Material};
use program::{self, TextureEncoding, ToneMapping};
use shadow::{ShadowMap, ShadowMapType};
use state::{Side, StateSet, UniformValue};
use texture::Texture;
use CullContext;

/// Host GLSL capabilities baked into generated programs.
#[derive(Clone, Debug)]
pub struct Capabilities {
    pub glslversion: String,
    pub precision: String,
    pub supports_vertex_textures: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Capabilities {
            glslversion: "330".to_owned(),
            precision: "highp".to_owned(),
            supports_vertex_textures: true,
        }
    }
}

/// Scene fog.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fog {
    Linear { color: Color, near: f32, far: f32 },
    Exp2 { color: Color, density: f32 },
}

impl Fog {
    pub fn is_exp2(&self) -> bool {
        match *self {
            Fog::Linear { .. } => false,
            Fog::Exp2 { .. } => true,
        }
    }
}

/// Marks a render state as belonging to a shadow camera, carrying what
/// depth-material substitution needs to know about the pass.
#[derive(Clone, Copy, Debug)]
pub struct ShadowPass {
    pub light_type: LightType,
    pub vsm: bool,
    pub camera_near: f32,
    pub camera_far: f32,
    pub reference_position: Point3<f32>,
}

#[derive(Debug)]
struct Background {
    material: Material,
}

/// Upper-left 3x3 of a view matrix, for rotating directions into view
/// space.
fn rotation_of(m: Matrix4<f32>) -> Matrix3<f32> {
    Matrix3::from_cols(m.x.truncate(), m.y.truncate(), m.z.truncate())
}

#[derive(Debug)]
pub struct RenderState {
    capabilities: Capabilities,

    output_encoding: Option<TextureEncoding>,
    gamma_factor: f32,
    tone_mapping: ToneMapping,
    tone_mapping_exposure: f32,
    tone_mapping_white_point: f32,
    logarithmic_depth_buffer: bool,
    physically_correct_lights: bool,

    fog: Option<Fog>,
    shadow_map: Option<ShadowMap>,
    shadow_pass: Option<ShadowPass>,
    background: Option<Background>,

    lights: Vec<Rc<RefCell<Light>>>,
    lights_by_type: VecMap<Vec<Rc<RefCell<Light>>>>,

    ltc_textures: Option<(Texture, Texture)>,
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState {
            capabilities: Capabilities::default(),
            output_encoding: Some(TextureEncoding::Linear),
            gamma_factor: 2.0,
            tone_mapping: ToneMapping::None,
            tone_mapping_exposure: 1.0,
            tone_mapping_white_point: 1.0,
            logarithmic_depth_buffer: false,
            physically_correct_lights: false,
            fog: None,
            shadow_map: None,
            shadow_pass: None,
            background: None,
            lights: Vec::new(),
            lights_by_type: VecMap::new(),
            ltc_textures: None,
        }
    }
}

impl RenderState {
    pub fn new() -> Self {
        RenderState::default()
    }

    /// Attaches a shared render state to the camera it drives.
    pub fn setup_camera(state: &Rc<RefCell<RenderState>>, camera: &mut Camera) {
        camera.attach_render_state(Rc::clone(state));
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    pub fn output_encoding(&self) -> Option<TextureEncoding> {
        self.output_encoding
    }

    pub fn set_output_encoding(&mut self, encoding: Option<TextureEncoding>) {
        self.output_encoding = encoding;
    }

    pub fn gamma_factor(&self) -> f32 {
        self.gamma_factor
    }

    pub fn set_gamma_factor(&mut self, factor: f32) {
        self.gamma_factor = factor;
    }

    pub fn tone_mapping(&self) -> ToneMapping {
        self.tone_mapping
    }

    pub fn set_tone_mapping(&mut self, mapping: ToneMapping) {
        self.tone_mapping = mapping;
    }

    pub fn set_tone_mapping_exposure(&mut self, exposure: f32) {
        self.tone_mapping_exposure = exposure;
    }

    pub fn set_tone_mapping_white_point(&mut self, white_point: f32) {
        self.tone_mapping_white_point = white_point;
    }

    pub fn logarithmic_depth_buffer(&self) -> bool {
        self.logarithmic_depth_buffer
    }

    pub fn set_logarithmic_depth_buffer(&mut self, enabled: bool) {
        self.logarithmic_depth_buffer = enabled;
    }

    pub fn physically_correct_lights(&self) -> bool {
        self.physically_correct_lights
    }

    pub fn set_physically_correct_lights(&mut self, enabled: bool) {
        self.physically_correct_lights = enabled;
    }

    pub fn fog(&self) -> Option<&Fog> {
        self.fog.as_ref()
    }

    pub fn set_fog(&mut self, fog: Option<Fog>) {
        self.fog = fog;
    }

    /// Enables shadow maps of the given type for every casting light.
    pub fn setup_shadow_map(&mut self, map_type: ShadowMapType) {
        self.shadow_map = Some(ShadowMap::new(map_type));
    }

    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow_map.as_ref()
    }

    pub(crate) fn set_shadow_pass(&mut self, pass: ShadowPass) {
        self.shadow_pass = Some(pass);
    }

    pub fn shadow_pass(&self) -> Option<&ShadowPass> {
        self.shadow_pass.as_ref()
    }

    /// Installs a sky box (cube map) or sky sphere (equirect map) drawn
    /// behind everything. Its environment data also feeds materials that
    /// have no environment map of their own.
    pub fn set_background(&mut self, texture: Texture) {
        let mut material = if texture.is_cube() {
            Material::cube_background(texture)
        } else {
            Material::equirect_background(texture)
        };
        material.set_side(Side::Back);
        self.background = Some(Background { material });
    }

    pub(crate) fn background_env(&self) -> Option<&EnvData> {
        self.background
            .as_ref()
            .and_then(|bg| bg.material.kind().background_env())
    }

    /// Registers a light and returns the shared handle to mutate it later.
    pub fn add_light(&mut self, light: Light) -> Rc<RefCell<Light>> {
        let type_index = light.light_type() as usize;
        let light = Rc::new(RefCell::new(light));
        self.lights.push(light.clone());
        self.lights_by_type
            .entry(type_index)
            .or_insert_with(Vec::new)
            .push(light.clone());
        light
    }

    pub fn lights(&self) -> &[Rc<RefCell<Light>>] {
        &self.lights
    }

    fn lights_of_type(&self, light_type: LightType) -> &[Rc<RefCell<Light>>] {
        self.lights_by_type
            .get(light_type as usize)
            .map_or(&[], |list| list.as_slice())
    }

    pub fn light_num_of_type(&self, light_type: LightType) -> u32 {
        self.lights_of_type(light_type).len() as u32
    }

    pub fn shadow_num_of_type(&self, light_type: LightType) -> u32 {
        self.lights_of_type(light_type)
            .iter()
            .filter(|light| light.borrow().cast_shadow())
            .count() as u32
    }

    /// Once-per-frame cull entry point for the camera this state drives.
    pub fn on_cull(
        &mut self,
        camera: &mut Camera,
        ctx: &mut CullContext,
    ) -> Result<(), program::Error> {
        let view = camera.view();
        let view_inverse = camera.view_inverse();
        {
            let ss = camera.state_set_mut();
            ss.set_uniform("osg_ViewMatrix", view);
            ss.set_uniform("osg_ViewMatrixInverse", view_inverse);
        }

        // shadow cameras reuse the same traversal but publish nothing
        if self.shadow_pass.is_some() {
            return Ok(());
        }

        if let Some(shadow_map) = self.shadow_map {
            shadow_map.on_cull(&self.lights, ctx)?;
        }

        if let Some(mut background) = self.background.take() {
            let is_orthographic = camera.projection().is_orthographic();
            let result = background
                .material
                .update(&*self, is_orthographic, ctx.programs);
            self.background = Some(background);
            result?;
        }
        if let Some(ref background) = self.background {
            let eye = camera.eye_position();
            ctx.host
                .render_background(eye.into(), background.material.state_set());
        }

        // ambient accumulates over every ambient light
        let mut ambient = Vector3::new(0.0f32, 0.0, 0.0);
        let mut ambient_intensity = 0.0f32;
        for light in self.lights_of_type(LightType::Ambient) {
            let light = light.borrow();
            if let LightKind::Ambient { color, intensity } = *light.kind() {
                ambient += Vector3::from(color::to_linear_rgb_scaled(color, intensity));
                ambient_intensity += intensity;
            }
        }
        {
            let ss = camera.state_set_mut();
            ss.set_uniform("ambientLightColor", ambient);
            ss.set_uniform("ambientLightIntensity", ambient_intensity);
        }

        // top units are assigned downwards; the very last one is reserved
        // for the instance data texture
        let mut unit = ctx.host.max_texture_units() as i32 - 2;

        self.update_directional_lights(camera.state_set_mut(), view, &mut unit);
        self.update_point_lights(camera.state_set_mut(), view, &mut unit);
        self.update_spot_lights(camera.state_set_mut(), view, &mut unit);
        self.update_hemisphere_lights(camera.state_set_mut(), view);
        self.update_rect_area_lights(camera.state_set_mut(), view, &mut unit);
        self.update_probe_lights(camera.state_set_mut());

        {
            let projection_far = camera.projection().far();
            let ss = camera.state_set_mut();
            match self.fog {
                Some(Fog::Linear { color, near, far }) => {
                    ss.set_uniform("fogColor", color::to_linear_rgb(color));
                    ss.set_uniform("fogNear", near);
                    ss.set_uniform("fogFar", far);
                }
                Some(Fog::Exp2 { color, density }) => {
                    ss.set_uniform("fogColor", color::to_linear_rgb(color));
                    ss.set_uniform("fogDensity", density);
                }
                None => {}
            }

            ss.set_uniform("toneMappingExposure", self.tone_mapping_exposure);
            ss.set_uniform("toneMappingWhitePoint", self.tone_mapping_white_point);

            if self.logarithmic_depth_buffer {
                ss.set_uniform("logDepthBufFC", 2.0 / (projection_far + 1.0).log2());
            }
        }

        Ok(())
    }

    fn update_directional_lights(&self, ss: &mut StateSet, view: Matrix4<f32>, unit: &mut i32) {
        let view3 = rotation_of(view);
        let mut shadow_units = Vec::new();
        let mut shadow_matrices = Vec::new();
        let mut shadow_index = 0usize;

        for (i, light) in self.lights_of_type(LightType::Directional).iter().enumerate() {
            let light = light.borrow();
            if let LightKind::Directional {
                direction,
                color,
                intensity,
                flow,
            } = *light.kind()
            {
                // flowing (sun) lights already carry a view-space direction
                let dir = if flow { direction } else { view3 * -direction };
                ss.set_uniform(&format!("directionalLights[{}].direction", i), dir);
                ss.set_uniform(
                    &format!("directionalLights[{}].color", i),
                    color::to_linear_rgb_scaled(color, intensity),
                );
            }

            if !light.cast_shadow() {
                continue;
            }
            if let Some(shadow) = light.shadow() {
                let size = shadow.map_size();
                ss.set_uniform(
                    &format!("directionalLightShadows[{}].shadowBias", shadow_index),
                    shadow.bias(),
                );
                ss.set_uniform(
                    &format!("directionalLightShadows[{}].shadowRadius", shadow_index),
                    shadow.radius(),
                );
                ss.set_uniform(
                    &format!("directionalLightShadows[{}].shadowMapSize", shadow_index),
                    [size[0] as f32, size[1] as f32],
                );
                if let Some(map) = shadow.map() {
                    ss.set_texture(*unit as usize, map.clone());
                    shadow_units.push(*unit);
                    shadow_matrices.push(shadow.matrix().into());
                    *unit -= 1;
                }
                shadow_index += 1;
            }
        }

        if !shadow_units.is_empty() {
            ss.set_uniform("directionalShadowMap", UniformValue::IntArray(shadow_units));
            ss.set_uniform(
                "directionalShadowMatrix",
                UniformValue::Mat4Array(shadow_matrices),
            );
        }
    }

    fn update_point_lights(&self, ss: &mut StateSet, view: Matrix4<f32>, unit: &mut i32) {
        let mut shadow_units = Vec::new();
        let mut shadow_matrices = Vec::new();
        let mut shadow_index = 0usize;

        for (i, light) in self.lights_of_type(LightType::Point).iter().enumerate() {
            let light = light.borrow();
            let mut light_distance = 0.0;
            if let LightKind::Point {
                position,
                color,
                intensity,
                distance,
                decay,
            } = *light.kind()
            {
                light_distance = distance;
                ss.set_uniform(
                    &format!("pointLights[{}].position", i),
                    view.transform_point(position),
                );
                ss.set_uniform(
                    &format!("pointLights[{}].color", i),
                    color::to_linear_rgb_scaled(color, intensity),
                );
                ss.set_uniform(&format!("pointLights[{}].distance", i), distance);
                ss.set_uniform(&format!("pointLights[{}].decay", i), decay);
            }

            if !light.cast_shadow() {
                continue;
            }
            if let Some(shadow) = light.shadow() {
                let size = shadow.map_size();
                ss.set_uniform(
                    &format!("pointLightShadows[{}].shadowBias", shadow_index),
                    shadow.bias(),
                );
                ss.set_uniform(
                    &format!("pointLightShadows[{}].shadowRadius", shadow_index),
                    shadow.radius(),
                );
                ss.set_uniform(
                    &format!("pointLightShadows[{}].shadowMapSize", shadow_index),
                    [size[0] as f32, size[1] as f32],
                );
                ss.set_uniform(
                    &format!("pointLightShadows[{}].shadowCameraNear", shadow_index),
                    0.1f32,
                );
                ss.set_uniform(
                    &format!("pointLightShadows[{}].shadowCameraFar", shadow_index),
                    light_distance,
                );
                if let Some(map) = shadow.map() {
                    ss.set_texture(*unit as usize, map.clone());
                    shadow_units.push(*unit);
                    shadow_matrices.push(shadow.matrix().into());
                    *unit -= 1;
                }
                shadow_index += 1;
            }
        }

        if !shadow_units.is_empty() {
            ss.set_uniform("pointShadowMap", UniformValue::IntArray(shadow_units));
            ss.set_uniform("pointShadowMatrix", UniformValue::Mat4Array(shadow_matrices));
        }
    }

    fn update_spot_lights(&self, ss: &mut StateSet, view: Matrix4<f32>, unit: &mut i32) {
        let view3 = rotation_of(view);
        let mut shadow_units = Vec::new();
        let mut shadow_matrices = Vec::new();
        let mut shadow_index = 0usize;

        for (i, light) in self.lights_of_type(LightType::Spot).iter().enumerate() {
            let light = light.borrow();
            if let LightKind::Spot {
                position,
                direction,
                color,
                intensity,
                distance,
                angle,
                penumbra,
                decay,
            } = *light.kind()
            {
                ss.set_uniform(
                    &format!("spotLights[{}].position", i),
                    view.transform_point(position),
                );
                ss.set_uniform(
                    &format!("spotLights[{}].direction", i),
                    view3 * -direction,
                );
                ss.set_uniform(
                    &format!("spotLights[{}].color", i),
                    color::to_linear_rgb_scaled(color, intensity),
                );
                ss.set_uniform(&format!("spotLights[{}].distance", i), distance);
                ss.set_uniform(&format!("spotLights[{}].decay", i), decay);
                ss.set_uniform(&format!("spotLights[{}].coneCos", i), angle.cos());
                ss.set_uniform(
                    &format!("spotLights[{}].penumbraCos", i),
                    (angle * (1.0 - penumbra)).cos(),
                );
            }

            if !light.cast_shadow() {
                continue;
            }
            if let Some(shadow) = light.shadow() {
                let size = shadow.map_size();
                ss.set_uniform(
                    &format!("spotLightShadows[{}].shadowBias", shadow_index),
                    shadow.bias(),
                );
                ss.set_uniform(
                    &format!("spotLightShadows[{}].shadowRadius", shadow_index),
                    shadow.radius(),
                );
                ss.set_uniform(
                    &format!("spotLightShadows[{}].shadowMapSize", shadow_index),
                    [size[0] as f32, size[1] as f32],
                );
                if let Some(map) = shadow.map() {
                    ss.set_texture(*unit as usize, map.clone());
                    shadow_units.push(*unit);
                    shadow_matrices.push(shadow.matrix().into());
                    *unit -= 1;
                }
                shadow_index += 1;
            }
        }

        if !shadow_units.is_empty() {
            ss.set_uniform("spotShadowMap", UniformValue::IntArray(shadow_units));
            ss.set_uniform("spotShadowMatrix", UniformValue::Mat4Array(shadow_matrices));
        }
    }

    fn update_hemisphere_lights(&self, ss: &mut StateSet, view: Matrix4<f32>) {
        let view3 = rotation_of(view);
        for (i, light) in self.lights_of_type(LightType::Hemisphere).iter().enumerate() {
            let light = light.borrow();
            if let LightKind::Hemisphere {
                direction,
                sky_color,
                ground_color,
                intensity,
            } = *light.kind()
            {
                ss.set_uniform(
                    &format!("hemisphereLights[{}].direction", i),
                    view3 * -direction,
                );
                ss.set_uniform(
                    &format!("hemisphereLights[{}].skyColor", i),
                    color::to_linear_rgb_scaled(sky_color, intensity),
                );
                ss.set_uniform(
                    &format!("hemisphereLights[{}].groundColor", i),
                    color::to_linear_rgb_scaled(ground_color, intensity),
                );
            }
        }
    }

    fn update_rect_area_lights(&mut self, ss: &mut StateSet, view: Matrix4<f32>, unit: &mut i32) {
        if self.lights_of_type(LightType::RectArea).is_empty() {
            return;
        }

        // linearly transformed cosine lookup tables, shared by all rect
        // area lights; the host fills them with the precomputed BRDF data
        if self.ltc_textures.is_none() {
            self.ltc_textures = Some((Texture::new_d2([64, 64]), Texture::new_d2([64, 64])));
        }
        if let Some((ref ltc_1, ref ltc_2)) = self.ltc_textures {
            ss.set_uniform("ltc_1", *unit);
            ss.set_texture(*unit as usize, ltc_1.clone());
            *unit -= 1;
            ss.set_uniform("ltc_2", *unit);
            ss.set_texture(*unit as usize, ltc_2.clone());
            *unit -= 1;
        }

        for (i, light) in self.lights_of_type(LightType::RectArea).iter().enumerate() {
            let light = light.borrow();
            if let LightKind::RectArea {
                position,
                direction,
                color,
                intensity,
                width,
                height,
            } = *light.kind()
            {
                ss.set_uniform(
                    &format!("rectAreaLights[{}].position", i),
                    view.transform_point(position),
                );
                ss.set_uniform(
                    &format!("rectAreaLights[{}].color", i),
                    color::to_linear_rgb_scaled(color, intensity),
                );

                // orient the half extents by the light frame, then into
                // view space
                let look = Matrix4::look_at_rh(
                    position,
                    position + direction * 10.0,
                    Vector3::unit_z(),
                );
                let frame = view
                    * look
                        .inverse_transform()
                        .unwrap_or_else(Matrix4::identity);
                let frame3 = rotation_of(frame);
                ss.set_uniform(
                    &format!("rectAreaLights[{}].halfWidth", i),
                    frame3 * Vector3::new(width / 2.0, 0.0, 0.0),
                );
                ss.set_uniform(
                    &format!("rectAreaLights[{}].halfHeight", i),
                    frame3 * Vector3::new(0.0, height / 2.0, 0.0),
                );
            }
        }
    }

    fn update_probe_lights(&self, ss: &mut StateSet) {
        let list = self.lights_of_type(LightType::Probe);
        if list.is_empty() {
            return;
        }

        let mut sh = [[0.0f32; 3]; 9];
        for light in list {
            let light = light.borrow();
            if let LightKind::Probe {
                ref coefficients,
                intensity,
            } = *light.kind()
            {
                for (acc, c) in sh.iter_mut().zip(coefficients.iter()) {
                    acc[0] += c.x * intensity;
                    acc[1] += c.y * intensity;
                    acc[2] += c.z * intensity;
                }
            }
        }
        ss.set_uniform("lightProbe", UniformValue::Vec3Array(sh.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera::Projection;
    use mint;
    use program::ProgramGenerator;
    use BoundingSphere;
    use CullHost;

    #[derive(Default)]
    struct TestHost {
        shadow_renders: usize,
        fullscreen_renders: usize,
        background_renders: usize,
    }

    impl CullHost for TestHost {
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
                radius: 10.0,
            }
        }

        fn render_shadow_camera(&mut self, _camera: &::camera::ShadowCamera) {
            self.shadow_renders += 1;
        }

        fn render_fullscreen(&mut self, _camera: &::camera::ShadowCamera, _state: &StateSet) {
            self.fullscreen_renders += 1;
        }

        fn render_background(&mut self, _eye: mint::Point3<f32>, _state: &StateSet) {
            self.background_renders += 1;
        }
    }

    fn cull(state: &mut RenderState, camera: &mut Camera, host: &mut TestHost) {
        let mut programs = ProgramGenerator::new();
        let mut ctx = CullContext {
            programs: &mut programs,
            host,
        };
        state.on_cull(camera, &mut ctx).unwrap();
    }

    #[test]
    fn same_type_lights_fill_indexed_slots_in_order() {
        let mut state = RenderState::new();
        for i in 0..7 {
            state.add_light(Light::point(
                [i as f32, 0.0, 0.0],
                0xFFFFFF,
                1.0,
                10.0,
                1.0,
            ));
        }
        assert_eq!(state.light_num_of_type(LightType::Point), 7);

        let mut camera = Camera::new(Projection::perspective(60.0, 1.0, 0.1, 100.0));
        let mut host = TestHost::default();
        cull(&mut state, &mut camera, &mut host);

        // identity view: positions upload unchanged, slot i = light i
        let ss = camera.state_set();
        for i in 0..7 {
            assert_eq!(
                ss.uniform(&format!("pointLights[{}].position", i)),
                Some(&UniformValue::Vec3([i as f32, 0.0, 0.0])),
                "slot {} out of insertion order",
                i
            );
        }
        assert!(ss.uniform("pointLights[7].position").is_none());
    }

    #[test]
    fn ambient_lights_accumulate() {
        let mut state = RenderState::new();
        state.add_light(Light::ambient(0xFFFFFF, 0.25));
        state.add_light(Light::ambient(0xFFFFFF, 0.5));

        let mut camera = Camera::new(Projection::perspective(60.0, 1.0, 0.1, 100.0));
        let mut host = TestHost::default();
        cull(&mut state, &mut camera, &mut host);

        match camera.state_set().uniform("ambientLightIntensity") {
            Some(&UniformValue::Float(v)) => assert!((v - 0.75).abs() < 1e-6),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn shadow_casting_light_renders_and_binds_from_top_unit() {
        let mut state = RenderState::new();
        state.setup_shadow_map(ShadowMapType::Pcf);
        let light = state.add_light(Light::directional([0.0, -1.0, 0.5], 0xFFFFFF, 1.0));
        light.borrow_mut().set_cast_shadow(true);

        let mut camera = Camera::new(Projection::perspective(60.0, 1.0, 0.1, 100.0));
        let mut host = TestHost::default();
        cull(&mut state, &mut camera, &mut host);

        assert_eq!(host.shadow_renders, 1);
        assert_eq!(host.fullscreen_renders, 0);
        assert_eq!(state.shadow_num_of_type(LightType::Directional), 1);

        let ss = camera.state_set();
        // 16 units, top one reserved: the map binds at 14
        assert_eq!(
            ss.uniform("directionalShadowMap"),
            Some(&UniformValue::IntArray(vec![14]))
        );
        assert!(ss.texture(14).is_some());
        assert!(ss
            .uniform("directionalLightShadows[0].shadowBias")
            .is_some());
    }

    #[test]
    fn vsm_shadow_runs_blur_passes() {
        let mut state = RenderState::new();
        state.setup_shadow_map(ShadowMapType::Vsm);
        let light = state.add_light(Light::spot(
            [0.0, 10.0, 0.0],
            [0.0, -1.0, 0.0],
            0xFFFFFF,
            1.0,
            50.0,
            0.6,
            0.0,
            1.0,
        ));
        light.borrow_mut().set_cast_shadow(true);

        let mut camera = Camera::new(Projection::perspective(60.0, 1.0, 0.1, 100.0));
        let mut host = TestHost::default();
        cull(&mut state, &mut camera, &mut host);

        assert_eq!(host.shadow_renders, 1);
        assert_eq!(host.fullscreen_renders, 2);
    }

    #[test]
    fn shadow_pass_state_publishes_nothing() {
        let mut state = RenderState::new();
        state.add_light(Light::ambient(0xFFFFFF, 1.0));
        state.set_shadow_pass(ShadowPass {
            light_type: LightType::Directional,
            vsm: false,
            camera_near: 0.1,
            camera_far: 100.0,
            reference_position: Point3::new(0.0, 0.0, 0.0),
        });

        let mut camera = Camera::new(Projection::perspective(60.0, 1.0, 0.1, 100.0));
        let mut host = TestHost::default();
        cull(&mut state, &mut camera, &mut host);

        let ss = camera.state_set();
        assert!(ss.uniform("osg_ViewMatrix").is_some());
        assert!(ss.uniform("ambientLightColor").is_none());
    }

    #[test]
    fn background_updates_and_renders() {
        let mut state = RenderState::new();
        state.set_background(Texture::new_cube(256));
        assert!(state.background_env().is_some());

        let mut camera = Camera::new(Projection::perspective(60.0, 1.0, 0.1, 100.0));
        let mut host = TestHost::default();
        cull(&mut state, &mut camera, &mut host);
        assert_eq!(host.background_renders, 1);
    }

    #[test]
    fn log_depth_uniform_uses_far_plane() {
        let mut state = RenderState::new();
        state.set_logarithmic_depth_buffer(true);

        let mut camera = Camera::new(Projection::perspective(60.0, 1.0, 0.1, 100.0));
        let mut host = TestHost::default();
        cull(&mut state, &mut camera, &mut host);

        match camera.state_set().uniform("logDepthBufFC") {
            Some(&UniformValue::Float(v)) => {
                assert!((v - 2.0 / (101.0f32).log2()).abs() < 1e-6)
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
