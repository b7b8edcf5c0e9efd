//! Shadow mapping.
//!
//! [`ShadowMap`] is the per-render-state switch; each shadow-casting light
//! owns a [`LightShadow`] that lazily builds its render targets and shadow
//! cameras on the first cull, then asks the host to re-render the scene
//! into them every frame. Variance shadow maps additionally run a two-pass
//! separable blur over the depth moments with a full-screen triangle.

use std::cell::RefCell;
use std::rc::Rc;

use arrayvec::ArrayVec;
use cgmath::{self, EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, Vector3};

use camera::ShadowCamera;
use light::{Light, LightType, ShadowGeometry};
use material::Material;
use program;
use render_state::{RenderState, ShadowPass};
use texture::{Filter, Texture};
use CullContext;

/// Shadow filtering algorithm, baked into the generated programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowMapType {
    Basic = 0,
    Pcf = 1,
    PcfSoft = 2,
    Vsm = 3,
}

/// Render-state-wide shadow switch.
#[derive(Clone, Copy, Debug)]
pub struct ShadowMap {
    enabled: bool,
    map_type: ShadowMapType,
}

impl Default for ShadowMap {
    fn default() -> Self {
        ShadowMap {
            enabled: false,
            map_type: ShadowMapType::Pcf,
        }
    }
}

impl ShadowMap {
    pub fn new(map_type: ShadowMapType) -> Self {
        ShadowMap {
            enabled: true,
            map_type,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn map_type(&self) -> ShadowMapType {
        self.map_type
    }

    /// Renders the shadow map of every casting light. Lights are cloned out
    /// of the state first so the host can re-traverse the scene while each
    /// one is borrowed.
    pub(crate) fn on_cull(
        &self,
        lights: &[Rc<RefCell<Light>>],
        ctx: &mut CullContext,
    ) -> Result<(), program::Error> {
        if !self.enabled {
            return Ok(());
        }
        let lights: Vec<_> = lights.to_vec();
        for light in &lights {
            if !light.borrow().cast_shadow() {
                continue;
            }
            let geometry = light.borrow().shadow_geometry();
            let mut light = light.borrow_mut();
            if let Some(shadow) = light.shadow_mut() {
                shadow.render(self.map_type, &geometry, ctx)?;
            }
        }
        Ok(())
    }
}

/// Near plane of a directional shadow volume, clamped away from zero so
/// depth precision survives scenes the light sits right on top of.
pub(crate) fn directional_clip_range(center_distance: f32, radius: f32) -> (f32, f32) {
    let zfar = center_distance + radius;
    let mut znear = center_distance - radius;
    let znear_ratio = 0.001;
    if znear < zfar * znear_ratio {
        znear = zfar * znear_ratio;
    }
    (znear, zfar)
}

/// Picks a vector orthogonal to `direction` to serve as the shadow
/// camera's up axis. Falls back from Y to Z when the light points almost
/// straight up or down.
fn orthogonal_up(direction: Vector3<f32>, threshold: f32) -> Vector3<f32> {
    let up = direction.cross(Vector3::unit_y());
    if up.magnitude() < threshold {
        direction.cross(Vector3::unit_z()).normalize()
    } else {
        up.normalize()
    }
}

/// Maps clip space `[-1, 1]` to texture space `[0, 1]`.
fn bias_matrix() -> Matrix4<f32> {
    Matrix4::from_scale(0.5) * Matrix4::from_translation(Vector3::new(1.0, 1.0, 1.0))
}

const CUBE_VIEWPORTS: [[u32; 2]; 6] = [[2, 1], [0, 1], [3, 1], [1, 1], [3, 0], [1, 0]];

const CUBE_DIRECTIONS: [[f32; 3]; 6] = [
    [1.0, 0.0, 0.0],
    [-1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, -1.0],
    [0.0, 1.0, 0.0],
    [0.0, -1.0, 0.0],
];

const CUBE_UPS: [[f32; 3]; 6] = [
    [0.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [0.0, 0.0, -1.0],
];

#[derive(Debug)]
struct BlurPass {
    camera: ShadowCamera,
    material: Material,
}

/// Per-light shadow state: map(s), cameras and the texture-space matrix
/// sampled by receivers.
#[derive(Debug)]
pub struct LightShadow {
    map_size: [u32; 2],
    frame_extents: [u32; 2],
    bias: f32,
    radius: f32,
    map: Option<Texture>,
    map_vsm: Option<Texture>,
    cameras: ArrayVec<ShadowCamera, 6>,
    blur_passes: Vec<BlurPass>,
    matrix: Matrix4<f32>,
    inited: bool,
}

impl LightShadow {
    fn with_defaults(map_size: [u32; 2], frame_extents: [u32; 2], bias: f32) -> Self {
        LightShadow {
            map_size,
            frame_extents,
            bias,
            radius: 1.0,
            map: None,
            map_vsm: None,
            cameras: ArrayVec::new(),
            blur_passes: Vec::new(),
            matrix: Matrix4::from_scale(1.0),
            inited: false,
        }
    }

    pub fn directional() -> Self {
        LightShadow::with_defaults([2048, 2048], [1, 1], -0.01)
    }

    pub fn spot() -> Self {
        LightShadow::with_defaults([2048, 2048], [1, 1], 0.0)
    }

    /// Point lights render six cube faces into a 4x2 atlas of the base
    /// map size.
    pub fn point() -> Self {
        LightShadow::with_defaults([512, 512], [4, 2], -0.005)
    }

    pub fn map_size(&self) -> [u32; 2] {
        self.map_size
    }

    /// Only effective before the first cull; the targets are built once.
    pub fn set_map_size(&mut self, size: [u32; 2]) {
        self.map_size = size;
    }

    pub fn bias(&self) -> f32 {
        self.bias
    }

    pub fn set_bias(&mut self, bias: f32) {
        self.bias = bias;
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
    }

    pub fn map(&self) -> Option<&Texture> {
        self.map.as_ref()
    }

    /// Texture-space shadow matrix (for point lights, the translation to
    /// light space; cube-face projection happens in the shader).
    pub fn matrix(&self) -> Matrix4<f32> {
        self.matrix
    }

    fn uses_vsm(map_type: ShadowMapType, light_type: LightType) -> bool {
        map_type == ShadowMapType::Vsm && light_type != LightType::Point
    }

    pub(crate) fn render(
        &mut self,
        map_type: ShadowMapType,
        geometry: &ShadowGeometry,
        ctx: &mut CullContext,
    ) -> Result<(), program::Error> {
        if !self.inited {
            self.setup_texture(map_type, geometry);
            self.setup_cameras(map_type, geometry, ctx);
            self.setup_vsm(map_type, geometry);
            self.inited = true;
        }

        for camera in &self.cameras {
            ctx.host.render_shadow_camera(camera);
        }

        for pass in &mut self.blur_passes {
            {
                let state = pass.camera.render_state.clone();
                let state = state.borrow();
                pass.material.update(&state, true, ctx.programs)?;
            }
            ctx.host.render_fullscreen(&pass.camera, pass.material.state_set());
        }

        Ok(())
    }

    fn target_size(&self) -> [u32; 2] {
        [
            self.map_size[0] * self.frame_extents[0],
            self.map_size[1] * self.frame_extents[1],
        ]
    }

    fn setup_texture(&mut self, map_type: ShadowMapType, geometry: &ShadowGeometry) {
        let vsm = LightShadow::uses_vsm(map_type, geometry.light_type);
        let filter = if vsm { Filter::Linear } else { Filter::Nearest };
        self.map = Some(Texture::render_target(self.target_size(), filter));
        if vsm {
            self.map_vsm = Some(Texture::render_target(self.target_size(), filter));
        }
    }

    fn shadow_render_state(
        &self,
        map_type: ShadowMapType,
        geometry: &ShadowGeometry,
        near: f32,
        far: f32,
    ) -> Rc<RefCell<RenderState>> {
        let mut state = RenderState::new();
        state.set_shadow_pass(ShadowPass {
            light_type: geometry.light_type,
            vsm: LightShadow::uses_vsm(map_type, geometry.light_type),
            camera_near: near,
            camera_far: far,
            reference_position: geometry.position,
        });
        Rc::new(RefCell::new(state))
    }

    fn setup_cameras(
        &mut self,
        map_type: ShadowMapType,
        geometry: &ShadowGeometry,
        ctx: &mut CullContext,
    ) {
        let map = match self.map {
            Some(ref map) => map.clone(),
            None => return,
        };
        match geometry.light_type {
            LightType::Directional => {
                let bound = ctx.host.scene_bound();
                let center = Point3::from(bound.center);
                let direction = geometry.direction;
                let position = center - direction * bound.radius * 2.0;

                let center_distance = (position - center).magnitude();
                let (znear, zfar) = directional_clip_range(center_distance, bound.radius);
                let extent = bound.radius;

                let up = orthogonal_up(direction, direction.magnitude() * 0.5);
                let view = Matrix4::look_at_rh(position, center, up);
                let projection = cgmath::ortho(-extent, extent, -extent, extent, znear, zfar);

                self.matrix = bias_matrix() * projection * view;
                self.cameras.push(ShadowCamera {
                    view,
                    projection,
                    viewport: [0, 0, self.map_size[0], self.map_size[1]],
                    clear_color: [1.0; 4],
                    target: map,
                    render_state: self.shadow_render_state(map_type, geometry, znear, zfar),
                });
            }
            LightType::Spot => {
                let fov = Rad(geometry.angle * 2.0);
                let aspect = self.map_size[0] as f32 / self.map_size[1] as f32;
                let projection = cgmath::perspective(fov, aspect, 0.1, geometry.distance);

                let direction = geometry.direction;
                let up = orthogonal_up(direction, 0.5);
                let view = Matrix4::look_at_rh(
                    geometry.position,
                    geometry.position + direction * 10.0,
                    up,
                );

                self.matrix = bias_matrix() * projection * view;
                self.cameras.push(ShadowCamera {
                    view,
                    projection,
                    viewport: [0, 0, self.map_size[0], self.map_size[1]],
                    clear_color: [1.0; 4],
                    target: map,
                    render_state: self.shadow_render_state(
                        map_type,
                        geometry,
                        0.1,
                        geometry.distance,
                    ),
                });
            }
            LightType::Point => {
                let aspect = self.map_size[0] as f32 / self.map_size[1] as f32;
                let projection =
                    cgmath::perspective(Rad(::std::f32::consts::FRAC_PI_2), aspect, 0.1, geometry.distance);

                for face in 0..6 {
                    let direction = Vector3::from(CUBE_DIRECTIONS[face]);
                    let up = Vector3::from(CUBE_UPS[face]);
                    let view = Matrix4::look_at_rh(
                        geometry.position,
                        geometry.position + direction * 10.0,
                        up,
                    );
                    let viewport = [
                        self.map_size[0] * CUBE_VIEWPORTS[face][0],
                        self.map_size[1] * CUBE_VIEWPORTS[face][1],
                        self.map_size[0],
                        self.map_size[1],
                    ];
                    self.cameras.push(ShadowCamera {
                        view,
                        projection,
                        viewport,
                        clear_color: [1.0; 4],
                        target: map.clone(),
                        render_state: self.shadow_render_state(
                            map_type,
                            geometry,
                            0.1,
                            geometry.distance,
                        ),
                    });
                }

                self.matrix = Matrix4::from_translation(Point3::origin() - geometry.position);
            }
            _ => {
                warn!("light type {:?} cannot cast shadows", geometry.light_type);
            }
        }
    }

    fn blur_material(&self, source: &Texture, horizontal: bool) -> Material {
        let mut material = Material::shader(
            include_str!("../data/shaders/vsm_vert.glsl"),
            include_str!("../data/shaders/vsm_frag.glsl"),
        );
        material.set_define("SAMPLE_RATE", "0.25");
        material.set_define("HALF_SAMPLE_RATE", "0.125");
        if horizontal {
            material.set_define("HORIZONAL_PASS", "1");
        }
        material.set_texture("shadow_pass", source.clone());
        material.set_uniform("radius", self.radius);
        material.set_uniform(
            "resolution",
            [self.map_size[0] as f32, self.map_size[1] as f32],
        );
        material
    }

    fn setup_vsm(&mut self, map_type: ShadowMapType, geometry: &ShadowGeometry) {
        if !LightShadow::uses_vsm(map_type, geometry.light_type) {
            return;
        }
        let (map, map_vsm) = match (self.map.clone(), self.map_vsm.clone()) {
            (Some(map), Some(map_vsm)) => (map, map_vsm),
            _ => return,
        };

        let projection = cgmath::ortho(0.0, 1.0, 0.0, 1.0, -1.0, 1.0);
        let pass = |source: &Texture, target: Texture, horizontal: bool| BlurPass {
            camera: ShadowCamera {
                view: Matrix4::from_scale(1.0),
                projection,
                viewport: [0, 0, self.map_size[0], self.map_size[1]],
                clear_color: [1.0; 4],
                target,
                render_state: Rc::new(RefCell::new(RenderState::new())),
            },
            material: self.blur_material(source, horizontal),
        };

        // vertical moments into the scratch map, then horizontal back
        let vertical = pass(&map, map_vsm.clone(), false);
        let horizontal = pass(&map_vsm, map, true);
        self.blur_passes.push(vertical);
        self.blur_passes.push(horizontal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_plane_clamps_to_far_ratio() {
        // light embedded in the scene: unclamped near would go negative
        let (znear, zfar) = directional_clip_range(1.0, 10.0);
        assert_eq!(zfar, 11.0);
        assert!((znear - 0.011).abs() < 1e-6);

        // far-away light keeps its exact range
        let (znear, zfar) = directional_clip_range(100.0, 10.0);
        assert_eq!(znear, 90.0);
        assert_eq!(zfar, 110.0);
    }

    #[test]
    fn up_vector_falls_back_for_vertical_lights() {
        let down = Vector3::new(0.0, -1.0, 0.0);
        let up = orthogonal_up(down, 0.5);
        assert!(up.magnitude() > 0.9);
        assert!(up.dot(down).abs() < 1e-6);

        let slanted = Vector3::new(1.0, -1.0, 0.0).normalize();
        let up = orthogonal_up(slanted, 0.5);
        assert!(up.dot(slanted).abs() < 1e-6);
    }

    #[test]
    fn bias_matrix_maps_clip_to_texture_space() {
        use cgmath::Transform;
        let m = bias_matrix();
        let lo = m.transform_point(Point3::new(-1.0, -1.0, -1.0));
        let hi = m.transform_point(Point3::new(1.0, 1.0, 1.0));
        assert!((lo - Point3::new(0.0, 0.0, 0.0)).magnitude() < 1e-6);
        assert!((hi - Point3::new(1.0, 1.0, 1.0)).magnitude() < 1e-6);
    }

    #[test]
    fn per_type_defaults() {
        assert_eq!(LightShadow::directional().map_size(), [2048, 2048]);
        assert_eq!(LightShadow::directional().bias(), -0.01);
        assert_eq!(LightShadow::spot().bias(), 0.0);
        let point = LightShadow::point();
        assert_eq!(point.map_size(), [512, 512]);
        assert_eq!(point.target_size(), [2048, 1024]);
        assert_eq!(point.bias(), -0.005);
    }

    #[test]
    fn vsm_only_for_non_point_lights() {
        assert!(LightShadow::uses_vsm(ShadowMapType::Vsm, LightType::Directional));
        assert!(LightShadow::uses_vsm(ShadowMapType::Vsm, LightType::Spot));
        assert!(!LightShadow::uses_vsm(ShadowMapType::Vsm, LightType::Point));
        assert!(!LightShadow::uses_vsm(ShadowMapType::Pcf, LightType::Directional));
    }
}
