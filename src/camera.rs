//! Cameras.

use std::cell::RefCell;
use std::rc::Rc;

use cgmath::{self, Deg, Matrix4, Point3, SquareMatrix, Transform, Vector3};
use mint;

use render_state::RenderState;
use state::StateSet;
use texture::Texture;

/// Orthographic projection volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orthographic {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

/// Perspective projection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Perspective {
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

/// Projection parameters of a camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Projection {
    Orthographic(Orthographic),
    Perspective(Perspective),
}

impl Projection {
    /// Perspective projection from a vertical FOV in degrees.
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective(Perspective {
            fov_y,
            aspect,
            near,
            far,
        })
    }

    /// Symmetric orthographic projection.
    pub fn orthographic(extent: f32, near: f32, far: f32) -> Self {
        Projection::Orthographic(Orthographic {
            left: -extent,
            right: extent,
            bottom: -extent,
            top: extent,
            near,
            far,
        })
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        match *self {
            Projection::Orthographic(o) => {
                cgmath::ortho(o.left, o.right, o.bottom, o.top, o.near, o.far)
            }
            Projection::Perspective(p) => {
                cgmath::perspective(Deg(p.fov_y), p.aspect, p.near, p.far)
            }
        }
    }

    pub fn is_orthographic(&self) -> bool {
        match *self {
            Projection::Orthographic(_) => true,
            Projection::Perspective(_) => false,
        }
    }

    pub fn far(&self) -> f32 {
        match *self {
            Projection::Orthographic(o) => o.far,
            Projection::Perspective(p) => p.far,
        }
    }
}

/// A viewer camera: view matrix, projection, its own state set, and the
/// [`RenderState`] driving the cull pass under it.
pub struct Camera {
    view: Matrix4<f32>,
    projection: Projection,
    state_set: StateSet,
    render_state: Option<Rc<RefCell<RenderState>>>,
}

impl Camera {
    pub fn new(projection: Projection) -> Self {
        Camera {
            view: Matrix4::identity(),
            projection,
            state_set: StateSet::new(),
            render_state: None,
        }
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn set_view(&mut self, view: Matrix4<f32>) {
        self.view = view;
    }

    /// Points the camera at `target` from `eye`.
    pub fn look_at<E, T>(&mut self, eye: E, target: T)
    where
        E: Into<mint::Point3<f32>>,
        T: Into<mint::Point3<f32>>,
    {
        let eye = Point3::from(eye.into());
        let target = Point3::from(target.into());
        self.view = Matrix4::look_at_rh(eye, target, Vector3::unit_y());
    }

    pub fn view(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn view_inverse(&self) -> Matrix4<f32> {
        self.view.inverse_transform().unwrap_or_else(Matrix4::identity)
    }

    /// World-space eye position, read back from the view matrix.
    pub fn eye_position(&self) -> Point3<f32> {
        let inv = self.view_inverse();
        Point3::new(inv.w.x, inv.w.y, inv.w.z)
    }

    pub fn state_set(&self) -> &StateSet {
        &self.state_set
    }

    pub fn state_set_mut(&mut self) -> &mut StateSet {
        &mut self.state_set
    }

    pub(crate) fn attach_render_state(&mut self, state: Rc<RefCell<RenderState>>) {
        self.render_state = Some(state);
    }

    pub fn render_state(&self) -> Option<Rc<RefCell<RenderState>>> {
        self.render_state.clone()
    }
}

/// An offscreen camera rendering into a texture, used for shadow map and
/// blur passes. The host re-traverses the scene (or draws a full-screen
/// triangle) with these settings when asked to.
#[derive(Debug)]
pub struct ShadowCamera {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    /// `[x, y, width, height]` in texels of the target.
    pub viewport: [u32; 4],
    pub clear_color: [f32; 4],
    pub target: Texture,
    pub render_state: Rc<RefCell<RenderState>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_position_roundtrip() {
        let mut camera = Camera::new(Projection::perspective(60.0, 1.0, 0.1, 100.0));
        camera.look_at([1.0, 2.0, 3.0], [0.0, 0.0, 0.0]);
        let eye = camera.eye_position();
        assert!((eye.x - 1.0).abs() < 1e-5);
        assert!((eye.y - 2.0).abs() < 1e-5);
        assert!((eye.z - 3.0).abs() < 1e-5);
    }

    #[test]
    fn projection_kind() {
        assert!(Projection::orthographic(1.0, 0.0, 1.0).is_orthographic());
        assert!(!Projection::perspective(45.0, 1.0, 0.1, 10.0).is_orthographic());
    }
}
