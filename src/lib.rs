//! three.js-style shading for a host scene graph.
//!
//! This crate generates GLSL programs from a chunk library, keeps materials
//! and their state sets in sync with scene-wide render state, and drives
//! shadow map and background rendering through a [`CullHost`] callback. The
//! host engine owns traversal, geometry and the GPU; this crate owns what
//! to draw things with.
//!
//! The per-frame flow is:
//!
//! 1. the host calls [`RenderState::on_cull`] for the camera, which
//!    publishes light and fog uniforms and renders shadow maps,
//! 2. for every material-bearing node it calls [`Material::cull`] and
//!    pushes the returned state set,
//! 3. it applies the state sets when drawing.
//!
//! ```rust
//! use three_shading::{Camera, CullContext, CullHost, Light, Material,
//!                     Projection, ProgramGenerator, RenderState};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! fn frame(host: &mut dyn CullHost, programs: &mut ProgramGenerator) {
//!     let state = Rc::new(RefCell::new(RenderState::new()));
//!     state.borrow_mut().add_light(Light::ambient(0xFFFFFF, 0.2));
//!
//!     let mut camera = Camera::new(Projection::perspective(60.0, 1.0, 0.1, 100.0));
//!     RenderState::setup_camera(&state, &mut camera);
//!
//!     let mut ctx = CullContext { programs, host };
//!     state.borrow_mut().on_cull(&mut camera, &mut ctx).unwrap();
//!
//!     let mut material = Material::phong();
//!     match material.cull(&camera, &mut ctx).unwrap() {
//!         three_shading::CullResult::Push(state_set) => {
//!             let _ = state_set;
//!         }
//!         _ => {}
//!     }
//! }
//! ```

#[macro_use]
extern crate log;
#[macro_use]
extern crate quick_error;
extern crate arrayvec;
extern crate cgmath;
extern crate itertools;
extern crate mint;
extern crate phf;
extern crate vec_map;

#[cfg(test)]
extern crate env_logger;

pub mod camera;
pub mod chunk;
pub mod color;
pub mod light;
pub mod material;
pub mod program;
pub mod render_state;
pub mod shadow;
pub mod state;
pub mod texture;

pub use camera::{Camera, Orthographic, Perspective, Projection, ShadowCamera};
pub use color::Color;
pub use light::{CubeFace, Light, LightKind, LightType, ShadowGeometry};
pub use material::{CullResult, Material, MaterialKind};
pub use program::{
    DepthPacking, EnvMapCombine, EnvMapMode, Program, ProgramGenerator, ProgramParameters,
    TextureEncoding, ToneMapping,
};
pub use render_state::{Capabilities, Fog, RenderState, ShadowPass};
pub use shadow::{LightShadow, ShadowMap, ShadowMapType};
pub use state::{
    BlendFactor, BlendState, CullState, RenderBin, Side, StateSet, Uniform, UniformValue,
};
pub use texture::{Filter, Texture, TextureKind, Wrap};

/// World-space bounding sphere of the scene, as reported by the host for
/// fitting directional shadow volumes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: mint::Point3<f32>,
    pub radius: f32,
}

/// What the host engine provides to and performs for the cull pass.
pub trait CullHost {
    /// Number of texture units the context exposes; shadow and lookup maps
    /// bind downwards from the top.
    fn max_texture_units(&self) -> usize;

    /// Bound of everything a directional shadow volume must cover.
    fn scene_bound(&self) -> BoundingSphere;

    /// Re-renders the scene from a shadow camera into its target.
    fn render_shadow_camera(&mut self, camera: &ShadowCamera);

    /// Draws a full-screen triangle with the given state into the camera's
    /// target, for blur passes.
    fn render_fullscreen(&mut self, camera: &ShadowCamera, state: &StateSet);

    /// Draws the background geometry translated to the eye position, with
    /// depth write and near/far contribution disabled.
    fn render_background(&mut self, eye: mint::Point3<f32>, state: &StateSet);
}

/// Everything a cull traversal threads through.
pub struct CullContext<'a> {
    pub programs: &'a mut ProgramGenerator,
    pub host: &'a mut dyn CullHost,
}
