//! Light sources.
//!
//! Lights are plain data plus an optional shadow. The per-type payload is a
//! tagged union; the cull pass matches on it to fill the uniform arrays and
//! the shadow pass reads a [`ShadowGeometry`] snapshot so it never has to
//! hold a borrow of the light while re-traversing the scene.

use cgmath::{InnerSpace, Point3, Vector3};
use mint;

use color::Color;
use shadow::LightShadow;

/// Discriminant used to group lights per type during the cull pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightType {
    Ambient = 0,
    Directional = 1,
    Point = 2,
    Spot = 3,
    Hemisphere = 4,
    RectArea = 5,
    Probe = 6,
}

/// Per-type light payload.
#[derive(Clone, Debug)]
pub enum LightKind {
    Ambient {
        color: Color,
        intensity: f32,
    },
    Directional {
        direction: Vector3<f32>,
        color: Color,
        intensity: f32,
        /// Marks sun-style lights whose direction tracks the time of day.
        flow: bool,
    },
    Point {
        position: Point3<f32>,
        color: Color,
        intensity: f32,
        distance: f32,
        decay: f32,
    },
    Spot {
        position: Point3<f32>,
        direction: Vector3<f32>,
        color: Color,
        intensity: f32,
        distance: f32,
        /// Half-angle of the cone, in radians.
        angle: f32,
        penumbra: f32,
        decay: f32,
    },
    Hemisphere {
        direction: Vector3<f32>,
        sky_color: Color,
        ground_color: Color,
        intensity: f32,
    },
    RectArea {
        position: Point3<f32>,
        direction: Vector3<f32>,
        color: Color,
        intensity: f32,
        width: f32,
        height: f32,
    },
    /// Irradiance probe: second-order spherical harmonics, RGB per band.
    Probe {
        coefficients: [Vector3<f32>; 9],
        intensity: f32,
    },
}

impl LightKind {
    pub fn light_type(&self) -> LightType {
        match *self {
            LightKind::Ambient { .. } => LightType::Ambient,
            LightKind::Directional { .. } => LightType::Directional,
            LightKind::Point { .. } => LightType::Point,
            LightKind::Spot { .. } => LightType::Spot,
            LightKind::Hemisphere { .. } => LightType::Hemisphere,
            LightKind::RectArea { .. } => LightType::RectArea,
            LightKind::Probe { .. } => LightType::Probe,
        }
    }
}

/// A light source, optionally casting a shadow.
#[derive(Debug)]
pub struct Light {
    kind: LightKind,
    cast_shadow: bool,
    shadow: Option<LightShadow>,
}

impl Light {
    /// Wraps a payload, attaching the default shadow for shadowing-capable
    /// types.
    pub fn new(kind: LightKind) -> Self {
        let shadow = match kind.light_type() {
            LightType::Directional => Some(LightShadow::directional()),
            LightType::Point => Some(LightShadow::point()),
            LightType::Spot => Some(LightShadow::spot()),
            _ => None,
        };
        Light {
            kind,
            cast_shadow: false,
            shadow,
        }
    }

    pub fn ambient(color: Color, intensity: f32) -> Self {
        Light::new(LightKind::Ambient { color, intensity })
    }

    pub fn directional<D>(direction: D, color: Color, intensity: f32) -> Self
    where
        D: Into<mint::Vector3<f32>>,
    {
        Light::new(LightKind::Directional {
            direction: Vector3::from(direction.into()).normalize(),
            color,
            intensity,
            flow: false,
        })
    }

    pub fn point<P>(position: P, color: Color, intensity: f32, distance: f32, decay: f32) -> Self
    where
        P: Into<mint::Point3<f32>>,
    {
        Light::new(LightKind::Point {
            position: Point3::from(position.into()),
            color,
            intensity,
            distance,
            decay,
        })
    }

    pub fn spot<P, D>(
        position: P,
        direction: D,
        color: Color,
        intensity: f32,
        distance: f32,
        angle: f32,
        penumbra: f32,
        decay: f32,
    ) -> Self
    where
        P: Into<mint::Point3<f32>>,
        D: Into<mint::Vector3<f32>>,
    {
        Light::new(LightKind::Spot {
            position: Point3::from(position.into()),
            direction: Vector3::from(direction.into()).normalize(),
            color,
            intensity,
            distance,
            angle,
            penumbra,
            decay,
        })
    }

    pub fn hemisphere<D>(direction: D, sky_color: Color, ground_color: Color, intensity: f32) -> Self
    where
        D: Into<mint::Vector3<f32>>,
    {
        Light::new(LightKind::Hemisphere {
            direction: Vector3::from(direction.into()).normalize(),
            sky_color,
            ground_color,
            intensity,
        })
    }

    pub fn rect_area<P, D>(
        position: P,
        direction: D,
        color: Color,
        intensity: f32,
        width: f32,
        height: f32,
    ) -> Self
    where
        P: Into<mint::Point3<f32>>,
        D: Into<mint::Vector3<f32>>,
    {
        Light::new(LightKind::RectArea {
            position: Point3::from(position.into()),
            direction: Vector3::from(direction.into()).normalize(),
            color,
            intensity,
            width,
            height,
        })
    }

    /// Irradiance probe projected from a pre-rendered cube map.
    pub fn probe(faces: &[CubeFace; 6], intensity: f32) -> Self {
        Light::new(LightKind::Probe {
            coefficients: project_sh(faces),
            intensity,
        })
    }

    pub fn kind(&self) -> &LightKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut LightKind {
        &mut self.kind
    }

    pub fn light_type(&self) -> LightType {
        self.kind.light_type()
    }

    pub fn cast_shadow(&self) -> bool {
        self.cast_shadow
    }

    pub fn set_cast_shadow(&mut self, cast: bool) {
        self.cast_shadow = cast;
    }

    pub fn shadow(&self) -> Option<&LightShadow> {
        self.shadow.as_ref()
    }

    pub fn shadow_mut(&mut self) -> Option<&mut LightShadow> {
        self.shadow.as_mut()
    }

    /// Snapshot of the geometry a shadow pass needs, detached from the
    /// light so the scene can be re-traversed while it is held.
    pub fn shadow_geometry(&self) -> ShadowGeometry {
        match self.kind {
            LightKind::Directional { direction, .. } => ShadowGeometry {
                light_type: LightType::Directional,
                position: Point3::new(0.0, 0.0, 0.0),
                direction,
                distance: 0.0,
                angle: 0.0,
            },
            LightKind::Point {
                position, distance, ..
            } => ShadowGeometry {
                light_type: LightType::Point,
                position,
                direction: Vector3::new(0.0, 0.0, -1.0),
                distance,
                angle: 0.0,
            },
            LightKind::Spot {
                position,
                direction,
                distance,
                angle,
                ..
            } => ShadowGeometry {
                light_type: LightType::Spot,
                position,
                direction,
                distance,
                angle,
            },
            _ => ShadowGeometry {
                light_type: self.light_type(),
                position: Point3::new(0.0, 0.0, 0.0),
                direction: Vector3::new(0.0, 0.0, -1.0),
                distance: 0.0,
                angle: 0.0,
            },
        }
    }
}

/// The geometric facts a shadow camera is built from.
#[derive(Clone, Copy, Debug)]
pub struct ShadowGeometry {
    pub light_type: LightType,
    pub position: Point3<f32>,
    pub direction: Vector3<f32>,
    pub distance: f32,
    pub angle: f32,
}

/// One face of a cube map, RGBA texels in row-major order, as fed to
/// [`Light::probe`]. Colors are sRGB-encoded as stored.
pub struct CubeFace {
    pub size: u32,
    pub texels: Vec<[f32; 4]>,
}

fn sh_basis(normal: Vector3<f32>) -> [f32; 9] {
    let (x, y, z) = (normal.x, normal.y, normal.z);
    [
        // band 0
        0.282095,
        // band 1
        0.488603 * y,
        0.488603 * z,
        0.488603 * x,
        // band 2
        1.092548 * x * y,
        1.092548 * y * z,
        0.315392 * (3.0 * z * z - 1.0),
        1.092548 * x * z,
        0.546274 * (x * x - y * y),
    ]
}

fn srgb_to_linear(c: f32) -> f32 {
    if c < 0.04045 {
        c * 0.0773993808
    } else {
        (c * 0.9478672986 + 0.0521327014).powf(2.4)
    }
}

/// Projects a cube map onto the first nine spherical harmonics bands,
/// weighting texels by their solid angle.
fn project_sh(faces: &[CubeFace; 6]) -> [Vector3<f32>; 9] {
    let mut coefficients = [Vector3::new(0.0, 0.0, 0.0); 9];
    let mut total_weight = 0.0f32;

    for (face, data) in faces.iter().enumerate() {
        let size = data.size as usize;
        let pixel_size = 2.0 / data.size as f32;

        for (index, texel) in data.texels.iter().take(size * size).enumerate() {
            let r = srgb_to_linear(texel[0]);
            let g = srgb_to_linear(texel[1]);
            let b = srgb_to_linear(texel[2]);

            let col = -1.0 + ((index % size) as f32 + 0.5) * pixel_size;
            let row = 1.0 - ((index / size) as f32 + 0.5) * pixel_size;

            let coord = match face {
                0 => Vector3::new(-1.0, row, -col),
                1 => Vector3::new(1.0, row, col),
                2 => Vector3::new(-col, 1.0, -row),
                3 => Vector3::new(-col, -1.0, row),
                4 => Vector3::new(-col, row, 1.0),
                _ => Vector3::new(col, row, -1.0),
            };

            let length_sq = coord.magnitude2();
            let weight = 4.0 / (coord.magnitude() * length_sq);
            total_weight += weight;

            let basis = sh_basis(coord.normalize());
            for (c, &bs) in coefficients.iter_mut().zip(basis.iter()) {
                c.x += bs * r * weight;
                c.y += bs * g * weight;
                c.z += bs * b * weight;
            }
        }
    }

    let norm = 4.0 * ::std::f32::consts::PI / total_weight;
    for c in &mut coefficients {
        *c *= norm;
    }
    coefficients
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shadows_per_type() {
        assert!(Light::directional([0.0, -1.0, 0.0], 0xFFFFFF, 1.0)
            .shadow()
            .is_some());
        assert!(Light::point([0.0, 5.0, 0.0], 0xFFFFFF, 1.0, 50.0, 1.0)
            .shadow()
            .is_some());
        assert!(Light::ambient(0xFFFFFF, 0.2).shadow().is_none());
        assert!(
            Light::hemisphere([0.0, 1.0, 0.0], 0x8888FF, 0x442200, 1.0)
                .shadow()
                .is_none()
        );
    }

    #[test]
    fn uniform_cube_projects_to_flat_sh() {
        let face = |v: f32| CubeFace {
            size: 4,
            texels: vec![[v, v, v, 1.0]; 16],
        };
        let faces = [
            face(1.0),
            face(1.0),
            face(1.0),
            face(1.0),
            face(1.0),
            face(1.0),
        ];
        let sh = project_sh(&faces);

        // a constant environment lands entirely in band 0
        let dc = 0.282095 * 4.0 * ::std::f32::consts::PI;
        assert!((sh[0].x - dc).abs() < 1e-2, "band 0 was {}", sh[0].x);
        for c in &sh[1..] {
            assert!(c.x.abs() < 1e-3);
            assert!(c.y.abs() < 1e-3);
            assert!(c.z.abs() < 1e-3);
        }
    }

    #[test]
    fn shadow_geometry_snapshot() {
        let light = Light::spot(
            [0.0, 10.0, 0.0],
            [0.0, -1.0, 0.0],
            0xFFFFFF,
            1.0,
            100.0,
            0.5,
            0.1,
            1.0,
        );
        let geometry = light.shadow_geometry();
        assert_eq!(geometry.light_type, LightType::Spot);
        assert_eq!(geometry.distance, 100.0);
        assert_eq!(geometry.angle, 0.5);
    }
}
