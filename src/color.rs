//! sRGB colors.

/// sRGB color represented by a 4-byte hexadecimal number.
///
/// ```rust
/// # #![allow(unused)]
/// let red = 0xFF0000;
/// let green = 0x00FF00;
/// let blue = 0x0000FF;
/// ```
pub type Color = u32;

/// Black.
pub const BLACK: Color = 0x000000;

/// White.
pub const WHITE: Color = 0xFFFFFF;

/// sRGB to linear conversion.
///
/// Implementation taken from https://www.khronos.org/registry/OpenGL/extensions/EXT/EXT_texture_sRGB_decode.txt
pub fn to_linear_rgb(c: Color) -> [f32; 3] {
    let f = |xu: u32| {
        let x = (xu & 0xFF) as f32 / 255.0;
        if x > 0.04045 {
            ((x + 0.055) / 1.055).powf(2.4)
        } else {
            x / 12.92
        }
    };
    [f(c >> 16), f(c >> 8), f(c)]
}

/// Linear color premultiplied by an intensity, the form every light and
/// emissive color uniform is uploaded in.
pub fn to_linear_rgb_scaled(c: Color, intensity: f32) -> [f32; 3] {
    let rgb = to_linear_rgb(c);
    [rgb[0] * intensity, rgb[1] * intensity, rgb[2] * intensity]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn black_and_white() {
        assert_eq!(to_linear_rgb(BLACK), [0.0, 0.0, 0.0]);
        assert_eq!(to_linear_rgb(WHITE), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn intensity_scales_linearly() {
        assert_eq!(to_linear_rgb_scaled(WHITE, 0.5), [0.5, 0.5, 0.5]);
    }
}
