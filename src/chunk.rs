//! GLSL chunk registry and shader library.
//!
//! Shader sources live in `data/` and are embedded at compile time. Chunks
//! are the named snippets `#include <name>` directives resolve to; the
//! shader library maps a shader id (`"basic"`, `"phong"`, ...) to its
//! vertex/fragment template pair.

use phf::phf_map;

/// Vertex/fragment template pair for one shader id.
#[derive(Clone, Copy, Debug)]
pub struct ShaderObject {
    pub vertex: &'static str,
    pub fragment: &'static str,
}

macro_rules! chunk {
    ($name: expr) => {
        include_str!(concat!("../data/chunks/", $name, ".glsl"))
    };
}

macro_rules! shader {
    ($name: expr) => {
        ShaderObject {
            vertex: include_str!(concat!("../data/shaders/", $name, "_vert.glsl")),
            fragment: include_str!(concat!("../data/shaders/", $name, "_frag.glsl")),
        }
    };
}

static CHUNKS: phf::Map<&'static str, &'static str> = phf_map! {
    "common" => chunk!("common"),
    "packing" => chunk!("packing"),
    "encodings_pars_fragment" => chunk!("encodings_pars_fragment"),
    "encodings_fragment" => chunk!("encodings_fragment"),
    "tonemapping_pars_fragment" => chunk!("tonemapping_pars_fragment"),
    "tonemapping_fragment" => chunk!("tonemapping_fragment"),
    "uv_pars_vertex" => chunk!("uv_pars_vertex"),
    "uv_vertex" => chunk!("uv_vertex"),
    "uv_pars_fragment" => chunk!("uv_pars_fragment"),
    "color_pars_vertex" => chunk!("color_pars_vertex"),
    "color_vertex" => chunk!("color_vertex"),
    "color_pars_fragment" => chunk!("color_pars_fragment"),
    "color_fragment" => chunk!("color_fragment"),
    "begin_vertex" => chunk!("begin_vertex"),
    "beginnormal_vertex" => chunk!("beginnormal_vertex"),
    "defaultnormal_vertex" => chunk!("defaultnormal_vertex"),
    "project_vertex" => chunk!("project_vertex"),
    "worldpos_vertex" => chunk!("worldpos_vertex"),
    "morphtarget_pars_vertex" => chunk!("morphtarget_pars_vertex"),
    "morphtarget_vertex" => chunk!("morphtarget_vertex"),
    "morphnormal_vertex" => chunk!("morphnormal_vertex"),
    "skinning_pars_vertex" => chunk!("skinning_pars_vertex"),
    "skinbase_vertex" => chunk!("skinbase_vertex"),
    "skinning_vertex" => chunk!("skinning_vertex"),
    "skinnormal_vertex" => chunk!("skinnormal_vertex"),
    "displacementmap_pars_vertex" => chunk!("displacementmap_pars_vertex"),
    "displacementmap_vertex" => chunk!("displacementmap_vertex"),
    "logdepthbuf_pars_vertex" => chunk!("logdepthbuf_pars_vertex"),
    "logdepthbuf_vertex" => chunk!("logdepthbuf_vertex"),
    "logdepthbuf_pars_fragment" => chunk!("logdepthbuf_pars_fragment"),
    "logdepthbuf_fragment" => chunk!("logdepthbuf_fragment"),
    "clipping_planes_pars_vertex" => chunk!("clipping_planes_pars_vertex"),
    "clipping_planes_vertex" => chunk!("clipping_planes_vertex"),
    "clipping_planes_pars_fragment" => chunk!("clipping_planes_pars_fragment"),
    "clipping_planes_fragment" => chunk!("clipping_planes_fragment"),
    "fog_pars_vertex" => chunk!("fog_pars_vertex"),
    "fog_vertex" => chunk!("fog_vertex"),
    "fog_pars_fragment" => chunk!("fog_pars_fragment"),
    "fog_fragment" => chunk!("fog_fragment"),
    "map_pars_fragment" => chunk!("map_pars_fragment"),
    "map_fragment" => chunk!("map_fragment"),
    "alphamap_pars_fragment" => chunk!("alphamap_pars_fragment"),
    "alphamap_fragment" => chunk!("alphamap_fragment"),
    "alphatest_fragment" => chunk!("alphatest_fragment"),
    "aomap_pars_fragment" => chunk!("aomap_pars_fragment"),
    "aomap_fragment" => chunk!("aomap_fragment"),
    "lightmap_pars_fragment" => chunk!("lightmap_pars_fragment"),
    "specularmap_pars_fragment" => chunk!("specularmap_pars_fragment"),
    "specularmap_fragment" => chunk!("specularmap_fragment"),
    "emissivemap_pars_fragment" => chunk!("emissivemap_pars_fragment"),
    "emissivemap_fragment" => chunk!("emissivemap_fragment"),
    "envmap_common_pars_fragment" => chunk!("envmap_common_pars_fragment"),
    "envmap_pars_vertex" => chunk!("envmap_pars_vertex"),
    "envmap_vertex" => chunk!("envmap_vertex"),
    "envmap_pars_fragment" => chunk!("envmap_pars_fragment"),
    "envmap_fragment" => chunk!("envmap_fragment"),
    "normalmap_pars_fragment" => chunk!("normalmap_pars_fragment"),
    "bumpmap_pars_fragment" => chunk!("bumpmap_pars_fragment"),
    "normal_fragment_begin" => chunk!("normal_fragment_begin"),
    "normal_fragment_maps" => chunk!("normal_fragment_maps"),
    "roughnessmap_pars_fragment" => chunk!("roughnessmap_pars_fragment"),
    "roughnessmap_fragment" => chunk!("roughnessmap_fragment"),
    "metalnessmap_pars_fragment" => chunk!("metalnessmap_pars_fragment"),
    "metalnessmap_fragment" => chunk!("metalnessmap_fragment"),
    "bsdfs" => chunk!("bsdfs"),
    "lights_pars_begin" => chunk!("lights_pars_begin"),
    "lights_lambert_vertex" => chunk!("lights_lambert_vertex"),
    "lights_phong_pars_fragment" => chunk!("lights_phong_pars_fragment"),
    "lights_physical_pars_fragment" => chunk!("lights_physical_pars_fragment"),
    "lights_fragment_begin" => chunk!("lights_fragment_begin"),
    "lights_fragment_end" => chunk!("lights_fragment_end"),
    "shadowmap_pars_vertex" => chunk!("shadowmap_pars_vertex"),
    "shadowmap_vertex" => chunk!("shadowmap_vertex"),
    "shadowmap_pars_fragment" => chunk!("shadowmap_pars_fragment"),
    "shadowmask_pars_fragment" => chunk!("shadowmask_pars_fragment"),
    "dithering_pars_fragment" => chunk!("dithering_pars_fragment"),
    "dithering_fragment" => chunk!("dithering_fragment"),
    "premultiplied_alpha_fragment" => chunk!("premultiplied_alpha_fragment"),
};

static SHADER_LIB: phf::Map<&'static str, ShaderObject> = phf_map! {
    "basic" => shader!("basic"),
    "lambert" => shader!("lambert"),
    "phong" => shader!("phong"),
    "physical" => shader!("physical"),
    "depth" => shader!("depth"),
    "distance" => shader!("distance"),
    "cube" => shader!("cube"),
    "equirect" => shader!("equirect"),
};

/// Looks up a chunk by name.
pub fn chunk(name: &str) -> Option<&'static str> {
    CHUNKS.get(name).cloned()
}

/// Looks up a shader-library entry by shader id.
pub fn shader(id: &str) -> Option<&'static ShaderObject> {
    SHADER_LIB.get(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_chunks_resolve() {
        assert!(chunk("common").is_some());
        assert!(chunk("tonemapping_pars_fragment").is_some());
        assert!(chunk("no_such_chunk").is_none());
    }

    #[test]
    fn library_covers_every_builtin_shader() {
        for id in &[
            "basic", "lambert", "phong", "physical", "depth", "distance", "cube", "equirect",
        ] {
            let obj = shader(id).unwrap();
            assert!(!obj.vertex.is_empty(), "{} has no vertex shader", id);
            assert!(!obj.fragment.is_empty(), "{} has no fragment shader", id);
        }
    }
}
