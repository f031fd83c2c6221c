// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Full-screen fragment programs.

A [`Program`] is a fragment stage plus the parameters it declares.  Like a material, it keeps
the last value bound to each declared parameter, so a parameter that is not passed to a later
[`crate::images::render_pass::render`] keeps its previous value.

Programs run on either backend:

* on [`crate::WgpuBackend`] the WGSL in [`FragmentShader`] is compiled, with the declarations
  from [`Program::wgsl_source`] prepended;
* on [`crate::SoftwareBackend`] the [`SoftwareKernel`] is evaluated once per texel.

```
use wavefield::bindings::parameters::ParameterKind;
use wavefield::images::program::Program;
use wavefield::images::shader::FragmentShader;
use wavefield::pixel_formats::Float4;

let damp = Program::new(
    "damp",
    FragmentShader::new(
        "damp",
        r#"
        @fragment
        fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
            return textureSample(wave, wave_sampler, in.uv) * parameters.damping.x;
        }
        "#.to_string(),
    ),
)
.with_parameter("wave", ParameterKind::Surface)
.with_parameter("damping", ParameterKind::Float)
.with_software_kernel(|input| {
    let damping = input.float("damping");
    input.sample("wave", input.uv).map(|c| c * damping)
});
assert!(damp.wgsl_source().contains("damping: vec4<f32>"));
assert!(damp.wgsl_source().contains("var wave: texture_2d<f32>;"));
```
*/
use crate::bindings::parameters::{ParameterKind, ParameterValue, Parameters};
use crate::bindings::software::texture::Texel;
use crate::bindings::surface::SurfaceHandle;
use crate::images::shader::FragmentShader;
use crate::pixel_formats::Float4;
use std::fmt::{Debug, Formatter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

fn next_program_id() -> u64 {
    NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed)
}

/// CPU implementation of a program, evaluated once per destination texel.
pub type SoftwareKernel = Arc<dyn Fn(&FragmentInput<'_>) -> Float4 + Send + Sync>;

/// Surface access for software kernels.
pub trait SurfaceSampler {
    /// Samples `surface` at `uv` with the surface's own filter and repeat wrapping.
    ///
    /// Returns `None` for surfaces the backend doesn't know.
    fn sample(&self, surface: SurfaceHandle, uv: [f32; 2]) -> Option<Float4>;
}

/// Inputs to one evaluation of a [`SoftwareKernel`].
pub struct FragmentInput<'a> {
    /// Normalized coordinate of the destination texel's center.
    pub uv: [f32; 2],
    pub texel: Texel,
    /// Size of the destination in texels.
    pub resolution: [u32; 2],
    program: &'a Program,
    sampler: &'a dyn SurfaceSampler,
}

impl<'a> FragmentInput<'a> {
    pub(crate) fn new(
        uv: [f32; 2],
        texel: Texel,
        resolution: [u32; 2],
        program: &'a Program,
        sampler: &'a dyn SurfaceSampler,
    ) -> Self {
        FragmentInput {
            uv,
            texel,
            resolution,
            program,
            sampler,
        }
    }

    fn lanes(&self, name: &str) -> [f32; 4] {
        self.program
            .value(name)
            .map(|v| v.as_lanes())
            .unwrap_or([0.0; 4])
    }

    /// Bound value of a `Float` parameter; 0 when unbound.
    pub fn float(&self, name: &str) -> f32 {
        self.lanes(name)[0]
    }

    /// Bound value of a `Vec2` parameter; zero when unbound.
    pub fn vec2(&self, name: &str) -> [f32; 2] {
        let lanes = self.lanes(name);
        [lanes[0], lanes[1]]
    }

    /// Bound value of a `Vec4` parameter; zero when unbound.
    pub fn vec4(&self, name: &str) -> Float4 {
        Float4::from(self.lanes(name))
    }

    /// A compile-time constant declared with [`Program::with_define`].
    pub fn define(&self, name: &str) -> Option<f32> {
        self.program
            .defines
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Samples the surface bound to `name`; zero when unbound.
    pub fn sample(&self, name: &str, uv: [f32; 2]) -> Float4 {
        match self.program.value(name) {
            Some(ParameterValue::Surface(handle)) => {
                self.sampler.sample(*handle, uv).unwrap_or(Float4::ZERO)
            }
            _ => Float4::ZERO,
        }
    }
}

/// A parameter a program declares.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    pub name: String,
    pub kind: ParameterKind,
}

/// A full-screen fragment program and its bound parameter values.
#[derive(Clone)]
pub struct Program {
    id: u64,
    name: String,
    fragment: FragmentShader,
    declarations: Vec<ParameterDecl>,
    defines: Vec<(String, f32)>,
    //parallel to declarations
    values: Vec<Option<ParameterValue>>,
    software: Option<SoftwareKernel>,
}

impl Debug for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("declarations", &self.declarations)
            .field("defines", &self.defines)
            .field("values", &self.values)
            .field("software", &self.software.is_some())
            .finish()
    }
}

impl Program {
    pub fn new(name: impl Into<String>, fragment: FragmentShader) -> Self {
        Program {
            id: next_program_id(),
            name: name.into(),
            fragment,
            declarations: Vec::new(),
            defines: Vec::new(),
            values: Vec::new(),
            software: None,
        }
    }

    /// Declares a parameter.  Redeclaring a name replaces its kind and forgets its value.
    pub fn with_parameter(mut self, name: impl Into<String>, kind: ParameterKind) -> Self {
        let name = name.into();
        match self.declarations.iter().position(|d| d.name == name) {
            Some(index) => {
                self.declarations[index].kind = kind;
                self.values[index] = None;
            }
            None => {
                self.declarations.push(ParameterDecl { name, kind });
                self.values.push(None);
            }
        }
        //the generated layout changed
        self.id = next_program_id();
        self
    }

    /// Declares a compile-time constant, emitted as `const NAME: f32 = value;`.
    pub fn with_define(mut self, name: impl Into<String>, value: f32) -> Self {
        let name = name.into();
        self.defines.retain(|(n, _)| *n != name);
        self.defines.push((name, value));
        self.id = next_program_id();
        self
    }

    pub fn with_software_kernel(
        mut self,
        kernel: impl Fn(&FragmentInput<'_>) -> Float4 + Send + Sync + 'static,
    ) -> Self {
        self.software = Some(Arc::new(kernel));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifies the compiled form of this program.  Clones share it.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub fn fragment_shader(&self) -> &FragmentShader {
        &self.fragment
    }

    pub fn declarations(&self) -> &[ParameterDecl] {
        &self.declarations
    }

    pub fn defines(&self) -> &[(String, f32)] {
        &self.defines
    }

    pub(crate) fn software_kernel(&self) -> Option<&SoftwareKernel> {
        self.software.as_ref()
    }

    /// The value currently bound to `name`, if it is declared and has been bound.
    pub fn value(&self, name: &str) -> Option<&ParameterValue> {
        let index = self.declarations.iter().position(|d| d.name == name)?;
        self.values[index].as_ref()
    }

    /// Binds one value.  Returns false if `name` is not declared or `value` has the wrong kind.
    pub fn bind(&mut self, name: &str, value: ParameterValue) -> bool {
        let Some(index) = self.declarations.iter().position(|d| d.name == name) else {
            return false;
        };
        if self.declarations[index].kind != value.kind() {
            logwise::warn_sync!(
                "Ignoring parameter {name} of program {program}: declared {declared}, got {got}",
                name = name.to_string(),
                program = self.name.clone(),
                declared = logwise::privacy::LogIt(&self.declarations[index].kind),
                got = logwise::privacy::LogIt(&value.kind())
            );
            return false;
        }
        self.values[index] = Some(value);
        true
    }

    /// Binds every value in `parameters` this program declares; other names are ignored.
    ///
    /// Returns how many values were bound.
    pub fn bind_all(&mut self, parameters: &Parameters) -> usize {
        let mut bound = 0;
        for (name, value) in parameters.iter() {
            if self.bind(name, *value) {
                bound += 1;
            }
        }
        bound
    }

    /// Declared surface parameters with their bound surfaces, in declaration order.
    pub(crate) fn surface_bindings(&self) -> impl Iterator<Item = (&str, Option<SurfaceHandle>)> {
        self.declarations
            .iter()
            .zip(self.values.iter())
            .filter(|(d, _)| d.kind == ParameterKind::Surface)
            .map(|(d, v)| {
                let handle = match v {
                    Some(ParameterValue::Surface(h)) => Some(*h),
                    _ => None,
                };
                (d.name.as_str(), handle)
            })
    }

    /// Uniform block contents: one four-lane slot per non-surface parameter, in declaration
    /// order, after the leading `resolution` slot.  Unbound parameters read as zero.
    #[allow(dead_code)] //software-only builds do not upload
    pub(crate) fn uniform_lanes(&self, resolution: [u32; 2]) -> Vec<[f32; 4]> {
        let mut lanes = vec![[resolution[0] as f32, resolution[1] as f32, 0.0, 0.0]];
        for (decl, value) in self.declarations.iter().zip(self.values.iter()) {
            if decl.kind != ParameterKind::Surface {
                lanes.push(value.map(|v| v.as_lanes()).unwrap_or([0.0; 4]));
            }
        }
        lanes
    }

    /**
    The complete WGSL module for this program.

    The generated declarations are:

    * one `const NAME: f32` per define;
    * `struct Parameters`, whose first field is `resolution: vec4<f32>` (destination size in
      `xy`), followed by one `vec4<f32>` field per non-surface parameter in declaration order
      (`Float` in `x`, `Vec2` in `xy`), bound as `parameters` at `@group(0) @binding(0)`;
    * for the `n`th surface parameter `name`, `var name: texture_2d<f32>` at binding `1 + 2n`
      and `var name_sampler: sampler` at binding `2 + 2n`;
    * `struct VertexOutput { position, uv }` and the full-screen vertex entry point `vs_main`.

    The program's own fragment code follows.
    */
    pub fn wgsl_source(&self) -> String {
        let mut source = String::new();
        for (name, value) in &self.defines {
            //writing to a String can't fail
            let _ = writeln!(source, "const {name}: f32 = {value:?};");
        }
        source.push_str("struct Parameters {\n    resolution: vec4<f32>,\n");
        for decl in &self.declarations {
            if decl.kind != ParameterKind::Surface {
                let _ = writeln!(source, "    {}: vec4<f32>,", decl.name);
            }
        }
        source.push_str("};\n@group(0) @binding(0) var<uniform> parameters: Parameters;\n");
        for (n, (name, _)) in self.surface_bindings().enumerate() {
            let _ = writeln!(
                source,
                "@group(0) @binding({}) var {name}: texture_2d<f32>;\n@group(0) @binding({}) var {name}_sampler: sampler;",
                1 + 2 * n,
                2 + 2 * n
            );
        }
        source.push_str(FULLSCREEN_VERTEX_WGSL);
        source.push_str(&self.fragment.wgsl_code);
        source
    }
}

const FULLSCREEN_VERTEX_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    //one triangle covering the whole target
    var pos = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 3.0, -1.0),
        vec2<f32>(-1.0,  3.0)
    );
    let p = pos[vertex_index];
    var out: VertexOutput;
    out.position = vec4<f32>(p, 0.0, 1.0);
    out.uv = vec2<f32>(p.x * 0.5 + 0.5, 0.5 - p.y * 0.5);
    return out;
}
"#;

/// Writes `(0, 0, 0, 0)` to every texel.
pub(crate) static ZERO_PROGRAM: LazyLock<Program> = LazyLock::new(|| {
    Program::new(
        "zero",
        FragmentShader::new(
            "zero",
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(0.0, 0.0, 0.0, 0.0);
}
"#
            .to_string(),
        ),
    )
    .with_software_kernel(|_| Float4::ZERO)
});

#[cfg(test)]
mod tests {
    use super::*;

    fn program() -> Program {
        Program::new("test", FragmentShader::new("test", String::new()))
            .with_parameter("a", ParameterKind::Float)
            .with_parameter("src", ParameterKind::Surface)
            .with_parameter("b", ParameterKind::Vec2)
            .with_parameter("dst", ParameterKind::Surface)
    }

    #[test]
    fn bind_all_ignores_undeclared_names() {
        let mut p = program();
        let parameters = Parameters::new()
            .with("a", 2.0f32)
            .with("unrelated", 7.0f32)
            .with("src", SurfaceHandle(4));
        assert_eq!(p.bind_all(&parameters), 2);
        assert_eq!(p.value("a"), Some(&ParameterValue::Float(2.0)));
        assert_eq!(p.value("unrelated"), None);
    }

    #[test]
    fn wrong_kind_is_ignored() {
        let mut p = program();
        assert!(!p.bind("a", ParameterValue::Vec2([1.0, 2.0])));
        assert_eq!(p.value("a"), None);
    }

    #[test]
    fn values_persist_between_binds() {
        let mut p = program();
        p.bind_all(&Parameters::new().with("a", 1.0f32));
        p.bind_all(&Parameters::new().with("b", [3.0f32, 4.0]));
        assert_eq!(p.value("a"), Some(&ParameterValue::Float(1.0)));
        assert_eq!(
            p.uniform_lanes([8, 4]),
            vec![[8.0, 4.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0], [3.0, 4.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn surface_bindings_follow_declaration_order() {
        let mut p = program();
        p.bind("dst", ParameterValue::Surface(SurfaceHandle(9)));
        let bindings: Vec<_> = p.surface_bindings().collect();
        assert_eq!(bindings, vec![("src", None), ("dst", Some(SurfaceHandle(9)))]);
        let source = p.wgsl_source();
        assert!(source.contains("@group(0) @binding(1) var src: texture_2d<f32>;"));
        assert!(source.contains("@group(0) @binding(4) var dst_sampler: sampler;"));
    }

    #[test]
    fn defines_are_emitted_as_constants() {
        let p = program().with_define("SIZE", 64.0);
        assert!(p.wgsl_source().starts_with("const SIZE: f32 = 64.0;"));
    }

    #[test]
    fn redeclaring_changes_identity() {
        let p = program();
        let id = p.id();
        let clone = p.clone();
        assert_eq!(clone.id(), id);
        let p = p.with_parameter("c", ParameterKind::Vec4);
        assert_ne!(p.id(), id);
    }
}
