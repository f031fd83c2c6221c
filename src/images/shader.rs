// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentShader {
    //may need additional type design for future backends
    pub(crate) label: &'static str,
    pub(crate) wgsl_code: String,
}

impl FragmentShader {
    /// A WGSL fragment stage.
    ///
    /// The code must define `@fragment fn fs_main(in: VertexOutput) -> @location(0) vec4<f32>`.
    /// `VertexOutput`, the `parameters` uniform block and one texture/sampler pair per surface
    /// parameter are declared for it; see [`crate::images::program::Program::wgsl_source`].
    pub fn new(label: &'static str, wgsl_code: String) -> Self {
        Self { label, wgsl_code }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn wgsl_code(&self) -> &str {
        &self.wgsl_code
    }
}
