// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The render pass executor.

[`render`] binds parameters into a [`Program`] and draws it over a whole target.  Binding is
permissive: names the program doesn't declare are skipped, so one [`Parameters`] set can be
shared by every pass of a frame.

```
use wavefield::SoftwareBackend;
use wavefield::bindings::parameters::{ParameterKind, Parameters};
use wavefield::bindings::surface::{SurfaceConfig, Target};
use wavefield::images::backend::RenderBackend;
use wavefield::images::program::Program;
use wavefield::images::render_pass::render;
use wavefield::images::shader::FragmentShader;
use wavefield::pixel_formats::Float4;

let mut backend = SoftwareBackend::new(16, 16);
let surface = backend.allocate_surface(SurfaceConfig::new(8, 8)).unwrap();
let mut fill = Program::new("fill", FragmentShader::new("fill", String::new()))
    .with_parameter("value", ParameterKind::Vec4)
    .with_software_kernel(|input| input.vec4("value"));
let parameters = Parameters::new()
    .with("value", Float4::splat(0.5))
    .with("ignored", 1.0f32);
render(&mut backend, Target::Surface(surface), &mut fill, &parameters).unwrap();
```
*/
use crate::bindings::parameters::Parameters;
use crate::bindings::surface::Target;
use crate::error::Error;
use crate::images::backend::RenderBackend;
use crate::images::program::{Program, ZERO_PROGRAM};
use std::ops::{Deref, DerefMut};

/// Binds `parameters` into `program` and draws it over all of `target`.
///
/// Values persist in `program`, so a parameter missing from `parameters` keeps whatever was
/// bound last time.
///
/// # Errors
///
/// * [`Error::UnboundParameter`] if a declared surface parameter has never been bound.
/// * [`Error::TargetIsBound`] if `target` is also one of the program's sampled surfaces.
/// * Whatever the backend reports for the draw itself.
pub fn render<B: RenderBackend + ?Sized>(
    backend: &mut B,
    target: Target,
    program: &mut Program,
    parameters: &Parameters,
) -> Result<(), Error> {
    let bound = program.bind_all(parameters);
    logwise::trace_sync!(
        "render {program} bound {bound} of {offered} parameters",
        program = program.name().to_string(),
        bound = bound,
        offered = parameters.len()
    );
    for (name, surface) in program.surface_bindings() {
        match surface {
            None => {
                return Err(Error::UnboundParameter {
                    program: program.name().to_string(),
                    parameter: name.to_string(),
                });
            }
            Some(handle) if target == Target::Surface(handle) => {
                return Err(Error::TargetIsBound {
                    program: program.name().to_string(),
                    parameter: name.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    backend.render_fullscreen_quad(target, program)
}

/// Sets every texel of `target` to zero.
pub fn clear<B: RenderBackend + ?Sized>(backend: &mut B, target: Target) -> Result<(), Error> {
    backend.render_fullscreen_quad(target, &ZERO_PROGRAM)
}

/**
Sets the backend's auto-clear flag for the guard's lifetime.

The previous value is restored when the guard drops, whichever way the scope exits.  The
guard dereferences to the backend, so passes can be issued through it.

```
use wavefield::SoftwareBackend;
use wavefield::images::backend::RenderBackend;
use wavefield::images::render_pass::AutoClearGuard;

let mut backend = SoftwareBackend::new(4, 4);
{
    let guard = AutoClearGuard::new(&mut backend, false);
    assert!(!guard.auto_clear());
}
assert!(backend.auto_clear());
```
*/
#[must_use]
pub struct AutoClearGuard<'a, B: RenderBackend + ?Sized> {
    backend: &'a mut B,
    previous: bool,
}

impl<'a, B: RenderBackend + ?Sized> AutoClearGuard<'a, B> {
    pub fn new(backend: &'a mut B, auto_clear: bool) -> Self {
        let previous = backend.auto_clear();
        backend.set_auto_clear(auto_clear);
        AutoClearGuard { backend, previous }
    }
}

impl<B: RenderBackend + ?Sized> Deref for AutoClearGuard<'_, B> {
    type Target = B;

    fn deref(&self) -> &Self::Target {
        self.backend
    }
}

impl<B: RenderBackend + ?Sized> DerefMut for AutoClearGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.backend
    }
}

impl<B: RenderBackend + ?Sized> Drop for AutoClearGuard<'_, B> {
    fn drop(&mut self) {
        self.backend.set_auto_clear(self.previous);
    }
}
