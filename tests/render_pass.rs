// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wavefield::bindings::parameters::{ParameterKind, ParameterValue, Parameters};
use wavefield::bindings::software::texture::Texel;
use wavefield::bindings::surface::{SurfaceConfig, SurfaceHandle, Target};
use wavefield::images::backend::RenderBackend;
use wavefield::images::program::Program;
use wavefield::images::render_pass::{AutoClearGuard, clear, render};
use wavefield::images::shader::FragmentShader;
use wavefield::pixel_formats::{Float4, ReadFormat, SurfaceFormat};
use wavefield::{Error, SoftwareBackend};

fn exact_surface(backend: &mut SoftwareBackend) -> SurfaceHandle {
    backend
        .allocate_surface(SurfaceConfig::new(4, 4).with_format(SurfaceFormat::Rgba32Float))
        .unwrap()
}

fn fill_program() -> Program {
    Program::new("fill", FragmentShader::new("fill", String::new()))
        .with_parameter("value", ParameterKind::Vec4)
        .with_software_kernel(|input| input.vec4("value"))
}

fn copy_program() -> Program {
    Program::new("copy", FragmentShader::new("copy", String::new()))
        .with_parameter("src", ParameterKind::Surface)
        .with_software_kernel(|input| input.sample("src", input.uv))
}

fn first_texel(backend: &SoftwareBackend, surface: SurfaceHandle) -> Float4 {
    backend.texture(surface).unwrap()[Texel::ZERO]
}

#[test]
fn undeclared_parameters_are_skipped() {
    let mut backend = SoftwareBackend::new(4, 4);
    let surface = exact_surface(&mut backend);
    let mut program = fill_program();
    let parameters = Parameters::new()
        .with("value", Float4::splat(0.5))
        .with("speed", 2.0f32)
        .with("origin", [0.1f32, 0.2]);
    render(&mut backend, Target::Surface(surface), &mut program, &parameters).unwrap();
    assert_eq!(first_texel(&backend, surface), Float4::splat(0.5));
    assert_eq!(backend.stats().fullscreen_draws, 1);
}

#[test]
fn bound_values_persist_between_renders() {
    let mut backend = SoftwareBackend::new(4, 4);
    let surface = exact_surface(&mut backend);
    let mut program = fill_program();
    let parameters = Parameters::new().with("value", Float4::splat(0.25));
    render(&mut backend, Target::Surface(surface), &mut program, &parameters).unwrap();
    clear(&mut backend, Target::Surface(surface)).unwrap();
    assert_eq!(first_texel(&backend, surface), Float4::ZERO);

    render(&mut backend, Target::Surface(surface), &mut program, &Parameters::new()).unwrap();
    assert_eq!(first_texel(&backend, surface), Float4::splat(0.25));
}

#[test]
fn mismatched_kind_keeps_the_previous_value() {
    let mut backend = SoftwareBackend::new(4, 4);
    let surface = exact_surface(&mut backend);
    let mut program = fill_program();
    assert!(program.bind("value", ParameterValue::Vec4(Float4::ONE)));
    assert!(!program.bind("value", ParameterValue::Float(0.5)));
    render(
        &mut backend,
        Target::Surface(surface),
        &mut program,
        &Parameters::new().with("value", 0.5f32),
    )
    .unwrap();
    assert_eq!(first_texel(&backend, surface), Float4::ONE);
}

#[test]
fn unbound_parameters_read_as_zero() {
    let mut backend = SoftwareBackend::new(4, 4);
    let surface = exact_surface(&mut backend);
    backend.write_texels(surface, |_| Float4::ONE).unwrap();
    let mut program = fill_program();
    render(&mut backend, Target::Surface(surface), &mut program, &Parameters::new()).unwrap();
    assert_eq!(first_texel(&backend, surface), Float4::ZERO);
}

#[test]
fn unbound_surface_is_an_error() {
    let mut backend = SoftwareBackend::new(4, 4);
    let surface = exact_surface(&mut backend);
    let mut program = copy_program();
    let result = render(&mut backend, Target::Surface(surface), &mut program, &Parameters::new());
    match result {
        Err(Error::UnboundParameter { program, parameter }) => {
            assert_eq!(program, "copy");
            assert_eq!(parameter, "src");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(backend.stats().fullscreen_draws, 0);
}

#[test]
fn sampling_the_target_is_an_error() {
    let mut backend = SoftwareBackend::new(4, 4);
    let surface = exact_surface(&mut backend);
    let mut program = copy_program();
    let parameters = Parameters::new().with("src", surface);
    assert!(matches!(
        render(&mut backend, Target::Surface(surface), &mut program, &parameters),
        Err(Error::TargetIsBound { .. })
    ));
}

#[test]
fn copy_between_surfaces() {
    let mut backend = SoftwareBackend::new(4, 4);
    let src = exact_surface(&mut backend);
    let dst = exact_surface(&mut backend);
    backend
        .write_texels(src, |t| Float4::new(t.x as f32, t.y as f32, 0.0, 1.0))
        .unwrap();
    let mut program = copy_program();
    render(
        &mut backend,
        Target::Surface(dst),
        &mut program,
        &Parameters::new().with("src", src),
    )
    .unwrap();
    assert_eq!(backend.texture(dst), backend.texture(src));
}

#[test]
fn programs_without_a_kernel_cannot_run_in_software() {
    let mut backend = SoftwareBackend::new(4, 4);
    let surface = exact_surface(&mut backend);
    let mut program = Program::new("gpu only", FragmentShader::new("gpu only", String::new()));
    assert!(matches!(
        render(&mut backend, Target::Surface(surface), &mut program, &Parameters::new()),
        Err(Error::NoSoftwareKernel(name)) if name == "gpu only"
    ));
}

#[test]
fn framebuffer_is_a_target() {
    let mut backend = SoftwareBackend::new(2, 2);
    let mut program = fill_program();
    render(
        &mut backend,
        Target::Framebuffer,
        &mut program,
        &Parameters::new().with("value", Float4::new(1.0, 0.0, 0.0, 1.0)),
    )
    .unwrap();
    let bytes = backend
        .read_pixels(Target::Framebuffer, 0, 0, 2, 1, ReadFormat::Rgba8Unorm)
        .unwrap();
    assert_eq!(bytes, vec![255, 0, 0, 255, 255, 0, 0, 255]);
}

#[test]
fn auto_clear_guard_restores_on_drop() {
    let mut backend = SoftwareBackend::new(2, 2);
    backend.set_auto_clear(false);
    {
        let guard = AutoClearGuard::new(&mut backend, true);
        assert!(guard.auto_clear());
    }
    assert!(!backend.auto_clear());
}
