//! `glprimer check`: validate settings and every file a lesson reads,
//! without opening a window or touching the GL driver.

use std::fs;
use std::path::Path;

use anyhow::{bail, Result};
use renderer::load_image;

use crate::cli::RunArgs;
use crate::settings::{resolve_settings, ShaderSource};

pub fn run_check(args: &RunArgs) -> Result<()> {
    let settings = resolve_settings(args)?;
    let lesson = &settings.lesson;
    let window = &settings.renderer.window;

    match &settings.source {
        Some(path) => println!("Config:   {}", path.display()),
        None => println!("Config:   (defaults)"),
    }
    println!("Lesson:   {}", lesson.kind);
    println!("Window:   {}x{} \"{}\"", window.width, window.height, window.title);

    let mut problems = Vec::new();
    match &lesson.shaders {
        ShaderSource::Builtin => println!("Shaders:  built-in {} sources", lesson.kind),
        ShaderSource::Files { vertex, fragment } => {
            println!("Shaders:");
            for (stage, path) in [("vertex", vertex), ("fragment", fragment)] {
                match check_shader(path) {
                    Ok(bytes) => println!("  {stage:<8} {} ({bytes} bytes)", path.display()),
                    Err(problem) => problems.push(format!("{stage} shader: {problem}")),
                }
            }
        }
    }

    if lesson.kind.uses_textures() {
        if lesson.textures.is_empty() {
            println!("Textures: generated checkerboards");
        } else {
            println!("Textures:");
            for (unit, entry) in lesson.textures.iter().enumerate() {
                match load_image(&entry.path, entry.flip_vertically) {
                    Ok(image) => println!(
                        "  unit {unit}   {} ({}x{}, {} channels)",
                        entry.path.display(),
                        image.width,
                        image.height,
                        image.source_channels
                    ),
                    Err(err) => problems.push(format!("texture unit {unit}: {err}")),
                }
            }
        }
    }

    if problems.is_empty() {
        println!("OK");
        return Ok(());
    }
    for problem in &problems {
        eprintln!("error: {problem}");
    }
    bail!("{} problem(s) found", problems.len())
}

fn check_shader(path: &Path) -> Result<usize, String> {
    let source =
        fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    if source.trim().is_empty() {
        return Err(format!("{} is empty", path.display()));
    }
    Ok(source.len())
}
