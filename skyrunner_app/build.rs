// build.rs
// Compiles the GLSL sources under resources/shaders to SPIR-V in <workspace>/target/shaders

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 6] = ["vert", "frag", "comp", "geom", "tesc", "tese"];

/// Whether `out_file` is missing or older than `source`
fn is_stale(source: &Path, out_file: &Path) -> bool {
    let modified = |path: &Path| std::fs::metadata(path).and_then(|meta| meta.modified()).ok();
    match (modified(source), modified(out_file)) {
        (Some(src), Some(dst)) => src > dst,
        _ => true,
    }
}

/// Recursively compile all shader files in a directory
fn compile_shaders_recursive(
    shader_dir: &Path,
    include_dir: &Path,
    target_dir: &Path,
    glslc: &Path,
    compiled: &mut u32,
) -> Result<(), String> {
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(_) => {
            println!("cargo:warning=No shader directory found at {}", shader_dir.display());
            return Ok(());
        }
    };

    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                println!("cargo:warning=Error reading shader directory entry: {e}");
                continue;
            }
        };

        if path.is_dir() {
            compile_shaders_recursive(&path, include_dir, target_dir, glslc, compiled)?;
            continue;
        }

        // .glsl files are includes, not standalone stages
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            continue;
        };
        if !SHADER_EXTENSIONS.contains(&ext) {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };

        // plain.vert -> plain.vert.spv keeps stages of one program apart
        let mut out_name = file_name.to_os_string();
        out_name.push(".spv");
        let out_file = target_dir.join(out_name);

        if !is_stale(&path, &out_file) {
            continue;
        }

        let status = Command::new(glslc)
            .arg("-I")
            .arg(include_dir)
            .arg(&path)
            .arg("-o")
            .arg(&out_file)
            .status()
            .map_err(|e| format!("failed to run glslc for {}: {e}", path.display()))?;

        if !status.success() {
            return Err(format!(
                "glslc failed for {} with exit code {}",
                path.display(),
                status.code().unwrap_or(-1)
            ));
        }
        *compiled += 1;
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        println!("cargo:warning=SKIP_SHADERS set, shader compilation skipped");
        return;
    }

    let Ok(vulkan_sdk) = env::var("VULKAN_SDK") else {
        println!("cargo:warning=VULKAN_SDK not set, shader compilation skipped");
        return;
    };

    let glslc = if cfg!(target_os = "windows") {
        PathBuf::from(&vulkan_sdk).join("Bin").join("glslc.exe")
    } else {
        PathBuf::from(&vulkan_sdk).join("bin").join("glslc")
    };
    if !glslc.exists() {
        println!(
            "cargo:warning=glslc not found at {}, shader compilation skipped",
            glslc.display()
        );
        return;
    }

    let manifest_dir =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let shader_dir = manifest_dir.join("resources").join("shaders");
    let target_dir = manifest_dir.join("..").join("target").join("shaders");

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {}: {e}", target_dir.display());
        return;
    }

    let mut compiled = 0;
    let result =
        compile_shaders_recursive(&shader_dir, &shader_dir, &target_dir, &glslc, &mut compiled);
    if let Err(e) = result {
        panic!("Shader compilation failed: {e}");
    }
    if compiled > 0 {
        println!("cargo:warning=Compiled {compiled} shader(s) into {}", target_dir.display());
    }
}
