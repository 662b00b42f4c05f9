// Compiles the GLSL sources in shaders/ to SPIR-V next to them. Requires
// glslc from the Vulkan SDK; skipped with a warning when VULKAN_SDK is not
// set so library-only builds still work.

use std::env;
use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    let vulkan_sdk = match env::var("VULKAN_SDK") {
        Ok(sdk) => sdk,
        Err(_) => {
            eprintln!("warning: VULKAN_SDK not set, shader compilation skipped");
            return;
        }
    };

    let glslc = if cfg!(target_os = "windows") {
        format!("{}\\Bin\\glslc.exe", vulkan_sdk)
    } else {
        format!("{}/bin/glslc", vulkan_sdk)
    };
    if !Path::new(&glslc).exists() {
        eprintln!("warning: glslc not found at {}, shader compilation skipped", glslc);
        return;
    }

    let entries = match std::fs::read_dir("shaders") {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("warning: no shaders directory: {}", e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_shader = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("vert") | Some("frag")
        );
        if !is_shader {
            continue;
        }

        // scene.vert -> scene.vert.spv
        let mut out_file = path.clone().into_os_string();
        out_file.push(".spv");

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: compiled {:?}", path.file_name().unwrap_or_default());
            }
            Ok(s) => panic!("glslc failed for {:?} with exit code {:?}", path, s.code()),
            Err(e) => panic!("failed to run glslc for {:?}: {}", path, e),
        }
    }
}
