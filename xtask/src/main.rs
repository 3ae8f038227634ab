//! Development tasks for saytype
//!
//! Usage:
//!   cargo xtask install [--gpu <backend>]  Install binary and man pages under /usr/local
//!   cargo xtask uninstall                  Remove what install put there
//!   cargo xtask man                        Generate man pages into target/man
//!   cargo xtask dist [--gpu <backend>]     Build release binary for distribution

use anyhow::{bail, Context};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

const PREFIX: &str = "/usr/local";
const GPU_BACKENDS: &[&str] = &["vulkan", "cuda", "metal", "hipblas"];

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let Some(command) = args.first() else {
        print_help();
        return ExitCode::SUCCESS;
    };

    let result = gpu_feature(&args[1..]).and_then(|gpu| match command.as_str() {
        "install" => install(gpu.as_deref()),
        "uninstall" => uninstall(),
        "man" => man_pages().map(|dir| println!("==> Man pages in {:?}", dir)),
        "dist" => dist(gpu.as_deref()),
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        cmd => {
            print_help();
            Err(anyhow::anyhow!("Unknown command: {}", cmd))
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    eprintln!(
        r#"
saytype development tasks

Usage: cargo xtask <COMMAND> [OPTIONS]

Commands:
  install    Build release binary, install it and its man pages (requires sudo)
  uninstall  Remove saytype and its man pages (requires sudo)
  man        Generate man pages into target/man
  dist       Build optimized release binary for distribution

Options:
  --gpu <backend>  Build whisper with GPU support: vulkan, cuda, metal, hipblas

Examples:
  cargo xtask install             # CPU-only build
  cargo xtask install --gpu cuda  # CUDA build
  cargo xtask dist --gpu vulkan
"#
    );
}

/// Cargo feature for `--gpu <backend>`
fn gpu_feature(args: &[String]) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == "--gpu") else {
        return Ok(None);
    };
    let backend = args
        .get(pos + 1)
        .context("--gpu needs a backend name")?
        .to_lowercase();
    if !GPU_BACKENDS.contains(&backend.as_str()) {
        bail!(
            "Unknown GPU backend '{}', expected one of: {}",
            backend,
            GPU_BACKENDS.join(", ")
        );
    }
    Ok(Some(format!("gpu-{}", backend)))
}

/// Get the project root directory
fn project_root() -> anyhow::Result<PathBuf> {
    let dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => env::current_dir()?,
    };

    // xtask is in a subdirectory, go up one level
    Ok(dir.parent().unwrap_or(&dir).to_path_buf())
}

fn run(cmd: &mut Command, what: &str) -> anyhow::Result<()> {
    let status = cmd
        .status()
        .with_context(|| format!("failed to run {}", what))?;
    if !status.success() {
        bail!("{} failed", what);
    }
    Ok(())
}

/// `cargo build --release`, with man pages generated alongside
fn build_release(root: &Path, gpu: Option<&str>) -> anyhow::Result<PathBuf> {
    match gpu {
        Some(feature) => println!("==> Building release binary ({})...", feature),
        None => println!("==> Building release binary..."),
    }

    let mut cmd = Command::new("cargo");
    cmd.args(["build", "--release"]).current_dir(root);
    if let Some(feature) = gpu {
        cmd.args(["--features", feature]);
    }
    run(&mut cmd, "cargo build")?;

    let binary = root.join("target/release/saytype");
    if !binary.exists() {
        bail!("Binary not found at {:?}", binary);
    }
    Ok(binary)
}

/// Generate man pages through build.rs and copy them to target/man
fn man_pages() -> anyhow::Result<PathBuf> {
    let root = project_root()?;
    let out = root.join("target/man");
    std::fs::create_dir_all(&out)?;

    println!("==> Generating man pages...");
    run(
        Command::new("cargo")
            .args(["build", "--release"])
            .env("SAYTYPE_GEN_MANPAGES", "1")
            .current_dir(&root),
        "cargo build",
    )?;

    // build.rs writes into its OUT_DIR; collect every saytype*.1 found there
    let build_dir = root.join("target/release/build");
    let mut found = 0;
    for entry in std::fs::read_dir(&build_dir)?.flatten() {
        let man_dir = entry.path().join("out/man");
        let Ok(pages) = std::fs::read_dir(&man_dir) else {
            continue;
        };
        for page in pages.flatten() {
            let path = page.path();
            if path.extension().is_some_and(|ext| ext == "1") {
                std::fs::copy(&path, out.join(page.file_name()))?;
                found += 1;
            }
        }
    }

    if found == 0 {
        bail!("No man pages found under {:?}", build_dir);
    }
    Ok(out)
}

/// Build release binary and install it with its man pages
fn install(gpu: Option<&str>) -> anyhow::Result<()> {
    let root = project_root()?;
    let binary = build_release(&root, gpu)?;
    let target = format!("{}/bin/saytype", PREFIX);

    println!("==> Installing to {}...", target);
    run(
        Command::new("sudo")
            .arg("install")
            .arg("-Dm755")
            .arg(&binary)
            .arg(&target),
        "install (sudo required)",
    )?;

    let man_dir = man_pages()?;
    for page in std::fs::read_dir(&man_dir)?.flatten() {
        let dest = format!("{}/share/man/man1/{}", PREFIX, page.file_name().to_string_lossy());
        run(
            Command::new("sudo")
                .arg("install")
                .arg("-Dm644")
                .arg(page.path())
                .arg(&dest),
            "install man page",
        )?;
    }

    println!("==> Installed successfully!");
    let _ = Command::new(&target).arg("--version").status();
    Ok(())
}

/// Remove saytype from /usr/local
fn uninstall() -> anyhow::Result<()> {
    println!("==> Removing {}/bin/saytype and man pages...", PREFIX);
    run(
        Command::new("sh").args([
            "-c",
            &format!(
                "sudo rm -f {p}/bin/saytype {p}/share/man/man1/saytype.1 {p}/share/man/man1/saytype-*.1",
                p = PREFIX
            ),
        ]),
        "uninstall (sudo required)",
    )?;

    println!("==> Uninstalled successfully!");
    Ok(())
}

/// Build optimized release binary for distribution
fn dist(gpu: Option<&str>) -> anyhow::Result<()> {
    let root = project_root()?;
    let binary = build_release(&root, gpu)?;
    println!("==> Built: {:?}", binary);

    let _ = Command::new("ls").arg("-lh").arg(&binary).status();
    let _ = Command::new(&binary).arg("--version").status();
    Ok(())
}
