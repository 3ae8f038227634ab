//! Build script for saytype
//!
//! Generates man pages from CLI definitions using clap_mangen.

use clap::CommandFactory;
use clap_mangen::Man;
use std::env;
use std::fs::{self, File};
use std::io::Error;
use std::path::{Path, PathBuf};

// Include the CLI module
include!("src/cli.rs");

fn render(cmd: clap::Command, path: &Path) -> Result<(), Error> {
    let mut file = File::create(path)?;
    Man::new(cmd).render(&mut file)
}

fn main() -> Result<(), Error> {
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=SAYTYPE_GEN_MANPAGES");

    // Only generate man pages for release builds or when explicitly requested
    let profile = env::var("PROFILE").unwrap_or_default();
    if env::var("SAYTYPE_GEN_MANPAGES").is_err() && profile != "release" {
        return Ok(());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap_or_else(|_| "target".to_string()));
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir)?;

    let cmd = Cli::command();
    render(cmd.clone(), &man_dir.join("saytype.1"))?;

    // One page per subcommand, e.g. saytype-record.1
    for sub in cmd.get_subcommands().filter(|s| s.get_name() != "help") {
        let name = format!("saytype-{}", sub.get_name());
        render(sub.clone(), &man_dir.join(format!("{}.1", name)))?;
    }

    Ok(())
}
