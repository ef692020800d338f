//! Renders the btaflash(1) man page from the clap definition
//!
//! Usage: gen-manpage [DIR]   (writes DIR/btaflash.1, DIR defaults to ./man)

use clap::CommandFactory;
use std::fs;
use std::path::PathBuf;

#[path = "../cli.rs"]
#[allow(dead_code)]
mod cli;

const MAN_PAGE: &str = "btaflash.1";

fn main() -> std::io::Result<()> {
    let dir = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&dir)?;

    let mut page = Vec::new();
    clap_mangen::Man::new(cli::Cli::command())
        .title("BTAFLASH")
        .section("1")
        .render(&mut page)?;

    let path = dir.join(MAN_PAGE);
    fs::write(&path, page)?;
    println!("{}", path.display());

    Ok(())
}
