//! `rvlab folders` commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Value, json};

use crate::opts::ClientOpts;
use crate::output::print_success;

use super::setup_logging;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// C source to build; `-` reads stdin. Omit to build an empty program.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

pub async fn cmd_create(opts: &ClientOpts, args: &CreateArgs) -> Result<()> {
    setup_logging("warn");
    let program = match &args.file {
        Some(path) if path.as_os_str() == "-" => {
            let mut text = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut text)
                .context("read program from stdin")?;
            Some(text)
        }
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("read program {}", path.display()))?,
        ),
        None => None,
    };

    let body = opts
        .post("/folders", &json!({ "programCode": program }))
        .await?;
    print_success(opts, &body, print_created)
}

fn print_created(body: &Value) {
    let text = |key: &str| body[key].as_str().unwrap_or_default().to_string();
    let mark = |key: &str| if body[key] == true { "ok" } else { "FAILED" };

    println!("{} ({} live)", text("folderName"), body["totalFolders"]);
    if let Some(evicted) = body["evictedFolder"].as_str() {
        eprintln!("notice: evicted {evicted}");
    }
    println!("  copy    [{}] {}", mark("filesCopied"), text("filesCopyMessage"));
    println!(
        "  source  [{}] {}",
        mark("programFile"),
        text("programFileMessage")
    );
    println!(
        "  build   [{}] {}",
        mark("makeCommand"),
        text("makeCommandMessage")
    );
    let output = text("makeOutput");
    if !output.trim().is_empty() {
        println!();
        print!("{output}");
        if !output.ends_with('\n') {
            println!();
        }
    }
}

pub async fn cmd_list(opts: &ClientOpts) -> Result<()> {
    setup_logging("warn");
    let body = opts.get("/folders").await?;
    print_success(opts, &body, |body| {
        let folders = body["folders"].as_array().cloned().unwrap_or_default();
        if folders.is_empty() {
            println!("no folders");
            return;
        }
        for folder in folders {
            println!(
                "{}  {}",
                folder["createdAt"].as_str().unwrap_or_default(),
                folder["name"].as_str().unwrap_or_default()
            );
        }
    })
}
