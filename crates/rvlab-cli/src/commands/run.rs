//! `rvlab run` command: fetch a relay ticket and drive one execution.

use std::io::Write;

use anyhow::{Context, Result, bail};
use base64::prelude::*;
use clap::Args;
use rvlab_relay::{ElfPayload, OutputKind, RelayConfig, SessionStatus, SessionUpdate};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::opts::ClientOpts;
use crate::output::register_table;

use super::setup_logging;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Folder whose artifact is executed
    #[arg(long)]
    pub folder: String,

    /// Override the backend URL from the ticket (env: RVLAB_BACKEND_URL)
    #[arg(long, env = "RVLAB_BACKEND_URL")]
    pub backend: Option<String>,

    /// Skip the register table at the end
    #[arg(long)]
    pub no_registers: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticket {
    elf_file_name: String,
    folder_name: String,
    ws_url: String,
    elf_data: String,
}

pub async fn cmd_run(opts: &ClientOpts, args: &RunArgs) -> Result<()> {
    setup_logging("warn");

    let body = opts
        .post("/websocket", &json!({ "folderName": args.folder }))
        .await?;
    let ticket: Ticket = serde_json::from_value(body).context("decode relay ticket")?;
    let elf_data = BASE64_STANDARD
        .decode(ticket.elf_data.as_bytes())
        .context("decode elfData")?;
    let url = args.backend.clone().unwrap_or(ticket.ws_url);
    eprintln!(
        "{}: {} ({} bytes) -> {url}",
        ticket.folder_name,
        ticket.elf_file_name,
        elf_data.len()
    );

    let payload = ElfPayload {
        folder_name: ticket.folder_name.clone(),
        file_name: ticket.elf_file_name,
        elf_data,
    };
    let mut handle =
        rvlab_relay::start(&RelayConfig::new(url), &ticket.folder_name, Some(payload)).await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    while let Some(update) = handle.next_update().await {
        match update {
            SessionUpdate::Status { message, .. } => eprintln!("[{message}]"),
            SessionUpdate::Output(entry) => match entry.kind {
                OutputKind::Cpu => {
                    write!(stdout, "{}", entry.text)?;
                    stdout.flush()?;
                }
                OutputKind::Result => writeln!(stdout, "\n{}", entry.text)?,
                OutputKind::Echo => {}
            },
            SessionUpdate::Registers(_) => {}
            SessionUpdate::InputRequested { prompt } => {
                if let Some(prompt) = prompt {
                    write!(stdout, "{prompt}")?;
                    stdout.flush()?;
                }
                match stdin.next_line().await.context("read stdin")? {
                    Some(line) => handle.send_input(line).await?,
                    None => {
                        tracing::warn!("stdin closed while the program waits for input");
                        break;
                    }
                }
            }
            SessionUpdate::Finished { .. } => break,
        }
    }

    let session = handle.close().await;
    if !args.no_registers {
        eprintln!();
        eprint!("{}", register_table(session.registers()));
    }
    let stats = session.stats();
    tracing::info!(
        sent = stats.bytes_sent,
        events = stats.events_received,
        inputs = stats.inputs_sent,
        "session ended"
    );
    match session.status() {
        SessionStatus::Completed | SessionStatus::Disconnected => Ok(()),
        status => bail!(
            "execution {status}: {}",
            session.error().unwrap_or(session.message())
        ),
    }
}
