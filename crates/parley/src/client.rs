//! Minimal terminal client: stdin lines go to the server, server lines go
//! to stdout.

use anyhow::{Context, Result};
use parley_transport::{LineReader, LineWriter};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::select;
use tracing::{info, warn};

use crate::cli::ClientArgs;

/// Typing this ends the client without sending anything.
pub const EXIT_COMMAND: &str = "exit";

pub async fn run(args: ClientArgs) -> Result<()> {
    let addr = args.server_addr();
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {addr}"))?;
    info!("connected to {addr}");

    let (reader, writer) = stream.into_split();
    let mut reader = LineReader::new(reader);
    let mut writer = LineWriter::new(writer);

    if let Some(name) = &args.name {
        writer
            .send_line(&format!("rename {name}"))
            .await
            .context("failed to send rename")?;
    }

    let mut stdin = BufReader::new(io::stdin());
    run_client_loop(&mut reader, &mut writer, &mut stdin).await?;

    if let Err(error) = writer.shutdown().await {
        warn!(%error, "failed to shutdown client writer cleanly");
    }
    Ok(())
}

async fn run_client_loop(
    reader: &mut LineReader<OwnedReadHalf>,
    writer: &mut LineWriter<OwnedWriteHalf>,
    stdin: &mut BufReader<io::Stdin>,
) -> Result<()> {
    let mut input = String::new();
    loop {
        input.clear();
        select! {
            line = reader.next_line() => match line {
                Ok(Some(line)) => write_stdout(&line).await?,
                Ok(None) => {
                    write_stdout("*** server closed the connection").await?;
                    break;
                }
                Err(e) if e.is_transient() => warn!(error = %e, "skipped server line"),
                Err(e) => return Err(e).context("connection lost"),
            },
            read = stdin.read_line(&mut input) => {
                if read? == 0 {
                    break;
                }
                let text = input.trim_end_matches(['\r', '\n']);
                if text.trim() == EXIT_COMMAND {
                    break;
                }
                writer.send_line(text).await.context("failed to send line")?;
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(%error, "ctrl-c handler failed");
                }
                break;
            }
        }
    }
    Ok(())
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
