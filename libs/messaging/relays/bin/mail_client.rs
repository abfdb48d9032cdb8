//! Line-oriented mail client
//!
//! Usage:
//!   mail_client <username> <server_ip> <port>
//!
//! Each stdin line of the form `<user>@<ipv4> <message>` is sent as a mail.
//! `close` ends the session.

use anyhow::{bail, Context, Result};
use clap::Parser;
use mail_relays::codec::{Envelope, Frame, FrameType, MAX_BODY_CHARS, QUIT_COMMAND};
use mail_relays::init_logging;
use mail_relays::network::{read_frame, write_frame, FrameLimits, TcpConnection, TransportError};
use std::net::{IpAddr, SocketAddr};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const SYNTAX_HINT: &str = "syntax: <recp_user>@<ip_addr> <mesg>";

#[derive(Parser, Debug)]
#[command(name = "mail_client")]
#[command(about = "Send and receive mail through a mail relay")]
#[command(version)]
struct Args {
    /// Name to announce to the relay
    username: String,

    /// Relay IPv4 address
    server_ip: IpAddr,

    /// Relay TCP port
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, false)?;

    let server = SocketAddr::new(args.server_ip, args.port);
    let limits = FrameLimits::default();
    let connection = TcpConnection::connect(server, limits)
        .await
        .with_context(|| format!("could not connect to {server}"))?;

    let (mut reader, mut writer) = connection.into_split();

    // Frames are read on their own task; read_frame is not cancel-safe
    let (frames_tx, mut frames_rx) = mpsc::channel::<Result<Frame, TransportError>>(16);
    tokio::spawn(async move {
        loop {
            let result = read_frame(&mut reader, &limits).await;
            let failed = result.is_err();
            if frames_tx.send(result).await.is_err() || failed {
                break;
            }
        }
    });

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            incoming = frames_rx.recv() => {
                let frame = match incoming {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        debug!("Read failed: {}", e);
                        server_closed();
                    }
                    None => server_closed(),
                };
                handle_frame(&frame, &args.username, &mut writer).await?;
            }
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    // stdin EOF ends the session like `close`
                    return quit(&mut writer).await;
                };
                if line.trim_end() == QUIT_COMMAND {
                    return quit(&mut writer).await;
                }
                send_mail(&line, &mut writer).await?;
            }
        }
    }
}

async fn handle_frame(frame: &Frame, username: &str, writer: &mut OwnedWriteHalf) -> Result<()> {
    match frame.frame_type() {
        Ok(FrameType::Welcome) => {
            println!(">> {}", frame.payload_text());
            write_frame(writer, &Frame::text(FrameType::UserName, username)).await?;
        }
        Ok(FrameType::EmailToClient) => {
            println!("New email received !\n>> {}", frame.payload_text());
        }
        Ok(FrameType::ServerError) => {
            println!(">> {}", frame.payload_text());
        }
        _ => bail!("unexpected reply from server: {frame}"),
    }
    Ok(())
}

async fn send_mail(line: &str, writer: &mut OwnedWriteHalf) -> Result<()> {
    let line = line.trim_end_matches(['\r', '\n']);
    match Envelope::parse(line, MAX_BODY_CHARS) {
        Ok(envelope) => {
            write_frame(writer, &Frame::text(FrameType::EmailToServer, envelope.to_wire())).await?;
        }
        Err(e) => {
            warn!("Rejected input line: {}", e);
            eprintln!("error: {e}.\n{SYNTAX_HINT}");
        }
    }
    Ok(())
}

async fn quit(writer: &mut OwnedWriteHalf) -> Result<()> {
    write_frame(writer, &Frame::empty(FrameType::CloseConnection)).await?;
    writer.shutdown().await?;
    Ok(())
}

fn server_closed() -> ! {
    eprintln!("Server closed the connection.");
    std::process::exit(1);
}
