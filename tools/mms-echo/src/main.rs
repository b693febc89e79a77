// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! mms-echo - Receive and send MMS messages over UDP
//!
//! `listen` runs an inbound service and prints every message routed to an
//! application id; `send` pushes one message through the fragmenting sender.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use mms::{InboundService, Message, MmsConfig, MmsStack, SendStatus, SuiteId};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Receive and send MMS messages over UDP
#[derive(Parser, Debug)]
#[command(name = "mms-echo")]
#[command(version)]
#[command(about = "Receive and send MMS messages over UDP")]
struct Args {
    /// JSON configuration file (flags override its values)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Device phone number used as sender address
    #[arg(long, global = true)]
    phone: Option<String>,

    /// Log filter (a level such as `debug`, or directives like `mms=trace`)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print messages routed to an application id
    Listen {
        /// Application id to claim
        app_id: String,

        /// Local UDP address
        #[arg(short, long, default_value = "0.0.0.0:2948")]
        bind: SocketAddr,

        /// Owning suite id
        #[arg(short, long, default_value = "1")]
        suite: u32,

        /// Register as push listener with this sender filter instead of
        /// opening a connection
        #[arg(long)]
        push: Option<String>,

        /// Maximum number of messages to receive (0 = unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u64,

        /// One JSON object per message
        #[arg(long)]
        json: bool,
    },
    /// Send one message
    Send {
        /// Receiver UDP address
        dest: SocketAddr,

        /// Destination application id
        app_id: String,

        /// Message text (ignored with --file)
        message: Option<String>,

        /// Read the body from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Sending application id (reply-to)
        #[arg(long, default_value = "mms-echo")]
        from: String,

        /// Outgoing fragment size in bytes
        #[arg(long)]
        fragment_size: Option<usize>,
    },
}

/// JSON line printed per message.
#[derive(Serialize)]
struct EchoRecord<'a> {
    received_at: String,
    from: &'a str,
    app_id: &'a str,
    reply_to: &'a str,
    timestamp: u64,
    len: usize,
    body: String,
}

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => MmsConfig::from_file(path)?,
        None => MmsConfig::from_env(),
    };
    if let Some(phone) = args.phone {
        config.phone_number = phone;
    }

    match args.command {
        Command::Listen {
            app_id,
            bind,
            suite,
            push,
            count,
            json,
        } => listen(config, &app_id, bind, SuiteId(suite), push.as_deref(), count, json),
        Command::Send {
            dest,
            app_id,
            message,
            file,
            from,
            fragment_size,
        } => {
            if let Some(size) = fragment_size {
                config.fragment_size = size;
            }
            let payload = match (file, message) {
                (Some(path), _) => std::fs::read(path)?,
                (None, Some(text)) => text.into_bytes(),
                (None, None) => return Err("nothing to send: pass a message or --file".into()),
            };
            send(config, dest, &app_id, &from, &payload)
        }
    }
}

fn listen(
    config: MmsConfig,
    app_id: &str,
    bind: SocketAddr,
    suite: SuiteId,
    push_filter: Option<&str>,
    max_messages: u64,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let stack = MmsStack::new(config)?;
    let service = InboundService::bind(Arc::clone(&stack), bind)?;
    info!("mms-echo v{} listening on {}", env!("CARGO_PKG_VERSION"), service.local_addr());

    let mut received = 0u64;
    let mut keep_going = |message: &Message| -> bool {
        received += 1;
        print_message(message, json);
        max_messages == 0 || received < max_messages
    };

    match push_filter {
        Some(filter) => {
            let push = stack.register_push(app_id, suite, Some(filter))?;
            info!("push registration app_id={} filter={}", app_id, filter);
            'outer: while running.load(Ordering::SeqCst) {
                if push.wait_for_activity_timeout(POLL_INTERVAL)?.is_none() {
                    continue;
                }
                while let Some(message) = stack.take_message(app_id) {
                    if !keep_going(&message) {
                        break 'outer;
                    }
                }
            }
        }
        None => {
            let conn = stack.open(app_id, suite)?;
            info!("connection open app_id={} suite={}", app_id, suite);
            while running.load(Ordering::SeqCst) {
                if let Some(message) = conn.receive_timeout(POLL_INTERVAL)? {
                    if !keep_going(&message) {
                        break;
                    }
                }
            }
        }
    }

    let stats = stack.dispatch_stats();
    info!(
        "received={} discarded={} pooled={}",
        received, stats.discarded, stats.pooled
    );
    Ok(())
}

fn send(
    config: MmsConfig,
    dest: SocketAddr,
    app_id: &str,
    from: &str,
    payload: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    let stack = MmsStack::new(config)?;
    let conn = stack.open(from, SuiteId(0))?;

    info!("sending {} bytes to {} app_id={}", payload.len(), dest, app_id);
    match conn.send(dest, app_id, payload)? {
        SendStatus::Sent => {
            info!("sent");
            Ok(())
        }
        SendStatus::Failed => {
            warn!("transfer to {} failed", dest);
            Err("send failed".into())
        }
    }
}

fn print_message(message: &Message, json: bool) {
    let received_at = Local::now();
    if json {
        let record = EchoRecord {
            received_at: received_at.to_rfc3339(),
            from: &message.from_address,
            app_id: &message.app_id,
            reply_to: &message.reply_to_app_id,
            timestamp: message.timestamp,
            len: message.len(),
            body: String::from_utf8_lossy(&message.body).into_owned(),
        };
        match serde_json::to_string(&record) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("cannot serialize message: {}", e),
        }
    } else {
        println!(
            "[{}] {} -> {} ({} bytes{})",
            received_at.format("%H:%M:%S%.3f"),
            message.from_address,
            message.app_id,
            message.len(),
            if message.reply_to_app_id.is_empty() {
                String::new()
            } else {
                format!(", reply-to {}", message.reply_to_app_id)
            }
        );
        println!("{}", String::from_utf8_lossy(&message.body));
    }
}
