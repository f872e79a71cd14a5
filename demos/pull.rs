//! Restream an HTTP live stream to stdout
//!
//! Run with: cargo run --example pull URL [VIEWERS]
//!
//! Examples:
//!   cargo run --example pull http://provider.example/live/1001.ts > out.ts
//!   cargo run --example pull http://provider.example/live/1001.ts 3 > /dev/null
//!
//! One upstream connection is opened no matter how many viewers are started.
//! The first viewer is written to stdout; extra viewers only count bytes.
//! Set RUST_LOG=restream_rs=debug to watch cursors attach.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use restream_rs::{
    ReadCursor, RegistryConfig, StaticBaseUrls, StreamDescriptor, StreamKey, StreamRegistry,
};

fn print_usage() {
    eprintln!("Usage: pull URL [VIEWERS]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  URL        http(s) address of the live stream");
    eprintln!("  VIEWERS    Number of local readers to attach (default: 1)");
}

async fn copy_to_stdout(mut cursor: ReadCursor) -> restream_rs::Result<u64> {
    let mut stdout = tokio::io::stdout();
    let mut total = 0u64;

    while let Some(chunk) = cursor.read(64 * 1024).await? {
        total += chunk.len() as u64;
        if stdout.write_all(&chunk).await.is_err() {
            break;
        }
    }
    let _ = stdout.flush().await;
    Ok(total)
}

async fn count_bytes(mut cursor: ReadCursor) -> restream_rs::Result<u64> {
    let mut total = 0u64;
    while let Some(chunk) = cursor.read(64 * 1024).await? {
        total += chunk.len() as u64;
    }
    Ok(total)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") || args.len() < 2 {
        print_usage();
        return Ok(());
    }

    let viewers: usize = match args.get(2) {
        Some(n) => n.parse()?,
        None => 1,
    };

    // Logs go to stderr so stdout carries only the stream
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("restream_rs=info".parse()?),
        )
        .init();

    let registry = Arc::new(StreamRegistry::http(
        Arc::new(StaticBaseUrls::default()),
        RegistryConfig::default(),
    )?);

    let mut descriptor = StreamDescriptor::remote(args[1].as_str());
    let key = StreamKey::for_descriptor(&descriptor)?;
    registry.ensure_restream(&key, &mut descriptor).await?;

    eprintln!("Restreaming {} as {}", args[1], key);
    eprintln!("  path:         {}", descriptor.path.as_deref().unwrap_or_default());
    eprintln!("  encoder path: {}", descriptor.encoder_path.as_deref().unwrap_or_default());

    let mut readers = Vec::with_capacity(viewers.max(1));
    readers.push(tokio::spawn(copy_to_stdout(registry.open_cursor(&key).await?)));
    for _ in 1..viewers {
        readers.push(tokio::spawn(count_bytes(registry.open_cursor(&key).await?)));
    }

    let stats_registry = Arc::clone(&registry);
    let stats_key = key.clone();
    let stats_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Some(stats) = stats_registry.stream_stats(&stats_key).await {
                eprintln!(
                    "Stats: state={} bytes={} bitrate={}bps cursors={} reconnects={}",
                    stats.state,
                    stats.bytes_received,
                    stats.bitrate(),
                    stats.active_cursors,
                    stats.reconnects,
                );
            }
        }
    });

    let restream = registry.get(&key).await.ok_or("restream was not registered")?;
    let mut state = restream.state_changes();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nShutting down...");
        }
        _ = state.wait_for(|s| s.is_closed()) => {
            eprintln!("Upstream gone");
        }
    }

    registry.shutdown().await;
    stats_task.abort();

    for (i, reader) in readers.into_iter().enumerate() {
        match reader.await? {
            Ok(bytes) => eprintln!("Viewer {}: {} bytes", i, bytes),
            Err(e) => eprintln!("Viewer {}: {}", i, e),
        }
    }

    Ok(())
}
