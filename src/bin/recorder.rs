//! Recorder Client
//!
//! Command line companion to the recording server.
//!
//! ```text
//! recorder devices                 list microphone inputs
//! recorder mic-test [seconds]      open the microphone and count samples
//! recorder upload <file> [name]    upload a recording file
//! recorder list                    list recordings on the server
//! ```

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use screen_recorder::{
    config::AppConfig,
    media::{list_input_devices, CpalMicrophone, MicrophoneCapture, MicrophoneOptions},
    session::ChunkSequence,
    transfer::UploadClient,
};

const USAGE: &str = "usage: recorder <devices | mic-test [seconds] | upload <file> [name] | list>";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load_or_default()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("devices") => print_devices(),
        Some("mic-test") => {
            let secs: u64 = match args.get(1) {
                Some(s) => s.parse().context("seconds must be a number")?,
                None => 3,
            };
            let mic = CpalMicrophone::new();
            let options = MicrophoneOptions {
                device_id: config.capture.microphone_device.clone(),
            };

            let source = mic.acquire(&options).await?;
            for track in source.tracks() {
                println!("Capturing from {} for {}s...", track.label(), secs);
            }
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
            source.stop_all();

            println!("Captured {} samples", mic.samples_captured());
        }
        Some("upload") => {
            let file = args.get(1).context(USAGE)?;
            let client = UploadClient::new(&config.upload)?;

            let data = tokio::fs::read(file)
                .await
                .with_context(|| format!("Failed to read {}", file))?;
            let mut chunks = ChunkSequence::new();
            chunks.push(Bytes::from(data));
            let blob = chunks.take_blob();

            let name = match args.get(2) {
                Some(name) => name.clone(),
                None => std::path::Path::new(file)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| blob.suggested_file_name()),
            };

            let record = client.upload(&blob, &name).await?;
            println!("Uploaded {} as #{} ({} bytes)", name, record.id, record.filesize);
            println!("  {}", client.stream_url(record.id));
        }
        Some("list") => {
            let client = UploadClient::new(&config.upload)?;
            let recordings = client.list_recordings().await?;

            println!("\n=== Recordings on {} ===", client.base_url());
            for record in &recordings {
                println!(
                    "  #{:<5} {:<40} {:>12} bytes  {}",
                    record.id,
                    record.filename,
                    record.filesize,
                    record.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            println!();
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

fn print_devices() {
    println!("\n=== Available Microphones ===");
    for device in list_input_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {}{}:", device.name, default_marker);
        println!("    ID: {}", device.id);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();
}
