//! Parses an HLS media playlist, repairs every referenced segment stream
//! (continuity counters, PCR-from-PTS, key-frame flags), and writes the
//! streams back in place.
//!
//! Usage: `hls_fix <playlist.m3u8> [pid ...]` (PIDs default to 0x100)

use std::process::ExitCode;
use tsfix::format::hls::Playlist;

#[tokio::main]
async fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let manifest = match args.next() {
        Some(manifest) => manifest,
        None => {
            eprintln!("usage: hls_fix <playlist.m3u8> [pid ...]");
            return ExitCode::from(2);
        }
    };
    let mut pids: Vec<u16> = args.filter_map(|arg| arg.parse().ok()).collect();
    if pids.is_empty() {
        pids.push(0x100);
    }

    let mut playlist = Playlist::new();
    let root = playlist.attach(None, manifest.clone());
    match playlist.parse(root).await {
        Ok(attached) => println!("{}: {} media streams", manifest, attached),
        Err(e) => {
            eprintln!("{}: {}", manifest, e);
            return ExitCode::from(1);
        }
    }

    playlist.fix_discontinuity(root, &pids);
    for &pid in &pids {
        playlist.update_pcr_by_pts(root, pid);
        playlist.fix_key_frame_info(root, pid);
    }

    let total = playlist.streams(root).len();
    let persisted = playlist.persist_all(root).await;
    println!("persisted {}/{} streams", persisted, total);

    if persisted == total {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
