//! Loads one transport stream, prints the decoded trace of every packet,
//! and optionally writes the (PES-length-reset) stream back out.
//!
//! Usage: `ts_inspect -i input.ts [-o output.ts]`
//!
//! Exits 0 on a complete run and 1 when the load stopped early, so
//! scripts can tell a clean stream from a truncated one.

use std::process::ExitCode;
use tsfix::format::ts::TsStream;

#[tokio::main]
async fn main() -> ExitCode {
    let mut input = String::from("3.ts");
    let mut output: Option<String> = None;

    let mut context = ' ';
    for arg in std::env::args().skip(1) {
        if let Some(flag) = arg.strip_prefix('-') {
            context = flag.chars().next().unwrap_or(' ');
        } else {
            match context {
                'i' | 'I' => input = arg,
                'o' | 'O' => output = Some(arg),
                _ => {}
            }
        }
    }

    let mut stream = TsStream::open(input.clone());
    let summary = match stream.load().await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("{}: {}", input, e);
            return ExitCode::from(1);
        }
    };

    stream.reset_pes_lengths();

    let mut stdout = std::io::stdout().lock();
    if stream.dump(&mut stdout).is_err() {
        return ExitCode::from(1);
    }
    drop(stdout);
    println!("segments: {}", summary.loaded);

    if let Some(dest) = output.as_deref() {
        if let Err(e) = stream.persist(Some(dest)).await {
            eprintln!("{}: {}", dest, e);
            return ExitCode::from(1);
        }
        println!("wrote {}", dest);
    }

    match summary.stopped {
        Some(cause) => {
            eprintln!("load stopped early: {}", cause);
            ExitCode::from(1)
        }
        None => ExitCode::SUCCESS,
    }
}
