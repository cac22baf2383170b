// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Fuzzy PSI sender binary: connects to a listening receiver, runs the
//! offline and online phases over randomly generated queries, and reports
//! how many of them matched.
//!
//! Every protocol parameter must match the receiver's configuration; the
//! wire format does not carry parameters.

use clap::Parser;
use hamper::utils::{self, PhaseStats};
use hamper::{params, ProtocolParams, Sender};
use log::info;
use scupper::{AesRng, Block, TrackChannel};
use std::{
    env,
    io::{BufReader, BufWriter},
    net::TcpStream,
    path::PathBuf,
    time::{Duration, Instant},
};

#[derive(Parser)]
#[command(name = "fpsi-sender", about = "Fuzzy PSI under Hamming distance: sender")]
struct Cli {
    /// Receiver host.
    #[arg(default_value = "127.0.0.1")]
    host: String,
    /// Receiver port.
    #[arg(default_value_t = 12345)]
    port: u16,
    /// Sender set size m.
    #[arg(long, default_value_t = 256)]
    set_size: usize,
    /// Vector dimension d.
    #[arg(long, default_value_t = 128)]
    dim: usize,
    /// Hamming distance threshold.
    #[arg(long, default_value_t = 10)]
    delta: usize,
    /// Number of LSH fingerprints L per vector.
    #[arg(long, default_value_t = 32)]
    lsh_count: usize,
    /// Entropy threshold for the LSH dimension pool.
    #[arg(long, default_value_t = params::DEFAULT_ENTROPY_THRESHOLD)]
    tau: f64,
    /// Offline ciphertext batch size.
    #[arg(long, default_value_t = params::DEFAULT_BATCH_SIZE)]
    batch: usize,
    /// Shared LSH seed; must equal the receiver's.
    #[arg(long, default_value_t = 0x5eed_cafe)]
    lsh_seed: u64,
    /// Seed for random test-data generation.
    #[arg(long, default_value_t = 123_456)]
    data_seed: u64,
    /// Per-phase socket timeout in seconds (also bounds the connect retry).
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Append human-readable phase statistics to this file.
    #[arg(long)]
    stats_file: Option<PathBuf>,
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init_timed();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        log::error!("sender failed: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let params = ProtocolParams {
        dim: cli.dim,
        delta: cli.delta,
        lsh_count: cli.lsh_count,
        entropy_threshold: cli.tau,
        batch_size: cli.batch,
    };
    params.validate()?;

    let mut data_rng = AesRng::from_block_seed(Block::from(cli.data_seed as u128));
    let queries = (0..cli.set_size)
        .map(|_| utils::rand_binary_vec(cli.dim, &mut data_rng))
        .collect::<Vec<Vec<u8>>>();
    info!("generated {} queries of dimension {}", cli.set_size, cli.dim);

    let addr = format!("{}:{}", cli.host, cli.port);
    let deadline = cli
        .timeout_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let stream = loop {
        match TcpStream::connect(&addr) {
            Ok(stream) => break stream,
            Err(e) => {
                if let Some(deadline) = deadline {
                    if Instant::now() > deadline {
                        return Err(format!("connecting to {}: {}", addr, e).into());
                    }
                }
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    };
    info!("connected to {}", addr);
    if let Some(secs) = cli.timeout_secs {
        stream.set_read_timeout(Some(Duration::from_secs(secs)))?;
        stream.set_write_timeout(Some(Duration::from_secs(secs)))?;
    }
    let mut channel = TrackChannel::new(BufReader::new(stream.try_clone()?), BufWriter::new(stream));

    let mut rng = AesRng::new();
    let mut sender = Sender::init(params, Block::from(cli.lsh_seed as u128))?;

    let start = Instant::now();
    sender.offline(&mut channel)?;
    let offline = PhaseStats {
        seconds: start.elapsed().as_secs_f64(),
        sent_mb: channel.megabytes_written(),
        received_mb: channel.megabytes_read(),
    };
    info!(
        "offline phase: {:.3} s, received {:.3} MB",
        offline.seconds, offline.received_mb
    );

    let start = Instant::now();
    let nmatched = sender.online(&queries, &mut channel, &mut rng)?;
    let online = PhaseStats {
        seconds: start.elapsed().as_secs_f64(),
        sent_mb: channel.megabytes_written() - offline.sent_mb,
        received_mb: channel.megabytes_read() - offline.received_mb,
    };
    info!(
        "online phase: {:.3} s, sent {:.3} MB",
        online.seconds, online.sent_mb
    );
    info!("{} of {} queries matched", nmatched, cli.set_size);

    if let Some(path) = &cli.stats_file {
        utils::append_stats(path, "Sender", &params, cli.set_size, offline, online)?;
    }
    Ok(())
}
