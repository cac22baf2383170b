// -*- mode: rust; -*-
//
// This file is part of `hamper`.
// See LICENSE for licensing information.

//! Fuzzy PSI receiver binary: listens for one sender, runs the offline and
//! online phases over randomly generated data, and reports the intersection.
//!
//! Every protocol parameter must match the sender's configuration; the wire
//! format does not carry parameters.

use clap::Parser;
use hamper::utils::{self, PhaseStats};
use hamper::{params, ProtocolParams, Receiver};
use log::info;
use scupper::{AesRng, Block, TrackChannel};
use std::{
    env,
    io::{BufReader, BufWriter},
    net::TcpListener,
    path::PathBuf,
    time::{Duration, Instant},
};

#[derive(Parser)]
#[command(name = "fpsi-receiver", about = "Fuzzy PSI under Hamming distance: receiver")]
struct Cli {
    /// Port to listen on.
    #[arg(default_value_t = 12345)]
    port: u16,
    /// Receiver set size n.
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
    /// Shared LSH seed; must equal the sender's.
    #[arg(long, default_value_t = 0x5eed_cafe)]
    lsh_seed: u64,
    /// Seed for random test-data generation.
    #[arg(long, default_value_t = 987_654)]
    data_seed: u64,
    /// Per-phase socket timeout in seconds.
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
        log::error!("receiver failed: {}", e);
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
    let inputs = (0..cli.set_size)
        .map(|_| utils::rand_binary_vec(cli.dim, &mut data_rng))
        .collect::<Vec<Vec<u8>>>();
    info!("generated {} vectors of dimension {}", cli.set_size, cli.dim);

    let listener = TcpListener::bind(("127.0.0.1", cli.port))?;
    info!("listening on 127.0.0.1:{}", cli.port);
    let (stream, peer) = listener.accept()?;
    info!("sender connected from {}", peer);
    if let Some(secs) = cli.timeout_secs {
        stream.set_read_timeout(Some(Duration::from_secs(secs)))?;
        stream.set_write_timeout(Some(Duration::from_secs(secs)))?;
    }
    let mut channel = TrackChannel::new(BufReader::new(stream.try_clone()?), BufWriter::new(stream));

    let mut rng = AesRng::new();
    let mut receiver = Receiver::init(params, Block::from(cli.lsh_seed as u128))?;

    let start = Instant::now();
    receiver.offline(&inputs, &mut channel, &mut rng)?;
    let offline = PhaseStats {
        seconds: start.elapsed().as_secs_f64(),
        sent_mb: channel.megabytes_written(),
        received_mb: channel.megabytes_read(),
    };
    info!(
        "offline phase: {:.3} s, sent {:.3} MB",
        offline.seconds, offline.sent_mb
    );

    let start = Instant::now();
    let intersection = receiver.online(&mut channel, &mut rng)?;
    let online = PhaseStats {
        seconds: start.elapsed().as_secs_f64(),
        sent_mb: channel.megabytes_written() - offline.sent_mb,
        received_mb: channel.megabytes_read() - offline.received_mb,
    };
    info!(
        "online phase: {:.3} s, received {:.3} MB",
        online.seconds, online.received_mb
    );
    info!("fuzzy intersection holds {} vectors", intersection.len());

    if let Some(path) = &cli.stats_file {
        utils::append_stats(path, "Receiver", &params, cli.set_size, offline, online)?;
    }
    Ok(())
}
