//! The `gabes` command line: one binary, run once per party.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use gabes::channel::TcpChannel;
use gabes::protocol::{evaluator, garbler, Error};
use gabes::{Circuit, Scheme};

/// Jointly evaluate a garbled boolean circuit with a remote peer.
#[derive(Debug, Parser)]
#[command(name = "gabes")]
struct Cli {
    /// Act as the garbler (the party supplying the circuit).
    #[arg(short, long, conflicts_with = "evaluator")]
    garbler: bool,
    /// Act as the evaluator.
    #[arg(short, long)]
    evaluator: bool,
    /// This party's input bits, one '0' or '1' per owned wire.
    #[arg(short, long)]
    bits: String,
    /// The wire identifiers this party owns, in the same order as the bits.
    #[arg(short, long, num_args = 1..)]
    identifiers: Vec<String>,
    /// Path of the circuit file (garbler only).
    #[arg(short, long)]
    circuit: Option<PathBuf>,
    /// Peer address as HOST:PORT. The evaluator listens, the garbler dials.
    #[arg(short, long)]
    address: String,
    /// Classical garbling: four shuffled rows per gate (the default).
    #[arg(long, group = "scheme")]
    cl: bool,
    /// Point-and-permute: rows indexed by select bits.
    #[arg(long, group = "scheme")]
    pp: bool,
    /// Garbled row reduction: three rows per gate.
    #[arg(long, group = "scheme")]
    grr3: bool,
    /// Free-XOR: XOR gates cost nothing.
    #[arg(long, group = "scheme")]
    free: bool,
    /// FleXOR: XOR gates cost up to two rows under per-wire offsets.
    #[arg(long, group = "scheme")]
    fle: bool,
    /// Half-gates: two rows per AND-family gate, free XOR.
    #[arg(long, group = "scheme")]
    half: bool,
}

impl Cli {
    fn scheme(&self) -> Scheme {
        if self.pp {
            Scheme::PointAndPermute
        } else if self.grr3 {
            Scheme::Grr3
        } else if self.free {
            Scheme::FreeXor
        } else if self.fle {
            Scheme::FleXor
        } else if self.half {
            Scheme::HalfGates
        } else {
            Scheme::Classical
        }
    }

    /// Maps the positional bit string onto the owned identifiers.
    fn inputs(&self) -> Result<HashMap<String, bool>, Error> {
        if self.bits.len() != self.identifiers.len() {
            return Err(Error::Usage(format!(
                "{} bits supplied for {} identifiers",
                self.bits.len(),
                self.identifiers.len()
            )));
        }
        let mut inputs = HashMap::new();
        for (id, bit) in self.identifiers.iter().zip(self.bits.chars()) {
            let bit = match bit {
                '0' => false,
                '1' => true,
                other => {
                    return Err(Error::Usage(format!(
                        "input bits must be '0' or '1', found {other:?}"
                    )))
                }
            };
            inputs.insert(id.clone(), bit);
        }
        Ok(inputs)
    }
}

fn rng_from_env() -> ChaCha20Rng {
    match std::env::var("GABES_RNG_SEED") {
        Ok(seed) => match seed.parse() {
            Ok(seed) => {
                debug!(seed, "using the deterministic test RNG");
                ChaCha20Rng::seed_from_u64(seed)
            }
            Err(_) => {
                eprintln!("ignoring unparsable GABES_RNG_SEED {seed:?}");
                ChaCha20Rng::from_entropy()
            }
        },
        Err(_) => ChaCha20Rng::from_entropy(),
    }
}

async fn run(cli: Cli) -> Result<bool, Error> {
    let inputs = cli.inputs()?;
    let scheme = cli.scheme();
    let mut rng = rng_from_env();
    if cli.garbler {
        let path = cli
            .circuit
            .as_ref()
            .ok_or_else(|| Error::Usage("the garbler needs a circuit file (-c)".into()))?;
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Usage(format!("could not read circuit file {}: {e}", path.display()))
        })?;
        let mut circuit = Circuit::parse(&text)?;
        println!("Welcome, garbler. Connecting to the evaluator...");
        let mut channel = TcpChannel::connect(&cli.address).await.map_err(network)?;
        garbler(&mut channel, &mut circuit, scheme, &inputs, &mut rng).await
    } else if cli.evaluator {
        println!("Welcome, evaluator. Waiting for the garbler...");
        let mut channel = TcpChannel::accept(&cli.address).await.map_err(network)?;
        evaluator(&mut channel, scheme, &inputs, &mut rng).await
    } else {
        Err(Error::Usage(
            "pass either -g (garbler) or -e (evaluator)".into(),
        ))
    }
}

fn network(e: std::io::Error) -> Error {
    Error::Network(gabes::channel::Error {
        phase: "connect".into(),
        reason: gabes::channel::ErrorKind::RecvError(format!("{e}")),
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            exit(if e.use_stderr() { 1 } else { 0 });
        }
    };
    match run(cli).await {
        Ok(output) => {
            println!(
                "The final output of the circuit is: {}",
                if output { 1 } else { 0 }
            );
        }
        Err(e) => {
            eprintln!("the protocol failed: {e:?}");
            exit(e.exit_code());
        }
    }
}
