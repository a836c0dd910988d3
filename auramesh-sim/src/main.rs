//! Scenario runner: spawns a configurable field and reports it cycle by cycle.
//!
//! Run with `RUST_LOG=info` (or `debug`/`trace`) to watch the nodes work.

use auramesh::info::{pack_unity_level, Affinity, DeviceInfo, Mode};
use auramesh_sim::Field;
use clap::Parser;
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[derive(Parser)]
#[command(name = "auramesh-sim", about = "Simulate a field of auramesh nodes")]
struct Args {
    /// Magic auras to spawn, ranks spread over 1..=3
    #[arg(long, default_value_t = 3)]
    magic_auras: usize,

    /// Techno auras to spawn, ranks spread over 1..=3
    #[arg(long, default_value_t = 2)]
    techno_auras: usize,

    /// Unity auras to spawn
    #[arg(long, default_value_t = 1)]
    unity_auras: usize,

    /// Switched devices to spawn, affinities alternating
    #[arg(long, default_value_t = 4)]
    devices: usize,

    /// Spawn an overseer at the centre of the field
    #[arg(long)]
    overseer: bool,

    /// Cycles to simulate
    #[arg(long, default_value_t = 30)]
    cycles: u32,

    /// Edge length of the square field, in metres
    #[arg(long, default_value_t = 15.0)]
    size: f64,

    /// Per-link frame loss probability
    #[arg(long, default_value_t = 0.05)]
    loss: f64,

    /// RNG seed
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

fn aura(affinity: Affinity, level: u8) -> DeviceInfo {
    DeviceInfo {
        mode: Mode::Aura,
        affinity,
        level,
        dynamic_rssi_threshold: 0,
    }
}

fn device(affinity: Affinity, level: u8) -> DeviceInfo {
    DeviceInfo {
        mode: Mode::Device,
        affinity,
        level,
        dynamic_rssi_threshold: 0,
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut field = Field::new(args.seed);
    field.loss = args.loss;

    let size = args.size;
    let mut placer = SmallRng::seed_from_u64(args.seed ^ 0x706C6163);
    let mut place = move || -> (f64, f64) {
        (placer.gen_range(0.0..size), placer.gen_range(0.0..size))
    };

    for n in 0..args.magic_auras {
        let pos = place();
        field.spawn(aura(Affinity::Magic, (n % 3) as u8 + 1), pos);
    }
    for n in 0..args.techno_auras {
        let pos = place();
        field.spawn(aura(Affinity::Techno, (n % 3) as u8 + 1), pos);
    }
    for n in 0..args.unity_auras {
        let rank = (n % 3) as u8 + 1;
        let pos = place();
        field.spawn(aura(Affinity::Unity, pack_unity_level(rank, rank)), pos);
    }
    for n in 0..args.devices {
        let affinity = if n % 2 == 0 {
            Affinity::Magic
        } else {
            Affinity::Techno
        };
        let pos = place();
        field.spawn(device(affinity, (n % 2) as u8), pos);
    }
    if args.overseer {
        let centre = (args.size / 2.0, args.size / 2.0);
        field.spawn(
            DeviceInfo {
                mode: Mode::Overseer,
                affinity: Affinity::Unity,
                level: 0,
                dynamic_rssi_threshold: 0,
            },
            centre,
        );
    }

    for cycle in 1..=args.cycles {
        field.step();
        info!("cycle {:>3}: {:?}", cycle, field.summary());
    }

    println!("{:#?}", field.summary());
}
