use tracing_subscriber::EnvFilter;
use treepack::{format_description, to_vec, BenchmarkCase, EncoderConfig, VERSION};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    println!("\n🔥 TREEPACK v{} RUN: {}\n", VERSION, format_description());

    let configs = [
        (0usize, 1000usize),
        (1, 1000),
        (10, 500),
        (100, 100),
        (1000, 20),
        (10000, 5),
    ];

    println!("| Size   | Nodes   | Depth | Bytes    | Iterations | Hash       |");
    println!("|--------|---------|-------|----------|------------|------------|");

    for (size, iterations) in configs {
        let case = match BenchmarkCase::setup(size, EncoderConfig::default()) {
            Ok(case) => case,
            Err(err) => {
                eprintln!("setup({}) failed: {}", size, err);
                std::process::exit(1);
            }
        };

        let bytes = match to_vec(case.root()) {
            Ok(bytes) => bytes.len(),
            Err(err) => {
                eprintln!("encode({}) failed: {}", size, err);
                std::process::exit(1);
            }
        };

        match case.run_iterations(iterations, 0) {
            Ok(hash) => println!(
                "| {:6} | {:7} | {:5} | {:8} | {:10} | 0x{:08x} |",
                size,
                case.root().node_count(),
                case.root().depth(),
                bytes,
                iterations,
                hash
            ),
            Err(err) => {
                eprintln!("run({}) failed: {}", size, err);
                std::process::exit(1);
            }
        }

        case.teardown();
    }

    println!();
}
