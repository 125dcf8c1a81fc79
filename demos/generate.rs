//! Print a Rust module with the best single precision roots and
//! inverse roots for N = 2, 3, 4, each preceded by its error
//! statistics.  Pass `exhaustive` as argument to score the candidates
//! by enumeration instead of with the analytic bound (slower).
//! Set `RUST_LOG=debug` to follow the search.

use std::error::Error;
use magicroot::{search, Basis, RootSpec};

fn main() -> Result<(), Box<dyn Error + 'static>> {
    simple_logger::SimpleLogger::new().env().init()?;
    let basis = match std::env::args().nth(1).as_deref() {
        Some("exhaustive") => Basis::WorstCase,
        _ => Basis::ApproxWorstCase,
    };

    println!("// Functions optimized for worst-case error\n");
    for n in [2, -2, 3, -3, 4, -4] {
        let spec = RootSpec::<f32>::new(n, 1)?;
        let best = search(spec).basis(basis).stride(256).run()?;
        println!("/*\n    Approximate y^(1/{n}) with 1 newtonian step");
        for line in best.stats().to_string().lines() {
            println!("    {line}");
        }
        println!("*/");
        println!("{}\n", best.model());
    }
    Ok(())
}
