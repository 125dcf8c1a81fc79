//! Parallel version of `generate.rs`: the searches for the various
//! roots, precisions and numbers of steps run on all cores.

use std::{error::Error, time::Instant};
use magicroot::{search, Basis, RootFloat, RootSpec};
use rayon::prelude::*;

fn best<T: RootFloat>(n: i32, steps: u32) -> Result<String, magicroot::Error> {
    let spec = RootSpec::<T>::new(n, steps)?;
    let best = search(spec).basis(Basis::ApproxWorstCase).run()?;
    Ok(format!("// worst relative error: {:e}\n{}", best.score, best.model()))
}

fn main() -> Result<(), Box<dyn Error + 'static>> {
    let jobs: Vec<(i32, u32, bool)> = [2, -2, 3, -3, 4, -4, 5, -5]
        .into_iter()
        .flat_map(|n| (0 ..= 2).flat_map(move |s| [(n, s, false), (n, s, true)]))
        .collect();

    let now = Instant::now();
    let functions: Result<Vec<String>, _> = jobs
        .par_iter()
        .map(|&(n, steps, double)| {
            if double { best::<f64>(n, steps) } else { best::<f32>(n, steps) }
        })
        .collect();
    for f in functions? {
        println!("{f}\n");
    }
    eprintln!("{} searches: {} secs", jobs.len(), now.elapsed().as_secs_f64());
    Ok(())
}
