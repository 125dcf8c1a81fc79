//! Fifth roots have no closed form; with the `rug` feature their
//! reference values are computed by MPFR.  Check a design against it.

use std::error::Error;
use magicroot::{search, Basis, RootSpec};
use rug::Float;

fn main() -> Result<(), Box<dyn Error + 'static>> {
    let spec = RootSpec::<f32>::new(5, 1)?;
    let best = search(spec).basis(Basis::ApproxWorstCase).run()?;
    let f = best.model();
    println!("{f}\n{}", best.stats());

    for y in [1f32, 3., 17., 31.] {
        let exact = Float::with_val(113, y).root(5);
        let approx = Float::with_val(113, f.eval(y));
        let err = (approx - &exact) / &exact;
        println!("y = {y:>4}: relative error {:.3e}", err.to_f64());
    }
    Ok(())
}
