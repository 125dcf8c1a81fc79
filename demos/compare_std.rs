//! Compare the accuracy of a few designs with the `std` functions,
//! including the classic `0x5f3759df` inverse square root.

use std::error::Error;
use magicroot::{exhaustive, CandidateModel, RootSpec};

fn main() -> Result<(), Box<dyn Error + 'static>> {
    let stats = exhaustive(-2, |y: f32| 1. / y.sqrt(), 1., 4.).stats()?;
    println!("1 / f32::sqrt\n{stats}\n");
    let stats = exhaustive(3, f32::cbrt, 1., 8.).stats()?;
    println!("f32::cbrt\n{stats}\n");

    let spec = RootSpec::<f32>::new(-2, 1)?;
    for (name, k, m) in [("classic", 0x5f3759df, -0.5),
                         ("tuned", 0x5f32a11f, -0.535103)] {
        let f = CandidateModel::new(spec, k).with_weight(m);
        println!("{name} {k:#x}, m = {m}: analytic bound {:e}\n{}\n",
                 f.worst_case_bound(), f.stats()?);
    }
    Ok(())
}
