use rand::{rngs::StdRng, Rng, SeedableRng};

// Functions as printed by `CandidateModel`'s `Display` for designs
// found by `search`.

pub fn inv_root2_f32_classic(y: f32) -> f32 {
    let i = y.to_bits() as i32; // interpret float as integer
    let i = 0x5f3759df - (i >> 1); // log-approximation hack
    let mut x = f32::from_bits(i as u32);
    x *= 1.5 - 0.5 * y * (x * x); // newtonian step #1
    x
}

pub fn inv_root2_f32(y: f32) -> f32 {
    let i = y.to_bits() as i32; // interpret float as integer
    let i = 0x5f32a11f - (i >> 1); // log-approximation hack
    let mut x = f32::from_bits(i as u32);
    x *= 1.535103 - 0.535103 * y * (x * x); // newtonian step #1
    x
}

pub fn root2_f32(y: f32) -> f32 {
    let i = y.to_bits() as i32; // interpret float as integer
    let i = 0x1fbed493 + (i >> 1); // log-approximation hack
    let mut x = f32::from_bits(i as u32);
    x = 0.48907030 * x + 0.5109297 * y / x; // newtonian step #1
    x
}

pub fn root3_f32(y: f32) -> f32 {
    let i = y.to_bits() as i32; // interpret float as integer
    let i = 0x2a543a9c + (i / 3); // log-approximation hack
    let mut x = f32::from_bits(i as u32);
    x = 0.65274864 * x + 0.34725136 * y / (x * x); // newtonian step #1
    x
}

pub fn inv_root4_f32(y: f32) -> f32 {
    let i = y.to_bits() as i32; // interpret float as integer
    let i = 0x4f57e9d6 - (i >> 2); // log-approximation hack
    let mut x = f32::from_bits(i as u32);
    x *= 1.2513021 - 0.25130206 * y * ((x * x) * (x * x)); // newtonian step #1
    x *= 1.2513021 - 0.25130206 * y * ((x * x) * (x * x)); // newtonian step #2
    x
}

/// Pairs (approximation, `std` counterpart) with their names.
#[allow(clippy::type_complexity)]
pub fn approximations() -> Vec<(&'static str, fn(f32) -> f32, fn(f32) -> f32)> {
    macro_rules! f { ($f: expr) => { $f as fn(f32) -> f32 } }
    vec![
        ("inv_root2_classic", f!(inv_root2_f32_classic), f!(|y: f32| 1. / y.sqrt())),
        ("inv_root2", f!(inv_root2_f32), f!(|y: f32| 1. / y.sqrt())),
        ("root2", f!(root2_f32), f!(f32::sqrt)),
        ("root3", f!(root3_f32), f!(f32::cbrt)),
        ("inv_root4", f!(inv_root4_f32), f!(|y: f32| 1. / y.sqrt().sqrt())),
    ]
}

/// Reproducible random positive normal floats.
pub fn samples(n: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(0);
    (0 .. n).map(|_| rng.gen_range(1e-20 .. 1e20)).collect()
}
