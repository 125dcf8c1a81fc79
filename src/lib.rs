//! Fast approximations of N-th roots of floating point numbers.
//!
//! This crate searches for, validates and prints *bit-hack*
//! approximations of `y^(1/N)` (and of the inverse root `y^(-1/N)`)
//! for [`f32`] and [`f64`].  Such an approximation reinterprets the
//! bits of `y` as an integer `i`, forms `k + i / N` for a “magic
//! constant” `k` and reinterprets the result as a float.  Because the
//! bit pattern of a positive float is close to an affine function of
//! its base-2 logarithm, this is already a rough estimate of the root,
//! which is then refined by a few Newton steps
//!
//! ```text
//! x ← (1 − m)·x + m·y / x^(N−1)        (N > 0)
//! x ← x·((1 − m) + m·y·x^|N|)          (N < 0)
//! ```
//!
//! where the blend weight `m` is nominally `1/N` but is tuned together
//! with `k` to minimize the error.
//!
//! The crate offers:
//! - the model itself, [`CandidateModel`];
//! - an evaluator enumerating every float of a range, [`exhaustive`];
//! - an analytic bound on the worst relative error,
//!   [`CandidateModel::worst_case_bound`];
//! - a coarse-to-fine search of the best `(k, m)`, [`search`];
//! - the rendering of a model as Rust source through [`Display`].
//!
//! # Example
//!
//! ```
//! # fn main() -> Result<(), magicroot::Error> {
//! use magicroot::{search, Basis, RootSpec};
//! // Inverse square root in single precision with one Newton step.
//! let spec = RootSpec::<f32>::new(-2, 1)?;
//! let best = search(spec).basis(Basis::ApproxWorstCase).run()?;
//! assert!(best.score < 2e-3);
//! let f = best.model();
//! assert!((f.eval(4.) - 0.5).abs() < 1e-3);
//! println!("{}", f); // Rust source of `inv_root2_f32`
//! # Ok(()) }
//! ```
//!
//! All computations are deterministic and single threaded.  The
//! search reports its progress through the [`log`] facade.

use std::{
    fmt::{self, Debug, Display, Formatter, LowerHex},
    iter,
    marker::PhantomData,
    mem::swap,
    ops::{Neg, Add, Sub, Mul, Div},
};

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

/// Errors that may be returned when setting up an approximation or
/// one of its evaluations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The root index N is zero; the 0th root is undefined.
    ZeroRoot,
    /// The range \[`min`, `max`\] is not made of positive normal
    /// floats in increasing order.
    InvalidDomain { min: f64, max: f64 },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::ZeroRoot => write!(f, "the 0th root is undefined"),
            Error::InvalidDomain { min, max } =>
                write!(f, "[{min}, {max}] is not a range of positive \
                           normal floats"),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
//
// Float types

/// Precision of a float type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    /// IEEE-754 binary32, [`f32`].
    Single,
    /// IEEE-754 binary64, [`f64`].
    Double,
}

impl Precision {
    /// Name of the Rust float type.
    pub fn float_name(self) -> &'static str {
        match self { Precision::Single => "f32", Precision::Double => "f64" }
    }

    /// Name of the signed integer type of the same width.
    pub fn int_name(self) -> &'static str {
        match self { Precision::Single => "i32", Precision::Double => "i64" }
    }

    /// Name of the unsigned integer type of the same width.
    pub fn uint_name(self) -> &'static str {
        match self { Precision::Single => "u32", Precision::Double => "u64" }
    }
}

/// Float types whose roots can be approximated by reinterpreting
/// their bits as an integer.
///
/// The integer type [`RootFloat::Int`] has the same width as the
/// float.  All integer arithmetic of this crate is carried out on
/// `i64` (see [`RootFloat::int_to_i64`]) and truncated back to the
/// storage width, which gives the wrapping semantics of the native
/// width.
pub trait RootFloat:
    Copy
    + PartialOrd
    + Debug
    + Display
    + Neg<Output = Self>
    + Add<Self, Output = Self>
    + Sub<Self, Output = Self>
    + Mul<Self, Output = Self>
    + Div<Self, Output = Self>
{
    /// Signed integer with the same width as `Self`.
    type Int: Copy + Ord + Debug + Display + LowerHex;

    /// The precision tag of the type.
    const PRECISION: Precision;
    /// Number of bits of the exponent field.
    const EXPONENT_BITS: u32;
    /// Number of bits of the (stored) mantissa field.
    const MANTISSA_BITS: u32;
    /// The number 1.
    const ONE: Self;

    /// Reinterpret the bits of `self` as a signed integer.
    fn to_int(self) -> Self::Int;
    /// Reinterpret the bits of `i` as a float.
    fn from_int(i: Self::Int) -> Self;
    /// Sign-extend `i` to 64 bits.
    fn int_to_i64(i: Self::Int) -> i64;
    /// Keep the low bits of `i` (wrapping to the storage width).
    fn int_from_i64(i: i64) -> Self::Int;

    fn to_f64(self) -> f64;
    fn from_f64(x: f64) -> Self;
    fn is_normal(self) -> bool;
    fn sqrt(self) -> Self;
    fn cbrt(self) -> Self;
    fn powf(self, e: Self) -> Self;
}

macro_rules! impl_root_float_fXX {
    ($t: ty, $i: ty, $u: ty, $prec: expr, $exp: expr, $man: expr) => {
        impl RootFloat for $t {
            type Int = $i;
            const PRECISION: Precision = $prec;
            const EXPONENT_BITS: u32 = $exp;
            const MANTISSA_BITS: u32 = $man;
            const ONE: Self = 1.;

            #[inline]
            fn to_int(self) -> $i { self.to_bits() as $i }
            #[inline]
            fn from_int(i: $i) -> Self { <$t>::from_bits(i as $u) }
            #[inline]
            fn int_to_i64(i: $i) -> i64 { i as i64 }
            #[inline]
            fn int_from_i64(i: i64) -> $i { i as $i }
            #[inline]
            fn to_f64(self) -> f64 { self as f64 }
            #[inline]
            fn from_f64(x: f64) -> Self { x as $t }
            #[inline]
            fn is_normal(self) -> bool { <$t>::is_normal(self) }
            #[inline]
            fn sqrt(self) -> Self { <$t>::sqrt(self) }
            #[inline]
            fn cbrt(self) -> Self { <$t>::cbrt(self) }
            #[inline]
            fn powf(self, e: Self) -> Self { <$t>::powf(self, e) }
        }
    }
}

impl_root_float_fXX!(f32, i32, u32, Precision::Single, 8, 23);
impl_root_float_fXX!(f64, i64, u64, Precision::Double, 11, 52);

////////////////////////////////////////////////////////////////////////
//
// Integer powers and roots

/// Degree of a power or of a root.  Small degrees have closed forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Degree {
    Zero,
    One,
    Two,
    Three,
    Four,
    Other(u32),
}

impl Degree {
    fn new(d: u32) -> Self {
        match d {
            0 => Degree::Zero,
            1 => Degree::One,
            2 => Degree::Two,
            3 => Degree::Three,
            4 => Degree::Four,
            d => Degree::Other(d),
        }
    }

    /// `x` to the power `self`.
    #[inline]
    fn pow<T: RootFloat>(self, x: T) -> T {
        match self {
            Degree::Zero => T::ONE,
            Degree::One => x,
            Degree::Two => x * x,
            Degree::Three => x * x * x,
            Degree::Four => { let x2 = x * x;  x2 * x2 }
            Degree::Other(d) => {
                let mut p = x;
                for _ in 1 .. d { p = p * x }
                p
            }
        }
    }

    /// The `self`-th root of `y`.
    #[inline]
    fn root<T: RootFloat>(self, y: T) -> T {
        match self {
            Degree::Zero => T::from_f64(f64::NAN),
            Degree::One => y,
            Degree::Two => y.sqrt(),
            Degree::Three => y.cbrt(),
            Degree::Four => y.sqrt().sqrt(),
            Degree::Other(d) => y.powf(T::ONE / T::from_f64(d as f64)),
        }
    }
}

/// Return `x` to the power `e`.
///
/// Exponents with |`e`| ≤ 4 use closed-form products, larger ones
/// repeated multiplication; negative exponents take the reciprocal.
///
/// ```
/// use magicroot::pow_i;
/// assert_eq!(pow_i(3f64, 4), 81.);
/// assert_eq!(pow_i(2f32, -3), 0.125);
/// assert_eq!(pow_i(7f64, 0), 1.);
/// ```
#[inline]
pub fn pow_i<T: RootFloat>(x: T, e: i32) -> T {
    let p = Degree::new(e.unsigned_abs()).pow(x);
    if e < 0 { T::ONE / p } else { p }
}

/// MPFR root, used as reference for degrees without closed form.
#[cfg(feature = "rug")]
fn generic_root(y: f64, d: u32) -> f64 {
    rug::Float::with_val(113, y).root(d).to_f64()
}

#[cfg(not(feature = "rug"))]
fn generic_root(y: f64, d: u32) -> f64 {
    y.powf(1. / d as f64)
}

/// A valid root index N, that is a nonzero integer.  Positive values
/// denote the root `y^(1/N)`, negative ones the inverse root
/// `y^(-1/|N|)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootIndex {
    n: i32,
    degree: Degree,
    // Shift replacing the division by |N| when |N| is a power of 2.
    shift: Option<u32>,
}

impl RootIndex {
    /// Validate the root index `n`.  Return [`Error::ZeroRoot`] if
    /// `n` is zero.
    pub fn new(n: i32) -> Result<Self, Error> {
        if n == 0 {
            return Err(Error::ZeroRoot)
        }
        let d = n.unsigned_abs();
        let shift = if d.is_power_of_two() { Some(d.trailing_zeros()) }
                    else { None };
        Ok(RootIndex { n, degree: Degree::new(d), shift })
    }

    /// The root index N.
    #[inline]
    pub fn get(self) -> i32 { self.n }

    /// The degree |N| of the root.
    #[inline]
    pub fn degree(self) -> u32 { self.n.unsigned_abs() }

    /// Whether this is the index of an inverse root (N < 0).
    #[inline]
    pub fn is_inverse(self) -> bool { self.n < 0 }

    /// The exponent `1/N` of the root as a `f64`.
    #[inline]
    pub fn exponent(self) -> f64 { 1. / self.n as f64 }

    /// If |N| is a power of two, the shift `s` such that |N| = 2^`s`.
    #[inline]
    pub fn shift(self) -> Option<u32> { self.shift }

    /// Return `y^(1/N)` using closed forms when available.
    #[inline]
    pub fn root<T: RootFloat>(self, y: T) -> T {
        let r = self.degree.root(y);
        if self.n < 0 { T::ONE / r } else { r }
    }

    /// Return `y^(1/N)` computed as accurately as possible in `f64`.
    /// This is the value errors are measured against.
    #[inline]
    fn reference_root(self, y: f64) -> f64 {
        let r = match self.degree {
            Degree::Other(d) => generic_root(y, d),
            deg => deg.root(y),
        };
        if self.n < 0 { 1. / r } else { r }
    }

    /// `i / N` for the bit pattern `i` of a positive float.
    #[inline]
    fn divide(self, i: i64) -> i64 {
        match self.shift {
            Some(s) if self.n > 0 => i >> s,
            Some(s) => -(i >> s),
            None => i / self.n as i64,
        }
    }
}

/// Return `y^(1/n)`, or [`Error::ZeroRoot`] if `n` is zero.
///
/// ```
/// # fn main() -> Result<(), magicroot::Error> {
/// use magicroot::root_i;
/// assert_eq!(root_i(16f64, 4)?, 2.);
/// assert_eq!(root_i(16f32, -2)?, 0.25);
/// assert!(root_i(1f64, 0).is_err());
/// # Ok(()) }
/// ```
pub fn root_i<T: RootFloat>(y: T, n: i32) -> Result<T, Error> {
    Ok(RootIndex::new(n)?.root(y))
}

////////////////////////////////////////////////////////////////////////
//
// Roots to approximate and their domains

/// The root to approximate: root index N, float precision `T` and
/// number of Newton steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootSpec<T> {
    index: RootIndex,
    steps: u32,
    float: PhantomData<T>,
}

impl<T: RootFloat> RootSpec<T> {
    /// Specify the approximation of `y^(1/n)` with `steps` Newton
    /// steps.  Return [`Error::ZeroRoot`] if `n` is zero.
    pub fn new(n: i32, steps: u32) -> Result<Self, Error> {
        Ok(RootSpec { index: RootIndex::new(n)?, steps, float: PhantomData })
    }

    #[inline]
    pub fn index(&self) -> RootIndex { self.index }

    /// The root index N.
    #[inline]
    pub fn n(&self) -> i32 { self.index.n }

    /// The number of Newton steps.
    #[inline]
    pub fn steps(&self) -> u32 { self.steps }

    #[inline]
    pub fn precision(&self) -> Precision { T::PRECISION }

    /// The nominal blend weight `1/N`.
    pub fn nominal_weight(&self) -> T { T::from_f64(self.index.exponent()) }

    /// The canonical test range \[1, 2^|N|\].  Scaling the input by
    /// 2^|N| scales both the root and its approximation by 2 (or ½),
    /// so the relative error on this range is the one on all normal
    /// floats away from the extremes of the exponent range.
    pub fn domain(&self) -> (T, T) {
        (T::ONE, T::from_f64(2f64.powf(self.index.degree() as f64)))
    }
}

/// A range of positive normal floats, stored as the bit patterns of
/// its bounds.  Since the bits of positive floats are ordered as the
/// floats themselves, the range is enumerated by counting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain<T> {
    start: i64,
    end: i64,
    float: PhantomData<T>,
}

impl<T: RootFloat> Domain<T> {
    /// The range \[`min`, `max`\].  Return [`Error::InvalidDomain`]
    /// unless `min` and `max` are positive normal floats with
    /// `min` ≤ `max`.
    pub fn new(min: T, max: T) -> Result<Self, Error> {
        if !(min.is_normal() && max.is_normal()
             && min.to_f64() > 0. && min <= max) {
            return Err(Error::InvalidDomain {
                min: min.to_f64(), max: max.to_f64() })
        }
        Ok(Domain {
            start: T::int_to_i64(min.to_int()),
            end: T::int_to_i64(max.to_int()),
            float: PhantomData,
        })
    }

    pub fn min(&self) -> T { T::from_int(T::int_from_i64(self.start)) }

    pub fn max(&self) -> T { T::from_int(T::int_from_i64(self.end)) }

    /// Number of floats in the range.
    pub fn count(&self) -> u64 { (self.end - self.start) as u64 + 1 }
}

////////////////////////////////////////////////////////////////////////
//
// Approximation model

/// A bit-hack approximation of `y^(1/N)`: magic constant `k` and
/// blend weight `m` of the Newton steps (see the [crate] documentation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateModel<T: RootFloat> {
    spec: RootSpec<T>,
    magic: T::Int,
    weight: T,
}

impl<T: RootFloat> CandidateModel<T> {
    /// Model with the magic constant `magic` and the nominal blend
    /// weight `1/N`.
    pub fn new(spec: RootSpec<T>, magic: T::Int) -> Self {
        CandidateModel { spec, magic, weight: spec.nominal_weight() }
    }

    /// Change the blend weight to `m`.
    #[must_use]
    pub fn with_weight(mut self, m: T) -> Self {
        self.weight = m;
        self
    }

    #[inline]
    pub fn spec(&self) -> RootSpec<T> { self.spec }

    #[inline]
    pub fn magic(&self) -> T::Int { self.magic }

    #[inline]
    pub fn weight(&self) -> T { self.weight }

    /// Initial estimate `k + i / N` where `i` are the bits of `y`.
    #[inline]
    pub fn initial_estimate(&self, y: T) -> T {
        let i = T::int_to_i64(y.to_int());
        let k = T::int_to_i64(self.magic);
        T::from_int(T::int_from_i64(k.wrapping_add(self.spec.index.divide(i))))
    }

    /// Inverse of [`initial_estimate`][Self::initial_estimate] (up to
    /// the truncation of the division): the float with bits
    /// `(i - k)·N` where `i` are the bits of `x`.
    pub fn initial_estimate_inverse(&self, x: T) -> T {
        let i = T::int_to_i64(x.to_int());
        let k = T::int_to_i64(self.magic);
        let n = self.spec.index.n as i64;
        T::from_int(T::int_from_i64(i.wrapping_sub(k).wrapping_mul(n)))
    }

    /// One Newton step refining the estimate `x` of the root of `y`.
    #[inline]
    pub fn refine(&self, y: T, x: T) -> T {
        let m = self.weight;
        let n = self.spec.index.n;
        if n > 0 {
            x * (T::ONE - m) + m * y / pow_i(x, n - 1)
        } else {
            x * ((T::ONE - m) + m * y * self.spec.index.degree.pow(x))
        }
    }

    /// Approximate `y^(1/N)`.  The result is only meaningful for
    /// positive normal `y`.
    #[inline]
    pub fn eval(&self, y: T) -> T {
        let mut x = self.initial_estimate(y);
        for _ in 0 .. self.spec.steps {
            x = self.refine(y, x);
        }
        x
    }

    /// Error statistics of the model on its canonical domain
    /// [`RootSpec::domain`], enumerating every float.
    pub fn stats(&self) -> Result<ErrorStats, Error> {
        let (a, b) = self.spec.domain();
        exhaustive(self.spec.n(), |y| self.eval(y), a, b).stats()
    }
}

////////////////////////////////////////////////////////////////////////
//
// Exhaustive evaluation

/// Statistics of the relative error `(approx - root) / root`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ErrorStats {
    pub mean_sq_error: f64,
    pub mean_error: f64,
    /// Smallest (signed) error and the input at which it occurs.
    pub min_error: f64,
    pub min_error_arg: f64,
    /// Largest (signed) error and the input at which it occurs.
    pub max_error: f64,
    pub max_error_arg: f64,
}

impl ErrorStats {
    /// The largest magnitude of the error.
    pub fn worst_error(&self) -> f64 {
        self.min_error.abs().max(self.max_error.abs())
    }

    /// Root mean square of the error.
    pub fn rms(&self) -> f64 { self.mean_sq_error.sqrt() }
}

impl Display for ErrorStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "RMS:  {:e}", self.rms())?;
        writeln!(f, "mean: {:e}", self.mean_error)?;
        writeln!(f, "min:  {:e} @ {}", self.min_error, self.min_error_arg)?;
        write!(f, "max:  {:e} @ {}", self.max_error, self.max_error_arg)
    }
}

/// Measure the relative error of `f` as an approximation of
/// `y^(1/n)` by evaluating it at every float `y` of
/// \[`min`, `max`\].
///
/// The reference root is computed in `f64` (with MPFR when the `rug`
/// feature is enabled and |`n`| has no closed form).  Nothing is
/// computed until [`stats`][Exhaustive::stats] or
/// [`worst_case`][Exhaustive::worst_case] is called.  Enumerating a
/// wide range of `f64` is not tractable; use
/// [`stride`][Exhaustive::stride] to evaluate only one float out of
/// many in that case.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), magicroot::Error> {
/// use magicroot::exhaustive;
/// let s = exhaustive(2, |y: f32| y.sqrt(), 1., 4.).stats()?;
/// assert!(s.worst_error() <= f32::EPSILON as f64);
/// # Ok(()) }
/// ```
pub fn exhaustive<T, F>(n: i32, f: F, min: T, max: T) -> Exhaustive<T, F>
where T: RootFloat,
      F: Fn(T) -> T {
    Exhaustive { n, f, min, max, stride: 1 }
}

/// Exhaustive evaluator returned by [`exhaustive`].
pub struct Exhaustive<T, F> {
    n: i32,
    f: F,
    min: T,
    max: T,
    stride: i64,
}

impl<T, F> Exhaustive<T, F>
where T: RootFloat,
      F: Fn(T) -> T {
    /// Only evaluate one float out of `stride` (starting with `min`).
    /// A value of `0` is interpreted as `1` (every float); strides
    /// beyond `i64::MAX` as `i64::MAX` (only `min` is evaluated).
    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = positive_stride(stride);
        self
    }

    fn check(&self) -> Result<(RootIndex, Domain<T>), Error> {
        Ok((RootIndex::new(self.n)?, Domain::new(self.min, self.max)?))
    }

    /// Return the statistics of the relative error.  The means are
    /// taken over `(end - start) / stride` samples where `start` and
    /// `end` are the bit patterns of the bounds.
    pub fn stats(&self) -> Result<ErrorStats, Error> {
        let (index, domain) = self.check()?;
        Ok(enumerate_stats(index, &self.f, domain, self.stride))
    }

    /// Return the largest magnitude of the relative error.  This is
    /// cheaper than [`stats`][Exhaustive::stats].
    pub fn worst_case(&self) -> Result<f64, Error> {
        let (index, domain) = self.check()?;
        Ok(enumerate_worst(index, &self.f, domain, self.stride))
    }
}

#[inline]
fn positive_stride(stride: usize) -> i64 {
    i64::try_from(stride).unwrap_or(i64::MAX).max(1)
}

/// Iterate on the floats of `domain`, one out of `stride` (≥ 1).
fn floats<T: RootFloat>(
    domain: Domain<T>, stride: i64
) -> impl Iterator<Item = T> {
    grid(domain.start, domain.end, stride)
        .map(|i| T::from_int(T::int_from_i64(i)))
}

#[inline]
fn relative_error<T, F>(index: RootIndex, f: &F, y: T) -> f64
where T: RootFloat, F: Fn(T) -> T {
    let root = index.reference_root(y.to_f64());
    (f(y).to_f64() - root) / root
}

fn enumerate_stats<T, F>(
    index: RootIndex, f: &F, domain: Domain<T>, stride: i64
) -> ErrorStats
where T: RootFloat, F: Fn(T) -> T {
    let mut sum_error = 0.;
    let mut sum_sq_error = 0.;
    let mut s = ErrorStats {
        min_error: f64::INFINITY,
        max_error: f64::NEG_INFINITY,
        ..ErrorStats::default()
    };
    for y in floats(domain, stride) {
        let error = relative_error(index, f, y);
        sum_error += error;
        sum_sq_error += error * error;
        if error < s.min_error { s.min_error = error;  s.min_error_arg = y.to_f64() }
        if error > s.max_error { s.max_error = error;  s.max_error_arg = y.to_f64() }
    }
    let samples = ((domain.end - domain.start) / stride).max(1) as f64;
    s.mean_error = sum_error / samples;
    s.mean_sq_error = sum_sq_error / samples;
    s
}

fn enumerate_worst<T, F>(
    index: RootIndex, f: &F, domain: Domain<T>, stride: i64
) -> f64
where T: RootFloat, F: Fn(T) -> T {
    floats(domain, stride)
        .map(|y| {
            let error = relative_error(index, f, y);
            if error.is_nan() { f64::INFINITY } else { error.abs() }
        })
        .fold(0., f64::max)
}

////////////////////////////////////////////////////////////////////////
//
// Analytic error range

/// Range \[`min`, `max`\] of the ratio `approx / root`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioRange {
    pub min: f64,
    pub max: f64,
}

impl RatioRange {
    /// The empty range.
    pub fn empty() -> Self {
        RatioRange { min: f64::INFINITY, max: f64::NEG_INFINITY }
    }

    pub fn is_empty(&self) -> bool { !(self.min <= self.max) }

    /// Extend the range to contain `r`.  Non-finite ratios are ignored.
    #[inline]
    fn consider(&mut self, r: f64) {
        if r.is_finite() {
            self.min = self.min.min(r);
            self.max = self.max.max(r);
        }
    }

    /// The largest relative error `|r - 1|` for `r` in the range,
    /// `+∞` if the range is empty.
    pub fn worst_error(&self) -> f64 {
        if self.is_empty() { return f64::INFINITY }
        (self.min - 1.).abs().max((self.max - 1.).abs())
    }
}

/// Abscissa of the extremum in \]`y1`, `y2`\[ of
/// `(a + b·y) · y^(-p)` where the line `a + b·y` goes through
/// (`y1`, `x1`) and (`y2`, `x2`).
fn stationary_point(p: f64, (y1, x1): (f64, f64), (y2, x2): (f64, f64))
                    -> Option<f64> {
    let dx = x2 - x1;
    // Flat segments have no interior extremum and make the formula
    // ill-conditioned.
    if dx.abs() <= f64::EPSILON * x1.abs().max(x2.abs()) {
        return None
    }
    let y = p / (p - 1.) * (y1 - x1 * (y2 - y1) / dx);
    if y.is_finite() && y1 < y && y < y2 { Some(y) } else { None }
}

impl<T: RootFloat> CandidateModel<T> {
    /// Input in \[1, 2^|N|\[ at which the initial estimate crosses a
    /// power of two (a kink of the estimate), if any.
    fn output_boundary(&self, top: f64) -> Option<f64> {
        let mut y = self.initial_estimate_inverse(T::ONE).to_f64();
        if !(y > 0. && y.is_finite()) {
            return None
        }
        while y < 1. { y *= top }
        while y >= top { y /= top }
        Some(y)
    }

    /// Range of `initial_estimate(y) / y^(1/N)` on the canonical
    /// domain.
    ///
    /// On each interval between consecutive powers of two of `y` and
    /// the point where the estimate crosses a power of two, the
    /// estimate is affine in `y`.  The ratio is thus extremal at the
    /// ends of these intervals or at the stationary point of
    /// `(a + b·y)·y^(-1/N)`, which are all evaluated.
    pub fn initial_ratio_range(&self) -> RatioRange {
        let index = self.spec.index;
        let mut range = RatioRange::empty();
        let top = self.spec.domain().1.to_f64();
        if !(top > 1. && top.is_finite()) {
            return range
        }
        let sample = |y: f64| {
            let y = T::from_f64(y);
            let x = self.initial_estimate(y).to_f64();
            (x, x / index.reference_root(y.to_f64()))
        };
        let mut bounds: Vec<f64> = (0 ..= index.degree())
            .map(|i| 2f64.powi(i as i32)).collect();
        bounds.extend(self.output_boundary(top));
        bounds.sort_by(f64::total_cmp);
        bounds.dedup();

        let mut y1 = bounds[0];
        let (mut x1, r1) = sample(y1);
        range.consider(r1);
        for &y2 in &bounds[1..] {
            let (x2, r2) = sample(y2);
            if let Some(y) = stationary_point(index.exponent(), (y1, x1), (y2, x2)) {
                range.consider(sample(y).1);
            }
            range.consider(r2);
            y1 = y2;
            x1 = x2;
        }
        range
    }

    /// Range of the ratio after one Newton step, given the range
    /// `prev` of the ratio before it.
    ///
    /// In terms of the ratio `r`, a step is the map
    /// `r ↦ (1 - m)·r + m·r^(1-N)` which is evaluated at the bounds
    /// of `prev` and at its stationary point if inside `prev`.
    pub fn refine_ratio_range(&self, prev: RatioRange) -> RatioRange {
        let mut range = RatioRange::empty();
        if prev.is_empty() {
            return range
        }
        let index = self.spec.index;
        let p = index.exponent();
        let m = self.weight.to_f64();
        let e = 1i32.saturating_sub(index.n);
        let blend = |r: f64| (1. - m) * r + m * pow_i(r, e);
        range.consider(blend(prev.min));
        range.consider(blend(prev.max));
        // Stationary point: r^(-N) = (m - 1) / (m (1 - N)).
        let base = m * (p - 1.) / (p * (m - 1.));
        if base > 0. && base.is_finite() {
            let r = index.reference_root(base);
            if prev.min < r && r < prev.max {
                range.consider(blend(r));
            }
        }
        range
    }

    /// Range of the ratio `eval(y) / y^(1/N)` on the canonical domain,
    /// computed without enumerating it.  Rounding errors of the
    /// Newton steps are not accounted for.
    pub fn ratio_range(&self) -> RatioRange {
        (0 .. self.spec.steps)
            .fold(self.initial_ratio_range(), |r, _| self.refine_ratio_range(r))
    }

    /// Analytic estimate of the worst relative error on the canonical
    /// domain.  See [`ratio_range`][Self::ratio_range].
    ///
    /// ```
    /// # fn main() -> Result<(), magicroot::Error> {
    /// use magicroot::{CandidateModel, RootSpec};
    /// let spec = RootSpec::<f32>::new(-2, 1)?;
    /// let f = CandidateModel::new(spec, 0x5f3759df).with_weight(-0.5);
    /// assert!((f.worst_case_bound() - 1.75e-3).abs() < 1e-5);
    /// # Ok(()) }
    /// ```
    pub fn worst_case_bound(&self) -> f64 {
        self.ratio_range().worst_error()
    }
}

////////////////////////////////////////////////////////////////////////
//
// Parameter search

// Bounds on log2(1 + x) - x for x ∈ [0, 1[.
const SIGMA_MIN: f64 = 0.;
const SIGMA_MAX: f64 = 0.08608;

const DEFAULT_MARGIN: f64 = 1.5;

/// Score minimized by the [`search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Basis {
    /// Worst relative error, by enumeration.
    #[default]
    WorstCase,
    /// Worst relative error, by [`CandidateModel::worst_case_bound`].
    /// Much faster.
    ApproxWorstCase,
    /// Mean squared relative error, by enumeration.
    MeanSquare,
}

/// Range of the parameters explored by a [`Search`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBounds<T: RootFloat> {
    pub magic_min: T::Int,
    pub magic_max: T::Int,
    pub weight_min: T,
    pub weight_max: T,
}

/// Parameter ranges as integers; the weight is represented by its bits.
#[derive(Debug, Clone, Copy)]
struct Bracket {
    k_min: i64,
    k_max: i64,
    m_min: i64,
    m_max: i64,
}

/// Search the magic constant and blend weight minimizing the error
/// of the approximation of `spec` on its canonical domain.
///
/// The search is a coarse-to-fine grid descent on the pairs
/// (`k`, bits of `m`): the grid step starts at a power of two
/// covering each range in about 8 steps, is divided by 4 at each
/// level and the ranges are narrowed to ±4 steps around the best
/// point found so far.  It finds a local optimum, usually the global
/// one.  The default score is the [`Basis::WorstCase`] which
/// enumerates the domain at every point of the grid; see
/// [`Search::basis`] and [`Search::stride`] for cheaper options.
///
/// # Example
///
/// ```
/// # fn main() -> Result<(), magicroot::Error> {
/// use magicroot::{search, Basis, RootSpec};
/// let spec = RootSpec::<f64>::new(3, 2)?;
/// let best = search(spec).basis(Basis::ApproxWorstCase).run()?;
/// assert!(best.score < 1e-5);
/// # Ok(()) }
/// ```
pub fn search<T: RootFloat>(spec: RootSpec<T>) -> Search<T> {
    Search { spec, basis: Basis::default(), margin: DEFAULT_MARGIN,
             stride: 1 }
}

/// Parameter search returned by [`search`].
#[derive(Debug, Clone)]
pub struct Search<T> {
    spec: RootSpec<T>,
    basis: Basis,
    margin: f64,
    stride: i64,
}

impl<T: RootFloat> Search<T> {
    /// Set the score to minimize.
    pub fn basis(mut self, basis: Basis) -> Self {
        self.basis = basis;
        self
    }

    /// Explore blend weights in \[`1/N ÷ margin`, `1/N × margin`\].
    /// Set the default value `1.5` if `margin` ≤ 1 or is not finite.
    pub fn margin(mut self, margin: f64) -> Self {
        self.margin = if margin > 1. && margin.is_finite() { margin }
                      else { DEFAULT_MARGIN };
        self
    }

    /// Evaluate the enumerating scores on one float out of `stride`
    /// (see [`Exhaustive::stride`]).
    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = positive_stride(stride);
        self
    }

    fn bracket(&self) -> Bracket {
        let l = (1_i64 << T::MANTISSA_BITS) as f64;
        let b = ((1_i64 << (T::EXPONENT_BITS - 1)) - 1) as f64;
        let p = self.spec.index.exponent();
        let k_min = ((1. - p) * l * (b - SIGMA_MAX)).floor() as i64;
        let k_max = ((1. - p) * l * (b - SIGMA_MIN)).ceil() as i64;
        let bits = |w: f64| T::int_to_i64(T::from_f64(w).to_int());
        let (mut m_min, mut m_max) = if self.spec.steps == 0 {
            (bits(p), bits(p))
        } else {
            (bits(p / self.margin), bits(p * self.margin))
        };
        // Negative weights have their bits in reverse order.
        if m_min > m_max { swap(&mut m_min, &mut m_max) }
        Bracket { k_min, k_max, m_min, m_max }
    }

    /// The ranges of magic constants and blend weights explored.
    pub fn bounds(&self) -> SearchBounds<T> {
        let b = self.bracket();
        let (w1, w2) = (weight_of::<T>(b.m_min), weight_of::<T>(b.m_max));
        SearchBounds {
            magic_min: T::int_from_i64(b.k_min),
            magic_max: T::int_from_i64(b.k_max),
            weight_min: if w1 <= w2 { w1 } else { w2 },
            weight_max: if w1 <= w2 { w2 } else { w1 },
        }
    }

    fn candidate(&self, k: i64, m: i64) -> CandidateModel<T> {
        CandidateModel::new(self.spec, T::int_from_i64(k))
            .with_weight(weight_of::<T>(m))
    }

    fn score(&self, domain: Domain<T>, k: i64, m: i64) -> f64 {
        let model = self.candidate(k, m);
        let f = |y| model.eval(y);
        match self.basis {
            Basis::WorstCase =>
                enumerate_worst(self.spec.index, &f, domain, self.stride),
            Basis::ApproxWorstCase => model.worst_case_bound(),
            Basis::MeanSquare =>
                enumerate_stats(self.spec.index, &f, domain, self.stride)
                .mean_sq_error,
        }
    }

    /// Run the search.  Return [`Error::InvalidDomain`] if the
    /// canonical domain of the `RootSpec` is not representable (|N| too
    /// large for the precision).
    pub fn run(&self) -> Result<SearchResult<T>, Error> {
        let (a, b) = self.spec.domain();
        let domain = Domain::new(a, b)?;
        let Bracket { k_min, k_max, m_min, m_max } = self.bracket();
        log::debug!("searching {}th root ({}, {} steps, {:?}): \
                     k ∈ [{:#x}, {:#x}], m ∈ [{:?}, {:?}]",
                    self.spec.n(), T::PRECISION.float_name(),
                    self.spec.steps, self.basis, k_min, k_max,
                    weight_of::<T>(m_min), weight_of::<T>(m_max));

        // Seed with the nominal design so that a result always exists.
        let mut best_k = k_min + (k_max - k_min) / 2;
        let mut best_m = T::int_to_i64(self.spec.nominal_weight().to_int())
            .clamp(m_min, m_max);
        let mut best_score = self.score(domain, best_k, best_m);

        let step = coarse_step(k_max - k_min).max(coarse_step(m_max - m_min));
        let (mut k_step, mut m_step) = (step, step);
        let (mut k_lo, mut k_hi) = (k_min, k_max);
        let (mut m_lo, mut m_hi) = (m_min, m_max);
        while k_lo < k_hi || m_lo < m_hi {
            k_step = k_step.max(1);
            m_step = m_step.max(1);
            let k_start = k_lo + (k_step / 2).min((k_hi - k_lo) / 2);
            let m_start = m_lo + (m_step / 2).min((m_hi - m_lo) / 2);
            for k in grid(k_start, k_hi, k_step) {
                for m in grid(m_start, m_hi, m_step) {
                    let score = self.score(domain, k, m);
                    if score < best_score {
                        log::trace!("k = {:#x}, m = {:?}: {:e}",
                                    k, weight_of::<T>(m), score);
                        best_score = score;
                        best_k = k;
                        best_m = m;
                    }
                }
            }
            log::debug!("step {}: best k = {:#x}, m = {:?}, score {:e}",
                        k_step, best_k, weight_of::<T>(best_m), best_score);
            k_step = if k_step > 1 { (k_step >> 2).max(1) } else { 0 };
            m_step = if m_step > 1 { (m_step >> 2).max(1) } else { 0 };
            k_lo = best_k.saturating_sub(4 * k_step).max(k_min);
            k_hi = best_k.saturating_add(4 * k_step).min(k_max);
            m_lo = best_m.saturating_sub(4 * m_step).max(m_min);
            m_hi = best_m.saturating_add(4 * m_step).min(m_max);
        }

        let best = self.candidate(best_k, best_m);
        log::debug!("best design k = {:#x}, m = {:?} with score {:e}",
                    best_k, best.weight, best_score);
        Ok(SearchResult {
            magic: best.magic,
            weight: best.weight,
            score: best_score,
            spec: self.spec,
            domain,
        })
    }
}

/// The blend weight with bits `m`.
#[inline]
fn weight_of<T: RootFloat>(m: i64) -> T { T::from_int(T::int_from_i64(m)) }

/// Smallest power of two ≥ `v` (and ≥ 1).
fn next_pow2(v: i64) -> i64 {
    (v.max(1) as u64).next_power_of_two() as i64
}

/// Smallest power of two covering `width` in at most 8 steps.
fn coarse_step(width: i64) -> i64 {
    next_pow2(width.saturating_add(7) / 8)
}

/// `start`, `start + step`,... up to `end` included.
fn grid(start: i64, end: i64, step: i64) -> impl Iterator<Item = i64> {
    iter::successors(Some(start), move |&v| v.checked_add(step))
        .take_while(move |&v| v <= end)
}

/// Best design found by a [`Search`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchResult<T: RootFloat> {
    pub magic: T::Int,
    pub weight: T,
    /// Score of the design according to the [`Basis`] of the search.
    pub score: f64,
    spec: RootSpec<T>,
    domain: Domain<T>,
}

impl<T: RootFloat> SearchResult<T> {
    #[inline]
    pub fn spec(&self) -> RootSpec<T> { self.spec }

    /// The model with the best parameters.
    pub fn model(&self) -> CandidateModel<T> {
        CandidateModel::new(self.spec, self.magic).with_weight(self.weight)
    }

    /// Error statistics of the best model, enumerating every float of
    /// the canonical domain.
    pub fn stats(&self) -> ErrorStats {
        let model = self.model();
        enumerate_stats(self.spec.index, &|y| model.eval(y), self.domain, 1)
    }
}

////////////////////////////////////////////////////////////////////////
//
// Code emission

fn int_literal(v: i64) -> String {
    if v >= 0 { format!("{v:#x}") } else { v.to_string() }
}

/// `x^d` as source code, `None` for `d = 0`.  The products are
/// grouped as in [`Degree::pow`] so the emitted code rounds the same.
fn power_source(d: u32) -> Option<String> {
    match d {
        0 => None,
        1 => Some("x".to_string()),
        4 => Some("((x * x) * (x * x))".to_string()),
        d => Some(format!("({})", vec!["x"; d as usize].join(" * "))),
    }
}

/// Render the model as the source of a Rust function named after the
/// root, e.g. `inv_root2_f32`.
///
/// ```
/// # fn main() -> Result<(), magicroot::Error> {
/// use magicroot::{CandidateModel, RootSpec};
/// let spec = RootSpec::<f32>::new(-2, 1)?;
/// let f = CandidateModel::new(spec, 0x5f3759df).with_weight(-0.5);
/// assert!(f.to_string().contains("x *= 1.5 - 0.5 * y * (x * x);"));
/// # Ok(()) }
/// ```
impl<T: RootFloat> Display for CandidateModel<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let index = self.spec.index;
        let d = index.degree();
        let p = T::PRECISION;
        let (float, int, uint) = (p.float_name(), p.int_name(), p.uint_name());
        let inv = if index.is_inverse() { "inv_" } else { "" };
        writeln!(f, "pub fn {inv}root{d}_{float}(y: {float}) -> {float} {{")?;
        writeln!(f, "    let i = y.to_bits() as {int}; \
                     // interpret float as integer")?;
        let op = if index.is_inverse() { '-' } else { '+' };
        let magic = int_literal(T::int_to_i64(self.magic));
        match index.shift() {
            Some(s) => writeln!(f, "    let i = {magic} {op} (i >> {s}); \
                                    // log-approximation hack")?,
            None => writeln!(f, "    let i = {magic} {op} (i / {d}); \
                                 // log-approximation hack")?,
        }
        let steps = self.spec.steps;
        let mutable = if steps > 0 { "mut " } else { "" };
        writeln!(f, "    let {mutable}x = {float}::from_bits(i as {uint});")?;
        let m = self.weight;
        let a = T::ONE - m;
        let (sign, b) = if m.to_f64() < 0. { ('-', -m) } else { ('+', m) };
        for step in 1 ..= steps {
            if index.is_inverse() {
                let pow = power_source(d).unwrap_or_default();
                write!(f, "    x *= {a:?} {sign} {b:?} * y * {pow};")?;
            } else {
                write!(f, "    x = {a:?} * x {sign} {b:?} * y")?;
                if let Some(pow) = power_source(d - 1) {
                    write!(f, " / {pow}")?;
                }
                write!(f, ";")?;
            }
            writeln!(f, " // newtonian step #{step}")?;
        }
        writeln!(f, "    x")?;
        write!(f, "}}")
    }
}

////////////////////////////////////////////////////////////////////////
//
// Tests

#[cfg(test)]
macro_rules! assert_approx_eq {
    ($a: expr, $b: expr, $err: expr) => {
        let a = $a;
        let b = $b;
        if ! ((a - b).abs() <= $err) {
            panic!("|left - right| ≤ {:e}\n  left: {}\n right: {}",
                   $err, a, b);
        }
    }
}
