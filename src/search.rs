/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Divider search.
//!
//! The output frequency is
//!
//! ```text
//! f_out = f_ref * (a1 + b1 / c1) / (a2 + b2 / c2) / 2^r
//! ```
//!
//! where the first divider sets the VCO and the second (the output
//! multisynth) divides it down. The search keeps every quantity as an exact
//! rational and only falls back to a bounded continued fraction when the exact
//! ratio has a denominator wider than 20 bits.

use crate::codec::{RationalDivider, FRACTION_MAX};
use crate::registers::OutputDivider;
use crate::Error;

pub const VCO_MIN_HZ: u64 = 600_000_000;
pub const VCO_MAX_HZ: u64 = 900_000_000;

pub const OUTPUT_MIN_HZ: u64 = 2_500;
pub const OUTPUT_MAX_HZ: u64 = 200_000_000;

pub const PLL_WHOLE_MIN: u32 = 15;
pub const PLL_WHOLE_MAX: u32 = 90;

/// Largest output multisynth divisor.
pub const MULTISYNTH_MAX: u32 = 2048;
/// Smallest whole part of a fractional output multisynth divisor.
pub const MULTISYNTH_FRACTIONAL_MIN: u32 = 8;
/// Integer divisors the output multisynth cannot use in its rational form.
pub const FORBIDDEN_DIVISORS: [u32; 6] = [1, 2, 3, 4, 5, 7];

/// Above this the smallest rational divisor (6) would push the VCO past its
/// upper limit, so the fixed divide-by-4 path is used.
pub const DIV_BY_4_THRESHOLD_HZ: u64 = VCO_MAX_HZ / 6;

/// Relative error the search aims for.
pub const TARGET_TOLERANCE: f64 = 1e-9;
/// Largest relative error still returned to the caller.
pub const ACCEPT_TOLERANCE: f64 = 1e-6;

const FRACTIONAL_SCAN_LIMIT: u64 = 4096;

/// Constraints a solution has to satisfy on top of the device limits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Limits {
    pub multisynth_max: u32,
    pub allow_div_by_4: bool,
    pub allow_r_div: bool,
}

impl Limits {
    pub const SINGLE: Limits = Limits {
        multisynth_max: MULTISYNTH_MAX,
        allow_div_by_4: true,
        allow_r_div: true,
    };

    /// The phase offset register is 7 bits wide and counts quarter VCO
    /// periods, so a 90° shift needs the divisor itself to fit in it.
    pub const QUADRATURE: Limits = Limits {
        multisynth_max: 127,
        allow_div_by_4: false,
        allow_r_div: false,
    };

    fn allows_multisynth(&self, ms: &RationalDivider) -> bool {
        if ms.is_integer() {
            !FORBIDDEN_DIVISORS.contains(&ms.whole)
                && ms.whole <= self.multisynth_max.min(MULTISYNTH_MAX)
        } else {
            ms.whole >= MULTISYNTH_FRACTIONAL_MIN
                && ms.whole < self.multisynth_max.min(MULTISYNTH_MAX)
        }
    }
}

/// Divider settings producing one output frequency.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Solution {
    pub pll: RationalDivider,
    /// Output multisynth; `4` when `div_by_4` is set.
    pub multisynth: RationalDivider,
    pub div_by_4: bool,
    pub r_div: OutputDivider,
}

impl Solution {
    pub fn vco_hz(&self, reference_hz: u32) -> f64 {
        f64::from(reference_hz) * self.pll.as_f64()
    }

    pub fn output_hz(&self, reference_hz: u32) -> f64 {
        self.vco_hz(reference_hz) / self.multisynth.as_f64() / f64::from(self.r_div.denominator())
    }

    /// `|f_out - target| / target`, computed from the exact rational output.
    pub fn relative_error(&self, reference_hz: u32, target_hz: u64) -> f64 {
        // f_out = ref * pll_n * ms_d / (pll_d * ms_n * 2^r)
        let produced = u128::from(reference_hz)
            * u128::from(self.pll.scaled())
            * u128::from(self.multisynth.denominator);
        let divisor = u128::from(self.pll.denominator)
            * u128::from(self.multisynth.scaled())
            * u128::from(self.r_div.denominator());
        let wanted = u128::from(target_hz) * divisor;
        if wanted == 0 {
            return f64::INFINITY;
        }
        let diff = if produced > wanted {
            produced - wanted
        } else {
            wanted - produced
        };
        diff as f64 / wanted as f64
    }
}

/// Finds dividers for `target_hz` with no restriction beyond the device limits.
pub fn seek(reference_hz: u32, target_hz: u64) -> Result<Solution, Error> {
    seek_with(reference_hz, target_hz, &Limits::SINGLE)
}

/// Finds dividers usable for a quadrature pair.
pub fn seek_quadrature(reference_hz: u32, target_hz: u64) -> Result<Solution, Error> {
    seek_with(reference_hz, target_hz, &Limits::QUADRATURE)
}

pub fn seek_with(reference_hz: u32, target_hz: u64, limits: &Limits) -> Result<Solution, Error> {
    if reference_hz == 0 {
        return Err(Error::InvalidParameter);
    }
    if !(OUTPUT_MIN_HZ..=OUTPUT_MAX_HZ).contains(&target_hz) {
        return Err(Error::UnreachableFrequency);
    }

    let mut search = Search {
        reference_hz: u64::from(reference_hz),
        target_hz,
        limits,
        best: None,
    };

    if target_hz > DIV_BY_4_THRESHOLD_HZ {
        if !limits.allow_div_by_4 {
            return Err(Error::UnreachableFrequency);
        }
        search.div_by_4();
    } else {
        let r_div = select_r_div(target_hz, limits)?;
        let ms_hz = target_hz << r_div.bits();

        search.integer_multisynth(ms_hz, r_div);
        if !search.converged() {
            search.exact_fractional_multisynth(ms_hz, r_div);
        }
        if !search.converged() {
            search.integer_pll(ms_hz, r_div);
        }
    }

    match search.best {
        Some(candidate) if candidate.error <= ACCEPT_TOLERANCE => Ok(candidate.solution),
        _ => Err(Error::UnreachableFrequency),
    }
}

/// Smallest R divider that lets the largest multisynth divisor reach the VCO band.
fn select_r_div(target_hz: u64, limits: &Limits) -> Result<OutputDivider, Error> {
    let ms_max = u64::from(limits.multisynth_max.min(MULTISYNTH_MAX));
    let mut exp = 0u8;
    while (target_hz << exp) * ms_max < VCO_MIN_HZ {
        exp += 1;
    }
    if exp > 0 && !limits.allow_r_div {
        return Err(Error::UnreachableFrequency);
    }
    OutputDivider::from_exp(exp).map_err(|_| Error::UnreachableFrequency)
}

#[derive(Debug, Copy, Clone)]
struct Candidate {
    solution: Solution,
    error: f64,
}

impl Candidate {
    fn converged(&self) -> bool {
        self.error <= TARGET_TOLERANCE
    }

    /// Converged candidates rank by the simpler multisynth fraction, the
    /// others by their error. Ties keep the earlier (lower VCO) candidate.
    fn improves_on(&self, other: &Candidate) -> bool {
        match (self.converged(), other.converged()) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => {
                self.solution.multisynth.denominator < other.solution.multisynth.denominator
            }
            (false, false) => self.error < other.error,
        }
    }
}

struct Search<'a> {
    reference_hz: u64,
    target_hz: u64,
    limits: &'a Limits,
    best: Option<Candidate>,
}

impl<'a> Search<'a> {
    fn converged(&self) -> bool {
        self.best.as_ref().map_or(false, Candidate::converged)
    }

    fn consider(&mut self, solution: Solution) {
        if !pll_in_range(&solution.pll, self.reference_hz) {
            return;
        }
        if !solution.div_by_4 && !self.limits.allows_multisynth(&solution.multisynth) {
            return;
        }

        let candidate = Candidate {
            solution,
            error: solution.relative_error(self.reference_hz as u32, self.target_hz),
        };
        let better = match self.best {
            Some(ref best) => candidate.improves_on(best),
            None => true,
        };
        if better {
            self.best = Some(candidate);
        }
    }

    fn div_by_4(&mut self) {
        let vco_hz = 4 * self.target_hz;
        if let Some(pll) = approximate(vco_hz, self.reference_hz) {
            self.consider(Solution {
                pll,
                multisynth: RationalDivider::integer(4),
                div_by_4: true,
                r_div: OutputDivider::Div1,
            });
        }
    }

    /// Integer output divisors, lowest VCO first, each with the PLL ratio the
    /// resulting VCO needs.
    fn integer_multisynth(&mut self, ms_hz: u64, r_div: OutputDivider) {
        let lowest = ((VCO_MIN_HZ + ms_hz - 1) / ms_hz).max(6);
        let highest = (VCO_MAX_HZ / ms_hz).min(u64::from(self.limits.multisynth_max));

        for divisor in lowest..=highest {
            if let Some(pll) = approximate(ms_hz * divisor, self.reference_hz) {
                self.consider(Solution {
                    pll,
                    multisynth: RationalDivider::integer(divisor as u32),
                    div_by_4: false,
                    r_div,
                });
            }
            if self.converged() {
                break;
            }
        }
    }

    /// Exact fractional solutions.
    ///
    /// With `F / R` the reduced ratio of multisynth output to reference, every
    /// exact solution has `pll = F * t` and `multisynth = R * t`. Taking
    /// `t = k / (v1 * v2)`, where `v1` divides `F` and `v2` divides `R` and
    /// both fit a 20-bit denominator, keeps both dividers encodable.
    fn exact_fractional_multisynth(&mut self, ms_hz: u64, r_div: OutputDivider) {
        let common = gcd(self.reference_hz, ms_hz);
        let f = ms_hz / common;
        let r = self.reference_hz / common;
        let v1 = largest_divisor_within(f, u64::from(FRACTION_MAX));
        let v2 = largest_divisor_within(r, u64::from(FRACTION_MAX));

        // vco = ms_hz * r * k / (v1 * v2)
        let scale = u128::from(v1) * u128::from(v2);
        let step = u128::from(ms_hz) * u128::from(r);
        let k_lo = (u128::from(VCO_MIN_HZ) * scale + step - 1) / step;
        let k_hi = (u128::from(VCO_MAX_HZ) * scale) / step;
        if k_lo > k_hi {
            return;
        }
        let k_hi = k_hi.min(k_lo + u128::from(FRACTIONAL_SCAN_LIMIT));

        for k in k_lo..=k_hi {
            let k = k as u64;
            let multisynth = reduced((r / v2) * k, v1);
            let pll = reduced((f / v1) * k, v2);
            if let (Some(pll), Some(multisynth)) = (pll, multisynth) {
                self.consider(Solution {
                    pll,
                    multisynth,
                    div_by_4: false,
                    r_div,
                });
            }
        }
    }

    /// Integer PLL multipliers with a fractional output divisor.
    fn integer_pll(&mut self, ms_hz: u64, r_div: OutputDivider) {
        for whole in PLL_WHOLE_MIN..=PLL_WHOLE_MAX {
            let vco_hz = self.reference_hz * u64::from(whole);
            if !(VCO_MIN_HZ..=VCO_MAX_HZ).contains(&vco_hz) {
                continue;
            }
            if let Some(multisynth) = approximate(vco_hz, ms_hz) {
                self.consider(Solution {
                    pll: RationalDivider::integer(whole),
                    multisynth,
                    div_by_4: false,
                    r_div,
                });
            }
        }
    }
}

fn pll_in_range(pll: &RationalDivider, reference_hz: u64) -> bool {
    if pll.whole < PLL_WHOLE_MIN || pll.whole > PLL_WHOLE_MAX {
        return false;
    }
    let vco = u128::from(reference_hz) * u128::from(pll.scaled());
    let denominator = u128::from(pll.denominator);
    vco >= u128::from(VCO_MIN_HZ) * denominator && vco <= u128::from(VCO_MAX_HZ) * denominator
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn largest_divisor_within(n: u64, limit: u64) -> u64 {
    if n <= limit {
        return n;
    }
    let mut best = 1;
    let mut i = 1;
    while i * i <= n {
        if n % i == 0 {
            if i <= limit && i > best {
                best = i;
            }
            let pair = n / i;
            if pair <= limit && pair > best {
                best = pair;
            }
        }
        i += 1;
    }
    best
}

/// `num / den` as a divider, when the reduced denominator fits 20 bits.
fn reduced(num: u64, den: u64) -> Option<RationalDivider> {
    let common = gcd(num, den);
    let (num, den) = (num / common, den / common);
    if den > u64::from(FRACTION_MAX) || num / den > u64::from(u32::MAX) {
        return None;
    }
    Some(RationalDivider::new(
        (num / den) as u32,
        (num % den) as u32,
        den as u32,
    ))
}

/// Closest divider to `num / den` whose denominator fits 20 bits.
///
/// Exact when the reduced fraction fits, otherwise the best of the last
/// continued fraction convergent and the largest admissible semiconvergent.
pub fn approximate(num: u64, den: u64) -> Option<RationalDivider> {
    if den == 0 {
        return None;
    }
    let max_den = u64::from(FRACTION_MAX);
    let whole = num / den;
    if whole > u64::from(u32::MAX) {
        return None;
    }
    let rem = num % den;
    if rem == 0 {
        return Some(RationalDivider::integer(whole as u32));
    }

    let common = gcd(rem, den);
    let (rem, den) = (rem / common, den / common);
    if den <= max_den {
        return Some(RationalDivider::new(whole as u32, rem as u32, den as u32));
    }

    // convergents p/q of rem/den, (p0, q0) the one before (p1, q1)
    let (mut p0, mut q0, mut p1, mut q1) = (0u64, 1u64, 1u64, 0u64);
    let (mut n, mut d) = (rem, den);
    let (p, q) = loop {
        let term = n / d;
        let q2 = term.saturating_mul(q1).saturating_add(q0);
        if q2 > max_den {
            let k = if q1 == 0 { 0 } else { (max_den - q0) / q1 };
            let (ps, qs) = (p0 + k * p1, q0 + k * q1);
            let err_convergent = distance(p1, q1, rem, den) * u128::from(qs);
            let err_semi = distance(ps, qs, rem, den) * u128::from(q1);
            break if k > 0 && err_semi < err_convergent {
                (ps, qs)
            } else {
                (p1, q1)
            };
        }
        let p2 = term * p1 + p0;
        p0 = p1;
        q0 = q1;
        p1 = p2;
        q1 = q2;

        let r = n % d;
        n = d;
        d = r;
        if d == 0 {
            break (p1, q1);
        }
    };

    if p == 0 {
        Some(RationalDivider::integer(whole as u32))
    } else if p == q {
        Some(RationalDivider::integer(whole as u32 + 1))
    } else {
        Some(RationalDivider::new(whole as u32, p as u32, q as u32))
    }
}

/// `|p / q - rem / den| * q * den`
fn distance(p: u64, q: u64, rem: u64, den: u64) -> u128 {
    let a = u128::from(p) * u128::from(den);
    let b = u128::from(rem) * u128::from(q);
    if a > b {
        a - b
    } else {
        b - a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fractions_are_reduced() {
        assert_eq!(approximate(605_880_000, 25_000_000), Some(RationalDivider::new(24, 147, 625)));
        assert_eq!(approximate(900_000_000, 25_000_000), Some(RationalDivider::integer(36)));
        assert_eq!(approximate(1, 0), None);
    }

    #[test]
    fn wide_fractions_use_the_closest_bounded_one() {
        // 600_000_006 / 25e6 = 24 + 3 / 12_500_000
        let divider = approximate(600_000_006, 25_000_000).unwrap();
        assert!(divider.denominator <= FRACTION_MAX);
        let exact = 600_000_006f64 / 25e6;
        assert!((divider.as_f64() - exact) < 3e-7 && (exact - divider.as_f64()) < 3e-7);

        // pi to many digits
        let divider = approximate(314_159_265_358_979, 100_000_000_000_000).unwrap();
        assert_eq!(divider.whole, 3);
        let err = divider.as_f64() - core::f64::consts::PI;
        assert!(err < 1e-11 && err > -1e-11, "{:?}", divider);
    }

    #[test]
    fn nearly_integral_fractions_collapse() {
        assert_eq!(
            approximate(1_000_000_000_000 - 1, 1_000_000_000_000),
            Some(RationalDivider::integer(1))
        );
        assert_eq!(
            approximate(2_000_000_000_001, 1_000_000_000_000),
            Some(RationalDivider::integer(2))
        );
    }

    #[test]
    fn lowest_vco_integer_divisor_wins() {
        let solution = seek(25_000_000, 50_490_000).unwrap();
        assert_eq!(solution.multisynth, RationalDivider::integer(12));
        assert_eq!(solution.pll, RationalDivider::new(24, 147, 625));
        assert_eq!(solution.relative_error(25_000_000, 50_490_000), 0.0);
    }

    #[test]
    fn exact_fractional_divisor_when_no_integer_one_is_exact() {
        // 100_000_001 = 17 * 5_882_353
        let solution = seek(25_000_000, 100_000_001).unwrap();
        assert_eq!(solution.multisynth, RationalDivider::new(8, 14, 17));
        assert_eq!(solution.pll, RationalDivider::new(35, 147_059, 500_000));
        assert_eq!(solution.relative_error(25_000_000, 100_000_001), 0.0);
    }

    #[test]
    fn approximate_solutions_stay_within_budget() {
        // 160_000_001 * 4 / 40e6 is 16 + 1 / 10_000_000
        let solution = seek(40_000_000, 160_000_001).unwrap();
        assert!(solution.div_by_4);
        assert_eq!(solution.pll, RationalDivider::integer(16));
        let err = solution.relative_error(40_000_000, 160_000_001);
        assert!(err > TARGET_TOLERANCE && err < ACCEPT_TOLERANCE);
    }

    #[test]
    fn r_divider_for_low_frequencies() {
        let solution = seek(25_000_000, 10_000).unwrap();
        assert_eq!(solution.r_div, OutputDivider::Div32);
        assert_eq!(solution.multisynth, RationalDivider::integer(1875));
        assert_eq!(solution.pll, RationalDivider::integer(24));
    }

    #[test]
    fn div_by_4_above_150_mhz() {
        let solution = seek(25_000_000, 150_000_000).unwrap();
        assert!(!solution.div_by_4);
        assert_eq!(solution.multisynth, RationalDivider::integer(6));

        let solution = seek(25_000_000, 200_000_000).unwrap();
        assert!(solution.div_by_4);
        assert_eq!(solution.pll, RationalDivider::integer(32));
    }

    #[test]
    fn out_of_range_targets() {
        assert_eq!(seek(25_000_000, 2_499), Err(Error::UnreachableFrequency));
        assert_eq!(seek(25_000_000, 200_000_001), Err(Error::UnreachableFrequency));
        assert_eq!(seek(0, 10_000_000), Err(Error::InvalidParameter));
        // no PLL multiplier in 15..=90 reaches the VCO band
        assert_eq!(seek(100_000_000, 10_000_000), Err(Error::UnreachableFrequency));
    }

    #[test]
    fn quadrature_limits() {
        let solution = seek_quadrature(25_000_000, 7_000_000).unwrap();
        assert_eq!(solution.multisynth, RationalDivider::integer(86));
        assert_eq!(solution.r_div, OutputDivider::Div1);

        assert_eq!(seek_quadrature(25_000_000, 4_700_000), Err(Error::UnreachableFrequency));
        assert_eq!(seek_quadrature(25_000_000, 161_234_000), Err(Error::UnreachableFrequency));
    }

    #[test]
    fn forbidden_divisors_are_skipped() {
        let limits = Limits::SINGLE;
        for &divisor in FORBIDDEN_DIVISORS.iter() {
            assert!(!limits.allows_multisynth(&RationalDivider::integer(divisor)));
        }
        assert!(limits.allows_multisynth(&RationalDivider::integer(6)));
        assert!(!limits.allows_multisynth(&RationalDivider::new(6, 1, 2)));
        assert!(limits.allows_multisynth(&RationalDivider::new(8, 1, 2)));
        assert!(!limits.allows_multisynth(&RationalDivider::new(2048, 1, 2)));
    }
}
