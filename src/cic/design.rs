//! CIC register sizing.
//!
//! Interpolators cannot discard bits between stages, so they are sized by the
//! bit growth of each stage. Decimators are sized with Hogenauer's register
//! pruning: the low bits of each stage are discarded as long as the
//! quantization noise they inject stays below the noise of the final output
//! quantization.
//!
//! References:
//!
//! - E. Hogenauer, "An Economical Class of Digital Filters for Decimation and
//!   Interpolation", IEEE Trans. Acoust. Speech and Signal Proc., vol. 29,
//!   1981.
//! - R. Lyons, "Computing CIC filter register pruning using MATLAB".

use anyhow::{Context, Result};
use dsp_json::FirstStageCorrection;

/// Register sizes of a decimating CIC filter.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Truncation {
    /// Full-precision register width.
    pub full_width: u32,
    /// Bits discarded at the input of each of the 2N stages (N integrators
    /// followed by N combs), followed by the bits discarded at the output.
    /// All counts are relative to the full-precision width.
    pub bits: Vec<u32>,
}

const TOO_LARGE: &str = "CIC parameters are too large";

// Smallest g such that 2^g >= n, for n >= 1.
fn ceil_log2(n: u128) -> u32 {
    128 - (n - 1).leading_zeros()
}

fn binomial(n: u64, k: u64) -> Option<u128> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut value = 1u128;
    for j in 0..k {
        value = value.checked_mul(u128::from(n - j))? / u128::from(j + 1);
    }
    Some(value)
}

/// Bit growth at the output of each stage of an interpolating CIC filter.
///
/// The N comb stages are followed by the N integrator stages. The growth is
/// relative to the input width.
pub fn bit_growth(stages: u32, rate: u32, differential_delay: u32) -> Result<Vec<u32>> {
    let n = stages;
    let rm = u128::from(rate) * u128::from(differential_delay);
    (1..=2 * n)
        .map(|j| {
            if j <= n {
                return Ok(j);
            }
            // 2^(2N - j) (RM)^(j - N) / R
            let gain = rm
                .checked_pow(j - n)
                .and_then(|x| x.checked_mul(1u128.checked_shl(2 * n - j)?))
                .context(TOO_LARGE)?;
            Ok(ceil_log2(gain.div_ceil(u128::from(rate))))
        })
        .collect()
}

/// Full-precision width at the output of a decimating CIC filter.
pub fn full_width(stages: u32, rate: u32, differential_delay: u32, width_in: u32) -> Result<u32> {
    let gain = (u128::from(rate) * u128::from(differential_delay))
        .checked_pow(stages)
        .context(TOO_LARGE)?;
    width_in.checked_add(ceil_log2(gain)).context(TOO_LARGE)
}

/// Variance gain from the output of stage `i` to the filter output.
///
/// Stages are numbered from 1: stages 1 to N are the integrators and stages
/// N + 1 to 2N are the combs.
pub fn noise_gain(stages: u32, rate: u32, differential_delay: u32, i: u32) -> Result<u128> {
    let n = u64::from(stages);
    let i = u64::from(i);
    let rm = u64::from(rate) * u64::from(differential_delay);
    let impulse_response = |k: u64| -> Option<i128> {
        if i <= n {
            (0..=k / rm).try_fold(0i128, |acc, l| {
                let term = i128::try_from(
                    binomial(n, l)?.checked_mul(binomial(n - i + k - rm * l, k - rm * l)?)?,
                )
                .ok()?;
                if l % 2 == 0 {
                    acc.checked_add(term)
                } else {
                    acc.checked_sub(term)
                }
            })
        } else {
            i128::try_from(binomial(2 * n + 1 - i, k)?).ok()
        }
    };
    let len = if i <= n {
        n * (rm - 1) + i - 1
    } else {
        2 * n + 1 - i
    };
    (0..=len)
        .try_fold(0u128, |acc, k| {
            let h = impulse_response(k)?.unsigned_abs();
            acc.checked_add(h.checked_mul(h)?)
        })
        .context(TOO_LARGE)
}

/// Bits discarded at each stage of a decimating CIC filter.
///
/// `width_out` defaults to the full-precision width.
pub fn truncation(
    stages: u32,
    rate: u32,
    differential_delay: u32,
    width_in: u32,
    width_out: Option<u32>,
    correction: FirstStageCorrection,
) -> Result<Truncation> {
    let full_width = full_width(stages, rate, differential_delay, width_in)?;
    let last = full_width.saturating_sub(width_out.unwrap_or(full_width));
    let t = (2f64.powi(2 * last as i32) / 12.0).log2() + (6.0 / f64::from(stages)).log2();
    let mut bits = (1..=2 * stages)
        .map(|i| {
            let gain = noise_gain(stages, rate, differential_delay, i)? as f64;
            let discard = (0.5 * (-gain.log2() + t)).floor();
            Ok(discard.max(0.0) as u32)
        })
        .collect::<Result<Vec<u32>>>()?;
    bits.push(last);
    // no bits should be discarded before any filtering has happened
    match correction {
        FirstStageCorrection::Zero => bits[0] = 0,
        FirstStageCorrection::CreditNext => {
            if bits[0] == 1 {
                bits[0] = 0;
                bits[1] += 1;
            }
        }
    }
    Ok(Truncation { full_width, bits })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn growth() {
        assert_eq!(bit_growth(3, 5, 4).unwrap(), vec![1, 2, 3, 4, 8, 11]);
        assert_eq!(bit_growth(3, 5, 1).unwrap(), vec![1, 2, 3, 2, 4, 5]);
        // without rate change the integrators undo the combs
        assert_eq!(bit_growth(3, 1, 1).unwrap(), vec![1, 2, 3, 2, 1, 0]);
    }

    #[test]
    fn widths() {
        assert_eq!(full_width(3, 5, 4, 12).unwrap(), 25);
        assert_eq!(full_width(3, 8, 1, 12).unwrap(), 21);
        assert_eq!(full_width(2, 1, 1, 12).unwrap(), 12);
        assert!(full_width(20, 1 << 20, 1 << 20, 12).is_err());
    }

    #[test]
    fn binomials() {
        assert_eq!(binomial(7, 5), Some(21));
        assert_eq!(binomial(3, 4), Some(0));
        assert_eq!(binomial(0, 0), Some(1));
        assert_eq!(binomial(60, 30), Some(118264581564861424));
    }

    #[test]
    fn comb_noise_gain() {
        // sum of squared binomial coefficients of 2N + 1 - i
        assert_eq!(noise_gain(3, 5, 1, 4).unwrap(), 20);
        assert_eq!(noise_gain(3, 5, 1, 6).unwrap(), 2);
    }

    #[test]
    fn integrator_noise_gain() {
        // a single integrator followed by a comb with RM = 2 has h = [1, 1]
        assert_eq!(noise_gain(1, 2, 1, 1).unwrap(), 2);
    }

    #[test]
    fn hogenauer() {
        let trunc = truncation(3, 5, 4, 12, Some(16), FirstStageCorrection::Zero).unwrap();
        assert_eq!(trunc.full_width, 25);
        assert_eq!(trunc.bits, vec![0, 1, 4, 5, 6, 7, 9]);
        let trunc = truncation(3, 5, 4, 12, Some(18), FirstStageCorrection::Zero).unwrap();
        assert_eq!(trunc.bits, vec![0, 0, 2, 3, 4, 5, 7]);
        // full precision output
        let trunc = truncation(3, 5, 1, 8, None, FirstStageCorrection::Zero).unwrap();
        assert_eq!(trunc.full_width, 15);
        assert_eq!(trunc.bits, vec![0; 7]);
    }

    #[test]
    fn later_stage_keeps_more_bits() {
        let trunc = truncation(2, 2, 1, 12, Some(10), FirstStageCorrection::Zero).unwrap();
        assert_eq!(trunc.full_width, 14);
        assert_eq!(trunc.bits, vec![0, 2, 1, 2, 4]);
    }

    #[test]
    fn first_stage_correction() {
        // the uncorrected first stage truncation is 1 bit here
        let zero = truncation(2, 2, 1, 12, Some(10), FirstStageCorrection::Zero).unwrap();
        let credit = truncation(2, 2, 1, 12, Some(10), FirstStageCorrection::CreditNext).unwrap();
        assert_eq!(zero.bits, vec![0, 2, 1, 2, 4]);
        assert_eq!(credit.bits, vec![0, 3, 1, 2, 4]);
        // a first stage truncation larger than 1 bit is not credited
        let zero = truncation(1, 2, 1, 12, Some(4), FirstStageCorrection::Zero).unwrap();
        let credit = truncation(1, 2, 1, 12, Some(4), FirstStageCorrection::CreditNext).unwrap();
        assert_eq!(zero.bits, vec![0, 8, 9]);
        assert_eq!(credit.bits, vec![8, 8, 9]);
    }
}
