//! Common small functions used throughout the crate
//!
//! These are left public for the convenience of the user. For example
//! prettier formatting for scientific numbers or cleaning up fixed-width
//! names read from a binary file.

use std::fmt::LowerExp;

// Alias for the format! macro out of laziness
pub use std::format as f;

/// Extends primitives with more specific formatting options
pub trait NumberFmt {
    /// Better scientific number formatting
    ///
    /// The default is not very consistent for scientific in particular, so this
    /// allows easy definition.
    ///
    /// ```rust
    /// # use gmvread::utils::NumberFmt;
    /// let number = -1.0;
    /// assert_eq!(number.sci(5, 2), "-1.00000e+00".to_string());
    /// assert_eq!((1.0).sci(5, 2), "1.00000e+00".to_string());
    /// ```
    fn sci(&self, precision: usize, exp_pad: usize) -> String;
}

impl<T: LowerExp> NumberFmt for T {
    fn sci(&self, precision: usize, exp_pad: usize) -> String {
        let num = f!("{:.precision$e}", &self, precision = precision);
        // LowerExp always produces an 'e', but fall back to the raw string
        let Some(split) = num.find('e') else {
            return num;
        };
        let (mantissa, exp) = num.split_at(split);
        // Make sure the exponent is signed
        let (sign, exp) = match exp.strip_prefix("e-") {
            Some(exp) => ('-', exp),
            None => ('+', &exp[1..]),
        };
        f!("{mantissa}e{}{:0>pad$}", sign, exp, pad = exp_pad)
    }
}

/// Turn a fixed-width name field into a clean string
///
/// Binary GMV names are space or NUL padded, so anything after the first NUL
/// and any trailing whitespace is dropped.
///
/// ```rust
/// # use gmvread::utils::field_to_string;
/// assert_eq!(field_to_string(b"cells   "), "cells".to_string());
/// assert_eq!(field_to_string(b"tet\0\0\0\0\0"), "tet".to_string());
/// ```
pub fn field_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

/// Find the maximum value of a `&[f64]`
///
/// Floating-point types do not implement Ord because of NaN, so this is the
/// workaround. Returns `None` for an empty slice.
///
/// ```rust
/// # use gmvread::utils::vec_f64_max;
/// let vector = vec![1.0, 2.0, 3.0];
/// assert_eq!(vec_f64_max(&vector), Some(3.0))
/// ```
pub fn vec_f64_max(vector: &[f64]) -> Option<f64> {
    vector.iter().copied().max_by(|a, b| a.total_cmp(b))
}

/// Find the minimum value of a `&[f64]`
///
/// ```rust
/// # use gmvread::utils::vec_f64_min;
/// let vector = vec![1.0, 2.0, 3.0];
/// assert_eq!(vec_f64_min(&vector), Some(1.0))
/// ```
pub fn vec_f64_min(vector: &[f64]) -> Option<f64> {
    vector.iter().copied().min_by(|a, b| a.total_cmp(b))
}
