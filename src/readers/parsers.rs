//! nom parsers for the textual pieces of a GMV file
//!
//! ASCII files are a stream of whitespace separated tokens, so most of these
//! operate on a single token at a time. Binary files still use text for the
//! header type string and `fromfile` paths.

// internal modules
use crate::readers::decoder::Encoding;

// external crates
use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_until};
use nom::character::complete::{char, i64 as signed_integer, multispace0};
use nom::combinator::{all_consuming, value};
use nom::number::complete::double;
use nom::sequence::{delimited, preceded};
use nom::IResult;

/// Recognise the encoding named by a file-type string
///
/// The second value is true for the `iecx` variants, which only differ from
/// their `ieee` equivalents by using 32-character names.
pub fn file_type(i: &str) -> IResult<&str, (Encoding, bool)> {
    alt((
        value((Encoding::Ascii, false), tag_no_case("ascii")),
        value((Encoding::IeeeI4R4, false), tag_no_case("ieeei4r4")),
        value((Encoding::IeeeI4R8, false), tag_no_case("ieeei4r8")),
        value((Encoding::IeeeI8R4, false), tag_no_case("ieeei8r4")),
        value((Encoding::IeeeI8R8, false), tag_no_case("ieeei8r8")),
        value((Encoding::IeeeI4R4, false), tag_no_case("ieee")),
        value((Encoding::IeeeI4R4, true), tag_no_case("iecxi4r4")),
        value((Encoding::IeeeI4R8, true), tag_no_case("iecxi4r8")),
        value((Encoding::IeeeI8R4, true), tag_no_case("iecxi8r4")),
        value((Encoding::IeeeI8R8, true), tag_no_case("iecxi8r8")),
    ))(i)
}

/// Classify a complete file-type token, nothing may follow the type name
pub fn classify_file_type(token: &str) -> Option<(Encoding, bool)> {
    all_consuming(file_type)(token.trim())
        .ok()
        .map(|(_, kind)| kind)
}

/// Whole-token signed integer
pub fn integer(i: &str) -> IResult<&str, i64> {
    all_consuming(signed_integer)(i)
}

/// Whole-token floating point number
pub fn real(i: &str) -> IResult<&str, f64> {
    all_consuming(double)(i)
}

/// Parse an integer token, tolerating integral values written as reals
pub fn parse_integer(token: &str) -> Option<i64> {
    match integer(token) {
        Ok((_, value)) => Some(value),
        Err(_) => parse_real(token)
            .filter(|v| v.fract() == 0.0 && v.is_finite())
            .map(|v| v as i64),
    }
}

/// Parse a real token, tolerating Fortran `D` exponents
pub fn parse_real(token: &str) -> Option<f64> {
    match real(token) {
        Ok((_, value)) => Some(value),
        Err(_) if token.contains(['d', 'D']) => {
            let fixed = token.replace(['d', 'D'], "e");
            real(&fixed).ok().map(|(_, v)| v)
        }
        Err(_) => None,
    }
}

/// Path in double quotes, e.g. `"mesh/cells.gmv"`
pub fn quoted_path(i: &str) -> IResult<&str, &str> {
    preceded(
        multispace0,
        delimited(char('"'), take_until("\""), char('"')),
    )(i)
}

/// Comment blocks end on a line starting with `endcomm`
pub fn is_end_of_comments(line: &str) -> bool {
    line.trim_start().starts_with("endcomm")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ascii", Encoding::Ascii, false)]
    #[case("ieee", Encoding::IeeeI4R4, false)]
    #[case("ieeei4r4", Encoding::IeeeI4R4, false)]
    #[case("ieeei4r8", Encoding::IeeeI4R8, false)]
    #[case("ieeei8r4", Encoding::IeeeI8R4, false)]
    #[case("ieeei8r8", Encoding::IeeeI8R8, false)]
    #[case("iecxi4r4", Encoding::IeeeI4R4, true)]
    #[case("iecxi4r8", Encoding::IeeeI4R8, true)]
    #[case("iecxi8r4", Encoding::IeeeI8R4, true)]
    #[case("iecxi8r8", Encoding::IeeeI8R8, true)]
    #[case("ieee    ", Encoding::IeeeI4R4, false)]
    fn recognised_file_types(#[case] s: &str, #[case] enc: Encoding, #[case] wide: bool) {
        assert_eq!(classify_file_type(s), Some((enc, wide)));
    }

    #[rstest]
    #[case("binary")]
    #[case("ieeei4r2")]
    #[case("")]
    fn unknown_file_types(#[case] s: &str) {
        assert_eq!(classify_file_type(s), None);
    }

    #[test]
    fn numbers() {
        assert_eq!(parse_integer("-12"), Some(-12));
        assert_eq!(parse_integer("3.0"), Some(3));
        assert_eq!(parse_integer("3.5"), None);
        assert_eq!(parse_integer("abc"), None);
        assert_eq!(parse_real("1.5e+02"), Some(150.0));
        assert_eq!(parse_real("2.0D-01"), Some(0.2));
        assert_eq!(parse_real("1.0x"), None);
    }

    #[test]
    fn paths() {
        assert_eq!(quoted_path(" \"a b/c.gmv\" rest"), Ok((" rest", "a b/c.gmv")));
        assert!(quoted_path("no quotes").is_err());
    }

    #[test]
    fn comment_terminator() {
        assert!(is_end_of_comments("   endcomm"));
        assert!(!is_end_of_comments("this is not endcomm"));
    }
}
