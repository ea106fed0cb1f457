//! Stock include scanners.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

use super::classic::{IncludeScanner, IncludeStyle};
use super::{Scanner, Selector};

pub const C_SUFFIXES: &[&str] = &[
    ".c", ".C", ".cxx", ".cpp", ".c++", ".cc", ".h", ".H", ".hxx", ".hpp", ".hh", ".F", ".fpp",
    ".FPP", ".m", ".mm", ".S", ".spp", ".SPP", ".sx",
];

pub const FORTRAN_SUFFIXES: &[&str] = &[
    ".f", ".F", ".for", ".FOR", ".ftn", ".FTN", ".fpp", ".FPP", ".f77", ".F77", ".f90", ".F90",
    ".f95", ".F95", ".f03", ".F03", ".f08", ".F08",
];

pub const C_INCLUDE_PATTERN: &str = r#"^[ \t]*#[ \t]*(?:include|import)[ \t]*(<|")([^>"]+)(>|")"#;

pub const FORTRAN_INCLUDE_PATTERN: &str = r#"(?i)^[ \t]*INCLUDE[ \t]+['"]([^'"]+)['"]"#;

static C_INCLUDE_REGEX: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(C_INCLUDE_PATTERN).multi_line(true).build().unwrap()
});

static FORTRAN_INCLUDE_REGEX: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(FORTRAN_INCLUDE_PATTERN).multi_line(true).build().unwrap()
});

/// C/C++ `#include` and `#import`, searched along `CPPPATH`.
pub fn c_scanner() -> Scanner {
    let extractor = IncludeScanner::compiled(C_INCLUDE_REGEX.clone(), IncludeStyle::Cpp);
    Scanner::from_include("CScanner", C_SUFFIXES.iter().copied(), "CPPPATH", extractor)
}

/// Fortran `INCLUDE 'file'`, searched along `FORTRANPATH`.
pub fn fortran_scanner() -> Scanner {
    let extractor = IncludeScanner::compiled(FORTRAN_INCLUDE_REGEX.clone(), IncludeStyle::Classic);
    Scanner::from_include(
        "FortranScan",
        FORTRAN_SUFFIXES.iter().copied(),
        "FORTRANPATH",
        extractor,
    )
}

/// Selector over the stock scanners. Suffixes claimed by both languages
/// (`.F`, `.fpp`, `.FPP`) go to the C preprocessor scanner.
pub fn default_selector() -> Selector {
    let mut selector = Selector::new("default");
    let fortran = Arc::new(fortran_scanner());
    for suffix in FORTRAN_SUFFIXES {
        selector.add_scanner(*suffix, Arc::clone(&fortran));
    }
    let c = Arc::new(c_scanner());
    for suffix in C_SUFFIXES {
        selector.add_scanner(*suffix, Arc::clone(&c));
    }
    selector
}
