//! Reads and writes the mif polygon/line/point text interchange format.
//!
//! The format is whitespace/token based, with case-insensitive keywords. A
//! file starts with an optional header (coordinate system, coordinate
//! order, false origin offsets) terminated by the `Data` keyword, followed
//! by features: `Region <n>`, `Pline <n>`, `Line x1 y1 x2 y2` and
//! `Point x y`. Cosmetic directives (`Pen`, `Brush`, ...) are skipped;
//! decorative feature kinds (`Rect`, `Text`, ...) are consumed but yield no
//! geometry.
//!
//! # Examples
//!
//! Open by filename:
//!
//! ```no_run
//! use std::path::Path;
//! use mapmerge::mif;
//!
//! let reader = mif::open_utf8(Path::new("borders.mif")).unwrap();
//! for feature in reader {
//!     // feature is a Result<MifFeature, MifError>
//!     println!("{:?}", feature.unwrap());
//! }
//! ```
//!
//! Parse one shape from an `io::Read` implementor:
//!
//! ```
//! use mapmerge::mif;
//!
//! let text = "Data\nRegion 1\n3\n0 0\n10 0\n10 10\n";
//! let shape = mif::create_from_mif(text.as_bytes()).unwrap();
//! assert_eq!(1, shape.nbr_polygons());
//! assert!(shape.polygons[0].closed);
//! ```

use std::error;
use std::fmt;
use std::io;

pub mod read;
pub mod write;

pub use self::read::{create_from_mif, open, open_ascii, open_utf8, open_windows1252};
pub use self::read::{CoordSys, MifFeature, MifHeader, MifReader};
pub use self::write::{write_mif, write_mif_header};

#[derive(Debug)]
pub enum MifError {
    IOError(io::Error),
    /// EOF before the mandatory `Data` keyword.
    NoDataTag,
    /// A token where a feature keyword was expected, and it isn't one.
    InvalidFeature(String),
    /// A feature declared more coordinates than the file holds. Corrupt
    /// file: fatal for this file, not recoverable.
    CoordinateCountMismatch { expected: usize, found: usize },
    ParseError(String),
}

impl fmt::Display for MifError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            MifError::IOError(ref err) => err.fmt(f),
            MifError::NoDataTag => write!(f, "end of file before the Data tag"),
            MifError::InvalidFeature(ref token) => {
                write!(f, "unknown feature keyword: {}", token)
            }
            MifError::CoordinateCountMismatch { expected, found } => write!(
                f,
                "feature declared {} coordinates but {} could be read",
                expected, found
            ),
            MifError::ParseError(ref description) => write!(f, "Parse error: {}", description),
        }
    }
}

impl error::Error for MifError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            MifError::IOError(ref err) => Some(err),
            _ => None,
        }
    }
}
