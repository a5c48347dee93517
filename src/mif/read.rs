/// Reads the mif text interchange format: an optional header terminated by
/// `Data`, then Region/Pline/Line/Point features. Keywords are
/// case-insensitive; parentheses and commas count as whitespace.

use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;
use encoding;
use regex::Regex;

use geo::{Coord, Polygon, Shape};
use mif::MifError;

/// 2^32 map units per full turn, so this many per degree.
pub const MC2_UNITS_PER_DEGREE: f64 = 4294967296.0 / 360.0;
/// Linear metre scale for planar grids, from the WGS84 equator length.
pub const MC2_UNITS_PER_METER: f64 = 4294967296.0 / 40075016.69;

lazy_static! {
    static ref DELIMITERS: Regex = Regex::new(r"[(),]").unwrap();
    static ref NUMBER: Regex = Regex::new(r"^[+-]?(\d+\.?\d*|\.\d+)([eE][+-]?\d+)?$").unwrap();
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoordSys {
    /// Plain internal map units; no transform.
    Mc2,
    Wgs84Deg,
    Rt90,
    Utm,
}

/// Parsed once per file, applied to every coordinate read afterward.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MifHeader {
    pub coord_sys: CoordSys,
    /// true: coordinates are written lat then lon; false: lon then lat.
    pub normal_order: bool,
    pub utm_zone: u32,
    pub false_northing: f64,
    pub false_easting: f64,
}

impl Default for MifHeader {
    fn default() -> MifHeader {
        MifHeader {
            coord_sys: CoordSys::Mc2,
            normal_order: true,
            utm_zone: 0,
            false_northing: 0.0,
            false_easting: 0.0,
        }
    }
}

impl MifHeader {
    /// One coordinate pair in file token order to internal units: resolve
    /// the token order, subtract the false origin, then scale.
    fn to_coord(&self, first: f64, second: f64) -> Coord {
        let (lat, lon) = if self.normal_order {
            (first, second)
        } else {
            (second, first)
        };
        let lat = lat - self.false_northing;
        let lon = lon - self.false_easting;
        let scale = match self.coord_sys {
            CoordSys::Mc2 => 1.0,
            CoordSys::Wgs84Deg => MC2_UNITS_PER_DEGREE,
            CoordSys::Rt90 | CoordSys::Utm => MC2_UNITS_PER_METER,
        };
        Coord::new((lat * scale).round() as i32, (lon * scale).round() as i32)
    }
}

#[derive(Debug)]
pub enum MifFeature {
    /// A closed multi-polygon shape, canonically sorted.
    Region(Shape),
    /// An open polyline.
    Pline(Shape),
    /// A two-coordinate open polyline.
    Line(Shape),
    /// A single coordinate.
    Point(Shape),
    /// A recognized feature kind this tool carries no geometry for. Its
    /// tokens were consumed to keep the stream in sync.
    Unsupported(String),
}

impl MifFeature {
    pub fn shape(&self) -> Option<&Shape> {
        match *self {
            MifFeature::Region(ref s)
            | MifFeature::Pline(ref s)
            | MifFeature::Line(ref s)
            | MifFeature::Point(ref s) => Some(s),
            MifFeature::Unsupported(_) => None,
        }
    }

    pub fn into_shape(self) -> Option<Shape> {
        match self {
            MifFeature::Region(s)
            | MifFeature::Pline(s)
            | MifFeature::Line(s)
            | MifFeature::Point(s) => Some(s),
            MifFeature::Unsupported(_) => None,
        }
    }
}

/// Iterates over the features of one mif file. The whole input is decoded
/// and tokenized up front; mif files are small next to the shapes built
/// from them.
pub struct MifReader {
    header: MifHeader,
    tokens: Vec<String>,
    pos: usize,
}

pub fn open(path: &Path, encoding: encoding::EncodingRef) -> Result<MifReader, MifError> {
    match fs::File::open(path) {
        Err(err) => Err(MifError::IOError(err)),
        Ok(f) => MifReader::new(io::BufReader::new(f), encoding),
    }
}

pub fn open_utf8(path: &Path) -> Result<MifReader, MifError> {
    open(path, encoding::all::UTF_8)
}

pub fn open_ascii(path: &Path) -> Result<MifReader, MifError> {
    let ascii = encoding::label::encoding_from_whatwg_label(&"ascii").unwrap();
    open(path, ascii)
}

pub fn open_windows1252(path: &Path) -> Result<MifReader, MifError> {
    open(path, encoding::all::WINDOWS_1252)
}

/// Reads every geometry feature of a mif stream into one shape, skipping
/// unsupported features with a warning.
pub fn create_from_mif<R: io::Read>(file: R) -> Result<Shape, MifError> {
    let reader = MifReader::new(file, encoding::all::UTF_8)?;
    let mut shape = Shape::new();
    for feature in reader {
        match feature? {
            MifFeature::Unsupported(kind) => {
                warn!("mif: skipping unsupported {} feature", kind);
            }
            feature => {
                if let Some(s) = feature.into_shape() {
                    shape.polygons.extend(s.polygons);
                }
            }
        }
    }
    Ok(shape)
}

impl Shape {
    pub fn create_from_mif<R: io::Read>(file: R) -> Result<Shape, MifError> {
        create_from_mif(file)
    }
}

impl MifReader {
    pub fn new<R: io::Read>(mut file: R, encoding: encoding::EncodingRef) -> Result<MifReader, MifError> {
        let mut bytes = vec![];
        if let Err(err) = file.read_to_end(&mut bytes) {
            return Err(MifError::IOError(err));
        }
        let text = match encoding.decode(&bytes, encoding::DecoderTrap::Replace) {
            Ok(text) => text,
            Err(message) => return Err(MifError::ParseError(message.into_owned())),
        };

        let tokens = DELIMITERS
            .replace_all(&text, " ")
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();

        let mut reader = MifReader {
            header: MifHeader::default(),
            tokens: tokens,
            pos: 0,
        };
        reader.read_header()?;
        Ok(reader)
    }

    pub fn header(&self) -> &MifHeader {
        &self.header
    }

    fn next_token(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_is_number(&self) -> bool {
        match self.tokens.get(self.pos) {
            Some(token) => NUMBER.is_match(token),
            None => false,
        }
    }

    fn read_header(&mut self) -> Result<(), MifError> {
        loop {
            let token = match self.next_token() {
                Some(token) => token,
                None => return Err(MifError::NoDataTag),
            };
            let keyword = token.to_lowercase();
            match keyword.as_str() {
                "data" => return Ok(()),
                "coordsys" => self.read_coord_sys()?,
                "falsenorthing" => {
                    self.header.false_northing = self.read_number("falseNorthing")?;
                }
                "falseeasting" => {
                    self.header.false_easting = self.read_number("falseEasting")?;
                }
                "charset" => {
                    self.next_token();
                }
                _ => {
                    debug!("mif header: skipping token {}", token);
                }
            }
        }
    }

    fn read_coord_sys(&mut self) -> Result<(), MifError> {
        let token = match self.next_token() {
            Some(token) => token,
            None => return Err(MifError::ParseError("COORDSYS without a value".to_string())),
        };
        let (coord_sys, normal_order) = match token.to_lowercase().as_str() {
            "mc2" => (CoordSys::Mc2, true),
            "mc2_lonlat" => (CoordSys::Mc2, false),
            "wgs84_deg" => (CoordSys::Wgs84Deg, true),
            "wgs84_lonlat_deg" => (CoordSys::Wgs84Deg, false),
            "rt90" => (CoordSys::Rt90, true),
            "rt90_lonlat" => (CoordSys::Rt90, false),
            "utm" => {
                self.header.utm_zone = self.read_number("the UTM zone")? as u32;
                (CoordSys::Utm, true)
            }
            "utm_lonlat" => {
                self.header.utm_zone = self.read_number("the UTM zone")? as u32;
                (CoordSys::Utm, false)
            }
            _ => {
                return Err(MifError::ParseError(format!("unknown COORDSYS: {}", token)));
            }
        };
        self.header.coord_sys = coord_sys;
        self.header.normal_order = normal_order;
        Ok(())
    }

    fn read_number(&mut self, what: &str) -> Result<f64, MifError> {
        match self.next_token() {
            None => Err(MifError::ParseError(format!("end of file reading {}", what))),
            Some(token) => {
                if NUMBER.is_match(&token) {
                    token
                        .parse::<f64>()
                        .map_err(|_| MifError::ParseError(format!("bad number for {}: {}", what, token)))
                } else {
                    Err(MifError::ParseError(format!(
                        "expected a number for {}, got {}",
                        what, token
                    )))
                }
            }
        }
    }

    fn read_count(&mut self, what: &str) -> Result<usize, MifError> {
        let n = self.read_number(what)?;
        if n < 0.0 || n.fract() != 0.0 {
            return Err(MifError::ParseError(format!("bad count for {}: {}", what, n)));
        }
        Ok(n as usize)
    }

    /// Reads exactly `expected` coordinate pairs. Running out of numeric
    /// tokens earlier means the file is corrupt.
    fn read_coords(&mut self, expected: usize) -> Result<Vec<Coord>, MifError> {
        let mut coords = Vec::with_capacity(expected);
        while coords.len() < expected && self.peek_is_number() {
            let first = self.read_number("a coordinate")?;
            let second = self.read_number("a coordinate")?;
            coords.push(self.header.to_coord(first, second));
        }
        if coords.len() != expected {
            return Err(MifError::CoordinateCountMismatch {
                expected: expected,
                found: coords.len(),
            });
        }
        Ok(coords)
    }

    fn read_region(&mut self) -> Result<MifFeature, MifError> {
        let nbr_polygons = self.read_count("the Region polygon count")?;
        let mut shape = Shape::new();
        for _ in 0..nbr_polygons {
            let nbr_coords = self.read_count("a polygon coordinate count")?;
            let mut polygon = Polygon::new(self.read_coords(nbr_coords)?, true);
            polygon.update_length();
            shape.polygons.push(polygon);
        }
        shape.sort_polygons();
        shape.remove_identical_coordinates();
        Ok(MifFeature::Region(shape))
    }

    fn read_pline(&mut self) -> Result<MifFeature, MifError> {
        let nbr_coords = self.read_count("the Pline coordinate count")?;
        let mut polygon = Polygon::new(self.read_coords(nbr_coords)?, false);
        // an open polyline keeps at least its one real coordinate
        polygon.remove_identical_coordinates();
        polygon.update_length();
        Ok(MifFeature::Pline(Shape::with_polygons(vec![polygon])))
    }

    fn read_line(&mut self) -> Result<MifFeature, MifError> {
        let mut polygon = Polygon::new(self.read_coords(2)?, false);
        polygon.remove_identical_coordinates();
        polygon.update_length();
        Ok(MifFeature::Line(Shape::with_polygons(vec![polygon])))
    }

    fn read_point(&mut self) -> Result<MifFeature, MifError> {
        let polygon = Polygon::new(self.read_coords(1)?, false);
        Ok(MifFeature::Point(Shape::with_polygons(vec![polygon])))
    }

    /// Cosmetic and decorative arguments: numbers plus quoted strings. A
    /// quoted string containing whitespace spans several tokens; all of them
    /// must be consumed or the next feature read starts mid-string.
    fn skip_arguments(&mut self) {
        while let Some(token) = self.tokens.get(self.pos) {
            if token.starts_with('"') {
                let closed = token.len() >= 2 && token.ends_with('"');
                self.pos += 1;
                if !closed {
                    while let Some(token) = self.tokens.get(self.pos) {
                        self.pos += 1;
                        if token.ends_with('"') {
                            break;
                        }
                    }
                }
            } else if NUMBER.is_match(token) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn next_feature(&mut self) -> Option<Result<MifFeature, MifError>> {
        loop {
            let token = match self.next_token() {
                Some(token) => token,
                None => return None,
            };
            let result = match token.to_lowercase().as_str() {
                "pen" | "brush" | "center" | "symbol" | "smooth" | "font" => {
                    self.skip_arguments();
                    continue;
                }
                "region" => self.read_region(),
                "pline" => self.read_pline(),
                "line" => self.read_line(),
                "point" => self.read_point(),
                "none" | "rect" | "roundrect" | "ellipse" | "text" => {
                    self.skip_arguments();
                    Ok(MifFeature::Unsupported(token))
                }
                _ => Err(MifError::InvalidFeature(token)),
            };
            return Some(result);
        }
    }
}

impl Iterator for MifReader {
    type Item = Result<MifFeature, MifError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_feature()
    }
}
