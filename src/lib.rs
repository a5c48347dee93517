extern crate encoding;
extern crate itertools;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;
extern crate regex;

#[cfg(test)]
extern crate env_logger;

pub mod geo;
pub mod outline;
pub mod interior;
pub mod merge;
pub mod filter;
pub mod mif;

pub use geo::{BoundingBox, Coord, Polygon, Shape, WindingOrder};
pub use geo::DEFAULT_MERGE_SQUARE_DISTANCE;
pub use outline::{create_outline, OutlineBuild, OutlineError};
pub use interior::remove_inside_coordinates;
pub use merge::{merge_polygons, merge_two_polygons, PairMerge};
pub use filter::filter_polygon;
pub use mif::{create_from_mif, write_mif, MifError, MifFeature, MifReader};
