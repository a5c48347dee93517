use std::io;

use geo::Shape;

/// The minimal header the reader accepts back: internal units, lat/lon
/// order, no false origin.
pub fn write_mif_header<W: io::Write>(w: &mut W) -> io::Result<()> {
    writeln!(w, "COORDSYS mc2")?;
    writeln!(w, "Data")
}

/// Serializes one shape. A closed shape becomes a single `Region` with one
/// coordinate block per polygon; open polygons become `Point` (one
/// coordinate) or `Pline` features. Output is byte-stable for a given
/// shape, so files round-trip unchanged.
pub fn write_mif<W: io::Write>(shape: &Shape, w: &mut W) -> io::Result<()> {
    if shape.is_closed() {
        writeln!(w, "Region {}", shape.nbr_polygons())?;
        for polygon in &shape.polygons {
            writeln!(w, "{}", polygon.coords.len())?;
            for c in &polygon.coords {
                writeln!(w, "{} {}", c.lat, c.lon)?;
            }
        }
        return Ok(());
    }

    for polygon in &shape.polygons {
        if polygon.coords.len() == 1 {
            writeln!(w, "Point {} {}", polygon.coords[0].lat, polygon.coords[0].lon)?;
        } else {
            writeln!(w, "Pline {}", polygon.coords.len())?;
            for c in &polygon.coords {
                writeln!(w, "{} {}", c.lat, c.lon)?;
            }
        }
    }
    Ok(())
}

impl Shape {
    pub fn write_mif<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        write_mif(self, w)
    }
}
