//! SRTM filename utilities.
//!
//! SRTMGL1 archive entries are named `{N|S}DD{E|W}DDD.SRTMGL1.hgt.zip`,
//! where `DD` is the integer latitude of the tile's south edge zero-padded
//! to two digits and `DDD` the integer longitude of the west edge padded to
//! three. The unpacked raster drops the `.SRTMGL1` marker and the `.zip`
//! extension.

/// Archive filename for the 1° cell containing the given coordinate.
///
/// # Examples
///
/// ```
/// use relief::filename::zip_filename;
///
/// assert_eq!(zip_filename(27.687, 86.731), "N27E086.SRTMGL1.hgt.zip");
/// assert_eq!(zip_filename(-3.5, -60.2), "S04W061.SRTMGL1.hgt.zip");
/// ```
pub fn zip_filename(lat: f64, lon: f64) -> String {
    format!("{}.SRTMGL1.hgt.zip", cell_name(lat, lon))
}

/// Unpacked raster filename for the 1° cell containing the given coordinate.
///
/// # Examples
///
/// ```
/// use relief::filename::hgt_filename;
///
/// assert_eq!(hgt_filename(27.687, 86.731), "N27E086.hgt");
/// ```
pub fn hgt_filename(lat: f64, lon: f64) -> String {
    format!("{}.hgt", cell_name(lat, lon))
}

/// Derive the unpacked raster filename from an archive filename.
///
/// ```
/// use relief::filename::hgt_from_zip_name;
///
/// assert_eq!(hgt_from_zip_name("N27E086.SRTMGL1.hgt.zip"), "N27E086.hgt");
/// ```
pub fn hgt_from_zip_name(zip_name: &str) -> String {
    zip_name
        .trim_end_matches(".zip")
        .replace(".SRTMGL1", "")
}

/// Cell name for the 1° tile whose south-west corner is the floor of the
/// coordinate, e.g. `N27E086`.
fn cell_name(lat: f64, lon: f64) -> String {
    let ns = if lat < 0.0 { 'S' } else { 'N' };
    let ew = if lon < 0.0 { 'W' } else { 'E' };

    format!(
        "{}{:02}{}{:03}",
        ns,
        lat.floor().abs() as i32,
        ew,
        lon.floor().abs() as i32
    )
}
