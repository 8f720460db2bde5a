use std::ffi::c_int;
use std::fmt::{self, Debug, Formatter};

use gdal_sys::{GDALColorEntry, GDALColorTableH, GDALPaletteInterp};

use crate::errors::{GdalError, Result};
use crate::utils::_string;

/// How the components of a [`ColorTable`] entry are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteInterpretation {
    Gray,
    Rgba,
    Cmyk,
    Hls,
}

impl PaletteInterpretation {
    fn from_c_int(interpretation: GDALPaletteInterp::Type) -> Self {
        match interpretation {
            GDALPaletteInterp::GPI_Gray => Self::Gray,
            GDALPaletteInterp::GPI_CMYK => Self::Cmyk,
            GDALPaletteInterp::GPI_HLS => Self::Hls,
            _ => Self::Rgba,
        }
    }

    pub fn c_int(&self) -> GDALPaletteInterp::Type {
        match self {
            Self::Gray => GDALPaletteInterp::GPI_Gray,
            Self::Rgba => GDALPaletteInterp::GPI_RGB,
            Self::Cmyk => GDALPaletteInterp::GPI_CMYK,
            Self::Hls => GDALPaletteInterp::GPI_HLS,
        }
    }

    /// GDAL's name for the interpretation, e.g. `"RGB"`.
    pub fn name(&self) -> String {
        _string(unsafe { gdal_sys::GDALGetPaletteInterpretationName(self.c_int()) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrayEntry {
    pub g: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbaEntry {
    pub r: i16,
    pub g: i16,
    pub b: i16,
    pub a: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmykEntry {
    pub c: i16,
    pub m: i16,
    pub y: i16,
    pub k: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HlsEntry {
    pub h: i16,
    pub l: i16,
    pub s: i16,
}

/// One palette entry, typed by the interpretation of its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorEntry {
    Gray(GrayEntry),
    Rgba(RgbaEntry),
    Cmyk(CmykEntry),
    Hls(HlsEntry),
}

impl ColorEntry {
    pub fn grey(g: i16) -> Self {
        Self::Gray(GrayEntry { g })
    }

    pub fn rgba(r: i16, g: i16, b: i16, a: i16) -> Self {
        Self::Rgba(RgbaEntry { r, g, b, a })
    }

    pub fn cmyk(c: i16, m: i16, y: i16, k: i16) -> Self {
        Self::Cmyk(CmykEntry { c, m, y, k })
    }

    pub fn hls(h: i16, l: i16, s: i16) -> Self {
        Self::Hls(HlsEntry { h, l, s })
    }

    pub fn interpretation(&self) -> PaletteInterpretation {
        match self {
            Self::Gray(_) => PaletteInterpretation::Gray,
            Self::Rgba(_) => PaletteInterpretation::Rgba,
            Self::Cmyk(_) => PaletteInterpretation::Cmyk,
            Self::Hls(_) => PaletteInterpretation::Hls,
        }
    }

    fn from_c(interpretation: PaletteInterpretation, entry: &GDALColorEntry) -> Self {
        match interpretation {
            PaletteInterpretation::Gray => Self::grey(entry.c1),
            PaletteInterpretation::Rgba => Self::rgba(entry.c1, entry.c2, entry.c3, entry.c4),
            PaletteInterpretation::Cmyk => Self::cmyk(entry.c1, entry.c2, entry.c3, entry.c4),
            PaletteInterpretation::Hls => Self::hls(entry.c1, entry.c2, entry.c3),
        }
    }

    fn to_c(self) -> GDALColorEntry {
        let (c1, c2, c3, c4) = match self {
            Self::Gray(e) => (e.g, e.g, e.g, 255),
            Self::Rgba(e) => (e.r, e.g, e.b, e.a),
            Self::Cmyk(e) => (e.c, e.m, e.y, e.k),
            Self::Hls(e) => (e.h, e.l, e.s, 0),
        };
        GDALColorEntry { c1, c2, c3, c4 }
    }
}

/// A palette mapping pixel values of a band to colors.
///
/// Tables read from a band are copies; changes only reach the band through
/// [`RasterBand::set_color_table`](crate::raster::RasterBand::set_color_table).
pub struct ColorTable {
    c_table: GDALColorTableH,
}

// A table is owned by exactly one value and never shared with a band.
unsafe impl Send for ColorTable {}
unsafe impl Sync for ColorTable {}

impl ColorTable {
    pub fn new(interpretation: PaletteInterpretation) -> Self {
        ColorTable {
            c_table: unsafe { gdal_sys::GDALCreateColorTable(interpretation.c_int()) },
        }
    }

    /// Copies a table owned by GDAL.
    ///
    /// # Safety
    /// `c_table` must be a valid color table.
    pub(crate) unsafe fn clone_from_c(c_table: GDALColorTableH) -> Self {
        ColorTable {
            c_table: gdal_sys::GDALCloneColorTable(c_table),
        }
    }

    pub(crate) fn c_table(&self) -> GDALColorTableH {
        self.c_table
    }

    /// A table whose entries `start_index..=end_index` blend linearly from `start` to `end`.
    pub fn color_ramp(
        start_index: u8,
        start: &ColorEntry,
        end_index: u8,
        end: &ColorEntry,
    ) -> Result<Self> {
        if start.interpretation() != end.interpretation() {
            return Err(GdalError::BadArgument(format!(
                "cannot blend {:?} into {:?}",
                start.interpretation(),
                end.interpretation()
            )));
        }
        if start_index > end_index {
            return Err(GdalError::BadArgument(format!(
                "cannot ramp from entry {start_index} down to {end_index}"
            )));
        }
        let table = Self::new(start.interpretation());
        let c_start = start.to_c();
        let c_end = end.to_c();
        unsafe {
            gdal_sys::GDALCreateColorRamp(
                table.c_table,
                c_int::from(start_index),
                &c_start,
                c_int::from(end_index),
                &c_end,
            )
        };
        Ok(table)
    }

    pub fn palette_interpretation(&self) -> PaletteInterpretation {
        PaletteInterpretation::from_c_int(unsafe {
            gdal_sys::GDALGetPaletteInterpretation(self.c_table)
        })
    }

    pub fn entry_count(&self) -> usize {
        unsafe { gdal_sys::GDALGetColorEntryCount(self.c_table) }.max(0) as usize
    }

    /// The entry at `index`, or `None` past the end of the table.
    pub fn entry(&self, index: usize) -> Option<ColorEntry> {
        let index = c_int::try_from(index).ok()?;
        let c_entry = unsafe { gdal_sys::GDALGetColorEntry(self.c_table, index) };
        if c_entry.is_null() {
            return None;
        }
        Some(ColorEntry::from_c(self.palette_interpretation(), unsafe {
            &*c_entry
        }))
    }

    /// The entry at `index` converted to RGBA.
    pub fn entry_as_rgb(&self, index: usize) -> Option<RgbaEntry> {
        let index = c_int::try_from(index).ok()?;
        let mut c_entry = GDALColorEntry {
            c1: 0,
            c2: 0,
            c3: 0,
            c4: 0,
        };
        let rv = unsafe { gdal_sys::GDALGetColorEntryAsRGB(self.c_table, index, &mut c_entry) };
        (rv != 0).then_some(RgbaEntry {
            r: c_entry.c1,
            g: c_entry.c2,
            b: c_entry.c3,
            a: c_entry.c4,
        })
    }

    /// Sets the entry at `index`, growing the table with zeroed entries as needed.
    pub fn set_color_entry(&mut self, index: u16, entry: &ColorEntry) {
        let c_entry = entry.to_c();
        unsafe { gdal_sys::GDALSetColorEntry(self.c_table, c_int::from(index), &c_entry) };
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::new(PaletteInterpretation::Rgba)
    }
}

impl Clone for ColorTable {
    fn clone(&self) -> Self {
        unsafe { Self::clone_from_c(self.c_table) }
    }
}

impl Drop for ColorTable {
    fn drop(&mut self) {
        unsafe { gdal_sys::GDALDestroyColorTable(self.c_table) };
    }
}

impl Debug for ColorTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColorTable")
            .field("palette_interpretation", &self.palette_interpretation())
            .field("entry_count", &self.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_entries() {
        let mut table = ColorTable::default();
        table.set_color_entry(2, &ColorEntry::rgba(255, 0, 0, 255));
        table.set_color_entry(5, &ColorEntry::rgba(0, 255, 0, 255));
        table.set_color_entry(7, &ColorEntry::rgba(0, 0, 255, 255));

        assert_eq!(table.entry_count(), 8);
        assert_eq!(table.entry(0), Some(ColorEntry::rgba(0, 0, 0, 0)));
        assert_eq!(table.entry(2), Some(ColorEntry::rgba(255, 0, 0, 255)));
        assert_eq!(table.entry(8), None);
        assert_eq!(
            table.entry_as_rgb(5),
            Some(RgbaEntry {
                r: 0,
                g: 255,
                b: 0,
                a: 255
            })
        );

        let copy = table.clone();
        table.set_color_entry(2, &ColorEntry::rgba(1, 1, 1, 1));
        assert_eq!(copy.entry(2), Some(ColorEntry::rgba(255, 0, 0, 255)));
    }

    #[test]
    fn test_color_ramp() {
        let table =
            ColorTable::color_ramp(0, &ColorEntry::grey(0), 99, &ColorEntry::grey(99)).unwrap();
        assert_eq!(table.palette_interpretation(), PaletteInterpretation::Gray);
        assert_eq!(table.entry(0), Some(ColorEntry::grey(0)));
        assert_eq!(table.entry(57), Some(ColorEntry::grey(57)));
        assert_eq!(table.entry(99), Some(ColorEntry::grey(99)));
        assert_eq!(table.entry(100), None);

        assert!(matches!(
            ColorTable::color_ramp(0, &ColorEntry::grey(0), 9, &ColorEntry::rgba(0, 0, 0, 0)),
            Err(GdalError::BadArgument(_))
        ));
    }

    #[test]
    fn test_interpretation_names() {
        assert_eq!(PaletteInterpretation::Rgba.name(), "RGB");
        assert_eq!(PaletteInterpretation::Gray.name(), "Gray");
    }
}
