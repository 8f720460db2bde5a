use std::ffi::{c_int, CString};
use std::fmt::{self, Debug, Formatter};
use std::ptr;
use std::sync::Arc;

use gdal_sys::{self, CPLErr, GDALAccess, GDALColorInterp, GDALMajorObjectH, GDALRasterBandH};

use crate::dataset::Dataset;
use crate::errors::*;
use crate::handle::{Guarded, Liveness, Scope};
use crate::metadata::{MajorObject, Metadata};
use crate::raster::{ColorTable, GdalDataType, Pixels, RasterCreationOption};
use crate::utils::{_cpl_result, _last_cpl_err, _opt_string, _string, _string_array};
use crate::vector::Envelope;
use crate::work::{self, Pending};
use crate::CslStringList;

/// Represents a single band of a dataset.
///
/// A band keeps its dataset alive, but stops working once the dataset is
/// [closed](Dataset::close): every call then fails with
/// [`GdalError::AlreadyDestroyed`].
#[derive(Clone)]
pub struct RasterBand {
    dataset: Dataset,
    live: Arc<Liveness>,
    c_band: GDALRasterBandH,
}

// The band pointer is only used under the dataset lock.
unsafe impl Send for RasterBand {}
unsafe impl Sync for RasterBand {}

impl RasterBand {
    /// Wraps a band pointer obtained while holding the dataset lock.
    fn adopt(dataset: &Dataset, scope: &mut Scope, c_band: GDALRasterBandH) -> RasterBand {
        RasterBand {
            dataset: dataset.clone(),
            live: scope.adopt("RasterBand"),
            c_band,
        }
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(GDALRasterBandH) -> Result<R>) -> Result<R> {
        let c_band = self.c_band;
        self.dataset.core().with_child(&self.live, |_| f(c_band))
    }

    fn with_scope<R>(
        &self,
        f: impl FnOnce(&mut Scope, GDALRasterBandH) -> Result<R>,
    ) -> Result<R> {
        let c_band = self.c_band;
        self.dataset
            .core()
            .with_child(&self.live, |scope| f(scope, c_band))
    }

    /// The dataset this band belongs to.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn is_destroyed(&self) -> bool {
        self.live.is_destroyed()
    }

    /// The 1-based index of this band; `0` for overview bands.
    pub fn id(&self) -> Result<usize> {
        self.with(|c_band| Ok(unsafe { gdal_sys::GDALGetBandNumber(c_band) } as usize))
    }

    pub fn id_async(&self) -> Pending<usize> {
        work::spawn_guarded(self, |this| this.id())
    }

    /// Dimensions of the band, `(x, y)`.
    /// Note that this may not be the same as the size of the dataset for overviews.
    pub fn size(&self) -> Result<(usize, usize)> {
        self.with(|c_band| {
            let x = unsafe { gdal_sys::GDALGetRasterBandXSize(c_band) };
            let y = unsafe { gdal_sys::GDALGetRasterBandYSize(c_band) };
            Ok((x as usize, y as usize))
        })
    }

    pub fn size_async(&self) -> Pending<(usize, usize)> {
        work::spawn_guarded(self, |this| this.size())
    }

    /// The natural block size of this band.
    pub fn block_size(&self) -> Result<(usize, usize)> {
        self.with(|c_band| {
            let mut size_x = 0;
            let mut size_y = 0;
            unsafe { gdal_sys::GDALGetBlockSize(c_band, &mut size_x, &mut size_y) };
            Ok((size_x as usize, size_y as usize))
        })
    }

    pub fn block_size_async(&self) -> Pending<(usize, usize)> {
        work::spawn_guarded(self, |this| this.block_size())
    }

    /// Get actual block size (at the edges) when block size
    /// does not divide band size.
    pub fn actual_block_size(&self, block_index: (usize, usize)) -> Result<(usize, usize)> {
        self.with(|c_band| {
            let mut block_size_x = 0;
            let mut block_size_y = 0;
            let rv = unsafe {
                gdal_sys::GDALGetActualBlockSize(
                    c_band,
                    block_index.0 as c_int,
                    block_index.1 as c_int,
                    &mut block_size_x,
                    &mut block_size_y,
                )
            };
            if rv != CPLErr::CE_None {
                return Err(GdalError::OutOfRange(format!(
                    "block {block_index:?} is outside of the band: {}",
                    _last_cpl_err(rv)
                )));
            }
            Ok((block_size_x as usize, block_size_y as usize))
        })
    }

    pub fn data_type(&self) -> Result<GdalDataType> {
        self.with(|c_band| Ok(unsafe { gdal_sys::GDALGetRasterDataType(c_band) }.into()))
    }

    pub fn data_type_async(&self) -> Pending<GdalDataType> {
        work::spawn_guarded(self, |this| this.data_type())
    }

    pub fn read_only(&self) -> Result<bool> {
        self.with(|c_band| {
            Ok(unsafe { gdal_sys::GDALGetRasterAccess(c_band) } == GDALAccess::GA_ReadOnly)
        })
    }

    pub fn read_only_async(&self) -> Pending<bool> {
        work::spawn_guarded(self, |this| this.read_only())
    }

    pub fn no_data_value(&self) -> Result<Option<f64>> {
        self.with(|c_band| {
            let mut pb_success = 1;
            let no_data = unsafe { gdal_sys::GDALGetRasterNoDataValue(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(no_data))
        })
    }

    pub fn no_data_value_async(&self) -> Pending<Option<f64>> {
        work::spawn_guarded(self, |this| this.no_data_value())
    }

    /// Sets the no-data value; `None` removes it.
    pub fn set_no_data_value(&self, no_data: Option<f64>) -> Result<()> {
        self.with(|c_band| {
            let rv = match no_data {
                Some(value) => unsafe { gdal_sys::GDALSetRasterNoDataValue(c_band, value) },
                None => unsafe { gdal_sys::GDALDeleteRasterNoDataValue(c_band) },
            };
            _cpl_result(rv, "GDALSetRasterNoDataValue")
        })
    }

    pub fn delete_no_data_value(&self) -> Result<()> {
        self.set_no_data_value(None)
    }

    pub fn scale(&self) -> Result<Option<f64>> {
        self.with(|c_band| {
            let mut pb_success = 1;
            let scale = unsafe { gdal_sys::GDALGetRasterScale(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(scale))
        })
    }

    pub fn scale_async(&self) -> Pending<Option<f64>> {
        work::spawn_guarded(self, |this| this.scale())
    }

    pub fn set_scale(&self, scale: f64) -> Result<()> {
        self.with(|c_band| {
            let rv = unsafe { gdal_sys::GDALSetRasterScale(c_band, scale) };
            _cpl_result(rv, "GDALSetRasterScale")
        })
    }

    pub fn set_scale_async(&self, scale: f64) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.set_scale(scale))
    }

    pub fn offset(&self) -> Result<Option<f64>> {
        self.with(|c_band| {
            let mut pb_success = 1;
            let offset = unsafe { gdal_sys::GDALGetRasterOffset(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(offset))
        })
    }

    pub fn offset_async(&self) -> Pending<Option<f64>> {
        work::spawn_guarded(self, |this| this.offset())
    }

    pub fn set_offset(&self, offset: f64) -> Result<()> {
        self.with(|c_band| {
            let rv = unsafe { gdal_sys::GDALSetRasterOffset(c_band, offset) };
            _cpl_result(rv, "GDALSetRasterOffset")
        })
    }

    pub fn set_offset_async(&self, offset: f64) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.set_offset(offset))
    }

    /// Name of the unit of the pixel values, e.g. `"m"`. Empty when unknown.
    pub fn unit_type(&self) -> Result<String> {
        self.with(|c_band| {
            let c_unit = unsafe { gdal_sys::GDALGetRasterUnitType(c_band) };
            Ok(_opt_string(c_unit).unwrap_or_default())
        })
    }

    pub fn unit_type_async(&self) -> Pending<String> {
        work::spawn_guarded(self, |this| this.unit_type())
    }

    pub fn set_unit_type(&self, unit: &str) -> Result<()> {
        let c_unit = CString::new(unit)?;
        self.with(|c_band| {
            let rv = unsafe { gdal_sys::GDALSetRasterUnitType(c_band, c_unit.as_ptr()) };
            _cpl_result(rv, "GDALSetRasterUnitType")
        })
    }

    pub fn set_unit_type_async(&self, unit: &str) -> Pending<()> {
        let unit = unit.to_owned();
        work::spawn_guarded(self, move |this| this.set_unit_type(&unit))
    }

    /// The minimum value as stored by the driver, if known.
    pub fn minimum(&self) -> Result<Option<f64>> {
        self.with(|c_band| {
            let mut pb_success = 0;
            let min = unsafe { gdal_sys::GDALGetRasterMinimum(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(min))
        })
    }

    pub fn minimum_async(&self) -> Pending<Option<f64>> {
        work::spawn_guarded(self, |this| this.minimum())
    }

    /// The maximum value as stored by the driver, if known.
    pub fn maximum(&self) -> Result<Option<f64>> {
        self.with(|c_band| {
            let mut pb_success = 0;
            let max = unsafe { gdal_sys::GDALGetRasterMaximum(c_band, &mut pb_success) };
            Ok((pb_success == 1).then_some(max))
        })
    }

    pub fn maximum_async(&self) -> Pending<Option<f64>> {
        work::spawn_guarded(self, |this| this.maximum())
    }

    pub fn color_interpretation(&self) -> Result<ColorInterpretation> {
        self.with(|c_band| {
            let c_interp = unsafe { gdal_sys::GDALGetRasterColorInterpretation(c_band) };
            Ok(ColorInterpretation::from_c_int(c_interp))
        })
    }

    pub fn color_interpretation_async(&self) -> Pending<ColorInterpretation> {
        work::spawn_guarded(self, |this| this.color_interpretation())
    }

    pub fn set_color_interpretation(&self, interpretation: ColorInterpretation) -> Result<()> {
        self.with(|c_band| {
            let rv = unsafe {
                gdal_sys::GDALSetRasterColorInterpretation(c_band, interpretation.c_int())
            };
            _cpl_result(rv, "GDALSetRasterColorInterpretation")
        })
    }

    pub fn set_color_interpretation_async(
        &self,
        interpretation: ColorInterpretation,
    ) -> Pending<()> {
        work::spawn_guarded(self, move |this| {
            this.set_color_interpretation(interpretation)
        })
    }

    /// A copy of the palette of the band, or `None` if it has none.
    pub fn color_table(&self) -> Result<Option<ColorTable>> {
        self.with(|c_band| {
            let c_table = unsafe { gdal_sys::GDALGetRasterColorTable(c_band) };
            if c_table.is_null() {
                return Ok(None);
            }
            Ok(Some(unsafe { ColorTable::clone_from_c(c_table) }))
        })
    }

    pub fn color_table_async(&self) -> Pending<Option<ColorTable>> {
        work::spawn_guarded(self, |this| this.color_table())
    }

    /// Replaces the palette of the band; `None` removes it.
    pub fn set_color_table(&self, table: Option<&ColorTable>) -> Result<()> {
        self.with(|c_band| {
            require_writable(c_band, "set its color table")?;
            let c_table = table.map_or(ptr::null_mut(), ColorTable::c_table);
            let rv = unsafe { gdal_sys::GDALSetRasterColorTable(c_band, c_table) };
            _cpl_result(rv, "GDALSetRasterColorTable")
        })
    }

    pub fn set_color_table_async(&self, table: Option<ColorTable>) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.set_color_table(table.as_ref()))
    }

    /// Names of the classes of a thematic band, indexed by pixel value.
    pub fn category_names(&self) -> Result<Vec<String>> {
        self.with(|c_band| {
            let c_names = unsafe { gdal_sys::GDALGetRasterCategoryNames(c_band) };
            Ok(_string_array(c_names))
        })
    }

    pub fn category_names_async(&self) -> Pending<Vec<String>> {
        work::spawn_guarded(self, |this| this.category_names())
    }

    /// Replaces the category names; an empty slice clears them.
    pub fn set_category_names(&self, names: &[&str]) -> Result<()> {
        let c_names = CslStringList::try_from(names)?;
        self.with(|c_band| {
            let rv = unsafe { gdal_sys::GDALSetRasterCategoryNames(c_band, c_names.as_ptr()) };
            _cpl_result(rv, "GDALSetRasterCategoryNames")
        })
    }

    pub fn set_category_names_async(&self, names: Vec<String>) -> Pending<()> {
        work::spawn_guarded(self, move |this| {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            this.set_category_names(&names)
        })
    }

    /// Sets every pixel to `value`.
    pub fn fill(&self, value: f64) -> Result<()> {
        self.with(|c_band| {
            require_writable(c_band, "fill it")?;
            let rv = unsafe { gdal_sys::GDALFillRaster(c_band, value, 0.0) };
            _cpl_result(rv, "GDALFillRaster")
        })
    }

    pub fn fill_async(&self, value: f64) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.fill(value))
    }

    /// Writes cached blocks to disk.
    pub fn flush(&self) -> Result<()> {
        self.with(|c_band| {
            let rv = unsafe { gdal_sys::GDALFlushRasterCache(c_band) };
            _cpl_result(rv, "GDALFlushRasterCache")
        })
    }

    pub fn flush_async(&self) -> Pending<()> {
        work::spawn_guarded(self, |this| this.flush())
    }

    /// Scans the band and computes min, max, mean and standard deviation.
    ///
    /// With `is_approx_ok` GDAL may use overviews or a subset of the blocks.
    pub fn compute_statistics(&self, is_approx_ok: bool) -> Result<StatisticsAll> {
        self.with(|c_band| {
            let mut stats = StatisticsAll::default();
            let rv = unsafe {
                gdal_sys::GDALComputeRasterStatistics(
                    c_band,
                    c_int::from(is_approx_ok),
                    &mut stats.min,
                    &mut stats.max,
                    &mut stats.mean,
                    &mut stats.std_dev,
                    None,
                    ptr::null_mut(),
                )
            };
            _cpl_result(rv, "GDALComputeRasterStatistics")?;
            Ok(stats)
        })
    }

    pub fn compute_statistics_async(&self, is_approx_ok: bool) -> Pending<StatisticsAll> {
        work::spawn_guarded(self, move |this| this.compute_statistics(is_approx_ok))
    }

    /// Whether the driver can produce overviews of any resolution on the fly.
    pub fn has_arbitrary_overviews(&self) -> Result<bool> {
        self.with(|c_band| Ok(unsafe { gdal_sys::GDALHasArbitraryOverviews(c_band) } != 0))
    }

    pub fn has_arbitrary_overviews_async(&self) -> Pending<bool> {
        work::spawn_guarded(self, |this| this.has_arbitrary_overviews())
    }

    pub fn overviews(&self) -> RasterOverviews {
        RasterOverviews { band: self.clone() }
    }

    /// Pixel I/O on this band.
    pub fn pixels(&self) -> Pixels {
        Pixels::new(self.clone())
    }
}

/// Fails with [`GdalError::Unsupported`] when the band was opened read-only.
pub(crate) fn require_writable(c_band: GDALRasterBandH, action: &str) -> Result<()> {
    if unsafe { gdal_sys::GDALGetRasterAccess(c_band) } == GDALAccess::GA_Update {
        return Ok(());
    }
    let id = unsafe { gdal_sys::GDALGetBandNumber(c_band) };
    Err(GdalError::Unsupported(format!(
        "band {id} is read-only, cannot {action}"
    )))
}

impl Guarded for RasterBand {
    fn liveness(&self) -> &Liveness {
        &self.live
    }
}

impl Debug for RasterBand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterBand")
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl MajorObject for RasterBand {
    fn with_major_object<R>(&self, f: impl FnOnce(GDALMajorObjectH) -> Result<R>) -> Result<R> {
        self.with(|c_band| f(c_band))
    }
}

impl Metadata for RasterBand {}

crate::metadata::impl_metadata_async!(RasterBand);

/// Result of [`RasterBand::compute_statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatisticsAll {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

/// How the values of a band are to be displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorInterpretation {
    Undefined,
    GrayIndex,
    PaletteIndex,
    RedBand,
    GreenBand,
    BlueBand,
    AlphaBand,
    HueBand,
    SaturationBand,
    LightnessBand,
    CyanBand,
    MagentaBand,
    YellowBand,
    BlackBand,
    YCbCrSpaceY,
    YCbCrSpaceCb,
    YCbCrSpaceCr,
}

impl ColorInterpretation {
    pub fn from_c_int(color_interpretation: GDALColorInterp::Type) -> Self {
        match color_interpretation {
            GDALColorInterp::GCI_GrayIndex => Self::GrayIndex,
            GDALColorInterp::GCI_PaletteIndex => Self::PaletteIndex,
            GDALColorInterp::GCI_RedBand => Self::RedBand,
            GDALColorInterp::GCI_GreenBand => Self::GreenBand,
            GDALColorInterp::GCI_BlueBand => Self::BlueBand,
            GDALColorInterp::GCI_AlphaBand => Self::AlphaBand,
            GDALColorInterp::GCI_HueBand => Self::HueBand,
            GDALColorInterp::GCI_SaturationBand => Self::SaturationBand,
            GDALColorInterp::GCI_LightnessBand => Self::LightnessBand,
            GDALColorInterp::GCI_CyanBand => Self::CyanBand,
            GDALColorInterp::GCI_MagentaBand => Self::MagentaBand,
            GDALColorInterp::GCI_YellowBand => Self::YellowBand,
            GDALColorInterp::GCI_BlackBand => Self::BlackBand,
            GDALColorInterp::GCI_YCbCr_YBand => Self::YCbCrSpaceY,
            GDALColorInterp::GCI_YCbCr_CbBand => Self::YCbCrSpaceCb,
            GDALColorInterp::GCI_YCbCr_CrBand => Self::YCbCrSpaceCr,
            _ => Self::Undefined,
        }
    }

    pub fn c_int(&self) -> GDALColorInterp::Type {
        match self {
            Self::Undefined => GDALColorInterp::GCI_Undefined,
            Self::GrayIndex => GDALColorInterp::GCI_GrayIndex,
            Self::PaletteIndex => GDALColorInterp::GCI_PaletteIndex,
            Self::RedBand => GDALColorInterp::GCI_RedBand,
            Self::GreenBand => GDALColorInterp::GCI_GreenBand,
            Self::BlueBand => GDALColorInterp::GCI_BlueBand,
            Self::AlphaBand => GDALColorInterp::GCI_AlphaBand,
            Self::HueBand => GDALColorInterp::GCI_HueBand,
            Self::SaturationBand => GDALColorInterp::GCI_SaturationBand,
            Self::LightnessBand => GDALColorInterp::GCI_LightnessBand,
            Self::CyanBand => GDALColorInterp::GCI_CyanBand,
            Self::MagentaBand => GDALColorInterp::GCI_MagentaBand,
            Self::YellowBand => GDALColorInterp::GCI_YellowBand,
            Self::BlackBand => GDALColorInterp::GCI_BlackBand,
            Self::YCbCrSpaceY => GDALColorInterp::GCI_YCbCr_YBand,
            Self::YCbCrSpaceCb => GDALColorInterp::GCI_YCbCr_CbBand,
            Self::YCbCrSpaceCr => GDALColorInterp::GCI_YCbCr_CrBand,
        }
    }

    /// Parses a name such as `"Red"`, ignoring case.
    pub fn from_name(name: &str) -> Result<Self> {
        let c_name = CString::new(name)?;
        let c_interp = unsafe { gdal_sys::GDALGetColorInterpretationByName(c_name.as_ptr()) };
        match Self::from_c_int(c_interp) {
            Self::Undefined if !name.eq_ignore_ascii_case("undefined") => Err(
                GdalError::BadArgument(format!("unknown color interpretation '{name}'")),
            ),
            interp => Ok(interp),
        }
    }

    pub fn name(&self) -> String {
        let rv = unsafe { gdal_sys::GDALGetColorInterpretationName(self.c_int()) };
        _string(rv)
    }
}

/// The bands of a dataset, numbered from `1`.
#[derive(Clone, Debug)]
pub struct DatasetBands {
    dataset: Dataset,
}

impl DatasetBands {
    pub(crate) fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    pub fn count(&self) -> Result<usize> {
        self.dataset
            .core()
            .with(|scope| Ok(unsafe { gdal_sys::GDALGetRasterCount(scope.c_dataset()) } as usize))
    }

    pub fn count_async(&self) -> Pending<usize> {
        work::spawn_guarded(self, |this| this.count())
    }

    /// Returns the band with the 1-based index `id`.
    pub fn get(&self, id: usize) -> Result<RasterBand> {
        self.dataset.core().with(|scope| {
            let count = unsafe { gdal_sys::GDALGetRasterCount(scope.c_dataset()) } as usize;
            if id < 1 || id > count {
                return Err(GdalError::OutOfRange(format!(
                    "band {id} does not exist, bands are numbered 1 to {count}"
                )));
            }
            let c_band = unsafe { gdal_sys::GDALGetRasterBand(scope.c_dataset(), id as c_int) };
            if c_band.is_null() {
                return Err(GdalError::OutOfRange(format!("band {id} does not exist")));
            }
            Ok(RasterBand::adopt(&self.dataset, scope, c_band))
        })
    }

    pub fn get_async(&self, id: usize) -> Pending<RasterBand> {
        work::spawn_guarded(self, move |this| this.get(id))
    }

    /// Appends a band of `data_type`. Not every driver supports adding bands.
    pub fn create(
        &self,
        data_type: GdalDataType,
        options: &[RasterCreationOption],
    ) -> Result<RasterBand> {
        let mut c_options = CslStringList::new();
        for option in options {
            c_options.set_name_value(option.key, option.value)?;
        }
        self.dataset.core().with(|scope| {
            let rv = unsafe {
                gdal_sys::GDALAddBand(scope.c_dataset(), data_type.gdal_type(), c_options.as_ptr())
            };
            _cpl_result(rv, "GDALAddBand")?;
            let count = unsafe { gdal_sys::GDALGetRasterCount(scope.c_dataset()) };
            let c_band = unsafe { gdal_sys::GDALGetRasterBand(scope.c_dataset(), count) };
            Ok(RasterBand::adopt(&self.dataset, scope, c_band))
        })
    }

    pub fn create_async(&self, data_type: GdalDataType) -> Pending<RasterBand> {
        work::spawn_guarded(self, move |this| this.create(data_type, &[]))
    }

    /// The area covered by the raster, computed from its geo-transform.
    pub fn envelope(&self) -> Result<Option<Envelope>> {
        let (Some((size_x, size_y)), Some(gt)) =
            (self.dataset.raster_size()?, self.dataset.geo_transform()?)
        else {
            return Ok(None);
        };
        let (size_x, size_y) = (size_x as f64, size_y as f64);
        let corners = [(0.0, 0.0), (size_x, 0.0), (0.0, size_y), (size_x, size_y)];
        let mut envelope = Envelope::empty();
        for (px, py) in corners {
            let x = gt[0] + px * gt[1] + py * gt[2];
            let y = gt[3] + px * gt[4] + py * gt[5];
            envelope.merge_point(x, y);
        }
        Ok(Some(envelope))
    }

    pub fn iter(&self) -> DatasetBandsIter {
        DatasetBandsIter {
            bands: self.clone(),
            next: 1,
            count: None,
        }
    }

    /// Calls `f` for every band, stopping at the first error.
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(RasterBand) -> Result<()>,
    {
        for band in self.iter() {
            f(band?)?;
        }
        Ok(())
    }

    pub fn map<R, F>(&self, mut f: F) -> Result<Vec<R>>
    where
        F: FnMut(RasterBand) -> Result<R>,
    {
        self.iter().map(|band| f(band?)).collect()
    }
}

impl Guarded for DatasetBands {
    fn liveness(&self) -> &Liveness {
        self.dataset.liveness()
    }
}

pub struct DatasetBandsIter {
    bands: DatasetBands,
    next: usize,
    count: Option<usize>,
}

impl Iterator for DatasetBandsIter {
    type Item = Result<RasterBand>;

    fn next(&mut self) -> Option<Self::Item> {
        let count = match self.count {
            Some(count) => count,
            None => match self.bands.count() {
                Ok(count) => *self.count.insert(count),
                Err(e) => {
                    self.count = Some(0);
                    return Some(Err(e));
                }
            },
        };
        if self.next > count {
            return None;
        }
        let band = self.bands.get(self.next);
        self.next += 1;
        Some(band)
    }
}

/// The overviews of a band, numbered from `0`.
#[derive(Clone, Debug)]
pub struct RasterOverviews {
    band: RasterBand,
}

impl RasterOverviews {
    pub fn count(&self) -> Result<usize> {
        self.band
            .with(|c_band| Ok(unsafe { gdal_sys::GDALGetOverviewCount(c_band) } as usize))
    }

    pub fn count_async(&self) -> Pending<usize> {
        work::spawn_guarded(self, |this| this.count())
    }

    pub fn get(&self, index: usize) -> Result<RasterBand> {
        self.band.with_scope(|scope, c_band| {
            let count = unsafe { gdal_sys::GDALGetOverviewCount(c_band) } as usize;
            if index >= count {
                return Err(GdalError::OutOfRange(format!(
                    "overview {index} does not exist, the band has {count}"
                )));
            }
            let c_overview = unsafe { gdal_sys::GDALGetOverview(c_band, index as c_int) };
            if c_overview.is_null() {
                return Err(GdalError::OutOfRange(format!("overview {index} does not exist")));
            }
            Ok(RasterBand::adopt(&self.band.dataset, scope, c_overview))
        })
    }

    pub fn get_async(&self, index: usize) -> Pending<RasterBand> {
        work::spawn_guarded(self, move |this| this.get(index))
    }

    /// The most reduced overview that still has at least `samples` pixels,
    /// or the band itself if there is none.
    pub fn get_by_sample_count(&self, samples: usize) -> Result<RasterBand> {
        self.band.with_scope(|scope, c_band| {
            let c_overview =
                unsafe { gdal_sys::GDALGetRasterSampleOverview(c_band, samples as c_int) };
            if c_overview.is_null() {
                return Err(GdalError::NotFound(format!(
                    "no overview with at least {samples} samples"
                )));
            }
            Ok(RasterBand::adopt(&self.band.dataset, scope, c_overview))
        })
    }

    pub fn get_by_sample_count_async(&self, samples: usize) -> Pending<RasterBand> {
        work::spawn_guarded(self, move |this| this.get_by_sample_count(samples))
    }

    pub fn iter(&self) -> RasterOverviewsIter {
        RasterOverviewsIter {
            overviews: self.clone(),
            next: 0,
            count: None,
        }
    }

    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(RasterBand) -> Result<()>,
    {
        for overview in self.iter() {
            f(overview?)?;
        }
        Ok(())
    }

    pub fn map<R, F>(&self, mut f: F) -> Result<Vec<R>>
    where
        F: FnMut(RasterBand) -> Result<R>,
    {
        self.iter().map(|overview| f(overview?)).collect()
    }
}

impl Guarded for RasterOverviews {
    fn liveness(&self) -> &Liveness {
        &self.band.live
    }
}

pub struct RasterOverviewsIter {
    overviews: RasterOverviews,
    next: usize,
    count: Option<usize>,
}

impl Iterator for RasterOverviewsIter {
    type Item = Result<RasterBand>;

    fn next(&mut self) -> Option<Self::Item> {
        let count = match self.count {
            Some(count) => count,
            None => match self.overviews.count() {
                Ok(count) => *self.count.insert(count),
                Err(e) => {
                    self.count = Some(0);
                    return Some(Err(e));
                }
            },
        };
        if self.next >= count {
            return None;
        }
        let overview = self.overviews.get(self.next);
        self.next += 1;
        Some(overview)
    }
}
