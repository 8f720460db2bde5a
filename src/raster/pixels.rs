use std::ffi::{c_int, c_void};

use gdal_sys::{self, CPLErr, GDALDataType, GDALRWFlag, GDALRasterIOExtraArg};

use crate::errors::*;
use crate::handle::{Guarded, Liveness};
use crate::raster::rasterband::require_writable;
use crate::raster::{Buffer, GdalType, RasterBand, ResampleAlg};
use crate::utils::_cpl_result;
use crate::work::{self, Pending};

/// Layout and resampling of a windowed read.
///
/// `pixel_space` and `line_space` are counted in elements of the buffer type and
/// default to a dense, row-major layout.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReadOptions {
    /// Size of the output buffer; defaults to the window size.
    pub buffer_size: Option<(usize, usize)>,
    pub pixel_space: Option<usize>,
    pub line_space: Option<usize>,
    pub resample_alg: ResampleAlg,
}

/// Pixel I/O on a [`RasterBand`].
///
/// Offsets are `(x, y)` from the top-left corner of the band.
#[derive(Clone, Debug)]
pub struct Pixels {
    band: RasterBand,
}

impl Pixels {
    pub(crate) fn new(band: RasterBand) -> Self {
        Self { band }
    }

    pub fn band(&self) -> &RasterBand {
        &self.band
    }

    /// Reads one pixel as `f64`.
    pub fn get(&self, x: isize, y: isize) -> Result<f64> {
        self.band.with(|c_band| {
            check_in_band(c_band, x, y)?;
            let mut value = 0.0_f64;
            let rv = unsafe {
                gdal_sys::GDALRasterIO(
                    c_band,
                    GDALRWFlag::GF_Read,
                    x as c_int,
                    y as c_int,
                    1,
                    1,
                    &mut value as *mut f64 as *mut c_void,
                    1,
                    1,
                    GDALDataType::GDT_Float64,
                    0,
                    0,
                )
            };
            _cpl_result(rv, "GDALRasterIO")?;
            Ok(value)
        })
    }

    pub fn get_async(&self, x: isize, y: isize) -> Pending<f64> {
        work::spawn_guarded(self, move |this| this.get(x, y))
    }

    /// Writes one pixel. The value is converted (and rounded) to the band type.
    pub fn set(&self, x: isize, y: isize, value: f64) -> Result<()> {
        self.band.with(|c_band| {
            require_writable(c_band, "write pixels")?;
            check_in_band(c_band, x, y)?;
            let mut value = value;
            let rv = unsafe {
                gdal_sys::GDALRasterIO(
                    c_band,
                    GDALRWFlag::GF_Write,
                    x as c_int,
                    y as c_int,
                    1,
                    1,
                    &mut value as *mut f64 as *mut c_void,
                    1,
                    1,
                    GDALDataType::GDT_Float64,
                    0,
                    0,
                )
            };
            _cpl_result(rv, "GDALRasterIO")
        })
    }

    pub fn set_async(&self, x: isize, y: isize, value: f64) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.set(x, y, value))
    }

    /// Reads a window of `window_size` pixels starting at `offset` into a new [`Buffer`].
    ///
    /// GDAL resamples when `options.buffer_size` differs from the window size. With
    /// non-default spacing the returned data is laid out by that spacing.
    pub fn read<T: GdalType>(
        &self,
        offset: (isize, isize),
        window_size: (usize, usize),
        options: Option<ReadOptions>,
    ) -> Result<Buffer<T>> {
        let options = options.unwrap_or_default();
        let size = options.buffer_size.unwrap_or(window_size);
        let layout = Layout::new(size, &options)?;
        let mut data = layout.allocate::<T>()?;
        self.read_into_slice(offset, window_size, size, &mut data, &options)?;
        Ok(Buffer { size, data })
    }

    pub fn read_async<T: GdalType>(
        &self,
        offset: (isize, isize),
        window_size: (usize, usize),
        options: Option<ReadOptions>,
    ) -> Pending<Buffer<T>> {
        work::spawn_guarded(self, move |this| this.read(offset, window_size, options))
    }

    /// Reads a window into an existing buffer, resampling to the buffer's size.
    pub fn read_into<T: GdalType>(
        &self,
        offset: (isize, isize),
        window_size: (usize, usize),
        buffer: &mut Buffer<T>,
        options: Option<ReadOptions>,
    ) -> Result<()> {
        let options = options.unwrap_or_default();
        if let Some(size) = options.buffer_size {
            if size != buffer.size {
                return Err(GdalError::BadArgument(format!(
                    "buffer_size {size:?} does not match the buffer size {:?}",
                    buffer.size
                )));
            }
        }
        let size = buffer.size;
        self.read_into_slice(offset, window_size, size, &mut buffer.data, &options)
    }

    /// Like [`Pixels::read_into`], handing the filled buffer back.
    pub fn read_into_async<T: GdalType>(
        &self,
        offset: (isize, isize),
        window_size: (usize, usize),
        mut buffer: Buffer<T>,
        options: Option<ReadOptions>,
    ) -> Pending<Buffer<T>> {
        work::spawn_guarded(self, move |this| {
            this.read_into(offset, window_size, &mut buffer, options)?;
            Ok(buffer)
        })
    }

    /// Reads a window into `data`, which holds `size.0 x size.1` elements laid out
    /// according to the spacing in `options`.
    pub fn read_into_slice<T: GdalType>(
        &self,
        offset: (isize, isize),
        window_size: (usize, usize),
        size: (usize, usize),
        data: &mut [T],
        options: &ReadOptions,
    ) -> Result<()> {
        let layout = Layout::new(size, options)?;
        if data.len() < layout.required_len() {
            return Err(GdalError::BadArgument(format!(
                "buffer of {} elements is too small, {} are required",
                data.len(),
                layout.required_len()
            )));
        }
        self.band.with(|c_band| {
            check_window(c_band, offset, window_size)?;
            raster_io::<T>(
                c_band,
                GDALRWFlag::GF_Read,
                offset,
                window_size,
                size,
                data.as_mut_ptr() as *mut c_void,
                &layout,
                options.resample_alg,
            )
        })
    }

    /// Writes `buffer` into the window at `offset`. GDAL resamples when the window
    /// size differs from the buffer size.
    pub fn write<T: GdalType>(
        &self,
        offset: (isize, isize),
        window_size: (usize, usize),
        buffer: &Buffer<T>,
    ) -> Result<()> {
        let options = ReadOptions::default();
        let layout = Layout::new(buffer.size, &options)?;
        if buffer.data.len() < layout.required_len() {
            return Err(GdalError::BadArgument(format!(
                "buffer of {} elements does not match its size {:?}",
                buffer.data.len(),
                buffer.size
            )));
        }
        self.band.with(|c_band| {
            require_writable(c_band, "write pixels")?;
            check_window(c_band, offset, window_size)?;
            raster_io::<T>(
                c_band,
                GDALRWFlag::GF_Write,
                offset,
                window_size,
                buffer.size,
                buffer.data.as_ptr() as *mut c_void,
                &layout,
                options.resample_alg,
            )
        })
    }

    pub fn write_async<T: GdalType>(
        &self,
        offset: (isize, isize),
        window_size: (usize, usize),
        buffer: Buffer<T>,
    ) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.write(offset, window_size, &buffer))
    }

    /// Reads one block in the band's natural block layout. `T` must match the
    /// band's data type.
    pub fn read_block<T: GdalType>(&self, block_index: (usize, usize)) -> Result<Buffer<T>> {
        self.band.with(|c_band| {
            check_block_type::<T>(c_band)?;
            let (block_x, block_y) = block_coords(block_index)?;
            let size = block_size(c_band);
            let mut data = vec![T::default(); size.0 * size.1];
            let rv = unsafe {
                gdal_sys::GDALReadBlock(
                    c_band,
                    block_x,
                    block_y,
                    data.as_mut_ptr() as *mut c_void,
                )
            };
            if rv != CPLErr::CE_None {
                return Err(block_err(rv, block_index));
            }
            Ok(Buffer { size, data })
        })
    }

    pub fn read_block_async<T: GdalType>(&self, block_index: (usize, usize)) -> Pending<Buffer<T>> {
        work::spawn_guarded(self, move |this| this.read_block(block_index))
    }

    /// Writes one whole block. `T` must match the band's data type and `buffer`
    /// must have the block size.
    pub fn write_block<T: GdalType>(
        &self,
        block_index: (usize, usize),
        buffer: &Buffer<T>,
    ) -> Result<()> {
        self.band.with(|c_band| {
            require_writable(c_band, "write blocks")?;
            check_block_type::<T>(c_band)?;
            let (block_x, block_y) = block_coords(block_index)?;
            let size = block_size(c_band);
            if buffer.size != size || buffer.data.len() < size.0 * size.1 {
                return Err(GdalError::BadArgument(format!(
                    "buffer size {:?} does not match the block size {size:?}",
                    buffer.size
                )));
            }
            let rv = unsafe {
                gdal_sys::GDALWriteBlock(
                    c_band,
                    block_x,
                    block_y,
                    buffer.data.as_ptr() as *mut c_void,
                )
            };
            if rv != CPLErr::CE_None {
                return Err(block_err(rv, block_index));
            }
            Ok(())
        })
    }

    pub fn write_block_async<T: GdalType>(
        &self,
        block_index: (usize, usize),
        buffer: Buffer<T>,
    ) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.write_block(block_index, &buffer))
    }

    /// The valid part of a block, smaller than the block size at the right and
    /// bottom edges.
    pub fn clamp_block(&self, block_index: (usize, usize)) -> Result<(usize, usize)> {
        self.band.actual_block_size(block_index)
    }

    pub fn clamp_block_async(&self, block_index: (usize, usize)) -> Pending<(usize, usize)> {
        work::spawn_guarded(self, move |this| this.clamp_block(block_index))
    }
}

impl Guarded for Pixels {
    fn liveness(&self) -> &Liveness {
        self.band.liveness()
    }
}

/// Element spacing of a buffer.
struct Layout {
    size: (usize, usize),
    pixel_space: usize,
    line_space: usize,
    len: usize,
}

impl Layout {
    fn new(size: (usize, usize), options: &ReadOptions) -> Result<Self> {
        let too_large = || GdalError::BadArgument(format!("a buffer of {size:?} pixels is too large"));
        to_c_int(size.0).ok_or_else(too_large)?;
        to_c_int(size.1).ok_or_else(too_large)?;
        let pixel_space = options.pixel_space.unwrap_or(1);
        if pixel_space == 0 {
            return Err(GdalError::BadArgument("pixel_space must not be 0".to_string()));
        }
        let line_space = match options.line_space {
            Some(line_space) => line_space,
            None => size.0.checked_mul(pixel_space).ok_or_else(too_large)?,
        };
        let (width, height) = size;
        let len = if width == 0 || height == 0 {
            0
        } else {
            let line = (width - 1)
                .checked_mul(pixel_space)
                .and_then(|n| n.checked_add(1))
                .ok_or_else(too_large)?;
            if line_space < line {
                return Err(GdalError::BadArgument(format!(
                    "line_space {line_space} is smaller than a line of {width} pixels"
                )));
            }
            (height - 1)
                .checked_mul(line_space)
                .and_then(|n| n.checked_add(line))
                .ok_or_else(too_large)?
        };
        Ok(Layout {
            size,
            pixel_space,
            line_space,
            len,
        })
    }

    fn required_len(&self) -> usize {
        self.len
    }

    /// Allocates a buffer matching this layout.
    fn allocate<T: GdalType>(&self) -> Result<Vec<T>> {
        let bytes = self.len.checked_mul(std::mem::size_of::<T>());
        if bytes.map_or(true, |bytes| bytes > isize::MAX as usize) {
            return Err(GdalError::BadArgument(format!(
                "a buffer of {:?} pixels is too large",
                self.size
            )));
        }
        Ok(vec![T::default(); self.len])
    }
}

fn to_c_int(value: usize) -> Option<c_int> {
    c_int::try_from(value).ok()
}

fn block_coords(block_index: (usize, usize)) -> Result<(c_int, c_int)> {
    match (to_c_int(block_index.0), to_c_int(block_index.1)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(GdalError::OutOfRange(format!("block {block_index:?} does not exist"))),
    }
}

fn band_size(c_band: gdal_sys::GDALRasterBandH) -> (isize, isize) {
    let x = unsafe { gdal_sys::GDALGetRasterBandXSize(c_band) };
    let y = unsafe { gdal_sys::GDALGetRasterBandYSize(c_band) };
    (x as isize, y as isize)
}

fn check_in_band(c_band: gdal_sys::GDALRasterBandH, x: isize, y: isize) -> Result<()> {
    let (size_x, size_y) = band_size(c_band);
    if x < 0 || y < 0 || x >= size_x || y >= size_y {
        return Err(GdalError::OutOfRange(format!(
            "pixel ({x}, {y}) is outside of the {size_x}x{size_y} band"
        )));
    }
    Ok(())
}

fn check_window(
    c_band: gdal_sys::GDALRasterBandH,
    offset: (isize, isize),
    window_size: (usize, usize),
) -> Result<()> {
    let (size_x, size_y) = band_size(c_band);
    let (x, y) = offset;
    let end = |start: isize, len: usize| isize::try_from(len).ok().and_then(|len| start.checked_add(len));
    let inside = x >= 0
        && y >= 0
        && end(x, window_size.0).is_some_and(|end_x| end_x <= size_x)
        && end(y, window_size.1).is_some_and(|end_y| end_y <= size_y);
    if !inside {
        return Err(GdalError::OutOfRange(format!(
            "window {window_size:?} at {offset:?} is outside of the {size_x}x{size_y} band"
        )));
    }
    Ok(())
}

fn block_size(c_band: gdal_sys::GDALRasterBandH) -> (usize, usize) {
    let mut size_x = 0;
    let mut size_y = 0;
    unsafe { gdal_sys::GDALGetBlockSize(c_band, &mut size_x, &mut size_y) };
    (size_x as usize, size_y as usize)
}

fn check_block_type<T: GdalType>(c_band: gdal_sys::GDALRasterBandH) -> Result<()> {
    let band_type = unsafe { gdal_sys::GDALGetRasterDataType(c_band) };
    if band_type != T::gdal_type() {
        return Err(GdalError::BadArgument(format!(
            "block access needs the band type {}, got {}",
            crate::raster::GdalDataType::from(band_type),
            T::datatype()
        )));
    }
    Ok(())
}

fn block_err(rv: CPLErr::Type, block_index: (usize, usize)) -> GdalError {
    match crate::utils::_last_cpl_err(rv) {
        GdalError::BadArgument(msg) | GdalError::CplError { msg, .. } => GdalError::OutOfRange(
            format!("block {block_index:?} cannot be accessed: {msg}"),
        ),
        other => other,
    }
}

#[allow(clippy::too_many_arguments)]
fn raster_io<T: GdalType>(
    c_band: gdal_sys::GDALRasterBandH,
    rw_flag: GDALRWFlag::Type,
    offset: (isize, isize),
    window_size: (usize, usize),
    size: (usize, usize),
    data: *mut c_void,
    layout: &Layout,
    resample_alg: ResampleAlg,
) -> Result<()> {
    let type_size = std::mem::size_of::<T>() as i64;
    let mut extra_arg: GDALRasterIOExtraArg = unsafe { std::mem::zeroed() };
    extra_arg.nVersion = 1;
    extra_arg.eResampleAlg = resample_alg.to_gdal();
    let rv = unsafe {
        gdal_sys::GDALRasterIOEx(
            c_band,
            rw_flag,
            offset.0 as c_int,
            offset.1 as c_int,
            window_size.0 as c_int,
            window_size.1 as c_int,
            data,
            size.0 as c_int,
            size.1 as c_int,
            T::gdal_type(),
            layout.pixel_space as i64 * type_size,
            layout.line_space as i64 * type_size,
            &mut extra_arg,
        )
    };
    _cpl_result(rv, "GDALRasterIOEx")
}
