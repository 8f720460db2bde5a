use super::{
    Buffer, ColorEntry, ColorInterpretation, ColorTable, GdalDataType, PaletteInterpretation,
    ReadOptions, ResampleAlg,
};
use crate::assert_near;
use crate::errors::GdalError;
use crate::metadata::Metadata;
use crate::test_utils::{mem_raster, sample_tif, SuppressGDALErrorLog};
use crate::{AccessMode, Dataset, DatasetOptions, Driver};

fn sample_value(x: usize, y: usize) -> u8 {
    ((x + y) % 256) as u8
}

#[test]
fn test_bands_are_numbered_from_one() {
    let dataset = mem_raster(20, 10, 3);
    let bands = dataset.bands();
    assert_eq!(bands.count().unwrap(), 3);
    assert!(matches!(bands.get(0), Err(GdalError::OutOfRange(_))));
    assert!(matches!(bands.get(4), Err(GdalError::OutOfRange(_))));

    let band = bands.get(2).unwrap();
    assert_eq!(band.id().unwrap(), 2);
    assert_eq!(band.size().unwrap(), (20, 10));
    assert_eq!(band.data_type().unwrap(), GdalDataType::BYTE);
    assert!(!band.read_only().unwrap());

    assert_eq!(bands.map(|band| band.id()).unwrap(), vec![1, 2, 3]);
    assert_eq!(bands.iter().count(), 3);
}

#[test]
fn test_read_window() {
    let (_fixture, dataset) = sample_tif();
    let pixels = dataset.bands().get(1).unwrap().pixels();
    let buffer = pixels.read::<u8>((10, 20), (4, 3), None).unwrap();
    assert_eq!(buffer.shape(), (4, 3));
    assert_eq!(buffer.len(), 12);
    for y in 0..3 {
        for x in 0..4 {
            assert_eq!(buffer[(x, y)], sample_value(10 + x, 20 + y));
        }
    }

    let wide = pixels.read::<f64>((398, 399), (2, 1), None).unwrap();
    assert_eq!(wide.data(), &[(797 % 256) as f64, (798 % 256) as f64]);
}

#[test]
fn test_read_resampled() {
    let (_fixture, dataset) = sample_tif();
    let pixels = dataset.bands().get(1).unwrap().pixels();
    let options = ReadOptions {
        buffer_size: Some((100, 50)),
        resample_alg: ResampleAlg::Average,
        ..Default::default()
    };
    let buffer = pixels.read::<u8>((0, 0), (400, 400), Some(options)).unwrap();
    assert_eq!(buffer.shape(), (100, 50));
    assert_eq!(buffer.len(), 5000);
}

#[test]
fn test_read_with_spacing() {
    let (_fixture, dataset) = sample_tif();
    let pixels = dataset.bands().get(1).unwrap().pixels();
    let options = ReadOptions {
        pixel_space: Some(2),
        line_space: Some(8),
        ..Default::default()
    };
    let buffer = pixels.read::<u8>((5, 0), (3, 2), Some(options)).unwrap();
    // (2 - 1) * 8 + (3 - 1) * 2 + 1 elements
    assert_eq!(buffer.len(), 13);
    assert_eq!(&buffer.data[0..5], &[5, 0, 6, 0, 7]);
    assert_eq!(&buffer.data[8..13], &[6, 0, 7, 0, 8]);

    let bad = ReadOptions {
        pixel_space: Some(2),
        line_space: Some(3),
        ..Default::default()
    };
    assert!(matches!(
        pixels.read::<u8>((0, 0), (3, 2), Some(bad)),
        Err(GdalError::BadArgument(_))
    ));
}

#[test]
fn test_read_into() {
    let (_fixture, dataset) = sample_tif();
    let pixels = dataset.bands().get(1).unwrap().pixels();
    let mut buffer = Buffer::<u16>::zeroed((2, 2));
    pixels.read_into((1, 1), (2, 2), &mut buffer, None).unwrap();
    assert_eq!(buffer.data, vec![2, 3, 3, 4]);

    let options = ReadOptions {
        buffer_size: Some((3, 3)),
        ..Default::default()
    };
    assert!(matches!(
        pixels.read_into((0, 0), (2, 2), &mut buffer, Some(options)),
        Err(GdalError::BadArgument(_))
    ));

    let mut slice = [0u8; 3];
    pixels
        .read_into_slice((7, 7), (3, 1), (3, 1), &mut slice, &ReadOptions::default())
        .unwrap();
    assert_eq!(slice, [14, 15, 16]);
    let mut short = [0u8; 2];
    assert!(pixels
        .read_into_slice((7, 7), (3, 1), (3, 1), &mut short, &ReadOptions::default())
        .is_err());
}

#[test]
fn test_out_of_range_access() {
    let dataset = mem_raster(8, 8, 1);
    let pixels = dataset.bands().get(1).unwrap().pixels();
    assert!(matches!(pixels.get(8, 0), Err(GdalError::OutOfRange(_))));
    assert!(matches!(pixels.get(0, -1), Err(GdalError::OutOfRange(_))));
    assert!(matches!(pixels.set(-1, 3, 1.0), Err(GdalError::OutOfRange(_))));
    assert!(matches!(
        pixels.read::<u8>((6, 6), (4, 2), None),
        Err(GdalError::OutOfRange(_))
    ));
    assert!(matches!(
        pixels.write((0, 7), (1, 2), &Buffer::new((1, 2), vec![1u8, 2])),
        Err(GdalError::OutOfRange(_))
    ));
}

#[test]
fn test_oversized_requests_are_rejected() {
    let dataset = mem_raster(8, 8, 1);
    let pixels = dataset.bands().get(1).unwrap().pixels();

    // the window end does not fit the offset type
    let small_buffer = ReadOptions {
        buffer_size: Some((1, 1)),
        ..Default::default()
    };
    assert!(matches!(
        pixels.read::<u8>((1, 0), (usize::MAX, 1), Some(small_buffer)),
        Err(GdalError::OutOfRange(_))
    ));
    assert!(matches!(
        pixels.read::<u8>((isize::MAX, 0), (2, 1), Some(ReadOptions {
            buffer_size: Some((2, 1)),
            ..Default::default()
        })),
        Err(GdalError::OutOfRange(_))
    ));

    // buffers that cannot be addressed are refused before allocating
    assert!(matches!(
        pixels.read::<u8>((0, 0), (usize::MAX, 1), None),
        Err(GdalError::BadArgument(_))
    ));
    let huge = ReadOptions {
        buffer_size: Some((i32::MAX as usize, i32::MAX as usize)),
        ..Default::default()
    };
    assert!(matches!(
        pixels.read::<f64>((0, 0), (8, 8), Some(huge)),
        Err(GdalError::BadArgument(_))
    ));
    let spaced = ReadOptions {
        pixel_space: Some(usize::MAX),
        buffer_size: Some((2, 1)),
        ..Default::default()
    };
    assert!(matches!(
        pixels.read::<u8>((0, 0), (2, 1), Some(spaced)),
        Err(GdalError::BadArgument(_))
    ));

    assert!(matches!(
        pixels.read_block::<u8>((usize::MAX, 0)),
        Err(GdalError::OutOfRange(_))
    ));
}

#[test]
fn test_get_and_set_pixels() {
    let dataset = mem_raster(8, 8, 1);
    let pixels = dataset.bands().get(1).unwrap().pixels();
    pixels.set(3, 4, 200.0).unwrap();
    assert_eq!(pixels.get(3, 4).unwrap(), 200.0);
    assert_eq!(pixels.get(4, 3).unwrap(), 0.0);

    // values are converted to the band type
    pixels.set(0, 0, 300.0).unwrap();
    assert_eq!(pixels.get(0, 0).unwrap(), 255.0);
}

#[test]
fn test_write_typed_band() {
    let driver = Driver::get_by_name("MEM").unwrap();
    let dataset = driver
        .create_with_band_type::<i16, _>("typed", 6, 4, 1)
        .unwrap();
    let pixels = dataset.bands().get(1).unwrap().pixels();
    assert_eq!(pixels.band().data_type().unwrap(), GdalDataType::INT16);

    let data: Vec<i16> = (0..6).map(|v| v * -100).collect();
    pixels.write((0, 1), (6, 1), &Buffer::new((6, 1), data.clone())).unwrap();
    let read = pixels.read::<i16>((0, 1), (6, 1), None).unwrap();
    assert_eq!(read.data, data);

    // a 2x2 buffer stretched over a 4x4 window
    pixels
        .write((0, 0), (4, 4), &Buffer::new((2, 2), vec![1i16, 2, 3, 4]))
        .unwrap();
    let read = pixels.read::<i16>((0, 0), (4, 4), None).unwrap();
    assert_eq!(read[(0, 0)], 1);
    assert_eq!(read[(3, 0)], 2);
    assert_eq!(read[(0, 3)], 3);
    assert_eq!(read[(3, 3)], 4);
}

#[test]
fn test_blocks() {
    let dataset = mem_raster(10, 5, 1);
    let band = dataset.bands().get(1).unwrap();
    let pixels = band.pixels();
    let (block_x, block_y) = band.block_size().unwrap();
    assert_eq!(block_x, 10);

    let block = Buffer::new((block_x, block_y), vec![9u8; block_x * block_y]);
    pixels.write_block((0, 0), &block).unwrap();
    assert_eq!(pixels.read_block::<u8>((0, 0)).unwrap(), block);
    assert_eq!(pixels.get(9, 0).unwrap(), 9.0);
    assert_eq!(pixels.clamp_block((0, 0)).unwrap(), (block_x, block_y));

    assert!(matches!(
        pixels.read_block::<u16>((0, 0)),
        Err(GdalError::BadArgument(_))
    ));
    assert!(matches!(
        pixels.write_block((0, 0), &Buffer::new((1, 1), vec![0u8])),
        Err(GdalError::BadArgument(_))
    ));

    let _nolog = SuppressGDALErrorLog::new();
    assert!(matches!(
        pixels.read_block::<u8>((3, 0)),
        Err(GdalError::OutOfRange(_))
    ));
    assert!(matches!(
        band.actual_block_size((0, 10)),
        Err(GdalError::OutOfRange(_))
    ));
}

#[test]
fn test_read_only_band() {
    let (fixture, dataset) = sample_tif();
    dataset.close().unwrap();
    let dataset = Dataset::open_ex(
        fixture.path(),
        DatasetOptions::with_mode(AccessMode::ReadOnly).driver("GTiff"),
    )
    .unwrap();
    let band = dataset.bands().get(1).unwrap();
    assert!(band.read_only().unwrap());

    let pixels = band.pixels();
    for result in [
        pixels.set(0, 0, 1.0),
        pixels.write((0, 0), (1, 1), &Buffer::new((1, 1), vec![1u8])),
        band.fill(3.0),
        band.set_color_table(Some(&ColorTable::default())),
    ] {
        match result {
            Err(GdalError::Unsupported(msg)) => assert!(msg.contains("read-only"), "{msg}"),
            other => panic!("expected a read-only error, got {other:?}"),
        }
    }
    // reading still works
    assert_eq!(pixels.get(3, 2).unwrap(), 5.0);
}

#[test]
fn test_band_properties() {
    let dataset = mem_raster(4, 4, 1);
    let band = dataset.bands().get(1).unwrap();

    assert_eq!(band.no_data_value().unwrap(), None);
    band.set_no_data_value(Some(7.0)).unwrap();
    assert_eq!(band.no_data_value().unwrap(), Some(7.0));
    band.delete_no_data_value().unwrap();
    assert_eq!(band.no_data_value().unwrap(), None);

    band.set_scale(0.5).unwrap();
    band.set_offset(-10.0).unwrap();
    assert_eq!(band.scale().unwrap(), Some(0.5));
    assert_eq!(band.offset().unwrap(), Some(-10.0));

    assert_eq!(band.unit_type().unwrap(), "");
    band.set_unit_type("m").unwrap();
    assert_eq!(band.unit_type().unwrap(), "m");

    band.set_color_interpretation(ColorInterpretation::RedBand)
        .unwrap();
    assert_eq!(
        band.color_interpretation().unwrap(),
        ColorInterpretation::RedBand
    );
    assert_eq!(
        ColorInterpretation::from_name("Green").unwrap(),
        ColorInterpretation::GreenBand
    );
    assert_eq!(ColorInterpretation::BlueBand.name(), "Blue");

    band.set_category_names(&["water", "land"]).unwrap();
    assert_eq!(band.category_names().unwrap(), vec!["water", "land"]);

    band.set_description("elevation").unwrap();
    assert_eq!(band.description().unwrap(), "elevation");
}

#[test]
fn test_fill_and_statistics() {
    let dataset = mem_raster(10, 10, 1);
    let band = dataset.bands().get(1).unwrap();
    band.fill(42.0).unwrap();
    assert_eq!(band.pixels().get(9, 9).unwrap(), 42.0);

    let data: Vec<u8> = (0..100).collect();
    band.pixels()
        .write((0, 0), (10, 10), &Buffer::new((10, 10), data))
        .unwrap();
    let stats = band.compute_statistics(false).unwrap();
    assert_eq!(stats.min, 0.0);
    assert_eq!(stats.max, 99.0);
    assert_near!(stats.mean, 49.5, epsilon = 1e-9);
    assert_near!(stats.std_dev, 28.866, epsilon = 1e-3);
}

#[test]
fn test_add_band() {
    let dataset = mem_raster(4, 4, 1);
    let band = dataset
        .bands()
        .create(GdalDataType::FLOAT32, &[])
        .unwrap();
    assert_eq!(band.id().unwrap(), 2);
    assert_eq!(band.data_type().unwrap(), GdalDataType::FLOAT32);

    let band = dataset
        .bands()
        .create_async(GdalDataType::UINT16)
        .wait()
        .unwrap();
    assert_eq!(band.id().unwrap(), 3);
    assert_eq!(dataset.bands().count().unwrap(), 3);
}

#[test]
fn test_overviews() {
    let (_fixture, dataset) = sample_tif();
    let band = dataset.bands().get(1).unwrap();
    assert_eq!(band.overviews().count().unwrap(), 0);

    dataset
        .build_overviews(ResampleAlg::NearestNeighbour, &[2, 4], &[], None)
        .unwrap();
    let overviews = band.overviews();
    assert_eq!(overviews.count().unwrap(), 2);
    assert_eq!(overviews.get(0).unwrap().size().unwrap(), (200, 200));
    assert_eq!(overviews.get(1).unwrap().size().unwrap(), (100, 100));
    assert!(matches!(overviews.get(2), Err(GdalError::OutOfRange(_))));
    assert_eq!(
        overviews.map(|overview| overview.size()).unwrap(),
        vec![(200, 200), (100, 100)]
    );

    let best = overviews.get_by_sample_count(200 * 200).unwrap();
    assert_eq!(best.size().unwrap(), (200, 200));

    let overview = overviews.get(1).unwrap();
    dataset.close().unwrap();
    assert!(overview.is_destroyed());
    assert!(overview.size().unwrap_err().is_already_destroyed());
}

#[test]
fn test_overviews_async() {
    let (_fixture, dataset) = sample_tif();
    dataset
        .build_overviews_async(ResampleAlg::Average, vec![2], vec![], None)
        .wait()
        .unwrap();
    let overviews = dataset.bands().get(1).unwrap().overviews();
    assert_eq!(overviews.count_async().wait().unwrap(), 1);
    let overview = overviews.get_async(0).wait().unwrap();
    assert_eq!(overview.size_async().wait().unwrap(), (200, 200));
    assert_eq!(overview.id_async().wait().unwrap(), 0);
    assert!(matches!(
        overviews.get_async(1).wait(),
        Err(GdalError::OutOfRange(_))
    ));

    dataset.close().unwrap();
    assert!(overviews
        .count_async()
        .wait()
        .unwrap_err()
        .is_already_destroyed());
}

#[test]
fn test_color_table() {
    let (_fixture, dataset) = sample_tif();
    let band = dataset.bands().get(1).unwrap();
    assert!(band.color_table().unwrap().is_none());

    let mut table = ColorTable::default();
    table.set_color_entry(0, &ColorEntry::rgba(7, 8, 45, 255));
    table.set_color_entry(1, &ColorEntry::rgba(255, 255, 255, 255));
    band.set_color_table(Some(&table)).unwrap();
    drop(table);

    let table = band.color_table_async().wait().unwrap().unwrap();
    assert_eq!(table.palette_interpretation(), PaletteInterpretation::Rgba);
    assert!(table.entry_count() >= 2);
    assert_eq!(table.entry(0), Some(ColorEntry::rgba(7, 8, 45, 255)));

    band.set_color_table_async(None).wait().unwrap();
    assert!(band.color_table().unwrap().is_none());

    dataset.close().unwrap();
    assert!(band
        .color_table_async()
        .wait()
        .unwrap_err()
        .is_already_destroyed());
    // copies outlive the dataset
    assert_eq!(table.entry(0), Some(ColorEntry::rgba(7, 8, 45, 255)));
}

#[test]
fn test_band_properties_async() {
    let dataset = mem_raster(4, 4, 1);
    let band = dataset.bands().get(1).unwrap();

    assert_eq!(band.id_async().wait().unwrap(), 1);
    assert_eq!(band.block_size_async().wait().unwrap().0, 4);
    assert_eq!(band.data_type_async().wait().unwrap(), GdalDataType::BYTE);
    assert!(!band.read_only_async().wait().unwrap());
    assert!(!band.has_arbitrary_overviews_async().wait().unwrap());
    assert_eq!(band.minimum_async().wait().unwrap(), None);
    assert_eq!(band.maximum_async().wait().unwrap(), None);

    band.set_scale_async(2.0).wait().unwrap();
    band.set_offset_async(1.5).wait().unwrap();
    band.set_unit_type_async("ft").wait().unwrap();
    band.set_color_interpretation_async(ColorInterpretation::AlphaBand)
        .wait()
        .unwrap();
    band.set_category_names_async(vec!["a".into(), "b".into()])
        .wait()
        .unwrap();
    assert_eq!(band.scale_async().wait().unwrap(), Some(2.0));
    assert_eq!(band.offset_async().wait().unwrap(), Some(1.5));
    assert_eq!(band.unit_type_async().wait().unwrap(), "ft");
    assert_eq!(
        band.color_interpretation_async().wait().unwrap(),
        ColorInterpretation::AlphaBand
    );
    assert_eq!(band.category_names_async().wait().unwrap(), vec!["a", "b"]);

    dataset.close().unwrap();
    assert!(band.id_async().wait().unwrap_err().is_already_destroyed());
    assert!(band
        .category_names_async()
        .wait()
        .unwrap_err()
        .is_already_destroyed());
    assert!(band
        .set_scale_async(1.0)
        .wait()
        .unwrap_err()
        .is_already_destroyed());
}

#[test]
fn test_envelope() {
    let (_fixture, dataset) = sample_tif();
    let envelope = dataset.bands().envelope().unwrap().unwrap();
    assert_near!(envelope.min_x, -10.0, epsilon = 1e-9);
    assert_near!(envelope.max_x, 10.0, epsilon = 1e-9);
    assert_near!(envelope.min_y, 30.0, epsilon = 1e-9);
    assert_near!(envelope.max_y, 50.0, epsilon = 1e-9);

    assert_eq!(mem_raster(2, 2, 1).bands().envelope().unwrap(), None);
}

#[test]
fn test_close_invalidates_bands() {
    let dataset = mem_raster(4, 4, 2);
    let band = dataset.bands().get(2).unwrap();
    let pixels = band.pixels();
    let bands = dataset.bands();

    dataset.close().unwrap();
    assert!(band.is_destroyed());
    assert!(band.size().unwrap_err().is_already_destroyed());
    assert!(pixels.get(0, 0).unwrap_err().is_already_destroyed());
    assert!(pixels
        .read::<u8>((0, 0), (2, 2), None)
        .unwrap_err()
        .is_already_destroyed());
    assert!(bands.count().unwrap_err().is_already_destroyed());
    assert!(bands.get(1).unwrap_err().is_already_destroyed());
    assert!(band.description().unwrap_err().is_already_destroyed());

    let err = pixels.read_async::<u8>((0, 0), (2, 2), None).wait().unwrap_err();
    assert!(matches!(err, GdalError::AlreadyDestroyed { .. }));
}

#[test]
fn test_async_pixel_io() {
    let dataset = mem_raster(16, 16, 1);
    let band = dataset.bands().get_async(1).wait().unwrap();
    let pixels = band.pixels();

    band.fill_async(5.0).wait().unwrap();
    let data: Vec<u8> = (0..16).collect();
    pixels
        .write_async((0, 2), (16, 1), Buffer::new((16, 1), data.clone()))
        .wait()
        .unwrap();

    let row = futures::executor::block_on(pixels.read_async::<u8>((0, 2), (16, 1), None)).unwrap();
    assert_eq!(row.data, data);
    assert_eq!(pixels.get_async(0, 0).wait().unwrap(), 5.0);

    let buffer = pixels
        .read_into_async((0, 0), (4, 4), Buffer::<u8>::zeroed((2, 2)), None)
        .wait()
        .unwrap();
    assert_eq!(buffer.shape(), (2, 2));

    let block = pixels.read_block_async::<u8>((0, 2)).wait().unwrap();
    assert_eq!(block.data[..16], data[..]);

    let stats = band.compute_statistics_async(false).wait().unwrap();
    assert_eq!(stats.max, 15.0);
    assert_eq!(band.size_async().wait().unwrap(), (16, 16));
    assert_eq!(dataset.bands().count_async().wait().unwrap(), 1);
}

#[test]
fn test_buffer() {
    let buffer = Buffer::new((3, 2), vec![1u8, 2, 3, 4, 5, 6]);
    assert_eq!(buffer[(2, 1)], 6);
    assert_eq!(buffer[(0, 1)], 4);
    assert!(!buffer.is_empty());
    assert!(matches!(
        Buffer::try_new((2, 2), vec![1u8]),
        Err(GdalError::BadArgument(_))
    ));
    let (shape, data) = buffer.into_shape_and_vec();
    assert_eq!(shape, (3, 2));
    assert_eq!(data.len(), 6);
}

#[cfg(feature = "ndarray")]
#[test]
fn test_buffer_to_array() {
    let buffer = Buffer::new((3, 2), vec![1u8, 2, 3, 4, 5, 6]);
    let array = buffer.to_array().unwrap();
    assert_eq!(array.shape(), &[2, 3]);
    assert_eq!(array[[1, 0]], 4);
}

#[test]
fn test_resample_alg_names() {
    assert_eq!(ResampleAlg::default(), ResampleAlg::NearestNeighbour);
    assert_eq!(ResampleAlg::NearestNeighbour.to_gdal_str(), "NEAREST");
    assert_eq!(ResampleAlg::CubicSpline.to_gdal_str(), "CUBICSPLINE");
}
