use gdal_async::errors::GdalError;
use gdal_async::{Driver, DriverManager};

#[test]
fn test_get_driver() {
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    assert_eq!(driver.short_name(), "GTiff");
    assert_eq!(driver.long_name(), "GeoTIFF");

    assert!(DriverManager::count() > 0);
    assert!(DriverManager::get_driver(0).is_ok());
    assert!(matches!(
        DriverManager::get_driver(100_000),
        Err(GdalError::OutOfRange(_))
    ));
}

#[test]
fn test_all_drivers_are_listed() {
    let names: Vec<String> = DriverManager::all()
        .iter()
        .map(|driver| driver.short_name())
        .collect();
    assert_eq!(names.len(), DriverManager::count());
    assert!(names.iter().any(|name| name == "MEM"));
    assert!(names.iter().any(|name| name == "ESRI Shapefile"));
}

#[test]
fn test_unknown_driver() {
    assert!(Driver::get_by_name("NotADriver").is_err());
}
