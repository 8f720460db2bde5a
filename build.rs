use semver::Version;
use std::env;

fn main() {
    // gdal-sys exports the linked version as `((maj)*1000000+(min)*10000+(rev)*100)`
    let gdal_version_string = env::var("DEP_GDAL_VERSION_NUMBER")
        .expect("gdal-sys did not export DEP_GDAL_VERSION_NUMBER");
    let gdal_version_number: u64 = gdal_version_string
        .parse()
        .expect("Could not parse gdal version number!");

    let detected_version = Version::new(
        gdal_version_number / 1_000_000,
        (gdal_version_number % 1_000_000) / 10_000,
        (gdal_version_number % 10_000) / 100,
    );
    println!("cargo:rerun-if-env-changed=DEP_GDAL_VERSION_NUMBER");
    println!("cargo:rustc-cfg=major_is_{}", detected_version.major);

    // we only support GDAL >= 3.0.
    for major in 3..=detected_version.major {
        println!("cargo:rustc-cfg=major_ge_{}", major);
    }

    for minor in 1..=detected_version.minor {
        println!("cargo:rustc-cfg=minor_ge_{}", minor);
    }
}
