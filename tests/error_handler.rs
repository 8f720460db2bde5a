use std::ffi::CString;
use std::sync::{Arc, Mutex};

use gdal_async::{config, errors::CplErrType};
use gdal_sys::{CPLErr, CPLError};

#[test]
fn test_error_handler() {
    // The handler is process-wide, so the scenarios run one after the other.
    use_error_handler();
    errors_from_worker_threads();
    error_handler_interleaved();
}

fn use_error_handler() {
    let errors: Arc<Mutex<Vec<(CplErrType, i32, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    config::set_error_handler(move |a, b, c| {
        errors_clone.lock().unwrap().push((a, b, c.to_string()));
    });

    let msg = CString::new("foo").unwrap();
    unsafe { CPLError(CPLErr::CE_Failure, 42, msg.as_ptr()) };
    let msg = CString::new("bar").unwrap();
    unsafe { CPLError(CPLErr::CE_Warning, 1, msg.as_ptr()) };

    config::remove_error_handler();

    let result = errors.lock().unwrap().clone();
    assert_eq!(
        result,
        vec![
            (CplErrType::Failure, 42, "foo".to_string()),
            (CplErrType::Warning, 1, "bar".to_string())
        ]
    );
}

fn errors_from_worker_threads() {
    let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = errors.clone();
    config::set_error_handler(move |_, _, msg| {
        errors_clone.lock().unwrap().push(msg.to_string());
    });

    let result = gdal_async::Dataset::open_async("/vsimem/does/not/exist.tif").wait();
    assert!(result.is_err());

    config::remove_error_handler();
    assert!(!errors.lock().unwrap().is_empty());
}

fn error_handler_interleaved() {
    use std::thread;

    let setters: Vec<_> = (0..2)
        .map(|_| {
            thread::spawn(|| {
                for _ in 0..100 {
                    config::set_error_handler(|_a, _b, _c| {});
                }
            })
        })
        .collect();

    let provoker = thread::spawn(|| {
        for _ in 0..100 {
            let msg = CString::new("foo").unwrap();
            unsafe { CPLError(CPLErr::CE_Failure, 42, msg.as_ptr()) };
            let msg = CString::new("bar").unwrap();
            unsafe { CPLError(CPLErr::CE_Warning, 1, msg.as_ptr()) };
        }
    });

    provoker.join().unwrap();
    for setter in setters {
        setter.join().unwrap();
    }
    config::remove_error_handler();
}
