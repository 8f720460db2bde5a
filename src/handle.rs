//! Lifetime tracking for native GDAL objects.
//!
//! Every object handed out by a [`Dataset`](crate::Dataset) carries a [`Liveness`] flag.
//! The dataset keeps weak references to those flags and flips all of them before the
//! native dataset is closed, so a band or layer that outlives its dataset fails with
//! [`GdalError::AlreadyDestroyed`] instead of touching freed memory.
//!
//! All native calls on a dataset and its children go through [`DatasetCore::with`] or
//! [`DatasetCore::with_child`], which hold the dataset lock while checking the flag and
//! running the call. [`DatasetCore::close`] takes the same lock.

use std::path::PathBuf;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Weak};

use gdal_sys::{GDALDatasetH, OGRLayerH};
use parking_lot::Mutex;

use crate::errors::{GdalError, Result};
use crate::utils::_string_array;

/// The `destroyed` flag of one wrapped native object.
#[derive(Debug)]
pub(crate) struct Liveness {
    destroyed: AtomicBool,
    kind: &'static str,
}

impl Liveness {
    pub(crate) fn new(kind: &'static str) -> Arc<Self> {
        Arc::new(Liveness {
            destroyed: AtomicBool::new(false),
            kind,
        })
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_destroyed() {
            Err(self.destroyed_err())
        } else {
            Ok(())
        }
    }

    pub(crate) fn destroyed_err(&self) -> GdalError {
        GdalError::AlreadyDestroyed { kind: self.kind }
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}

struct CoreState {
    c_dataset: GDALDatasetH,
    children: Vec<Weak<Liveness>>,
    layers: Vec<(OGRLayerH, Weak<Liveness>)>,
    result_sets: Vec<(OGRLayerH, Weak<Liveness>)>,
    mem_file: Option<PathBuf>,
    // `/vsimem/` files that must outlive the native dataset
    pinned: Vec<PathBuf>,
}

/// Shared state of one open dataset.
pub(crate) struct DatasetCore {
    live: Arc<Liveness>,
    state: Mutex<CoreState>,
}

// The native pointers are only dereferenced while `state` is locked.
unsafe impl Send for DatasetCore {}
unsafe impl Sync for DatasetCore {}

static OPEN_DATASETS: LazyLock<Mutex<Vec<Weak<DatasetCore>>>> = LazyLock::new(Default::default);

/// What a closure running under the dataset lock gets to see.
pub(crate) struct Scope<'a> {
    state: &'a mut CoreState,
}

impl Scope<'_> {
    pub(crate) fn c_dataset(&self) -> GDALDatasetH {
        self.state.c_dataset
    }

    /// Registers a new child object whose flag is flipped when the dataset closes.
    pub(crate) fn adopt(&mut self, kind: &'static str) -> Arc<Liveness> {
        let live = Liveness::new(kind);
        if self.state.children.len() >= 64 && self.state.children.len().is_power_of_two() {
            self.state.children.retain(|c| c.strong_count() > 0);
        }
        self.state.children.push(Arc::downgrade(&live));
        live
    }

    /// Registers an `ExecuteSQL` result set; it is released before the dataset closes.
    pub(crate) fn adopt_result_set(&mut self, c_layer: OGRLayerH) -> Arc<Liveness> {
        let live = Liveness::new("Layer");
        self.state
            .result_sets
            .push((c_layer, Arc::downgrade(&live)));
        live
    }

    /// Releases one result set early, marking it destroyed.
    pub(crate) fn release_result_set(&mut self, c_layer: OGRLayerH) {
        if let Some(pos) = self
            .state
            .result_sets
            .iter()
            .position(|(layer, _)| *layer == c_layer)
        {
            let (c_layer, live) = self.state.result_sets.swap_remove(pos);
            if let Some(live) = live.upgrade() {
                live.destroy();
            }
            unsafe { gdal_sys::GDALDatasetReleaseResultSet(self.state.c_dataset, c_layer) };
        }
    }

    /// Returns the flag shared by every handle to `c_layer`, registering it on first use.
    pub(crate) fn adopt_layer(&mut self, c_layer: OGRLayerH) -> Arc<Liveness> {
        self.state.layers.retain(|(_, live)| live.strong_count() > 0);
        if let Some(live) = self
            .state
            .layers
            .iter()
            .find(|(layer, _)| *layer == c_layer)
            .and_then(|(_, live)| live.upgrade())
        {
            return live;
        }
        let live = self.adopt("Layer");
        self.state.layers.push((c_layer, Arc::downgrade(&live)));
        live
    }

    /// Marks every handle to `c_layer` as destroyed, e.g. before the layer is deleted.
    pub(crate) fn invalidate_layer(&mut self, c_layer: OGRLayerH) {
        self.state.layers.retain(|(layer, live)| {
            if *layer == c_layer {
                if let Some(live) = live.upgrade() {
                    live.destroy();
                }
                false
            } else {
                true
            }
        });
    }
}

impl DatasetCore {
    pub(crate) fn new(c_dataset: GDALDatasetH, mem_file: Option<PathBuf>) -> Arc<Self> {
        let pinned = mem_files_of(c_dataset, mem_file.as_ref());
        crate::vsi::pin(&pinned);
        let core = Arc::new(DatasetCore {
            live: Liveness::new("Dataset"),
            state: Mutex::new(CoreState {
                c_dataset,
                children: Vec::new(),
                layers: Vec::new(),
                result_sets: Vec::new(),
                mem_file,
                pinned,
            }),
        });
        let mut open = OPEN_DATASETS.lock();
        open.retain(|c| c.strong_count() > 0);
        open.push(Arc::downgrade(&core));
        core
    }

    pub(crate) fn liveness(&self) -> &Liveness {
        &self.live
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.live.is_destroyed()
    }

    /// Runs `f` against the dataset while holding its lock.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Scope) -> Result<R>) -> Result<R> {
        let mut state = self.state.lock();
        self.live.check()?;
        f(&mut Scope { state: &mut state })
    }

    /// Runs `f` on behalf of a child object while holding the dataset lock.
    pub(crate) fn with_child<R>(
        &self,
        child: &Liveness,
        f: impl FnOnce(&mut Scope) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.state.lock();
        child.check()?;
        self.live.check().map_err(|_| child.destroyed_err())?;
        f(&mut Scope { state: &mut state })
    }

    /// Runs `f` on behalf of `child` while also holding the lock of `target`.
    ///
    /// Both locks are taken in address order, so calls spanning the same two
    /// datasets from different threads cannot deadlock. `target` must be another dataset.
    pub(crate) fn with_child_and<R>(
        &self,
        child: &Liveness,
        target: &DatasetCore,
        f: impl FnOnce(&mut Scope, &mut Scope) -> Result<R>,
    ) -> Result<R> {
        if ptr::eq(self, target) {
            return Err(GdalError::BadArgument(
                "source and target are the same dataset".to_string(),
            ));
        }
        let (mut own, mut other) = if (self as *const Self) < (target as *const Self) {
            let own = self.state.lock();
            (own, target.state.lock())
        } else {
            let other = target.state.lock();
            (self.state.lock(), other)
        };
        child.check()?;
        self.live.check().map_err(|_| child.destroyed_err())?;
        target.live.check()?;
        f(&mut Scope { state: &mut own }, &mut Scope { state: &mut other })
    }

    /// Runs `f` under the dataset lock whether or not the dataset is still open.
    ///
    /// Used to free objects that are owned by the caller, such as features, which
    /// must not race with other calls on the same dataset.
    pub(crate) fn serialized<R>(&self, f: impl FnOnce() -> R) -> R {
        let _state = self.state.lock();
        f()
    }

    /// Invalidates every child, releases result sets and closes the native dataset.
    pub(crate) fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.live.check()?;

        let mut invalidated = 0;
        for child in state.children.drain(..) {
            if let Some(child) = child.upgrade() {
                child.destroy();
                invalidated += 1;
            }
        }
        state.layers.clear();
        let c_dataset = state.c_dataset;
        for (c_layer, live) in state.result_sets.drain(..) {
            if let Some(live) = live.upgrade() {
                live.destroy();
            }
            unsafe { gdal_sys::GDALDatasetReleaseResultSet(c_dataset, c_layer) };
        }

        self.live.destroy();
        unsafe { gdal_sys::GDALClose(c_dataset) };
        state.c_dataset = ptr::null_mut();
        log::debug!("closed dataset, invalidated {invalidated} child objects");
        crate::vsi::unpin(&std::mem::take(&mut state.pinned));

        if let Some(mem_file) = state.mem_file.take() {
            if let Err(e) = crate::vsi::release_owned(&mem_file) {
                log::warn!("unable to release in-memory buffer {}: {e}", mem_file.display());
            }
        }
        Ok(())
    }
}

impl Drop for DatasetCore {
    fn drop(&mut self) {
        if !self.live.is_destroyed() {
            let _ = self.close();
        }
    }
}

/// The `/vsimem/` files backing `c_dataset`, as far as GDAL reports them.
fn mem_files_of(c_dataset: GDALDatasetH, mem_file: Option<&PathBuf>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if !c_dataset.is_null() {
        let c_list = unsafe { gdal_sys::GDALGetFileList(c_dataset) };
        if !c_list.is_null() {
            files = _string_array(c_list).into_iter().map(PathBuf::from).collect();
            unsafe { gdal_sys::CSLDestroy(c_list) };
        }
    }
    files.extend(mem_file.cloned());
    files.retain(|file| file.starts_with("/vsimem"));
    files.sort();
    files.dedup();
    files
}

/// Closes every dataset that is still open.
///
/// Objects vended from these datasets become unusable, just as with [`Dataset::close`](crate::Dataset::close).
/// Returns the number of datasets that were closed.
pub fn close_all_datasets() -> usize {
    let open: Vec<_> = std::mem::take(&mut *OPEN_DATASETS.lock());
    open.iter()
        .filter_map(Weak::upgrade)
        .filter(|core| core.close().is_ok())
        .count()
}

/// A handle whose liveness can be checked without touching the native layer.
pub(crate) trait Guarded: Clone + Send + 'static {
    /// The flag that decides whether a queued call may still run.
    fn liveness(&self) -> &Liveness;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_flag() {
        let live = Liveness::new("RasterBand");
        assert!(live.check().is_ok());
        live.destroy();
        let err = live.check().unwrap_err();
        assert!(err.is_already_destroyed());
        assert_eq!(err.to_string(), "RasterBand object has already been destroyed");
    }

    #[test]
    fn test_registry_prunes_dropped_children() {
        let core = DatasetCore {
            live: Liveness::new("Dataset"),
            state: Mutex::new(CoreState {
                c_dataset: ptr::null_mut(),
                children: Vec::new(),
                layers: Vec::new(),
                result_sets: Vec::new(),
                mem_file: None,
                pinned: Vec::new(),
            }),
        };
        let kept = core
            .with(|scope| {
                for _ in 0..200 {
                    scope.adopt("Feature");
                }
                Ok(scope.adopt("Feature"))
            })
            .unwrap();
        assert!(core.state.lock().children.len() < 201);
        // never closed natively: the pointer is null
        core.live.destroy();
        assert!(!kept.is_destroyed());
    }

    #[test]
    fn test_layer_handles_share_a_flag() {
        let core = DatasetCore {
            live: Liveness::new("Dataset"),
            state: Mutex::new(CoreState {
                c_dataset: ptr::null_mut(),
                children: Vec::new(),
                layers: Vec::new(),
                result_sets: Vec::new(),
                mem_file: None,
                pinned: Vec::new(),
            }),
        };
        let c_a = 0x10 as OGRLayerH;
        let c_b = 0x20 as OGRLayerH;
        let (a1, a2, b) = core
            .with(|scope| Ok((scope.adopt_layer(c_a), scope.adopt_layer(c_a), scope.adopt_layer(c_b))))
            .unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        core.with(|scope| {
            scope.invalidate_layer(c_a);
            Ok(())
        })
        .unwrap();
        assert!(a1.is_destroyed() && a2.is_destroyed());
        assert!(!b.is_destroyed());
        core.live.destroy();
    }
}
