use std::ffi::{c_int, CStr, CString};
use std::fmt::{self, Debug, Formatter};
use std::ptr;
use std::sync::Arc;

use gdal_sys::{self, GDALMajorObjectH, OGRErr, OGRLayerH, OGRwkbGeometryType};

use crate::dataset::{Dataset, DatasetCapability};
use crate::errors::*;
use crate::handle::{Guarded, Liveness, Scope};
use crate::metadata::{MajorObject, Metadata};
use crate::spatial_ref::SpatialRef;
use crate::utils::{_last_error_msg, _last_null_pointer_err, _ogr_result, _string};
use crate::vector::{Envelope, Geometry, LayerFeatures, LayerFields, Selector};
use crate::work::{self, Pending};
use crate::CslStringList;

/// Layer capabilities, see [`Layer::test_capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerCapability {
    RandomRead,
    SequentialWrite,
    RandomWrite,
    FastSpatialFilter,
    FastFeatureCount,
    FastGetExtent,
    FastSetNextByIndex,
    CreateField,
    CreateGeomField,
    DeleteField,
    ReorderFields,
    AlterFieldDefn,
    DeleteFeature,
    StringsAsUTF8,
    Transactions,
    IgnoreFields,
    CurveGeometries,
}

impl LayerCapability {
    fn as_c_str(&self) -> &'static CStr {
        match self {
            LayerCapability::RandomRead => c"RandomRead",
            LayerCapability::SequentialWrite => c"SequentialWrite",
            LayerCapability::RandomWrite => c"RandomWrite",
            LayerCapability::FastSpatialFilter => c"FastSpatialFilter",
            LayerCapability::FastFeatureCount => c"FastFeatureCount",
            LayerCapability::FastGetExtent => c"FastGetExtent",
            LayerCapability::FastSetNextByIndex => c"FastSetNextByIndex",
            LayerCapability::CreateField => c"CreateField",
            LayerCapability::CreateGeomField => c"CreateGeomField",
            LayerCapability::DeleteField => c"DeleteField",
            LayerCapability::ReorderFields => c"ReorderFields",
            LayerCapability::AlterFieldDefn => c"AlterFieldDefn",
            LayerCapability::DeleteFeature => c"DeleteFeature",
            LayerCapability::StringsAsUTF8 => c"StringsAsUTF8",
            LayerCapability::Transactions => c"Transactions",
            LayerCapability::IgnoreFields => c"IgnoreFields",
            LayerCapability::CurveGeometries => c"CurveGeometries",
        }
    }

    pub(crate) fn test(&self, c_layer: OGRLayerH) -> bool {
        unsafe { gdal_sys::OGR_L_TestCapability(c_layer, self.as_c_str().as_ptr()) == 1 }
    }

    /// Fails with [`GdalError::Unsupported`] unless `c_layer` has this capability.
    pub(crate) fn require(&self, c_layer: OGRLayerH, action: &str) -> Result<()> {
        if self.test(c_layer) {
            return Ok(());
        }
        let name = _string(unsafe { gdal_sys::OGR_L_GetName(c_layer) });
        Err(GdalError::Unsupported(format!(
            "layer '{name}' is read-only or its driver cannot {action}"
        )))
    }
}

/// Releases an `ExecuteSQL` result set once its last handle is dropped.
struct ResultSet {
    dataset: Dataset,
    c_layer: OGRLayerH,
}

// The layer pointer is only used under the dataset lock.
unsafe impl Send for ResultSet {}
unsafe impl Sync for ResultSet {}

impl Drop for ResultSet {
    fn drop(&mut self) {
        let c_layer = self.c_layer;
        // a closed dataset has released its result sets already
        let _ = self.dataset.core().with(|scope| {
            scope.release_result_set(c_layer);
            Ok(())
        });
    }
}

/// Layer in a vector dataset.
///
/// Handles to the same layer share their state; once the layer is
/// [removed](DatasetLayers::remove) or its dataset closed, every call fails with
/// [`GdalError::AlreadyDestroyed`].
#[derive(Clone)]
pub struct Layer {
    dataset: Dataset,
    live: Arc<Liveness>,
    c_layer: OGRLayerH,
    result_set: Option<Arc<ResultSet>>,
}

// The layer pointer is only used under the dataset lock.
unsafe impl Send for Layer {}
unsafe impl Sync for Layer {}

impl Layer {
    pub(crate) fn adopt(dataset: &Dataset, scope: &mut Scope, c_layer: OGRLayerH) -> Layer {
        Layer {
            dataset: dataset.clone(),
            live: scope.adopt_layer(c_layer),
            c_layer,
            result_set: None,
        }
    }

    pub(crate) fn adopt_result_set(
        dataset: &Dataset,
        scope: &mut Scope,
        c_layer: OGRLayerH,
    ) -> Layer {
        Layer {
            dataset: dataset.clone(),
            live: scope.adopt_result_set(c_layer),
            c_layer,
            result_set: Some(Arc::new(ResultSet {
                dataset: dataset.clone(),
                c_layer,
            })),
        }
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(OGRLayerH) -> Result<R>) -> Result<R> {
        let c_layer = self.c_layer;
        self.dataset.core().with_child(&self.live, |_| f(c_layer))
    }

    pub(crate) fn with_scope<R>(
        &self,
        f: impl FnOnce(&mut Scope, OGRLayerH) -> Result<R>,
    ) -> Result<R> {
        let c_layer = self.c_layer;
        self.dataset
            .core()
            .with_child(&self.live, |scope| f(scope, c_layer))
    }

    pub(crate) fn live(&self) -> &Arc<Liveness> {
        &self.live
    }

    /// The dataset this layer belongs to.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn is_destroyed(&self) -> bool {
        self.live.is_destroyed()
    }

    /// Whether this layer is the result of [`Dataset::execute_sql`].
    pub fn is_result_set(&self) -> bool {
        self.result_set.is_some()
    }

    pub fn name(&self) -> Result<String> {
        self.with(|c_layer| Ok(_string(unsafe { gdal_sys::OGR_L_GetName(c_layer) })))
    }

    pub fn geometry_type(&self) -> Result<OGRwkbGeometryType::Type> {
        self.with(|c_layer| Ok(unsafe { gdal_sys::OGR_L_GetGeomType(c_layer) }))
    }

    /// Name of the FID column, empty when the driver does not expose one.
    pub fn fid_column(&self) -> Result<String> {
        self.with(|c_layer| Ok(_string(unsafe { gdal_sys::OGR_L_GetFIDColumn(c_layer) })))
    }

    pub fn geometry_column(&self) -> Result<String> {
        self.with(|c_layer| {
            Ok(_string(unsafe {
                gdal_sys::OGR_L_GetGeometryColumn(c_layer)
            }))
        })
    }

    /// A copy of the layer's spatial reference; it stays valid after the dataset is closed.
    pub fn srs(&self) -> Result<Option<SpatialRef>> {
        self.with(|c_layer| {
            let c_srs = unsafe { gdal_sys::OGR_L_GetSpatialRef(c_layer) };
            if c_srs.is_null() {
                return Ok(None);
            }
            unsafe { SpatialRef::from_c_obj(c_srs) }.map(Some)
        })
    }

    pub fn srs_async(&self) -> Pending<Option<SpatialRef>> {
        work::spawn_guarded(self, |this| this.srs())
    }

    pub fn test_capability(&self, capability: LayerCapability) -> Result<bool> {
        self.with(|c_layer| Ok(capability.test(c_layer)))
    }

    /// The extent of the layer.
    ///
    /// Without `force`, drivers that cannot compute the extent cheaply return `None`.
    pub fn extent(&self, force: bool) -> Result<Option<Envelope>> {
        self.with(|c_layer| {
            let mut envelope = gdal_sys::OGREnvelope {
                MinX: 0.0,
                MaxX: 0.0,
                MinY: 0.0,
                MaxY: 0.0,
            };
            let rv =
                unsafe { gdal_sys::OGR_L_GetExtent(c_layer, &mut envelope, force as c_int) };
            if rv != OGRErr::OGRERR_NONE {
                unsafe { gdal_sys::CPLErrorReset() };
                return Ok(None);
            }
            Ok(Some(envelope.into()))
        })
    }

    pub fn extent_async(&self, force: bool) -> Pending<Option<Envelope>> {
        work::spawn_guarded(self, move |this| this.extent(force))
    }

    /// A copy of the current spatial filter.
    pub fn spatial_filter(&self) -> Result<Option<Geometry>> {
        self.with(|c_layer| {
            let c_geom = unsafe { gdal_sys::OGR_L_GetSpatialFilter(c_layer) };
            if c_geom.is_null() {
                return Ok(None);
            }
            unsafe { Geometry::from_borrowed(c_geom) }.map(Some)
        })
    }

    /// Restricts reading to features whose geometry intersects `geometry`.
    pub fn set_spatial_filter(&self, geometry: &Geometry) -> Result<()> {
        self.with(|c_layer| {
            unsafe { gdal_sys::OGR_L_SetSpatialFilter(c_layer, geometry.c_geometry()) };
            Ok(())
        })
    }

    pub fn set_spatial_filter_rect(
        &self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Result<()> {
        self.with(|c_layer| {
            unsafe { gdal_sys::OGR_L_SetSpatialFilterRect(c_layer, min_x, min_y, max_x, max_y) };
            Ok(())
        })
    }

    pub fn clear_spatial_filter(&self) -> Result<()> {
        self.with(|c_layer| {
            unsafe { gdal_sys::OGR_L_SetSpatialFilter(c_layer, ptr::null_mut()) };
            Ok(())
        })
    }

    /// Sets an OGR SQL `WHERE` clause restricting the features read; `None` clears it.
    pub fn set_attribute_filter(&self, query: Option<&str>) -> Result<()> {
        let c_query = query.map(CString::new).transpose()?;
        self.with(|c_layer| {
            let rv = unsafe {
                gdal_sys::OGR_L_SetAttributeFilter(
                    c_layer,
                    c_query.as_ref().map_or(ptr::null(), |q| q.as_ptr()),
                )
            };
            if rv != OGRErr::OGRERR_NONE {
                return Err(GdalError::ParseError(format!(
                    "invalid attribute filter {query:?}: {}",
                    _last_error_msg()
                )));
            }
            Ok(())
        })
    }

    /// Flushes pending changes to disk.
    pub fn sync_to_disk(&self) -> Result<()> {
        self.with(|c_layer| _ogr_result(unsafe { gdal_sys::OGR_L_SyncToDisk(c_layer) }, "OGR_L_SyncToDisk"))
    }

    pub fn sync_to_disk_async(&self) -> Pending<()> {
        work::spawn_guarded(self, |this| this.sync_to_disk())
    }

    pub fn features(&self) -> LayerFeatures {
        LayerFeatures::new(self.clone())
    }

    pub fn fields(&self) -> LayerFields {
        LayerFields::new(self.clone())
    }
}

impl Guarded for Layer {
    fn liveness(&self) -> &Liveness {
        &self.live
    }
}

impl Debug for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("result_set", &self.is_result_set())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl MajorObject for Layer {
    fn with_major_object<R>(&self, f: impl FnOnce(GDALMajorObjectH) -> Result<R>) -> Result<R> {
        self.with(|c_layer| f(c_layer))
    }
}

impl Metadata for Layer {}

crate::metadata::impl_metadata_async!(Layer);

/// Parameters for [`DatasetLayers::create`].
#[derive(Debug, Clone, Copy)]
pub struct LayerOptions<'a> {
    /// The name of the new layer
    pub name: &'a str,
    /// The SRS of the new layer, `None` for no SRS
    pub srs: Option<&'a SpatialRef>,
    /// The geometry type of the new layer
    pub ty: OGRwkbGeometryType::Type,
    /// Driver specific `KEY=VALUE` creation options
    pub options: &'a [&'a str],
}

impl Default for LayerOptions<'_> {
    fn default() -> Self {
        LayerOptions {
            name: "",
            srs: None,
            ty: OGRwkbGeometryType::wkbUnknown,
            options: &[],
        }
    }
}

fn require_dataset(scope: &Scope, capability: DatasetCapability, action: &str) -> Result<()> {
    let rv = unsafe {
        gdal_sys::GDALDatasetTestCapability(scope.c_dataset(), capability.as_c_str().as_ptr())
    };
    if rv == 1 {
        Ok(())
    } else {
        Err(GdalError::Unsupported(format!(
            "dataset is read-only or its driver cannot {action}"
        )))
    }
}

/// The layers of a [`Dataset`], numbered from 0.
#[derive(Clone, Debug)]
pub struct DatasetLayers {
    dataset: Dataset,
}

impl DatasetLayers {
    pub(crate) fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    pub fn count(&self) -> Result<usize> {
        self.dataset.core().with(|scope| {
            Ok(unsafe { gdal_sys::GDALDatasetGetLayerCount(scope.c_dataset()) } as usize)
        })
    }

    pub fn count_async(&self) -> Pending<usize> {
        work::spawn_guarded(self, |this| this.count())
    }

    /// Returns a layer by its 0-based index or by its name.
    pub fn get(&self, selector: impl Into<Selector>) -> Result<Layer> {
        let selector = selector.into();
        let c_name = match &selector {
            Selector::Name(name) => Some(CString::new(name.as_str())?),
            Selector::Index(_) => None,
        };
        self.dataset.core().with(|scope| {
            let c_layer = match &selector {
                Selector::Name(name) => {
                    let c_name = c_name.as_ref().map_or(ptr::null(), |n| n.as_ptr());
                    let c_layer =
                        unsafe { gdal_sys::GDALDatasetGetLayerByName(scope.c_dataset(), c_name) };
                    if c_layer.is_null() {
                        return Err(GdalError::NotFound(format!("layer '{name}' does not exist")));
                    }
                    c_layer
                }
                Selector::Index(index) => {
                    let count = unsafe { gdal_sys::GDALDatasetGetLayerCount(scope.c_dataset()) };
                    if *index >= count as usize {
                        return Err(GdalError::OutOfRange(format!(
                            "layer {index} does not exist, the dataset has {count} layers"
                        )));
                    }
                    unsafe { gdal_sys::GDALDatasetGetLayer(scope.c_dataset(), *index as c_int) }
                }
            };
            if c_layer.is_null() {
                return Err(_last_null_pointer_err("GDALDatasetGetLayer"));
            }
            Ok(Layer::adopt(&self.dataset, scope, c_layer))
        })
    }

    pub fn get_async(&self, selector: impl Into<Selector>) -> Pending<Layer> {
        let selector = selector.into();
        work::spawn_guarded(self, move |this| this.get(selector))
    }

    /// Creates a new layer.
    ///
    /// Fails with [`GdalError::Unsupported`] when the dataset was not opened for update
    /// or its driver cannot create layers.
    ///
    /// ```rust, no_run
    /// # use gdal_async::{Driver, vector::{LayerOptions, OGRwkbGeometryType}};
    /// # fn main() -> gdal_async::errors::Result<()> {
    /// let dataset = Driver::get_by_name("Memory")?.create_vector_only("")?;
    /// let layer = dataset.layers().create(LayerOptions {
    ///     name: "roads",
    ///     ty: OGRwkbGeometryType::wkbLineString,
    ///     ..Default::default()
    /// })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn create(&self, options: LayerOptions<'_>) -> Result<Layer> {
        let c_name = CString::new(options.name)?;
        let c_options = CslStringList::try_from(options.options)?;
        self.dataset.core().with(|scope| {
            require_dataset(scope, DatasetCapability::CreateLayer, "create layers")?;
            let c_srs = options
                .srs
                .map_or(ptr::null_mut(), |srs| unsafe { srs.to_c_hsrs() });
            let c_layer = unsafe {
                gdal_sys::GDALDatasetCreateLayer(
                    scope.c_dataset(),
                    c_name.as_ptr(),
                    c_srs,
                    options.ty,
                    c_options.as_ptr(),
                )
            };
            if c_layer.is_null() {
                return Err(_last_null_pointer_err("GDALDatasetCreateLayer"));
            }
            log::debug!("created layer '{}'", options.name);
            Ok(Layer::adopt(&self.dataset, scope, c_layer))
        })
    }

    pub fn create_async(
        &self,
        name: String,
        srs: Option<SpatialRef>,
        ty: OGRwkbGeometryType::Type,
    ) -> Pending<Layer> {
        work::spawn_guarded(self, move |this| {
            this.create(LayerOptions {
                name: &name,
                srs: srs.as_ref(),
                ty,
                options: &[],
            })
        })
    }

    /// Copies `source`, which may belong to another dataset, into a new layer `name`.
    pub fn copy(&self, source: &Layer, name: &str, options: &[&str]) -> Result<Layer> {
        let c_name = CString::new(name)?;
        let c_options = CslStringList::try_from(options)?;
        let copy = |scope: &mut Scope, c_source: OGRLayerH| {
            require_dataset(scope, DatasetCapability::CreateLayer, "create layers")?;
            let c_layer = unsafe {
                gdal_sys::GDALDatasetCopyLayer(
                    scope.c_dataset(),
                    c_source,
                    c_name.as_ptr(),
                    c_options.as_ptr(),
                )
            };
            if c_layer.is_null() {
                return Err(_last_null_pointer_err("GDALDatasetCopyLayer"));
            }
            Ok(Layer::adopt(&self.dataset, scope, c_layer))
        };
        if Arc::ptr_eq(source.dataset().core(), self.dataset.core()) {
            source.with_scope(copy)
        } else {
            let c_source = source.c_layer;
            source.dataset().core().with_child_and(
                &source.live,
                self.dataset.core(),
                |_, scope| copy(scope, c_source),
            )
        }
    }

    pub fn copy_async(&self, source: &Layer, name: &str, options: Vec<String>) -> Pending<Layer> {
        let (source, name) = (source.clone(), name.to_owned());
        work::spawn_guarded(self, move |this| {
            let options: Vec<&str> = options.iter().map(String::as_str).collect();
            this.copy(&source, &name, &options)
        })
    }

    /// Deletes the layer at `index`. Every handle to it becomes unusable.
    pub fn remove(&self, index: usize) -> Result<()> {
        self.dataset.core().with(|scope| {
            require_dataset(scope, DatasetCapability::DeleteLayer, "delete layers")?;
            let count = unsafe { gdal_sys::GDALDatasetGetLayerCount(scope.c_dataset()) };
            if index >= count as usize {
                return Err(GdalError::OutOfRange(format!(
                    "layer {index} does not exist, the dataset has {count} layers"
                )));
            }
            let c_layer = unsafe { gdal_sys::GDALDatasetGetLayer(scope.c_dataset(), index as c_int) };
            let rv = unsafe { gdal_sys::GDALDatasetDeleteLayer(scope.c_dataset(), index as c_int) };
            _ogr_result(rv, "GDALDatasetDeleteLayer")?;
            scope.invalidate_layer(c_layer);
            Ok(())
        })
    }

    pub fn remove_async(&self, index: usize) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.remove(index))
    }

    pub fn iter(&self) -> DatasetLayersIter {
        DatasetLayersIter {
            layers: self.clone(),
            next: 0,
            count: None,
        }
    }

    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(Layer) -> Result<()>,
    {
        for layer in self.iter() {
            f(layer?)?;
        }
        Ok(())
    }

    pub fn map<R, F>(&self, mut f: F) -> Result<Vec<R>>
    where
        F: FnMut(Layer) -> Result<R>,
    {
        self.iter().map(|layer| f(layer?)).collect()
    }
}

impl Guarded for DatasetLayers {
    fn liveness(&self) -> &Liveness {
        self.dataset.liveness()
    }
}

pub struct DatasetLayersIter {
    layers: DatasetLayers,
    next: usize,
    count: Option<usize>,
}

impl Iterator for DatasetLayersIter {
    type Item = Result<Layer>;

    fn next(&mut self) -> Option<Self::Item> {
        let count = match self.count {
            Some(count) => count,
            None => match self.layers.count() {
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
        let layer = self.layers.get(self.next);
        self.next += 1;
        Some(layer)
    }
}
