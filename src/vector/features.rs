use gdal_sys::{self, OGRErr, OGRLayerH};

use crate::errors::*;
use crate::handle::{Guarded, Liveness, Scope};
use crate::utils::{_last_error_msg, _ogr_result};
use crate::vector::{Feature, Layer, LayerCapability};
use crate::work::{self, Pending};

/// The features of a [`Layer`], addressed by their feature ID.
///
/// [`LayerFeatures::next`] and [`LayerFeatures::iter`] continue from the layer's
/// current read position; only [`LayerFeatures::first`] rewinds it.
#[derive(Clone, Debug)]
pub struct LayerFeatures {
    layer: Layer,
}

impl LayerFeatures {
    pub(crate) fn new(layer: Layer) -> Self {
        Self { layer }
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    /// The number of features matching the current filters.
    ///
    /// Some drivers have to scan the whole layer to answer.
    pub fn count(&self) -> Result<usize> {
        self.layer.with(|c_layer| {
            let count = unsafe { gdal_sys::OGR_L_GetFeatureCount(c_layer, 1) };
            if count < 0 {
                return Err(GdalError::Unsupported(format!(
                    "feature count is not available: {}",
                    _last_error_msg()
                )));
            }
            Ok(count as usize)
        })
    }

    pub fn count_async(&self) -> Pending<usize> {
        work::spawn_guarded(self, |this| this.count())
    }

    /// The feature with ID `fid`.
    pub fn get(&self, fid: u64) -> Result<Feature> {
        self.layer.with_scope(|scope, c_layer| {
            let c_feature = unsafe { gdal_sys::OGR_L_GetFeature(c_layer, fid as i64) };
            if c_feature.is_null() {
                unsafe { gdal_sys::CPLErrorReset() };
                return Err(GdalError::NotFound(format!("feature {fid} does not exist")));
            }
            Ok(Feature::adopt(self.layer.dataset(), scope, c_feature))
        })
    }

    pub fn get_async(&self, fid: u64) -> Pending<Feature> {
        work::spawn_guarded(self, move |this| this.get(fid))
    }

    fn read_next(&self, scope: &mut Scope, c_layer: OGRLayerH) -> Option<Feature> {
        let c_feature = unsafe { gdal_sys::OGR_L_GetNextFeature(c_layer) };
        (!c_feature.is_null()).then(|| Feature::adopt(self.layer.dataset(), scope, c_feature))
    }

    /// The next feature, or `None` once the layer is exhausted.
    pub fn next(&self) -> Result<Option<Feature>> {
        self.layer
            .with_scope(|scope, c_layer| Ok(self.read_next(scope, c_layer)))
    }

    pub fn next_async(&self) -> Pending<Option<Feature>> {
        work::spawn_guarded(self, |this| this.next())
    }

    /// Rewinds the layer and returns its first feature.
    pub fn first(&self) -> Result<Option<Feature>> {
        self.layer.with_scope(|scope, c_layer| {
            unsafe { gdal_sys::OGR_L_ResetReading(c_layer) };
            Ok(self.read_next(scope, c_layer))
        })
    }

    pub fn first_async(&self) -> Pending<Option<Feature>> {
        work::spawn_guarded(self, |this| this.first())
    }

    /// Iterates from the current read position, without rewinding.
    pub fn iter(&self) -> LayerFeaturesIter {
        LayerFeaturesIter {
            features: self.clone(),
            rewind: false,
            done: false,
        }
    }

    /// Calls `f` for every feature, starting from the first one.
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(Feature) -> Result<()>,
    {
        let iter = LayerFeaturesIter {
            features: self.clone(),
            rewind: true,
            done: false,
        };
        for feature in iter {
            f(feature?)?;
        }
        Ok(())
    }

    pub fn map<R, F>(&self, mut f: F) -> Result<Vec<R>>
    where
        F: FnMut(Feature) -> Result<R>,
    {
        let iter = LayerFeaturesIter {
            features: self.clone(),
            rewind: true,
            done: false,
        };
        iter.map(|feature| f(feature?)).collect()
    }

    /// Writes `feature` as a new feature of the layer; its ID is updated.
    pub fn add(&self, feature: &mut Feature) -> Result<()> {
        self.layer.with(|c_layer| {
            LayerCapability::SequentialWrite.require(c_layer, "create features")?;
            let c_feature = feature.c_feature_checked()?;
            let rv = unsafe { gdal_sys::OGR_L_CreateFeature(c_layer, c_feature) };
            _ogr_result(rv, "OGR_L_CreateFeature")
        })
    }

    /// Like [`LayerFeatures::add`], handing the written feature back.
    pub fn add_async(&self, mut feature: Feature) -> Pending<Feature> {
        work::spawn_guarded(self, move |this| {
            this.add(&mut feature)?;
            Ok(feature)
        })
    }

    /// Replaces the stored feature that has the same ID as `feature`.
    pub fn set(&self, feature: &Feature) -> Result<()> {
        self.layer.with(|c_layer| {
            LayerCapability::RandomWrite.require(c_layer, "rewrite features")?;
            let c_feature = feature.c_feature_checked()?;
            let rv = unsafe { gdal_sys::OGR_L_SetFeature(c_layer, c_feature) };
            if rv == OGRErr::OGRERR_NON_EXISTING_FEATURE {
                let fid = unsafe { gdal_sys::OGR_F_GetFID(c_feature) };
                return Err(GdalError::NotFound(format!("feature {fid} does not exist")));
            }
            _ogr_result(rv, "OGR_L_SetFeature")
        })
    }

    /// Stores `feature` under ID `fid`, replacing the feature there.
    pub fn set_at(&self, fid: u64, feature: &mut Feature) -> Result<()> {
        self.layer.with(|c_layer| {
            LayerCapability::RandomWrite.require(c_layer, "rewrite features")
        })?;
        feature.set_fid(Some(fid))?;
        self.set(feature)
    }

    pub fn set_async(&self, feature: Feature) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.set(&feature))
    }

    /// Deletes the feature with ID `fid`.
    pub fn remove(&self, fid: u64) -> Result<()> {
        self.layer.with(|c_layer| {
            LayerCapability::DeleteFeature.require(c_layer, "delete features")?;
            let rv = unsafe { gdal_sys::OGR_L_DeleteFeature(c_layer, fid as i64) };
            if rv == OGRErr::OGRERR_NON_EXISTING_FEATURE {
                return Err(GdalError::NotFound(format!("feature {fid} does not exist")));
            }
            _ogr_result(rv, "OGR_L_DeleteFeature")
        })
    }

    pub fn remove_async(&self, fid: u64) -> Pending<()> {
        work::spawn_guarded(self, move |this| this.remove(fid))
    }
}

impl Guarded for LayerFeatures {
    fn liveness(&self) -> &Liveness {
        self.layer.live()
    }
}

pub struct LayerFeaturesIter {
    features: LayerFeatures,
    rewind: bool,
    done: bool,
}

impl Iterator for LayerFeaturesIter {
    type Item = Result<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let feature = if std::mem::take(&mut self.rewind) {
            self.features.first()
        } else {
            self.features.next()
        };
        match feature {
            Ok(Some(feature)) => Some(Ok(feature)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
