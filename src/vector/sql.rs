use std::ffi::{CStr, CString};
use std::ptr;

use gdal_sys::CPLErr;

use crate::errors::*;
use crate::utils::_last_error_msg;
use crate::vector::{Geometry, Layer};
use crate::work::{self, Pending};
use crate::Dataset;

/// Represents valid SQL dialects to use in SQL queries. See
/// <https://gdal.org/user/ogr_sql_sqlite_dialect.html>
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// Use the default dialect. This is OGR SQL unless the underlying driver has a native dialect,
    /// such as MySQL, Postgres, Oracle, etc.
    #[default]
    DEFAULT,

    /// Explicitly choose OGR SQL regardless of if the underlying driver has a native dialect.
    OGR,

    /// SQLite dialect. If the data set is not actually a SQLite database, then a virtual SQLite
    /// table is created to execute the query.
    SQLITE,
}

impl Dialect {
    fn as_c_str(&self) -> Option<&'static CStr> {
        match self {
            Dialect::DEFAULT => None,
            Dialect::OGR => Some(c"OGRSQL"),
            Dialect::SQLITE => Some(c"SQLITE"),
        }
    }
}

/// [Dataset] methods relating to SQL over vector datasets.
impl Dataset {
    /// Execute a SQL query against the Dataset.
    ///
    /// A query that produces rows returns a result-set [`Layer`]; it is released when
    /// its last clone is dropped or the dataset is closed. Statements such as
    /// `ALTER TABLE` or `CREATE INDEX` have no result set and return `None`, which is
    /// distinct from an empty result set. A malformed query fails with
    /// [`GdalError::ParseError`].
    ///
    /// # Arguments
    /// * `query`: The SQL query
    /// * `spatial_filter`: Limit results of the query to features that intersect the given
    ///   [`Geometry`]
    /// * `dialect`: The dialect of SQL to use. See
    ///   <https://gdal.org/user/ogr_sql_sqlite_dialect.html>
    ///
    /// # Example
    ///
    /// ```rust, no_run
    /// use gdal_async::Dataset;
    /// use gdal_async::vector::Dialect;
    ///
    /// # fn main() -> gdal_async::errors::Result<()> {
    /// let ds = Dataset::open("fixtures/roads.geojson")?;
    /// let query = "SELECT kind, is_bridge, highway FROM roads WHERE highway = 'pedestrian'";
    /// if let Some(result_set) = ds.execute_sql(query, None, Dialect::DEFAULT)? {
    ///     println!("{} rows", result_set.features().count()?);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn execute_sql(
        &self,
        query: &str,
        spatial_filter: Option<&Geometry>,
        dialect: Dialect,
    ) -> Result<Option<Layer>> {
        let c_query = CString::new(query)?;
        let c_filter = spatial_filter.map_or(ptr::null_mut(), |geom| unsafe { geom.c_geometry() });
        let c_dialect = dialect.as_c_str().map_or(ptr::null(), CStr::as_ptr);

        self.core().with(|scope| {
            unsafe { gdal_sys::CPLErrorReset() };
            let c_layer = unsafe {
                gdal_sys::GDALDatasetExecuteSQL(scope.c_dataset(), c_query.as_ptr(), c_filter, c_dialect)
            };
            if c_layer.is_null() {
                let err = unsafe { gdal_sys::CPLGetLastErrorType() };
                if err == CPLErr::CE_Failure || err == CPLErr::CE_Fatal {
                    let msg = _last_error_msg();
                    unsafe { gdal_sys::CPLErrorReset() };
                    return Err(GdalError::ParseError(format!("cannot execute '{query}': {msg}")));
                }
                return Ok(None);
            }
            log::trace!("SQL result set opened for '{query}'");
            Ok(Some(Layer::adopt_result_set(self, scope, c_layer)))
        })
    }

    pub fn execute_sql_async(
        &self,
        query: String,
        spatial_filter: Option<Geometry>,
        dialect: Dialect,
    ) -> Pending<Option<Layer>> {
        work::spawn_guarded(self, move |this| {
            this.execute_sql(&query, spatial_filter.as_ref(), dialect)
        })
    }
}
