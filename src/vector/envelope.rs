use gdal_sys::{OGREnvelope, OGREnvelope3D};

/// An axis aligned bounding box.
///
/// An empty envelope has `min > max` on both axes; merging anything into it
/// replaces it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Envelope {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Envelope {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn empty() -> Self {
        Envelope {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    pub fn merge(&mut self, other: &Envelope) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub fn merge_point(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    /// Whether the two boxes share at least one point, edges included.
    pub fn intersects(&self, other: &Envelope) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Shrinks this envelope to the area it shares with `other`, or makes it
    /// empty if they are disjoint.
    pub fn intersect(&mut self, other: &Envelope) {
        if !self.intersects(other) {
            *self = Envelope::empty();
            return;
        }
        self.min_x = self.min_x.max(other.min_x);
        self.max_x = self.max_x.min(other.max_x);
        self.min_y = self.min_y.max(other.min_y);
        self.max_y = self.max_y.min(other.max_y);
    }

    pub fn contains(&self, other: &Envelope) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min_x <= other.min_x
            && self.max_x >= other.max_x
            && self.min_y <= other.min_y
            && self.max_y >= other.max_y
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope::empty()
    }
}

impl From<OGREnvelope> for Envelope {
    fn from(e: OGREnvelope) -> Self {
        Envelope::new(e.MinX, e.MaxX, e.MinY, e.MaxY)
    }
}

impl From<Envelope> for OGREnvelope {
    fn from(e: Envelope) -> Self {
        OGREnvelope {
            MinX: e.min_x,
            MaxX: e.max_x,
            MinY: e.min_y,
            MaxY: e.max_y,
        }
    }
}

/// An [`Envelope`] with a z range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope3D {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl Envelope3D {
    pub fn empty() -> Self {
        Envelope3D {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
            min_z: f64::INFINITY,
            max_z: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y || self.min_z > self.max_z
    }

    pub fn merge(&mut self, other: &Envelope3D) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
        self.min_z = self.min_z.min(other.min_z);
        self.max_z = self.max_z.max(other.max_z);
    }

    pub fn intersects(&self, other: &Envelope3D) -> bool {
        self.to_2d().intersects(&other.to_2d())
            && self.min_z <= other.max_z
            && self.max_z >= other.min_z
    }

    pub fn intersect(&mut self, other: &Envelope3D) {
        if !self.intersects(other) {
            *self = Envelope3D::empty();
            return;
        }
        self.min_x = self.min_x.max(other.min_x);
        self.max_x = self.max_x.min(other.max_x);
        self.min_y = self.min_y.max(other.min_y);
        self.max_y = self.max_y.min(other.max_y);
        self.min_z = self.min_z.max(other.min_z);
        self.max_z = self.max_z.min(other.max_z);
    }

    pub fn contains(&self, other: &Envelope3D) -> bool {
        self.to_2d().contains(&other.to_2d())
            && self.min_z <= other.min_z
            && self.max_z >= other.max_z
    }

    /// Drops the z range.
    pub fn to_2d(&self) -> Envelope {
        Envelope::new(self.min_x, self.max_x, self.min_y, self.max_y)
    }
}

impl From<OGREnvelope3D> for Envelope3D {
    fn from(e: OGREnvelope3D) -> Self {
        Envelope3D {
            min_x: e.MinX,
            max_x: e.MaxX,
            min_y: e.MinY,
            max_y: e.MaxY,
            min_z: e.MinZ,
            max_z: e.MaxZ,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_envelope() {
        let mut e = Envelope::empty();
        assert!(e.is_empty());
        assert_eq!(e.width(), 0.0);
        e.merge(&Envelope::new(1.0, 2.0, 3.0, 5.0));
        assert_eq!(e, Envelope::new(1.0, 2.0, 3.0, 5.0));
        assert!(!Envelope::empty().intersects(&e));
    }

    #[test]
    fn test_envelope_relations() {
        let outer = Envelope::new(0.0, 10.0, 0.0, 10.0);
        let inner = Envelope::new(2.0, 3.0, 2.0, 3.0);
        let touching = Envelope::new(10.0, 12.0, 5.0, 6.0);
        let apart = Envelope::new(11.0, 12.0, 5.0, 6.0);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.intersects(&touching));
        assert!(!outer.intersects(&apart));
    }

    #[test]
    fn test_envelope_3d() {
        let mut e = Envelope3D::empty();
        e.merge(&Envelope3D {
            min_x: 0.0,
            max_x: 1.0,
            min_y: 0.0,
            max_y: 1.0,
            min_z: -5.0,
            max_z: 5.0,
        });
        assert!(!e.is_empty());
        assert_eq!(e.to_2d(), Envelope::new(0.0, 1.0, 0.0, 1.0));
        let flat = Envelope3D { min_z: 6.0, max_z: 7.0, ..e };
        assert!(!e.intersects(&flat));
    }

    #[test]
    fn test_intersect() {
        let mut e = Envelope::new(-10.0, 10.0, -10.0, 10.0);
        e.intersect(&Envelope::new(-2.0, 12.0, -1.0, 1.0));
        assert_eq!(e, Envelope::new(-2.0, 10.0, -1.0, 1.0));

        e.intersect(&Envelope::new(20.0, 30.0, 20.0, 30.0));
        assert!(e.is_empty());
        assert_eq!(e.width(), 0.0);

        let mut e = Envelope::empty();
        e.intersect(&Envelope::new(0.0, 1.0, 0.0, 1.0));
        assert!(e.is_empty());
    }

    #[test]
    fn test_intersect_3d() {
        let mut a = Envelope3D {
            min_x: -10.0,
            max_x: 10.0,
            min_y: -10.0,
            max_y: 10.0,
            min_z: -10.0,
            max_z: 10.0,
        };
        let b = Envelope3D {
            min_x: -2.0,
            max_x: 12.0,
            min_y: -1.0,
            max_y: 1.0,
            min_z: -2.0,
            max_z: 2.0,
        };
        a.intersect(&b);
        assert_eq!(a, Envelope3D { max_x: 10.0, ..b });

        let above = Envelope3D { min_z: 5.0, max_z: 6.0, ..b };
        a.intersect(&above);
        assert!(a.is_empty());
    }
}
