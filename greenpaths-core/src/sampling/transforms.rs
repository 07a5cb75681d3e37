//! Named per-feature transforms applied to vector sources before rasterization

use geo::{ConvexHull, MultiPolygon};
use hashbrown::HashMap;

use super::VectorFeature;
use crate::Error;

/// Pure per-row transform. Returning `None` drops the feature.
pub type FeatureTransform = fn(VectorFeature) -> Option<VectorFeature>;

/// Explicit name to function mapping used by data source configurations
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, FeatureTransform>,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("positive_only", positive_only);
        registry.register("convex_hull", convex_hull);
        registry.register("percent_to_fraction", percent_to_fraction);
        registry
    }
}

impl TransformRegistry {
    /// Registry without the built-in transforms
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Adds or replaces a transform
    pub fn register(&mut self, name: &str, transform: FeatureTransform) {
        self.transforms.insert(name.to_string(), transform);
    }

    /// # Errors
    ///
    /// Returns [`Error::UnknownTransform`] if no transform is registered under `name`.
    pub fn get(&self, name: &str) -> Result<FeatureTransform, Error> {
        self.transforms
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownTransform(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transforms.keys().map(String::as_str)
    }
}

fn positive_only(feature: VectorFeature) -> Option<VectorFeature> {
    (feature.value > 0.0).then_some(feature)
}

fn convex_hull(feature: VectorFeature) -> Option<VectorFeature> {
    let hull = feature.geometry.convex_hull();
    Some(VectorFeature {
        geometry: MultiPolygon::new(vec![hull]),
        value: feature.value,
    })
}

fn percent_to_fraction(feature: VectorFeature) -> Option<VectorFeature> {
    Some(VectorFeature {
        value: feature.value / 100.0,
        ..feature
    })
}

#[cfg(test)]
mod tests {
    use geo::{Area, polygon};

    use super::*;

    fn feature(value: f64) -> VectorFeature {
        VectorFeature {
            geometry: MultiPolygon::new(vec![
                polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
                polygon![(x: 3.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 1.0), (x: 3.0, y: 1.0)],
            ]),
            value,
        }
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = TransformRegistry::default();
        let mut names: Vec<&str> = registry.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["convex_hull", "percent_to_fraction", "positive_only"]);
    }

    #[test]
    fn test_unknown_transform() {
        let registry = TransformRegistry::default();
        assert!(matches!(
            registry.get("buffer_everything"),
            Err(Error::UnknownTransform(name)) if name == "buffer_everything"
        ));
    }

    #[test]
    fn test_builtin_behaviour() {
        let registry = TransformRegistry::default();

        let positive_only = registry.get("positive_only").unwrap();
        assert!(positive_only(feature(0.0)).is_none());
        assert!(positive_only(feature(2.0)).is_some());

        let percent = registry.get("percent_to_fraction").unwrap();
        assert_eq!(percent(feature(45.0)).unwrap().value, 0.45);

        let hull = registry.get("convex_hull").unwrap();
        let hulled = hull(feature(1.0)).unwrap();
        assert_eq!(hulled.geometry.0.len(), 1);
        assert!((hulled.geometry.unsigned_area() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_registration() {
        fn double(feature: VectorFeature) -> Option<VectorFeature> {
            Some(VectorFeature {
                value: feature.value * 2.0,
                ..feature
            })
        }

        let mut registry = TransformRegistry::empty();
        assert!(registry.get("positive_only").is_err());
        registry.register("double", double);
        assert_eq!(registry.get("double").unwrap()(feature(1.5)).unwrap().value, 3.0);
    }
}
