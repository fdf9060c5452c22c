//! Project files bundling field boundaries, an application plan and
//! machine settings.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::boundary::boundary_of;
use crate::error::{Result, VectorError};
use crate::geojson::FeatureCollection;

/// Spreader settings stored with a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Spreading width in metres.
    pub throwing_range: f64,
    /// Minimum driving speed in m/s.
    pub min_speed: f64,
    /// Rate applied outside planned zones.
    pub default_rate: f64,
    /// Driving speed in m/s.
    pub default_speed: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            throwing_range: 15.0,
            min_speed: 1.0,
            default_rate: 0.0,
            default_speed: 2.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default)]
    pub boundaries: Option<FeatureCollection>,
    #[serde(default)]
    pub plan: Option<FeatureCollection>,
    #[serde(default)]
    pub settings: Settings,
}

impl ProjectFile {
    pub fn from_plan(plan: FeatureCollection) -> Self {
        Self {
            plan: Some(plan),
            ..Default::default()
        }
    }

    /// Fill in missing boundaries from the union of the plan polygons.
    /// Existing boundaries are left as they are.
    pub fn complete(mut self) -> Result<Self> {
        if self.boundaries.is_none() {
            let plan = self
                .plan
                .as_ref()
                .ok_or(VectorError::MissingBoundariesAndPlan)?;
            let boundaries = boundary_of(plan)?;
            info!(
                plan_features = plan.len(),
                "Derived project boundaries from plan"
            );
            self.boundaries = Some(boundaries);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::{Feature, Geometry};

    #[test]
    fn test_settings_defaults() {
        let project: ProjectFile = serde_json::from_str("{}").unwrap();
        assert_eq!(project.settings, Settings::default());
        assert_eq!(project.settings.throwing_range, 15.0);
        assert_eq!(project.settings.default_speed, 2.2);

        let partial: Settings = serde_json::from_str(r#"{"min_speed": 3}"#).unwrap();
        assert_eq!(partial.min_speed, 3.0);
        assert_eq!(partial.throwing_range, 15.0);
    }

    #[test]
    fn test_complete_derives_boundaries() {
        let plan = FeatureCollection::new(vec![
            Feature::new(Geometry::polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]))
                .with_property("RATE", 100.0),
            Feature::new(Geometry::polygon(&[(1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0)]))
                .with_property("RATE", 150.0),
        ]);
        let project = ProjectFile::from_plan(plan).complete().unwrap();
        let boundaries = project.boundaries.unwrap();
        assert_eq!(boundaries.len(), 1);
        assert_eq!(
            boundaries.bounding_box(),
            Some(geo_common::BoundingBox::new(0.0, 0.0, 2.0, 1.0))
        );
    }

    #[test]
    fn test_complete_keeps_existing_boundaries() {
        let existing = FeatureCollection::new(vec![Feature::new(Geometry::point(5.0, 5.0))]);
        let project = ProjectFile {
            boundaries: Some(existing.clone()),
            ..Default::default()
        };
        assert_eq!(project.complete().unwrap().boundaries, Some(existing));
    }

    #[test]
    fn test_complete_without_inputs() {
        assert!(matches!(
            ProjectFile::default().complete(),
            Err(VectorError::MissingBoundariesAndPlan)
        ));
    }
}
