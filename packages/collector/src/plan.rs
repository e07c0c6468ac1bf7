//! The region × year task matrix.

use safewalk_accident_models::{DatasetType, RegionCode};

/// One unit of work: a dataset for one region and year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTask {
    pub dataset: DatasetType,
    pub region: RegionCode,
    pub year: String,
}

/// Regions, years and page size shared by every dataset collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPlan {
    pub regions: Vec<RegionCode>,
    pub years: Vec<String>,
    /// `numOfRows` requested per task.
    pub page_size: u32,
}

impl CollectionPlan {
    /// Number of tasks per dataset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len() * self.years.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks for `dataset`, region-major then year.
    pub fn tasks(&self, dataset: DatasetType) -> impl Iterator<Item = CollectionTask> + '_ {
        self.regions.iter().flat_map(move |region| {
            self.years.iter().map(move |year| CollectionTask {
                dataset,
                region: region.clone(),
                year: year.clone(),
            })
        })
    }
}
