//! Endpoint registry, loaded from embedded TOML definitions.
//!
//! Each `.toml` file in `packages/source/endpoints/` describes one KoROAD
//! dataset endpoint and is baked into the binary via [`include_str!`].

use safewalk_accident_models::DatasetType;
use serde::Deserialize;

use crate::SourceError;

/// TOML definitions embedded at compile time.
const ENDPOINT_TOMLS: &[(&str, &str)] = &[
    ("pedestrian", include_str!("../endpoints/pedestrian.toml")),
    (
        "elderly_pedestrian",
        include_str!("../endpoints/elderly_pedestrian.toml"),
    ),
    (
        "local_government",
        include_str!("../endpoints/local_government.toml"),
    ),
    ("holiday", include_str!("../endpoints/holiday.toml")),
    (
        "accident_statistics",
        include_str!("../endpoints/accident_statistics.toml"),
    ),
    (
        "link_risk_area",
        include_str!("../endpoints/link_risk_area.toml"),
    ),
];

/// One dataset endpoint of the KoROAD REST API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EndpointDefinition {
    /// Short identifier, matching the TOML file name.
    pub id: String,
    /// Dataset served by this endpoint.
    pub dataset: DatasetType,
    /// Published dataset name.
    pub name: String,
    /// Path relative to the API base URL, with a leading slash.
    pub path: String,
    #[serde(default)]
    pub description: String,
}

impl EndpointDefinition {
    /// Full request URL under `base_url`.
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path)
    }
}

/// Parses a single endpoint definition.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the TOML is malformed or the path does
/// not start with `/`.
pub fn parse_endpoint_toml(toml_str: &str) -> Result<EndpointDefinition, SourceError> {
    let def: EndpointDefinition = toml::from_str(toml_str).map_err(|e| SourceError::Config {
        message: e.to_string(),
    })?;
    if !def.path.starts_with('/') {
        return Err(SourceError::Config {
            message: format!("{}: path must start with '/', got {:?}", def.id, def.path),
        });
    }
    Ok(def)
}

/// Returns every configured endpoint.
///
/// # Errors
///
/// Returns [`SourceError::Config`] naming the first malformed definition.
pub fn all_endpoints() -> Result<Vec<EndpointDefinition>, SourceError> {
    ENDPOINT_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_endpoint_toml(toml).map_err(|e| SourceError::Config {
                message: format!("Failed to parse {name}.toml: {e}"),
            })
        })
        .collect()
}

/// Looks up the endpoint serving `dataset`.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if the registry fails to load or has no
/// entry for `dataset`.
pub fn endpoint_for(dataset: DatasetType) -> Result<EndpointDefinition, SourceError> {
    all_endpoints()?
        .into_iter()
        .find(|e| e.dataset == dataset)
        .ok_or_else(|| SourceError::Config {
            message: format!("no endpoint configured for {dataset}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_all_endpoints() {
        let endpoints = all_endpoints().unwrap();
        assert_eq!(endpoints.len(), DatasetType::all().len());
    }

    #[test]
    fn every_dataset_has_exactly_one_endpoint() {
        let endpoints = all_endpoints().unwrap();
        for dataset in DatasetType::all() {
            let n = endpoints.iter().filter(|e| e.dataset == *dataset).count();
            assert_eq!(n, 1, "{dataset}");
        }
    }

    #[test]
    fn endpoint_paths() {
        let path = |d| endpoint_for(d).unwrap().path;
        assert_eq!(path(DatasetType::Pedestrian), "/frequentzone/pedstrians");
        assert_eq!(path(DatasetType::ElderlyPedestrian), "/frequentzone/oldman");
        assert_eq!(path(DatasetType::LocalGovernment), "/frequentzone/lg");
        assert_eq!(path(DatasetType::Holiday), "/frequentzone/tmzon");
        assert_eq!(path(DatasetType::AccidentStatistics), "/stt");
        assert_eq!(path(DatasetType::LinkRiskArea), "/accident/riskArea");
    }

    #[test]
    fn url_joins_without_double_slash() {
        let def = endpoint_for(DatasetType::AccidentStatistics).unwrap();
        assert_eq!(
            def.url("https://opendata.koroad.or.kr/data/rest/"),
            "https://opendata.koroad.or.kr/data/rest/stt"
        );
    }

    #[test]
    fn rejects_relative_path() {
        let err = parse_endpoint_toml(
            "id = \"x\"\ndataset = \"HOLIDAY\"\nname = \"x\"\npath = \"tmzon\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Config { .. }));
    }
}
