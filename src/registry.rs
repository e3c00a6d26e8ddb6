use crate::series::{ContinuousSeries, ReferenceSeries};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("Site {0} appears more than once in the sensor data")]
    DuplicateContinuous(String),
}

// A monitoring location: its sensor history and optional manual gaugings
#[derive(Debug, Clone)]
pub struct Site {
    pub id: String,
    pub continuous: ContinuousSeries,
    pub reference: Option<ReferenceSeries>,
}

// Sites keyed by identifier, matched by exact string equality
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    pub sites: BTreeMap<String, Site>,
    /// Manual measurement columns whose site has no sensor sheet.
    pub unmatched_reference: Vec<String>,
    /// Sites named by more than one manual measurement group. Their groups
    /// are pooled into a single series.
    pub duplicate_reference: Vec<String>,
}

impl SiteRegistry {
    pub fn build(
        continuous: Vec<ContinuousSeries>,
        reference: Vec<ReferenceSeries>,
    ) -> Result<Self, RegistryError> {
        let mut sites = BTreeMap::new();
        for series in continuous {
            let id = series.site.clone();
            if sites.contains_key(&id) {
                return Err(RegistryError::DuplicateContinuous(id));
            }
            sites.insert(
                id.clone(),
                Site {
                    id,
                    continuous: series,
                    reference: None,
                },
            );
        }

        let mut unmatched_reference = Vec::new();
        let mut duplicate_reference = Vec::new();
        for series in reference {
            match sites.get_mut(&series.site) {
                Some(Site {
                    reference: Some(existing),
                    ..
                }) => {
                    warn!(
                        "{}: repeated manual measurement group, pooling {} more samples",
                        series.site,
                        series.samples.len()
                    );
                    existing.samples.extend(series.samples);
                    if !duplicate_reference.contains(&series.site) {
                        duplicate_reference.push(series.site);
                    }
                }
                Some(site) => {
                    debug!(
                        "Matched {} manual measurements to site {}",
                        series.samples.len(),
                        site.id
                    );
                    site.reference = Some(series);
                }
                None => {
                    warn!(
                        "Manual measurements for {} have no matching sensor data",
                        series.site
                    );
                    unmatched_reference.push(series.site);
                }
            }
        }

        let registry = SiteRegistry {
            sites,
            unmatched_reference,
            duplicate_reference,
        };
        info!(
            "Site registry built with {} sites ({} with manual measurements)",
            registry.sites.len(),
            registry.sites.len() - registry.sites_without_reference().len()
        );
        Ok(registry)
    }

    /// Sites with no manual measurements at all.
    pub fn sites_without_reference(&self) -> Vec<String> {
        self.sites
            .values()
            .filter(|s| s.reference.as_ref().is_none_or(ReferenceSeries::is_empty))
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
