//! Object catalog
//!
//! The catalog is the fixed pool of stimuli trials are sampled from. It is
//! loaded once, validated, and shared read-only by every session created
//! from it.

use std::collections::HashSet;

use garde::Validate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    catalog,
    trial::{DISTRACTOR_COUNT, OBJECTS_PER_TRIAL},
};

use super::context::ContextType;

/// A single catalog entry
///
/// Objects are labelled at three taxonomic levels. The sub-level label
/// (`subID`) doubles as the object's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct Object {
    /// Sub-ordinate label, unique across the catalog
    #[serde(rename = "subID")]
    #[garde(length(min = 1, max = catalog::MAX_LABEL_LENGTH))]
    pub sub_id: String,
    /// Basic-level category
    #[garde(length(min = 1, max = catalog::MAX_LABEL_LENGTH))]
    pub basic: String,
    /// Super-ordinate category
    #[serde(rename = "super")]
    #[garde(length(min = 1, max = catalog::MAX_LABEL_LENGTH))]
    pub super_category: String,
    /// Where clients load the image from
    #[garde(length(max = catalog::MAX_URL_LENGTH))]
    pub url: String,
    /// Intrinsic image width in pixels
    #[serde(default)]
    #[garde(skip)]
    pub width: u32,
    /// Intrinsic image height in pixels
    #[serde(default)]
    #[garde(skip)]
    pub height: u32,
}

impl Object {
    /// The object's identifier
    pub fn id(&self) -> &str {
        &self.sub_id
    }

    /// The object's label at the taxonomic level a context discriminates on
    pub fn label(&self, level: ContextType) -> &str {
        match level {
            ContextType::Sub => &self.sub_id,
            ContextType::Basic => &self.basic,
            ContextType::Super => &self.super_category,
        }
    }
}

/// Errors that can occur when loading a catalog
#[derive(Error, Debug)]
pub enum Error {
    /// The catalog source is not valid JSON for a list of objects
    #[error("catalog is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
    /// The catalog parsed but breaks one of its invariants
    #[error("invalid catalog: {0}")]
    Invalid(#[from] garde::Report),
}

/// Validates that no two objects share an identifier
fn validate_unique_ids(objects: &[Object]) -> garde::Result {
    let mut seen = HashSet::new();
    match objects.iter().find(|o| !seen.insert(o.id())) {
        Some(duplicate) => Err(garde::Error::new(format!(
            "duplicate object identifier {}",
            duplicate.id()
        ))),
        None => Ok(()),
    }
}

/// The validated pool of objects a session samples from
///
/// Deserializing goes through [`Catalog::new`], so a catalog obtained from
/// serde has passed the same checks.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(try_from = "Vec<Object>", into = "Vec<Object>")]
pub struct Catalog {
    #[garde(
        length(min = OBJECTS_PER_TRIAL),
        custom(|v, _| validate_unique_ids(v)),
        dive
    )]
    objects: Vec<Object>,
}

impl Catalog {
    /// Builds a catalog from a list of objects
    ///
    /// # Errors
    ///
    /// Returns `Error::Invalid` if there are fewer objects than a trial
    /// needs, identifiers repeat, or a label is empty.
    pub fn new(objects: Vec<Object>) -> Result<Self, Error> {
        let catalog = Self { objects };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parses and validates a catalog from a JSON array of objects
    ///
    /// # Errors
    ///
    /// Returns `Error::Parse` for malformed JSON and `Error::Invalid` if
    /// the parsed catalog breaks an invariant.
    pub fn from_json(source: &str) -> Result<Self, Error> {
        Self::new(serde_json::from_str(source)?)
    }

    /// All objects in catalog order
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Objects that can be the target of a trial under `context`
    ///
    /// A target qualifies when at least three objects differ from it at the
    /// context's level and, for sub and basic contexts, one of those shares
    /// its category at the next coarser level.
    pub fn targets(&self, context: ContextType) -> Vec<&Object> {
        self.objects
            .iter()
            .filter(|target| {
                let pool = self
                    .objects
                    .iter()
                    .filter(|o| o.label(context) != target.label(context))
                    .collect::<Vec<_>>();
                pool.len() >= DISTRACTOR_COUNT
                    && context.coarser().is_none_or(|level| {
                        pool.iter().any(|o| o.label(level) == target.label(level))
                    })
            })
            .collect()
    }

    /// Looks up an object by identifier
    pub fn get(&self, id: &str) -> Option<&Object> {
        self.objects.iter().find(|o| o.id() == id)
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the catalog has no objects
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl TryFrom<Vec<Object>> for Catalog {
    type Error = Error;

    fn try_from(objects: Vec<Object>) -> Result<Self, Self::Error> {
        Self::new(objects)
    }
}

impl From<Catalog> for Vec<Object> {
    fn from(catalog: Catalog) -> Self {
        catalog.objects
    }
}
