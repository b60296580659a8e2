//! Trial content
//!
//! This module contains everything a round shows to the participants: the
//! object catalog, the condition and context types that decide how
//! distractors relate to the target, the grid geometry, and the sampler
//! that builds a session's full trial list up front.

pub mod catalog;
pub mod context;
pub mod geometry;
pub mod sampler;

use serde::Serialize;

use crate::{constants::trial::DISTRACTOR_COUNT, registry::Role};

use self::{
    catalog::Object,
    context::ContextType,
    geometry::{Cell, CellDimensions, Placement},
};

/// Whether an object is the one the speaker has to describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    /// The object the listener has to pick
    Target,
    /// One of the other objects
    Distractor,
}

/// An object as it appears in one trial
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialObject {
    /// The catalog entry
    pub object: Object,
    /// Whether this is the target
    pub target_status: TargetStatus,
    /// Drawn width in pixels
    pub width: f64,
    /// Drawn height in pixels
    pub height: f64,
    /// Placement on the speaker's grid
    pub speaker_coords: Placement,
    /// Placement on the listener's grid
    pub listener_coords: Placement,
}

impl TrialObject {
    fn new(
        object: Object,
        target_status: TargetStatus,
        speaker_cell: Cell,
        listener_cell: Cell,
        dimensions: CellDimensions,
    ) -> Self {
        let (width, height) = dimensions.object_size();
        Self {
            object,
            target_status,
            width,
            height,
            speaker_coords: Placement::new(speaker_cell, dimensions),
            listener_coords: Placement::new(listener_cell, dimensions),
        }
    }

    /// The object's identifier
    pub fn id(&self) -> &str {
        self.object.id()
    }

    /// Whether this object is the target
    pub fn is_target(&self) -> bool {
        matches!(self.target_status, TargetStatus::Target)
    }

    /// The placement seen by `role`
    pub fn placement(&self, role: Role) -> &Placement {
        match role {
            Role::Speaker => &self.speaker_coords,
            Role::Listener => &self.listener_coords,
        }
    }
}

/// The full content of one round
///
/// Holds the distractors first and the target last. Positions on screen
/// come from the per-role cells, so the order carries no information.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trial {
    context: ContextType,
    objects: [TrialObject; DISTRACTOR_COUNT + 1],
}

impl Trial {
    /// Assembles a trial, assigning `speaker_cells[i]` and
    /// `listener_cells[i]` to the i-th object (distractors, then target)
    pub(crate) fn new(
        context: ContextType,
        target: Object,
        distractors: [Object; DISTRACTOR_COUNT],
        speaker_cells: [Cell; DISTRACTOR_COUNT + 1],
        listener_cells: [Cell; DISTRACTOR_COUNT + 1],
        dimensions: CellDimensions,
    ) -> Self {
        let [first, second, third] = distractors;
        let [s0, s1, s2, s3] = speaker_cells;
        let [l0, l1, l2, l3] = listener_cells;

        let objects = [
            (first, TargetStatus::Distractor, s0, l0),
            (second, TargetStatus::Distractor, s1, l1),
            (third, TargetStatus::Distractor, s2, l2),
            (target, TargetStatus::Target, s3, l3),
        ]
        .map(|(object, status, speaker_cell, listener_cell)| {
            TrialObject::new(object, status, speaker_cell, listener_cell, dimensions)
        });

        Self { context, objects }
    }

    /// The context type this trial was sampled under
    pub fn context(&self) -> ContextType {
        self.context
    }

    /// All four objects, distractors first
    pub fn objects(&self) -> &[TrialObject] {
        &self.objects
    }

    /// The target object
    pub fn target(&self) -> &TrialObject {
        &self.objects[DISTRACTOR_COUNT]
    }

    /// The three distractors
    pub fn distractors(&self) -> &[TrialObject] {
        &self.objects[..DISTRACTOR_COUNT]
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use itertools::Itertools;

    use super::{catalog::tests::object, *};

    fn sample_trial() -> Trial {
        Trial::new(
            ContextType::Basic,
            object("dalmatian", "dog", "animal"),
            [
                object("eagle", "bird", "animal"),
                object("oak", "tree", "plant"),
                object("rose", "flower", "plant"),
            ],
            Cell::ALL,
            [Cell::ALL[3], Cell::ALL[2], Cell::ALL[1], Cell::ALL[0]],
            CellDimensions::default(),
        )
    }

    #[test]
    fn test_target_is_last() {
        let trial = sample_trial();
        assert_eq!(trial.target().id(), "dalmatian");
        assert!(trial.target().is_target());
        assert_eq!(
            trial.distractors().iter().map(TrialObject::id).collect_vec(),
            vec!["eagle", "oak", "rose"]
        );
        assert!(trial.distractors().iter().all(|d| !d.is_target()));
    }

    #[test]
    fn test_cells_follow_object_order() {
        let trial = sample_trial();
        assert_eq!(
            trial.target().placement(Role::Speaker).cell(),
            Cell::new(2, 2)
        );
        assert_eq!(
            trial.target().placement(Role::Listener).cell(),
            Cell::new(1, 1)
        );
    }

    #[test]
    fn test_every_object_gets_its_own_cells() {
        let trial = sample_trial();
        for (i, object) in trial.objects().iter().enumerate() {
            assert_eq!(object.placement(Role::Speaker).cell(), Cell::ALL[i]);
            assert_eq!(object.placement(Role::Listener).cell(), Cell::ALL[3 - i]);
        }
    }

    #[test]
    fn test_drawn_size_is_scaled_cell() {
        let trial = sample_trial();
        assert!(trial.objects().iter().all(|o| o.width == 225. && o.height == 225.));
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(sample_trial()).unwrap();

        assert_eq!(json["context"], "basic");
        assert_eq!(json["objects"].as_array().unwrap().len(), 4);
        assert_eq!(json["objects"][3]["targetStatus"], "target");
        assert_eq!(json["objects"][0]["targetStatus"], "distractor");
        assert_eq!(json["objects"][3]["object"]["subID"], "dalmatian");
        assert_eq!(json["objects"][3]["speakerCoords"]["gridX"], 2);
        assert_eq!(json["objects"][3]["listenerCoords"]["gridX"], 1);
    }
}
