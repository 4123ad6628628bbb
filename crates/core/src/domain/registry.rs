use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::CoreError;

/// Reserved terminal indexes that no declared phase may use.
const RESERVED_INDEXES: [i32; 2] = [99, -1];

/// External-state condition a phase requires before it may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PreconditionRef {
    /// No demo account may exist yet.
    DemoAccountAbsent,
    /// A demo account must exist and no demo friend may exist yet.
    FriendSeedable,
    /// No demo friend may exist yet.
    FriendAbsent,
    /// The demo account id must have been resolved.
    AccountResolved,
    /// Suite selection flags must not contradict each other.
    SuiteSelectionConsistent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PhaseEntry {
    pub index: i32,
    pub name: String,
    pub precondition: Option<PreconditionRef>,
}

impl PhaseEntry {
    pub fn new(index: i32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            precondition: None,
        }
    }

    pub fn requires(mut self, precondition: PreconditionRef) -> Self {
        self.precondition = Some(precondition);
        self
    }
}

/// Static, ordered description of a pipeline's phases.
///
/// Indexes strictly increase, start at `0` or above, and never use the
/// terminal values `99` or `-1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PhaseRegistry {
    pub pipeline: String,
    pub entries: Vec<PhaseEntry>,
}

impl PhaseRegistry {
    pub fn new(pipeline: impl Into<String>, entries: Vec<PhaseEntry>) -> Result<Self, CoreError> {
        let registry = Self {
            pipeline: pipeline.into(),
            entries,
        };
        registry.validate()?;
        Ok(registry)
    }

    /// Build a registry whose phases are numbered `1..=n` in declaration order.
    pub fn sequential(
        pipeline: impl Into<String>,
        phases: &[(&str, Option<PreconditionRef>)],
    ) -> Self {
        let entries = phases
            .iter()
            .zip(1..)
            .map(|((name, precondition), index)| PhaseEntry {
                index,
                name: (*name).to_string(),
                precondition: *precondition,
            })
            .collect();

        Self {
            pipeline: pipeline.into(),
            entries,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.entries.is_empty() {
            return Err(CoreError::EmptyRegistry {
                pipeline: self.pipeline.clone(),
            });
        }

        let mut previous: Option<i32> = None;
        for entry in &self.entries {
            if entry.index < 0 || RESERVED_INDEXES.contains(&entry.index) {
                return Err(CoreError::ReservedIndex {
                    pipeline: self.pipeline.clone(),
                    index: entry.index,
                });
            }
            if entry.name.trim().is_empty() {
                return Err(CoreError::UnnamedPhase {
                    pipeline: self.pipeline.clone(),
                    index: entry.index,
                });
            }
            if let Some(previous) = previous {
                if entry.index <= previous {
                    return Err(CoreError::NonIncreasingIndex {
                        pipeline: self.pipeline.clone(),
                        previous,
                        index: entry.index,
                    });
                }
            }
            previous = Some(entry.index);
        }

        Ok(())
    }

    pub fn entries(&self) -> &[PhaseEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: i32) -> Option<&PhaseEntry> {
        self.entries.iter().find(|entry| entry.index == index)
    }

    pub fn first(&self) -> Option<&PhaseEntry> {
        self.entries.first()
    }

    pub fn name_of(&self, index: i32) -> Option<&str> {
        self.get(index).map(|entry| entry.name.as_str())
    }
}
