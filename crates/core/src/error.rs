use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    #[error("Pipeline {pipeline} declares no phases")]
    EmptyRegistry { pipeline: String },

    #[error("Phase {index} of pipeline {pipeline} has an empty name")]
    UnnamedPhase { pipeline: String, index: i32 },

    #[error("Phase index {index} is reserved and cannot be declared by pipeline {pipeline}")]
    ReservedIndex { pipeline: String, index: i32 },

    #[error("Phase indexes of pipeline {pipeline} must increase, found {previous} then {index}")]
    NonIncreasingIndex {
        pipeline: String,
        previous: i32,
        index: i32,
    },
}
