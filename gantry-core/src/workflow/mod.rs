// Workflow declaration format
// Models for the YAML input plus parsing and semantic validation

pub mod models;
pub mod parser;

pub use models::{AxisValue, EventConfig, Job, Matrix, Step, Strategy, Trigger, Workflow};
pub use parser::WorkflowParser;
