// Training, export and scoring of the Gatekeeper classifier
pub mod ml;
