pub mod reconciler;
pub mod resources;

pub use reconciler::{NodeReconciler, ReconcileOutcome};
