// Maestro controller - query scheduling and model probing

pub mod controller;
pub mod models;
pub mod reconcile;

pub use controller::Controller;
pub use models::ModelProber;
pub use reconcile::QueryReconciler;
