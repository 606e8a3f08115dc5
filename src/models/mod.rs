pub mod intent;
pub mod k8s;
pub mod query;
