pub mod ai;
pub mod kubeconfig;
pub mod kubectl;
pub mod logs;
pub mod lookup;
pub mod pods;
pub mod resources;
