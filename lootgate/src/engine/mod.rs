pub mod anomaly;
pub mod dispatcher;
pub mod drawer;
pub mod gate;
pub mod session;
