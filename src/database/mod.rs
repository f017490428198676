// Database module
// Vector storage lives in LanceDB; there is no other persistence layer

pub mod lancedb;
