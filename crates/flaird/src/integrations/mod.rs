#[cfg(feature = "integration_flair")]
pub mod flair;
