pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod platforms;
pub(crate) mod refine;
