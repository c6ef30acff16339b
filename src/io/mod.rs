pub mod compression;
pub mod csv;
pub mod encoder;
pub mod glob;
pub mod source;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod parquet;

#[cfg_attr(docsrs, doc(cfg(feature = "io-xlsx")))]
#[cfg(feature = "io-xlsx")]
pub mod xlsx;
