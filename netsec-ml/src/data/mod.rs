//! Data pipeline: ingestion, validation, transformation.

pub mod array;
pub mod dataset;
pub mod drift;
pub mod impute;
pub mod ingest;
pub mod labels;
pub mod schema;
pub mod source;
pub mod transform;
pub mod validate;

pub use array::NumericArray;
pub use dataset::Dataset;
pub use drift::{ColumnDrift, DriftReport};
pub use impute::{FittedImputer, KnnImputer};
pub use ingest::DataIngestion;
pub use labels::{LabelEncoder, LabelMapping};
pub use schema::{ColumnSchema, ColumnType, Schema};
pub use source::{
    CsvSource, DataSourceInfo, DataSourceType, DocumentSource, JsonSource, JsonlSource,
};
pub use transform::{DataTransformation, Preprocessor};
pub use validate::DataValidation;
