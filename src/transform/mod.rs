pub mod augment;
pub mod format;
pub mod mapper;
pub mod transformer;

pub use augment::augment_record;
pub use format::{FormatError, FormatSpec};
pub use mapper::{
    InclusionPolicy, MOST_DENY_LIST, MapperError, ObsToUpload, ObservationMapper,
    ObservationSpec, ResolvedObservation,
};
pub use transformer::{BINDING_TAG, RecordTransformer, TransformError};
