//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, Label};
pub use crate::{OneHotSlice, OriginalGeometry, SegError, SegResult, Slice, Volume};

pub use crate::config::PipelineConfig;
pub use crate::consts::labels::DEFAULT_CLASS_LABELS;
pub use crate::consts::{canonical_size, CLINICAL_MARGIN};

pub use crate::dataset::{self, home_dataset_dir_with};
pub use crate::dataset::{
    load_all, merge_augmented, split, LoadedDataset, Partition, PrepareOptions, SplitSpec,
};

pub use crate::label::{decode_label_values, one_hot_encode, ClassVocabulary};
pub use crate::normalize::{crop, pad, reorient};

pub use crate::persist::{write_partition, save_prediction};
pub use crate::reconstruct::{predict_all, BatchOptions, BatchReport, Reconstructor, SlicePredictor};
