//! 固定秩的数据容器. 形状检查发生在构造时, 而不是在使用处断言.

mod geometry;
mod one_hot;
mod slice;
mod volume;

pub use geometry::OriginalGeometry;
pub use one_hot::OneHotSlice;
pub use slice::Slice;
pub use volume::Volume;
