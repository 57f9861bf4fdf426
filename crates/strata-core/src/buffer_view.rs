//! Typed, shaped views over buffers.
//!
//! A [`BufferView`] retains one reference to its [`Buffer`] and describes the
//! buffer contents as a dense row-major tensor. The only mutation a view
//! supports after construction is [`BufferView::reshape`], which keeps rank
//! and element count and therefore `byte_length`.

use crate::buffer::Buffer;
use crate::element::ElementType;
use crate::error::{HalError, Result};
use crate::layout::{self, DeviceSize, Dim};
use crate::resource::{Resource, ResourceHeader, ResourceKind};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct ViewShape {
    dims: Vec<Dim>,
    element_count: DeviceSize,
    byte_length: DeviceSize,
}

impl ViewShape {
    fn new(dims: Vec<Dim>, element_type: ElementType) -> Result<Self> {
        let element_count = layout::element_count(&dims)?;
        let byte_length = layout::compute_view_size(&dims, element_type)?;
        Ok(Self {
            dims,
            element_count,
            byte_length,
        })
    }
}

/// Typed, shaped window over a [`Buffer`].
pub struct BufferView {
    header: ResourceHeader,
    buffer: Arc<Buffer>,
    element_type: ElementType,
    shape: RwLock<ViewShape>,
}

impl BufferView {
    /// Creates a view of `rank` dimensions over `buffer`.
    ///
    /// `shape` may only be absent for rank 0. When present its length must
    /// equal `rank`. Shapes whose byte length overflows fail `OutOfRange`.
    pub fn create(
        buffer: Arc<Buffer>,
        shape: Option<&[Dim]>,
        rank: usize,
        element_type: ElementType,
    ) -> Result<Arc<Self>> {
        let dims = match shape {
            None if rank > 0 => {
                return Err(HalError::invalid_argument("no shape dimensions specified"));
            }
            None => Vec::new(),
            Some(dims) if dims.len() != rank => {
                return Err(HalError::invalid_argument(format!(
                    "shape has {} dimensions but rank is {rank}",
                    dims.len()
                )));
            }
            Some(dims) => dims.to_vec(),
        };

        let shape = ViewShape::new(dims, element_type)?;
        let tracker = buffer.header().tracker().cloned();
        let view = Self {
            header: ResourceHeader::new(ResourceKind::BufferView, tracker),
            shape: RwLock::new(shape),
            buffer,
            element_type,
        };
        tracing::trace!(
            view = %view.header.id(),
            buffer = %view.buffer.resource_id(),
            descriptor = %view,
            "buffer view created"
        );
        Ok(Arc::new(view))
    }

    /// Creates a view whose rank is the length of `shape`.
    pub fn new(buffer: Arc<Buffer>, shape: &[Dim], element_type: ElementType) -> Result<Arc<Self>> {
        Self::create(buffer, Some(shape), shape.len(), element_type)
    }

    /// The viewed buffer.
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// Element type of the view.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Size of one element in bytes.
    pub fn element_size(&self) -> DeviceSize {
        self.element_type.byte_width()
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.read().dims.len()
    }

    /// Copy of the current shape.
    pub fn shape(&self) -> Vec<Dim> {
        self.shape.read().dims.clone()
    }

    /// Size of dimension `index`, if it exists.
    pub fn shape_dim(&self, index: usize) -> Option<Dim> {
        self.shape.read().dims.get(index).copied()
    }

    /// Copies the shape into `out` and returns the rank.
    ///
    /// When `out` is shorter than the rank nothing is copied and the call
    /// fails `OutOfRange`; callers use this as a size query.
    pub fn copy_shape(&self, out: &mut [Dim]) -> Result<usize> {
        let shape = self.shape.read();
        let rank = shape.dims.len();
        if out.len() < rank {
            return Err(HalError::out_of_range(format!(
                "shape capacity {} is smaller than rank {rank}",
                out.len()
            )));
        }
        out[..rank].copy_from_slice(&shape.dims);
        Ok(rank)
    }

    /// Product of the shape dimensions (1 for rank 0).
    pub fn element_count(&self) -> DeviceSize {
        self.shape.read().element_count
    }

    /// Bytes covered by the view.
    pub fn byte_length(&self) -> DeviceSize {
        self.shape.read().byte_length
    }

    /// Byte offset of the element at `indices`.
    pub fn compute_offset(&self, indices: &[Dim]) -> Result<DeviceSize> {
        layout::compute_offset(&self.shape.read().dims, self.element_type, indices)
    }

    /// Byte range `(start_offset, byte_length)` of a contiguous slice.
    pub fn compute_range(
        &self,
        start_indices: &[Dim],
        lengths: &[Dim],
    ) -> Result<(DeviceSize, DeviceSize)> {
        layout::compute_range(
            &self.shape.read().dims,
            self.element_type,
            start_indices,
            lengths,
        )
    }

    /// Creates a new view of shape `lengths` over the slice starting at
    /// `start_indices`. This view is left untouched.
    pub fn subview(&self, start_indices: &[Dim], lengths: &[Dim]) -> Result<Arc<Self>> {
        let (start_offset, byte_length) = self.compute_range(start_indices, lengths)?;
        let sub_buffer = self.buffer.subspan(start_offset, byte_length)?;
        Self::new(sub_buffer, lengths, self.element_type)
    }

    /// Replaces the shape with one of equal rank and element count.
    pub fn reshape(&self, new_shape: &[Dim]) -> Result<()> {
        let mut shape = self.shape.write();
        if new_shape.len() != shape.dims.len() {
            return Err(HalError::invalid_argument(format!(
                "buffer view reshapes must have the same rank; target={}, existing={}",
                new_shape.len(),
                shape.dims.len()
            )));
        }

        let reshaped = ViewShape::new(new_shape.to_vec(), self.element_type)?;
        if reshaped.element_count != shape.element_count {
            return Err(HalError::invalid_argument(format!(
                "buffer view reshapes must have the same element count; target={}, existing={}",
                reshaped.element_count, shape.element_count
            )));
        }

        *shape = reshaped;
        Ok(())
    }
}

/// Parses a view descriptor such as `2x3xf32` (or `f32` for rank 0).
pub fn parse_shape_and_element_type(value: &str) -> Result<(Vec<Dim>, ElementType)> {
    match value.rsplit_once('x') {
        Some((shape, element_type)) => {
            Ok((layout::parse_shape(shape)?, element_type.parse()?))
        }
        None => Ok((Vec::new(), value.parse()?)),
    }
}

impl Resource for BufferView {
    fn header(&self) -> &ResourceHeader {
        &self.header
    }
}

impl fmt::Display for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = self.shape.read();
        if shape.dims.is_empty() {
            write!(f, "{}", self.element_type)
        } else {
            write!(f, "{}x{}", layout::format_shape(&shape.dims), self.element_type)
        }
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("id", &self.header.id())
            .field("buffer", &self.buffer.resource_id())
            .field("descriptor", &self.to_string())
            .field("byte_length", &self.byte_length())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{Allocator, HeapAllocator};

    fn view(shape: &[Dim], element_type: ElementType) -> Arc<BufferView> {
        let size = layout::compute_view_size(shape, element_type).unwrap();
        let buffer = HeapAllocator::new("test").allocate_buffer(size).unwrap();
        BufferView::new(buffer, shape, element_type).unwrap()
    }

    #[test]
    fn test_create_computes_byte_length() {
        let v = view(&[2, 3], ElementType::FLOAT_32);
        assert_eq!(v.byte_length(), 24);
        assert_eq!(v.element_count(), 6);
        assert_eq!(v.rank(), 2);
        assert_eq!(v.shape_dim(1), Some(3));
        assert_eq!(v.shape_dim(2), None);
    }

    #[test]
    fn test_create_rejects_missing_shape() {
        let buffer = HeapAllocator::new("test").allocate_buffer(4).unwrap();
        let err = BufferView::create(buffer.clone(), None, 2, ElementType::FLOAT_32).unwrap_err();
        assert!(matches!(err, HalError::InvalidArgument { .. }));

        let err = BufferView::create(buffer.clone(), Some(&[1, 2, 3]), 2, ElementType::INT_8)
            .unwrap_err();
        assert!(matches!(err, HalError::InvalidArgument { .. }));

        let scalar = BufferView::create(buffer, None, 0, ElementType::FLOAT_32).unwrap();
        assert_eq!(scalar.element_count(), 1);
        assert_eq!(scalar.byte_length(), 4);
    }

    #[test]
    fn test_oversized_shapes_are_out_of_range() {
        let buffer = HeapAllocator::new("test").allocate_buffer(8).unwrap();
        let err = BufferView::new(buffer.clone(), &[u64::MAX, 2], ElementType::FLOAT_32)
            .unwrap_err();
        assert!(matches!(err, HalError::OutOfRange { .. }));

        let v = BufferView::new(buffer, &[2], ElementType::FLOAT_32).unwrap();
        let err = v.reshape(&[u64::MAX]).unwrap_err();
        assert!(matches!(err, HalError::OutOfRange { .. }));
        assert_eq!(v.shape(), vec![2]);
    }

    #[test]
    fn test_copy_shape_size_query() {
        let v = view(&[2, 3, 4], ElementType::INT_8);
        let mut small = [0; 2];
        assert!(matches!(
            v.copy_shape(&mut small).unwrap_err(),
            HalError::OutOfRange { .. }
        ));
        let mut out = [0; 4];
        assert_eq!(v.copy_shape(&mut out).unwrap(), 3);
        assert_eq!(&out[..3], &[2, 3, 4]);
    }

    #[test]
    fn test_reshape() {
        let v = view(&[2, 6], ElementType::FLOAT_32);
        v.reshape(&[3, 4]).unwrap();
        assert_eq!(v.shape(), vec![3, 4]);
        assert_eq!(v.byte_length(), 48);

        assert!(v.reshape(&[12]).is_err());
        assert!(v.reshape(&[5, 2]).is_err());
        assert_eq!(v.shape(), vec![3, 4]);
    }

    #[test]
    fn test_subview() {
        let v = view(&[4, 5], ElementType::FLOAT_32);
        let bytes: Vec<u8> = (0..80).collect();
        v.buffer().write(0, &bytes).unwrap();

        let rows = v.subview(&[1, 0], &[2, 5]).unwrap();
        assert_eq!(rows.shape(), vec![2, 5]);
        assert_eq!(rows.byte_length(), 40);
        assert_eq!(rows.buffer().byte_offset(), 20);
        assert_eq!(rows.buffer().read_to_vec(0, 4).unwrap(), vec![20, 21, 22, 23]);

        // The parent is unaffected.
        assert_eq!(v.shape(), vec![4, 5]);

        let err = v.subview(&[0, 0], &[2, 2]).unwrap_err();
        assert!(matches!(err, HalError::Unimplemented { .. }));
    }

    #[test]
    fn test_view_retains_buffer() {
        let allocator = HeapAllocator::new("retain");
        let buffer = allocator.allocate_buffer(16).unwrap();
        let v = BufferView::new(buffer.clone(), &[4], ElementType::FLOAT_32).unwrap();
        assert_eq!(Arc::strong_count(&buffer), 2);
        drop(v);
        assert_eq!(Arc::strong_count(&buffer), 1);
    }

    #[test]
    fn test_descriptor_text() {
        let v = view(&[2, 3], ElementType::FLOAT_32);
        assert_eq!(v.to_string(), "2x3xf32");

        let (shape, et) = parse_shape_and_element_type("2x3xf32").unwrap();
        assert_eq!(shape, vec![2, 3]);
        assert_eq!(et, ElementType::FLOAT_32);

        let (shape, et) = parse_shape_and_element_type("i8").unwrap();
        assert!(shape.is_empty());
        assert_eq!(et, ElementType::INT_8);

        assert!(parse_shape_and_element_type("2xyxf32").is_err());
    }
}
