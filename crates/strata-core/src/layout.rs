//! Row-major byte layout arithmetic for shaped buffer contents.
//!
//! These functions are pure and shared by [`BufferView`](crate::buffer_view::BufferView)
//! and by callers that need to size or address a tensor before a view exists.

use crate::element::ElementType;
use crate::error::{HalError, Result};

/// Size of one shape dimension.
pub type Dim = u64;

/// Byte offsets and lengths within device memory.
pub type DeviceSize = u64;

/// Number of elements described by `shape` (1 for rank 0).
///
/// Fails `OutOfRange` when the product does not fit the device size type.
pub fn element_count(shape: &[Dim]) -> Result<DeviceSize> {
    checked_product(shape).ok_or_else(|| {
        HalError::out_of_range(format!(
            "element count of shape {} overflows the device size type",
            format_shape(shape)
        ))
    })
}

fn checked_product(dims: &[Dim]) -> Option<DeviceSize> {
    dims.iter().try_fold(1, |acc: DeviceSize, &dim| acc.checked_mul(dim))
}

fn offset_overflow(indices: &[Dim]) -> HalError {
    HalError::out_of_range(format!(
        "byte offset of indices {indices:?} overflows the device size type"
    ))
}

/// Total bytes needed to store a dense tensor of `shape` and `element_type`.
pub fn compute_view_size(shape: &[Dim], element_type: ElementType) -> Result<DeviceSize> {
    shape
        .iter()
        .try_fold(element_type.byte_width(), |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| {
            HalError::out_of_range(format!(
                "allocation size of {}x{element_type} overflows the device size type",
                format_shape(shape)
            ))
        })
}

/// Byte offset of the element at `indices` in a dense row-major tensor.
///
/// Fails `InvalidArgument` when the index count differs from the rank and
/// `OutOfRange` when any index reaches its dimension.
pub fn compute_offset(
    shape: &[Dim],
    element_type: ElementType,
    indices: &[Dim],
) -> Result<DeviceSize> {
    if shape.len() != indices.len() {
        return Err(HalError::invalid_argument(format!(
            "shape rank/indices mismatch: {} != {}",
            shape.len(),
            indices.len()
        )));
    }

    if let Some(axis) = indices.iter().zip(shape).position(|(&index, &dim)| index >= dim) {
        return Err(HalError::out_of_range(format!(
            "index[{axis}] out of bounds: {} >= {}",
            indices[axis], shape[axis]
        )));
    }

    let mut offset: DeviceSize = 0;
    for (axis, &index) in indices.iter().enumerate() {
        offset = checked_product(&shape[axis + 1..])
            .and_then(|stride| index.checked_mul(stride))
            .and_then(|term| offset.checked_add(term))
            .ok_or_else(|| offset_overflow(indices))?;
    }
    offset
        .checked_mul(element_type.byte_width())
        .ok_or_else(|| offset_overflow(indices))
}

/// Byte range covered by the slice starting at `start_indices` with `lengths`.
///
/// Returns `(start_offset, byte_length)`. Only slices that are contiguous in
/// memory are supported; anything else fails `Unimplemented`.
pub fn compute_range(
    shape: &[Dim],
    element_type: ElementType,
    start_indices: &[Dim],
    lengths: &[Dim],
) -> Result<(DeviceSize, DeviceSize)> {
    if start_indices.len() != lengths.len() {
        return Err(HalError::invalid_argument(format!(
            "indices/lengths mismatch: {} != {}",
            start_indices.len(),
            lengths.len()
        )));
    }
    if shape.len() != start_indices.len() {
        return Err(HalError::invalid_argument(format!(
            "shape rank/indices mismatch: {} != {}",
            shape.len(),
            start_indices.len()
        )));
    }
    if let Some(axis) = lengths.iter().position(|&length| length == 0) {
        return Err(HalError::invalid_argument(format!(
            "lengths[{axis}] is zero; ranges must cover at least one element"
        )));
    }

    let end_indices: Vec<Dim> = start_indices
        .iter()
        .zip(lengths)
        .map(|(&start, &length)| start.saturating_add(length - 1))
        .collect();

    // Bounds-check both corners before sizing the slice.
    let start_offset = compute_offset(shape, element_type, start_indices)?;
    let end_offset = compute_offset(shape, element_type, &end_indices)?;

    let element_size = element_type.byte_width();
    let subspan_length = compute_view_size(lengths, element_type)?;

    // Non-contiguous regions would need strides to describe.
    if (end_offset - start_offset).checked_add(element_size) != Some(subspan_length) {
        return Err(HalError::unimplemented(
            "non-contiguous range region computation",
        ));
    }

    Ok((start_offset, subspan_length))
}

/// Formats a shape as `2x3x4` (empty for rank 0).
pub fn format_shape(shape: &[Dim]) -> String {
    shape
        .iter()
        .map(Dim::to_string)
        .collect::<Vec<_>>()
        .join("x")
}

/// Parses a shape written as `2x3x4`; the empty string is rank 0.
pub fn parse_shape(value: &str) -> Result<Vec<Dim>> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split('x')
        .map(|dim| {
            dim.parse::<Dim>().map_err(|_| {
                HalError::invalid_argument(format!("invalid shape dimension '{dim}' in '{value}'"))
            })
        })
        .collect()
}
