//! Tests for buffer view layout and lifetime properties.
//!
//! Covers byte length bookkeeping, offset/range arithmetic against a
//! brute-force model, reshapes, subviews and resource tracking.

use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use strata_core::{
    allocator::{Allocator, HeapAllocator},
    buffer_view::BufferView,
    element::ElementType,
    error::HalError,
    layout::{self, Dim},
    resource::{ResourceKind, ResourceTracker},
};

fn tracked_allocator() -> (Arc<ResourceTracker>, HeapAllocator) {
    let tracker = Arc::new(ResourceTracker::new());
    let allocator = HeapAllocator::with_options("views", None, Some(tracker.clone()));
    (tracker, allocator)
}

fn make_view(allocator: &HeapAllocator, shape: &[Dim], element_type: ElementType) -> Arc<BufferView> {
    let size = layout::compute_view_size(shape, element_type).unwrap();
    let buffer = allocator.allocate_buffer(size).unwrap();
    BufferView::new(buffer, shape, element_type).unwrap()
}

/// Row-major index of `indices` computed one element at a time.
fn linear_index(shape: &[Dim], indices: &[Dim]) -> Dim {
    indices
        .iter()
        .zip(shape)
        .fold(0, |acc, (&index, &dim)| acc * dim + index)
}

fn element_types() -> impl Strategy<Value = ElementType> {
    prop_oneof![
        Just(ElementType::INT_8),
        Just(ElementType::FLOAT_16),
        Just(ElementType::FLOAT_32),
        Just(ElementType::FLOAT_64),
        Just(ElementType::BFLOAT_16),
    ]
}

fn shape_and_indices() -> impl Strategy<Value = (Vec<Dim>, Vec<Dim>)> {
    prop::collection::vec(1u64..6, 0..5).prop_flat_map(|shape| {
        let indices: Vec<_> = shape.iter().map(|&dim| 0..dim).collect();
        (Just(shape), indices)
    })
}

mod layout_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_byte_length_matches_shape() {
        let (_, allocator) = tracked_allocator();
        let view = make_view(&allocator, &[2, 3], ElementType::FLOAT_32);
        assert_eq!(view.byte_length(), 24);
        assert_eq!(view.element_size(), 4);
        assert_eq!(view.to_string(), "2x3xf32");
    }

    #[test]
    fn test_offset_out_of_range() {
        let (_, allocator) = tracked_allocator();
        let view = make_view(&allocator, &[2, 3], ElementType::FLOAT_32);
        assert!(matches!(
            view.compute_offset(&[2, 0]).unwrap_err(),
            HalError::OutOfRange { .. }
        ));
        assert!(matches!(
            view.compute_offset(&[0, 3]).unwrap_err(),
            HalError::OutOfRange { .. }
        ));
    }

    #[test]
    fn test_non_contiguous_range_unimplemented() {
        let (_, allocator) = tracked_allocator();
        let view = make_view(&allocator, &[4, 4], ElementType::INT_8);
        assert!(matches!(
            view.compute_range(&[1, 1], &[2, 2]).unwrap_err(),
            HalError::Unimplemented { .. }
        ));
    }

    #[test]
    fn test_zero_length_range_rejected() {
        let (_, allocator) = tracked_allocator();
        let view = make_view(&allocator, &[4, 4], ElementType::INT_8);
        assert!(matches!(
            view.compute_range(&[0, 0], &[0, 4]).unwrap_err(),
            HalError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn test_huge_range_lengths_out_of_range() {
        let (_, allocator) = tracked_allocator();
        let view = make_view(&allocator, &[4, 5], ElementType::FLOAT_32);
        assert!(matches!(
            view.compute_range(&[0, 0], &[Dim::MAX, Dim::MAX]).unwrap_err(),
            HalError::OutOfRange { .. }
        ));
        assert!(matches!(
            view.subview(&[1, 0], &[Dim::MAX, 5]).unwrap_err(),
            HalError::OutOfRange { .. }
        ));
    }

    proptest! {
        #[test]
        fn prop_byte_length_is_width_times_count(
            shape in prop::collection::vec(0u64..8, 0..5),
            element_type in element_types(),
        ) {
            let (_, allocator) = tracked_allocator();
            let view = make_view(&allocator, &shape, element_type);
            let count: u64 = shape.iter().product();
            prop_assert_eq!(view.byte_length(), element_type.byte_width() * count);
            prop_assert_eq!(view.element_count(), count);
        }

        #[test]
        fn prop_offset_matches_linear_index(
            (shape, indices) in shape_and_indices(),
            element_type in element_types(),
        ) {
            let offset = layout::compute_offset(&shape, element_type, &indices).unwrap();
            prop_assert_eq!(offset, linear_index(&shape, &indices) * element_type.byte_width());
        }

        #[test]
        fn prop_contiguous_range_agrees_with_offsets(
            shape in prop::collection::vec(1u64..6, 1..5),
            row_fraction in 0.0f64..1.0,
            element_type in element_types(),
        ) {
            // Rows of the leading axis are always contiguous.
            let row = ((shape[0] as f64) * row_fraction) as Dim;
            let mut start = vec![0; shape.len()];
            start[0] = row;
            let mut lengths = shape.clone();
            lengths[0] = shape[0] - row;

            let (start_offset, byte_length) =
                layout::compute_range(&shape, element_type, &start, &lengths).unwrap();
            prop_assert_eq!(start_offset, layout::compute_offset(&shape, element_type, &start).unwrap());

            let end: Vec<Dim> = shape.iter().map(|&dim| dim - 1).collect();
            let end_offset = layout::compute_offset(&shape, element_type, &end).unwrap();
            prop_assert_eq!(end_offset + element_type.byte_width() - start_offset, byte_length);
        }

        #[test]
        fn prop_reshape_keeps_byte_length(
            a in 1u64..8,
            b in 1u64..8,
            c in 1u64..8,
        ) {
            let (_, allocator) = tracked_allocator();
            let view = make_view(&allocator, &[a * b, c], ElementType::FLOAT_32);
            let before = view.byte_length();
            view.reshape(&[a, b * c]).unwrap();
            prop_assert_eq!(view.byte_length(), before);
            prop_assert_eq!(view.shape(), vec![a, b * c]);

            let grown = view.reshape(&[a + 1, b * c]);
            let grown_is_invalid = matches!(grown, Err(HalError::InvalidArgument { .. }));
            prop_assert!(grown_is_invalid);
        }
    }
}

mod subview_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_subview_reads_parent_rows() {
        let (_, allocator) = tracked_allocator();
        let view = make_view(&allocator, &[3, 4], ElementType::INT_8);
        let bytes: Vec<u8> = (0..12).collect();
        view.buffer().write(0, &bytes).unwrap();

        let middle = view.subview(&[1, 0], &[1, 4]).unwrap();
        assert_eq!(middle.shape(), vec![1, 4]);
        assert_eq!(middle.buffer().read_to_vec(0, 4).unwrap(), vec![4, 5, 6, 7]);
        assert!(middle.buffer().shares_allocation_with(view.buffer()));
    }

    #[test]
    fn test_subview_outlives_parent() {
        let (tracker, allocator) = tracked_allocator();
        let view = make_view(&allocator, &[2, 8], ElementType::INT_8);
        let tail = view.subview(&[1, 0], &[1, 8]).unwrap();
        drop(view);
        tail.buffer().write(0, &[9; 8]).unwrap();
        assert_eq!(tracker.stats().live(ResourceKind::BufferView), 1);
        drop(tail);
        assert_eq!(tracker.stats().total_live(), 0);
        assert_eq!(allocator.statistics().bytes_in_use, 0);
    }
}

mod lifetime_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_concurrent_clone_drop_destroys_once() {
        let (tracker, allocator) = tracked_allocator();
        let view = make_view(&allocator, &[16], ElementType::FLOAT_32);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let view = view.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let extra = view.clone();
                        drop(extra);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(view);

        let stats = tracker.stats();
        assert_eq!(stats.created(ResourceKind::BufferView), 1);
        assert_eq!(stats.destroyed(ResourceKind::BufferView), 1);
        assert_eq!(stats.created(ResourceKind::Buffer), 1);
        assert_eq!(stats.destroyed(ResourceKind::Buffer), 1);
    }
}
