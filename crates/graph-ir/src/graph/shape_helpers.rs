//! Shape inference helpers shared by node builders and node verification.
//!
//! Every helper returns `Err(detail)` with a human-readable reason; callers
//! wrap the detail into their own error type.

use crate::types::Dims;

/// NHWC view of a rank-4 activation shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeNhwc {
    pub n: usize,
    pub h: usize,
    pub w: usize,
    pub c: usize,
}

impl ShapeNhwc {
    pub fn from_dims(dims: &[usize]) -> Result<Self, String> {
        match dims {
            [n, h, w, c] => Ok(Self {
                n: *n,
                h: *h,
                w: *w,
                c: *c,
            }),
            _ => Err(format!("expected an NHWC tensor of rank 4, got {dims:?}")),
        }
    }
}

/// Element count of `dims`, or the caller's error when the product overflows.
pub fn checked_element_count_or_error<E, F>(dims: &[usize], mut on_overflow: F) -> Result<usize, E>
where
    F: FnMut() -> E,
{
    let mut count = 1usize;
    for dim in dims {
        count = count.checked_mul(*dim).ok_or_else(&mut on_overflow)?;
    }
    Ok(count)
}

/// Element count of `dims` with a descriptive overflow error.
pub fn checked_element_count(dims: &[usize]) -> Result<usize, String> {
    checked_element_count_or_error(dims, || format!("element count of {dims:?} overflows"))
}

/// Output spatial extent of a windowed operator: `(in + 2 * pad - kernel) / stride + 1`.
pub fn window_output_dims(
    input: ShapeNhwc,
    kernel: usize,
    stride: usize,
    pad: usize,
) -> Result<(usize, usize), String> {
    if kernel == 0 {
        return Err("kernel must be positive".to_string());
    }
    if stride == 0 {
        return Err("stride must be positive".to_string());
    }
    if input.h < kernel || input.w < kernel {
        return Err(format!(
            "spatial extent {}x{} is smaller than kernel {kernel}",
            input.h, input.w
        ));
    }
    let padded = |extent: usize| {
        pad.checked_mul(2)
            .and_then(|both| both.checked_add(extent))
            .ok_or_else(|| format!("padding {pad} overflows spatial extent {extent}"))
    };
    let out_h = (padded(input.h)? - kernel) / stride + 1;
    let out_w = (padded(input.w)? - kernel) / stride + 1;
    Ok((out_h, out_w))
}

/// Splits a shape into its first dimension and the product of the rest.
pub fn flatten_cdr(dims: &[usize]) -> Result<(usize, usize), String> {
    match dims.split_first() {
        Some((first, rest)) => Ok((*first, checked_element_count(rest)?)),
        None => Err("cannot flatten a rank-0 shape".to_string()),
    }
}

/// Returns `true` when `a` and `b` have equal rank and agree on every axis but `axis`.
pub fn same_shape_except_axis(a: &[usize], b: &[usize], axis: usize) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .enumerate()
            .all(|(idx, (x, y))| idx == axis || x == y)
}

/// Output shape of concatenating `inputs` along `axis`.
pub fn concat_dims(inputs: &[&[usize]], axis: usize) -> Result<Dims, String> {
    let Some(first) = inputs.first() else {
        return Err("concat needs at least one input".to_string());
    };
    if axis >= first.len() {
        return Err(format!("axis {axis} out of range for rank {}", first.len()));
    }
    let mut out = Dims::from_slice(first);
    out[axis] = 0;
    for (idx, dims) in inputs.iter().enumerate() {
        if !same_shape_except_axis(first, dims, axis) {
            return Err(format!(
                "input {idx} has shape {dims:?}, incompatible with {first:?} outside axis {axis}"
            ));
        }
        out[axis] = out[axis]
            .checked_add(dims[axis])
            .ok_or_else(|| format!("concatenated extent on axis {axis} overflows"))?;
    }
    Ok(out)
}

/// Output shape of slicing `[begin, end)` on every axis.
pub fn slice_dims(input: &[usize], begin: &[usize], end: &[usize]) -> Result<Dims, String> {
    if begin.len() != end.len() {
        return Err(format!(
            "begin has {} entries but end has {}",
            begin.len(),
            end.len()
        ));
    }
    if begin.len() != input.len() {
        return Err(format!(
            "slice bounds have {} entries but input rank is {}",
            begin.len(),
            input.len()
        ));
    }
    let mut out = Dims::with_capacity(input.len());
    for (axis, ((&b, &e), &dim)) in begin.iter().zip(end).zip(input).enumerate() {
        if !(b < e && e <= dim) {
            return Err(format!(
                "axis {axis}: bounds [{b}, {e}) do not fit extent {dim}"
            ));
        }
        out.push(e - b);
    }
    Ok(out)
}

/// Applies a transpose shuffle; `shuffle` must be a permutation of `0..rank`.
pub fn transpose_dims(input: &[usize], shuffle: &[usize]) -> Result<Dims, String> {
    if shuffle.len() != input.len() {
        return Err(format!(
            "shuffle has {} entries but input rank is {}",
            shuffle.len(),
            input.len()
        ));
    }
    let mut seen = vec![false; input.len()];
    for &axis in shuffle {
        if axis >= input.len() || seen[axis] {
            return Err(format!("shuffle {shuffle:?} is not a permutation"));
        }
        seen[axis] = true;
    }
    Ok(shuffle.iter().map(|&axis| input[axis]).collect())
}

/// Output shape of gathering rows of `data` with `indices`.
pub fn gather_dims(data: &[usize], indices: &[usize]) -> Result<Dims, String> {
    if data.is_empty() {
        return Err("gather data must have rank >= 1".to_string());
    }
    let mut out = Dims::from_slice(indices);
    out.extend_from_slice(&data[1..]);
    Ok(out)
}

/// Output shape of a top-k along the innermost axis.
pub fn top_k_dims(input: &[usize], k: usize) -> Result<Dims, String> {
    let Some(&last) = input.last() else {
        return Err("top-k input must have rank >= 1".to_string());
    };
    if k > last {
        return Err(format!("k = {k} exceeds innermost extent {last}"));
    }
    let mut out = Dims::from_slice(input);
    if let Some(slot) = out.last_mut() {
        *slot = k;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_output_keeps_same_padding_extent() {
        let input = ShapeNhwc::from_dims(&[1, 32, 32, 3]).unwrap();
        assert_eq!(window_output_dims(input, 5, 1, 2).unwrap(), (32, 32));
        assert_eq!(window_output_dims(input, 2, 2, 0).unwrap(), (16, 16));
    }

    #[test]
    fn window_rejects_small_inputs() {
        let input = ShapeNhwc::from_dims(&[1, 3, 3, 1]).unwrap();
        assert!(window_output_dims(input, 5, 1, 0).is_err());
        assert!(window_output_dims(input, 3, 0, 0).is_err());
    }

    #[test]
    fn oversized_shapes_are_errors() {
        assert_eq!(checked_element_count(&[3, 4, 5]), Ok(60));
        assert!(checked_element_count(&[usize::MAX, 2]).is_err());
        assert!(flatten_cdr(&[1, usize::MAX, 2]).is_err());
        assert!(concat_dims(&[&[usize::MAX], &[1]], 0).is_err());
        let input = ShapeNhwc::from_dims(&[1, 3, 3, 1]).unwrap();
        assert!(window_output_dims(input, 3, 1, usize::MAX).is_err());
    }

    #[test]
    fn concat_sums_axis() {
        let out = concat_dims(&[&[4, 10], &[4, 6]], 1).unwrap();
        assert_eq!(out.as_slice(), &[4, 16]);
        assert!(concat_dims(&[&[4, 10], &[4, 6]], 0).is_err());
    }

    #[test]
    fn slice_requires_nonempty_ranges() {
        assert_eq!(
            slice_dims(&[4, 8], &[1, 0], &[3, 8]).unwrap().as_slice(),
            &[2, 8]
        );
        assert!(slice_dims(&[4, 8], &[2, 0], &[2, 8]).is_err());
        assert!(slice_dims(&[4, 8], &[0, 0], &[5, 8]).is_err());
    }

    #[test]
    fn transpose_requires_permutation() {
        assert_eq!(
            transpose_dims(&[2, 3, 4], &[2, 0, 1]).unwrap().as_slice(),
            &[4, 2, 3]
        );
        assert!(transpose_dims(&[2, 3], &[0, 0]).is_err());
    }

    #[test]
    fn gather_prepends_index_shape() {
        assert_eq!(gather_dims(&[10, 4], &[2, 3]).unwrap().as_slice(), &[2, 3, 4]);
    }
}
