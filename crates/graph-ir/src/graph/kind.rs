//! Closed catalog of operator kinds.
//!
//! `NodeKind` is the single dispatch table for per-kind behavior: arity, port
//! names, in-place metadata and local consistency checks. Cloning, erasure and
//! the debug descriptor all go through it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::shape_helpers::{
    checked_element_count, concat_dims, flatten_cdr, gather_dims, slice_dims, top_k_dims, transpose_dims,
    window_output_dims, ShapeNhwc,
};
use crate::types::{ElemKind, Type};

/// Elementwise binary operators sharing the same operand contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
    CmpLte,
}

impl ArithmeticOp {
    pub fn name(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "Add",
            ArithmeticOp::Sub => "Sub",
            ArithmeticOp::Mul => "Mul",
            ArithmeticOp::Div => "Div",
            ArithmeticOp::Max => "Max",
            ArithmeticOp::Min => "Min",
            ArithmeticOp::CmpLte => "CmpLTE",
        }
    }
}

/// Operator kind together with its scalar attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Convolution {
        kernel: usize,
        stride: usize,
        pad: usize,
        depth: usize,
    },
    PoolMax {
        kernel: usize,
        stride: usize,
        pad: usize,
    },
    PoolAvg {
        kernel: usize,
        stride: usize,
        pad: usize,
    },
    FullyConnected,
    Relu,
    Sigmoid,
    Tanh,
    SoftMax,
    CrossEntropyLoss,
    Regression,
    Reshape {
        dims: Vec<usize>,
    },
    Transpose {
        shuffle: Vec<usize>,
    },
    Broadcast {
        shape: Vec<usize>,
        axis: usize,
    },
    Concat {
        axis: usize,
    },
    Slice {
        start: Vec<usize>,
    },
    BatchNormalization {
        channel_idx: usize,
        epsilon: f32,
        momentum: f32,
    },
    LocalResponseNormalization {
        half_window_size: usize,
        alpha: f32,
        beta: f32,
        k: f32,
    },
    Arithmetic(ArithmeticOp),
    Pow {
        exp: f32,
    },
    Select,
    Splat {
        value: f32,
    },
    MatMul,
    BatchedReduceAdd,
    BatchedAdd,
    Save,
    QuantizationProfile {
        profiled_node_name: String,
    },
    TopK {
        k: usize,
    },
    Gather,
    Quantize,
    Dequantize,
    RescaleQuantized,
}

impl NodeKind {
    /// Stable kind name used in descriptors and for color selection.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Convolution { .. } => "Convolution",
            NodeKind::PoolMax { .. } => "PoolMax",
            NodeKind::PoolAvg { .. } => "PoolAvg",
            NodeKind::FullyConnected => "FullyConnected",
            NodeKind::Relu => "Relu",
            NodeKind::Sigmoid => "Sigmoid",
            NodeKind::Tanh => "Tanh",
            NodeKind::SoftMax => "SoftMax",
            NodeKind::CrossEntropyLoss => "CrossEntropyLoss",
            NodeKind::Regression => "Regression",
            NodeKind::Reshape { .. } => "Reshape",
            NodeKind::Transpose { .. } => "Transpose",
            NodeKind::Broadcast { .. } => "Broadcast",
            NodeKind::Concat { .. } => "Concat",
            NodeKind::Slice { .. } => "Slice",
            NodeKind::BatchNormalization { .. } => "BatchNormalization",
            NodeKind::LocalResponseNormalization { .. } => "LocalResponseNormalization",
            NodeKind::Arithmetic(op) => op.name(),
            NodeKind::Pow { .. } => "Pow",
            NodeKind::Select => "Select",
            NodeKind::Splat { .. } => "Splat",
            NodeKind::MatMul => "MatMul",
            NodeKind::BatchedReduceAdd => "BatchedReduceAdd",
            NodeKind::BatchedAdd => "BatchedAdd",
            NodeKind::Save => "Save",
            NodeKind::QuantizationProfile { .. } => "QuantizationProfile",
            NodeKind::TopK { .. } => "TopK",
            NodeKind::Gather => "Gather",
            NodeKind::Quantize => "Quantize",
            NodeKind::Dequantize => "Dequantize",
            NodeKind::RescaleQuantized => "RescaleQuantized",
        }
    }

    /// Named input ports. `None` for variadic kinds.
    fn input_ports(&self) -> Option<&'static [&'static str]> {
        let ports: &'static [&'static str] = match self {
            NodeKind::Convolution { .. } => &["Input", "Filter", "Bias"],
            NodeKind::PoolMax { .. }
            | NodeKind::PoolAvg { .. }
            | NodeKind::Relu
            | NodeKind::Sigmoid
            | NodeKind::Tanh
            | NodeKind::Reshape { .. }
            | NodeKind::Transpose { .. }
            | NodeKind::Broadcast { .. }
            | NodeKind::Slice { .. }
            | NodeKind::LocalResponseNormalization { .. }
            | NodeKind::TopK { .. }
            | NodeKind::Quantize
            | NodeKind::Dequantize
            | NodeKind::RescaleQuantized => &["Input"],
            NodeKind::FullyConnected => &["Input", "Weights", "Bias"],
            NodeKind::SoftMax => &["Input", "Selected"],
            NodeKind::CrossEntropyLoss => &["P", "Labels"],
            NodeKind::Regression => &["Input", "Expected"],
            NodeKind::Concat { .. } => return None,
            NodeKind::BatchNormalization { .. } => &["Input", "Scale", "Bias", "Mean", "Var"],
            NodeKind::Arithmetic(_) | NodeKind::MatMul => &["LHS", "RHS"],
            NodeKind::Pow { .. } => &["Base"],
            NodeKind::Select => &["Cond", "LHS", "RHS"],
            NodeKind::Splat { .. } => &[],
            NodeKind::BatchedReduceAdd => &["Batch"],
            NodeKind::BatchedAdd => &["Batch", "Slice"],
            NodeKind::Save => &["Input", "Output"],
            NodeKind::QuantizationProfile { .. } => &["Input", "Histogram", "ComputationInfo"],
            NodeKind::Gather => &["Data", "Indices"],
        };
        Some(ports)
    }

    fn output_ports(&self) -> &'static [&'static str] {
        match self {
            NodeKind::TopK { .. } => &["Values", "Indices"],
            NodeKind::CrossEntropyLoss => &["CE"],
            _ => &["Result"],
        }
    }

    /// Expected number of positional inputs; `None` when variadic.
    pub fn num_inputs(&self) -> Option<usize> {
        self.input_ports().map(|ports| ports.len())
    }

    pub fn num_results(&self) -> usize {
        self.output_ports().len()
    }

    /// Port name of input `idx`.
    pub fn input_name(&self, idx: usize) -> String {
        match self.input_ports() {
            Some(ports) => ports
                .get(idx)
                .map(|name| name.to_string())
                .unwrap_or_else(|| format!("Input{idx}")),
            None => format!("Input{idx}"),
        }
    }

    /// Port name of result slot `idx`.
    pub fn output_name(&self, idx: usize) -> String {
        self.output_ports()
            .get(idx)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("Result{idx}"))
    }

    /// Whether consuming input `idx` also writes the producer's buffer in place.
    pub fn is_overwritten_input(&self, idx: usize) -> bool {
        match self {
            NodeKind::Save => idx == 1,
            NodeKind::QuantizationProfile { .. } => idx == 1 || idx == 2,
            _ => false,
        }
    }

    /// Attribute lines for the debug descriptor.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        match self {
            NodeKind::Convolution {
                kernel,
                stride,
                pad,
                depth,
            } => vec![
                ("kernel", kernel.to_string()),
                ("stride", stride.to_string()),
                ("pad", pad.to_string()),
                ("depth", depth.to_string()),
            ],
            NodeKind::PoolMax {
                kernel,
                stride,
                pad,
            }
            | NodeKind::PoolAvg {
                kernel,
                stride,
                pad,
            } => vec![
                ("kernel", kernel.to_string()),
                ("stride", stride.to_string()),
                ("pad", pad.to_string()),
            ],
            NodeKind::Reshape { dims } => vec![("dims", format!("{dims:?}"))],
            NodeKind::Transpose { shuffle } => vec![("shuffle", format!("{shuffle:?}"))],
            NodeKind::Broadcast { shape, axis } => vec![
                ("shape", format!("{shape:?}")),
                ("axis", axis.to_string()),
            ],
            NodeKind::Concat { axis } => vec![("axis", axis.to_string())],
            NodeKind::Slice { start } => vec![("start", format!("{start:?}"))],
            NodeKind::BatchNormalization {
                channel_idx,
                epsilon,
                momentum,
            } => vec![
                ("channelIdx", channel_idx.to_string()),
                ("epsilon", epsilon.to_string()),
                ("momentum", momentum.to_string()),
            ],
            NodeKind::LocalResponseNormalization {
                half_window_size,
                alpha,
                beta,
                k,
            } => vec![
                ("halfWindowSize", half_window_size.to_string()),
                ("alpha", alpha.to_string()),
                ("beta", beta.to_string()),
                ("k", k.to_string()),
            ],
            NodeKind::Pow { exp } => vec![("exp", exp.to_string())],
            NodeKind::Splat { value } => vec![("value", value.to_string())],
            NodeKind::QuantizationProfile { profiled_node_name } => {
                vec![("profiledNodeName", profiled_node_name.clone())]
            }
            NodeKind::TopK { k } => vec![("k", k.to_string())],
            _ => Vec::new(),
        }
    }

    /// Local consistency check over resolved operand and result types.
    ///
    /// Arity has already been checked by the caller.
    pub(crate) fn check(&self, inputs: &[&Type], results: &[&Type]) -> Result<(), String> {
        let result = results[0];
        match self {
            NodeKind::Convolution {
                kernel,
                stride,
                pad,
                depth,
            } => {
                let idim = ShapeNhwc::from_dims(inputs[0].dims())?;
                let (oh, ow) = window_output_dims(idim, *kernel, *stride, *pad)?;
                expect_dims("filter", inputs[1], &[*depth, *kernel, *kernel, idim.c])?;
                if inputs[2].size() != *depth {
                    return Err(format!(
                        "bias has {} elements, expected {depth}",
                        inputs[2].size()
                    ));
                }
                expect_dims("result", result, &[idim.n, oh, ow, *depth])
            }
            NodeKind::PoolMax {
                kernel,
                stride,
                pad,
            }
            | NodeKind::PoolAvg {
                kernel,
                stride,
                pad,
            } => {
                let idim = ShapeNhwc::from_dims(inputs[0].dims())?;
                let (oh, ow) = window_output_dims(idim, *kernel, *stride, *pad)?;
                expect_dims("result", result, &[idim.n, oh, ow, idim.c])
            }
            NodeKind::FullyConnected => {
                let (batch, features) = flatten_cdr(inputs[0].dims())?;
                let weights = inputs[1].dims();
                if weights.len() != 2 || weights[0] != features {
                    return Err(format!(
                        "weights {weights:?} do not accept {features} input features"
                    ));
                }
                if inputs[2].size() != weights[1] {
                    return Err(format!(
                        "bias has {} elements, expected {}",
                        inputs[2].size(),
                        weights[1]
                    ));
                }
                expect_dims("result", result, &[batch, weights[1]])
            }
            NodeKind::Relu
            | NodeKind::Sigmoid
            | NodeKind::Tanh
            | NodeKind::SoftMax
            | NodeKind::LocalResponseNormalization { .. }
            | NodeKind::Pow { .. } => expect_dims("result", result, inputs[0].dims()),
            NodeKind::CrossEntropyLoss => {
                if result.size() != 1 {
                    return Err(format!("loss must be a single element, got {result}"));
                }
                Ok(())
            }
            NodeKind::Regression => {
                expect_dims("expected", inputs[1], inputs[0].dims())?;
                expect_dims("result", result, inputs[0].dims())
            }
            NodeKind::Reshape { dims } => {
                expect_dims("result", result, dims)?;
                let before = checked_element_count(inputs[0].dims())?;
                let after = checked_element_count(result.dims())?;
                if before != after {
                    return Err(format!(
                        "reshape changes element count from {before} to {after}"
                    ));
                }
                Ok(())
            }
            NodeKind::Transpose { shuffle } => {
                let dims = transpose_dims(inputs[0].dims(), shuffle)?;
                expect_dims("result", result, &dims)
            }
            NodeKind::Broadcast { shape, axis } => {
                if axis
                    .checked_add(inputs[0].rank())
                    .map_or(true, |end| end > shape.len())
                {
                    return Err(format!(
                        "input of rank {} placed at axis {axis} does not fit target rank {}",
                        inputs[0].rank(),
                        shape.len()
                    ));
                }
                expect_dims("result", result, shape)
            }
            NodeKind::Concat { axis } => {
                let dims: Vec<&[usize]> = inputs.iter().map(|ty| ty.dims()).collect();
                let out = concat_dims(&dims, *axis)?;
                expect_dims("result", result, &out)
            }
            NodeKind::Slice { start } => {
                let input = inputs[0].dims();
                if start.len() != input.len() || result.rank() != input.len() {
                    return Err(format!(
                        "slice start {start:?} and result {result} do not match input rank {}",
                        input.len()
                    ));
                }
                let end = start
                    .iter()
                    .zip(result.dims())
                    .map(|(s, extent)| s.checked_add(*extent))
                    .collect::<Option<Vec<usize>>>()
                    .ok_or_else(|| format!("slice start {start:?} plus result {result} overflows"))?;
                slice_dims(input, start, &end).map(|_| ())
            }
            NodeKind::BatchNormalization { channel_idx, .. } => {
                let dims = inputs[0].dims();
                let Some(&channels) = dims.get(*channel_idx) else {
                    return Err(format!(
                        "channel index {channel_idx} out of range for rank {}",
                        dims.len()
                    ));
                };
                for (port, param) in ["scale", "bias", "mean", "var"].iter().zip(&inputs[1..]) {
                    if param.size() != channels {
                        return Err(format!(
                            "{port} has {} elements, expected {channels}",
                            param.size()
                        ));
                    }
                }
                expect_dims("result", result, dims)
            }
            NodeKind::Arithmetic(_) => {
                expect_dims("rhs", inputs[1], inputs[0].dims())?;
                expect_dims("result", result, inputs[0].dims())
            }
            NodeKind::Select => {
                expect_dims("lhs", inputs[1], inputs[0].dims())?;
                expect_dims("rhs", inputs[2], inputs[0].dims())?;
                expect_dims("result", result, inputs[0].dims())
            }
            NodeKind::Splat { .. } => Ok(()),
            NodeKind::MatMul => {
                let (lhs, rhs) = (inputs[0].dims(), inputs[1].dims());
                if lhs.len() != 2 || rhs.len() != 2 || lhs[1] != rhs[0] {
                    return Err(format!("cannot multiply {lhs:?} by {rhs:?}"));
                }
                expect_dims("result", result, &[lhs[0], rhs[1]])
            }
            NodeKind::BatchedReduceAdd => {
                let dims = inputs[0].dims();
                if dims.is_empty() {
                    return Err("batch must have rank >= 1".to_string());
                }
                expect_dims("result", result, &dims[1..])
            }
            NodeKind::BatchedAdd => {
                let batch = inputs[0].dims();
                if batch.is_empty() {
                    return Err("batch must have rank >= 1".to_string());
                }
                expect_dims("slice", inputs[1], &batch[1..])?;
                expect_dims("result", result, batch)
            }
            NodeKind::Save => expect_dims("output", inputs[1], inputs[0].dims()),
            NodeKind::QuantizationProfile { .. } => {
                if inputs[1].rank() != 1 {
                    return Err(format!("histogram must have rank 1, got {}", inputs[1]));
                }
                if inputs[2].size() != 2 {
                    return Err(format!(
                        "computation info must hold 2 elements, got {}",
                        inputs[2]
                    ));
                }
                Ok(())
            }
            NodeKind::TopK { k } => {
                let dims = top_k_dims(inputs[0].dims(), *k)?;
                expect_dims("values", result, &dims)?;
                expect_dims("indices", results[1], &dims)?;
                if results[1].elem_kind() != ElemKind::Index {
                    return Err(format!("indices must be of index kind, got {}", results[1]));
                }
                Ok(())
            }
            NodeKind::Gather => {
                let dims = gather_dims(inputs[0].dims(), inputs[1].dims())?;
                expect_dims("result", result, &dims)
            }
            NodeKind::Quantize => {
                if !inputs[0].elem_kind().is_float() || !result.is_quantized() {
                    return Err(format!("cannot quantize {} into {result}", inputs[0]));
                }
                expect_dims("result", result, inputs[0].dims())
            }
            NodeKind::Dequantize => {
                if !inputs[0].is_quantized() || !result.elem_kind().is_float() {
                    return Err(format!("cannot dequantize {} into {result}", inputs[0]));
                }
                expect_dims("result", result, inputs[0].dims())
            }
            NodeKind::RescaleQuantized => {
                if !inputs[0].is_quantized() || !result.is_quantized() {
                    return Err(format!("cannot rescale {} into {result}", inputs[0]));
                }
                expect_dims("result", result, inputs[0].dims())
            }
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn expect_dims(what: &str, ty: &Type, expected: &[usize]) -> Result<(), String> {
    if ty.dims() == expected {
        Ok(())
    } else {
        Err(format!(
            "{what} has shape {:?}, expected {expected:?}",
            ty.dims()
        ))
    }
}
