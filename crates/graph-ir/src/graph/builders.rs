//! Node-builder catalog.
//!
//! Every builder validates its operands, derives result types through the
//! module's type pool, allocates any parameters it was not given, and appends
//! the node. The appended node always passes its own local check.

use crate::graph::error::{GraphError, GraphResult};
use crate::graph::function::FunctionMut;
use crate::graph::ids::{NodeId, NodeRef, NodeValue, VariableId};
use crate::graph::kind::{ArithmeticOp, NodeKind};
use crate::graph::shape_helpers::{
    checked_element_count, flatten_cdr, gather_dims, slice_dims, top_k_dims, transpose_dims, window_output_dims,
    ShapeNhwc,
};
use crate::graph::variable::{InitPolicy, Visibility};
use crate::types::{Dims, ElemKind, Type, TypeRef};

/// Histogram size allocated by [`FunctionMut::create_quantization_profile`].
pub const PROFILE_HISTOGRAM_BUCKETS: usize = 2000;

const DEFAULT_BIAS_FILL: f32 = 0.1;

impl FunctionMut<'_> {
    fn operand(&self, op: &str, value: NodeValue) -> GraphResult<(TypeRef, Type)> {
        let unknown = || GraphError::UnknownOperand {
            op: op.to_string(),
            operand: value,
        };
        let ty = self.type_ref_of(value).map_err(|_| unknown())?;
        let resolved = self.state.types.try_get(ty).ok_or_else(unknown)?;
        Ok((ty, resolved.clone()))
    }

    fn param(&mut self, elem: ElemKind, dims: &[usize], name: &str, init: InitPolicy) -> NodeValue {
        self.state
            .create_variable(Type::new(elem, dims), name, Visibility::Private, init)
            .into()
    }

    fn producer_name(&self, value: NodeValue) -> String {
        let name = match value.producer {
            NodeRef::Variable(id) => self.state.variables.get(&id).map(|v| v.name()),
            NodeRef::Node(id) => self.function.node(id).map(|n| n.name()),
        };
        name.unwrap_or_default().to_string()
    }

    fn append(
        &mut self,
        kind: NodeKind,
        name: &str,
        inputs: &[NodeValue],
        results: &[TypeRef],
    ) -> GraphResult<NodeId> {
        {
            let mut input_types = Vec::with_capacity(inputs.len());
            for value in inputs {
                input_types.push(self.type_of(*value)?);
            }
            let mut result_types = Vec::with_capacity(results.len());
            for &ty in results {
                let resolved = self
                    .state
                    .types
                    .try_get(ty)
                    .ok_or_else(|| GraphError::UnknownType {
                        op: name.to_string(),
                        ty,
                    })?;
                result_types.push(resolved);
            }
            kind.check(&input_types, &result_types)
                .map_err(|detail| GraphError::attr(name, detail))?;
        }
        self.add_node(kind, name, inputs, results)
    }

    // --- convolution and pooling ---

    /// Convolution with freshly allocated filter (`depth x k x k x C`, Xavier)
    /// and bias (`depth`, constant 0.1).
    pub fn create_conv(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        depth: usize,
        kernel: usize,
        stride: usize,
        pad: usize,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (_, in_ty) = self.operand(name, input)?;
        let idim = nhwc(name, &in_ty)?;
        let (oh, ow) =
            window_output_dims(idim, kernel, stride, pad).map_err(|d| GraphError::attr(name, d))?;
        if depth == 0 {
            return Err(GraphError::attr(name, "depth must be positive"));
        }

        let fan_in = checked_element_count(&[kernel, kernel, idim.c])
            .map_err(|d| GraphError::attr(name, d))? as f32;
        let filter = self.param(
            ElemKind::Float,
            &[depth, kernel, kernel, idim.c],
            "filter",
            InitPolicy::Xavier(fan_in),
        );
        let bias = self.param(
            ElemKind::Float,
            &[depth],
            "bias",
            InitPolicy::Broadcast(DEFAULT_BIAS_FILL),
        );
        let out = self
            .state
            .types
            .intern_dims(ElemKind::Float, &[idim.n, oh, ow, depth]);
        self.append(
            NodeKind::Convolution {
                kernel,
                stride,
                pad,
                depth,
            },
            name,
            &[input, filter, bias],
            &[out],
        )
    }

    /// Convolution over caller-supplied parameters and result type.
    #[allow(clippy::too_many_arguments)]
    pub fn create_conv_with(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        filter: impl Into<NodeValue>,
        bias: impl Into<NodeValue>,
        out_ty: Type,
        depth: usize,
        kernel: usize,
        stride: usize,
        pad: usize,
    ) -> GraphResult<NodeId> {
        let (input, filter, bias) = (input.into(), filter.into(), bias.into());
        let (_, in_ty) = self.operand(name, input)?;
        let (_, filter_ty) = self.operand(name, filter)?;
        let (_, bias_ty) = self.operand(name, bias)?;
        let idim = nhwc(name, &in_ty)?;
        let (oh, ow) =
            window_output_dims(idim, kernel, stride, pad).map_err(|d| GraphError::attr(name, d))?;
        let filter_dims = [depth, kernel, kernel, idim.c];
        if filter_ty.dims() != filter_dims {
            return Err(GraphError::shape(name, &filter_dims, filter_ty.dims()));
        }
        if bias_ty.size() != depth {
            return Err(GraphError::shape(name, &[depth], bias_ty.dims()));
        }
        let out_dims = [idim.n, oh, ow, depth];
        if out_ty.dims() != out_dims {
            return Err(GraphError::shape(name, &out_dims, out_ty.dims()));
        }
        let out = self.state.types.intern(out_ty);
        self.append(
            NodeKind::Convolution {
                kernel,
                stride,
                pad,
                depth,
            },
            name,
            &[input, filter, bias],
            &[out],
        )
    }

    pub fn create_pool_max(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        kernel: usize,
        stride: usize,
        pad: usize,
    ) -> GraphResult<NodeId> {
        self.create_pool(NodeKind::PoolMax { kernel, stride, pad }, name, input.into())
    }

    pub fn create_pool_avg(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        kernel: usize,
        stride: usize,
        pad: usize,
    ) -> GraphResult<NodeId> {
        self.create_pool(NodeKind::PoolAvg { kernel, stride, pad }, name, input.into())
    }

    fn create_pool(&mut self, kind: NodeKind, name: &str, input: NodeValue) -> GraphResult<NodeId> {
        let (NodeKind::PoolMax {
            kernel,
            stride,
            pad,
        }
        | NodeKind::PoolAvg {
            kernel,
            stride,
            pad,
        }) = kind
        else {
            return Err(GraphError::attr(name, format!("{kind} is not a pooling kind")));
        };
        let (in_ref, in_ty) = self.operand(name, input)?;
        let idim = nhwc(name, &in_ty)?;
        let (oh, ow) =
            window_output_dims(idim, kernel, stride, pad).map_err(|d| GraphError::attr(name, d))?;
        let out = self
            .state
            .types
            .with_new_shape(in_ref, &[idim.n, oh, ow, idim.c]);
        self.append(kind, name, &[input], &[out])
    }

    // --- dense layers ---

    /// Fully connected layer with freshly allocated weights (Xavier) and bias
    /// (constant 0.1). All dimensions but the first are flattened.
    pub fn create_fully_connected(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        out_depth: usize,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (_, in_ty) = self.operand(name, input)?;
        let (batch, features) = flatten_cdr(in_ty.dims()).map_err(|d| GraphError::attr(name, d))?;
        if out_depth == 0 {
            return Err(GraphError::attr(name, "output depth must be positive"));
        }
        let elem = in_ty.elem_kind();
        let weights = self.param(
            elem,
            &[features, out_depth],
            "weights",
            InitPolicy::Xavier(features as f32),
        );
        let bias = self.param(
            elem,
            &[out_depth],
            "bias",
            InitPolicy::Broadcast(DEFAULT_BIAS_FILL),
        );
        let out = self.state.types.intern_dims(elem, &[batch, out_depth]);
        self.append(
            NodeKind::FullyConnected,
            name,
            &[input, weights, bias],
            &[out],
        )
    }

    pub fn create_fully_connected_with(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        weights: impl Into<NodeValue>,
        bias: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let (input, weights, bias) = (input.into(), weights.into(), bias.into());
        let (in_ref, in_ty) = self.operand(name, input)?;
        let (_, w_ty) = self.operand(name, weights)?;
        let (_, b_ty) = self.operand(name, bias)?;
        let (batch, features) = flatten_cdr(in_ty.dims()).map_err(|d| GraphError::attr(name, d))?;
        if w_ty.rank() != 2 {
            return Err(GraphError::rank(name, 2, w_ty.rank()));
        }
        let out_depth = w_ty.dims()[1];
        if w_ty.dims()[0] != features {
            return Err(GraphError::shape(name, &[features, out_depth], w_ty.dims()));
        }
        if b_ty.size() != out_depth {
            return Err(GraphError::shape(name, &[out_depth], b_ty.dims()));
        }
        let out = self.state.types.with_new_shape(in_ref, &[batch, out_depth]);
        self.append(
            NodeKind::FullyConnected,
            name,
            &[input, weights, bias],
            &[out],
        )
    }

    // --- activations and losses ---

    pub fn create_relu(&mut self, name: &str, input: impl Into<NodeValue>) -> GraphResult<NodeId> {
        self.create_unary(NodeKind::Relu, name, input.into())
    }

    pub fn create_sigmoid(&mut self, name: &str, input: impl Into<NodeValue>) -> GraphResult<NodeId> {
        self.create_unary(NodeKind::Sigmoid, name, input.into())
    }

    pub fn create_tanh(&mut self, name: &str, input: impl Into<NodeValue>) -> GraphResult<NodeId> {
        self.create_unary(NodeKind::Tanh, name, input.into())
    }

    fn create_unary(&mut self, kind: NodeKind, name: &str, input: NodeValue) -> GraphResult<NodeId> {
        let (ty, _) = self.operand(name, input)?;
        self.append(kind, name, &[input], &[ty])
    }

    pub fn create_softmax(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        selected: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let (input, selected) = (input.into(), selected.into());
        let (ty, _) = self.operand(name, input)?;
        self.operand(name, selected)?;
        self.append(NodeKind::SoftMax, name, &[input, selected], &[ty])
    }

    /// Cross-entropy loss; the result is a single element.
    pub fn create_cross_entropy_loss(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        labels: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let (input, labels) = (input.into(), labels.into());
        let (in_ref, _) = self.operand(name, input)?;
        self.operand(name, labels)?;
        let out = self.state.types.with_new_shape(in_ref, &[1]);
        self.append(NodeKind::CrossEntropyLoss, name, &[input, labels], &[out])
    }

    pub fn create_regression(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        expected: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let (input, expected) = (input.into(), expected.into());
        let (ty, in_ty) = self.operand(name, input)?;
        let (_, exp_ty) = self.operand(name, expected)?;
        if exp_ty.dims() != in_ty.dims() {
            return Err(GraphError::shape(name, in_ty.dims(), exp_ty.dims()));
        }
        self.append(NodeKind::Regression, name, &[input, expected], &[ty])
    }

    // --- shape manipulation ---

    /// Reinterprets the input under `dims`; the element count must not change.
    pub fn create_reshape(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        dims: &[usize],
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (in_ref, in_ty) = self.operand(name, input)?;
        let size = checked_element_count(dims).map_err(|d| GraphError::attr(name, d))?;
        let in_size =
            checked_element_count(in_ty.dims()).map_err(|d| GraphError::attr(name, d))?;
        if size != in_size {
            return Err(GraphError::attr(
                name,
                format!("cannot reshape {in_size} elements into {dims:?} ({size} elements)"),
            ));
        }
        let out = self.state.types.with_new_shape(in_ref, dims);
        self.append(
            NodeKind::Reshape {
                dims: dims.to_vec(),
            },
            name,
            &[input],
            &[out],
        )
    }

    pub fn create_transpose(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        shuffle: &[usize],
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (in_ref, in_ty) = self.operand(name, input)?;
        let dims = transpose_dims(in_ty.dims(), shuffle).map_err(|d| GraphError::attr(name, d))?;
        let out = self.state.types.with_new_shape(in_ref, &dims);
        self.append(
            NodeKind::Transpose {
                shuffle: shuffle.to_vec(),
            },
            name,
            &[input],
            &[out],
        )
    }

    /// Broadcasts `input` into `shape`, aligning its first axis with `axis`.
    /// Each input extent must be 1 or equal to the target extent.
    pub fn create_broadcast(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        shape: &[usize],
        axis: usize,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (_, in_ty) = self.operand(name, input)?;
        if axis.checked_add(in_ty.rank()).map_or(true, |end| end > shape.len()) {
            return Err(GraphError::attr(
                name,
                format!(
                    "input {in_ty} placed at axis {axis} does not fit target shape {shape:?}"
                ),
            ));
        }
        for (idx, &extent) in in_ty.dims().iter().enumerate() {
            let target = shape[axis + idx];
            if extent != 1 && extent != target {
                return Err(GraphError::attr(
                    name,
                    format!("extent {extent} on input axis {idx} cannot broadcast to {target}"),
                ));
            }
        }
        let out = self.state.types.intern_dims(in_ty.elem_kind(), shape);
        self.append(
            NodeKind::Broadcast {
                shape: shape.to_vec(),
                axis,
            },
            name,
            &[input],
            &[out],
        )
    }

    /// Stacks `inputs` along `axis`. Every input must match the first one on
    /// element kind and on every other axis.
    pub fn create_concat(
        &mut self,
        name: &str,
        inputs: &[NodeValue],
        axis: usize,
    ) -> GraphResult<NodeId> {
        let Some(&first) = inputs.first() else {
            return Err(GraphError::attr(name, "concat needs at least one input"));
        };
        let (first_ref, first_ty) = self.operand(name, first)?;
        if axis >= first_ty.rank() {
            return Err(GraphError::attr(
                name,
                format!("axis {axis} out of range for {first_ty}"),
            ));
        }
        let mut out_dims = Dims::from_slice(first_ty.dims());
        for &value in &inputs[1..] {
            let (_, ty) = self.operand(name, value)?;
            if ty.elem_kind() != first_ty.elem_kind() {
                return Err(GraphError::elem(
                    name,
                    format!("{ty} does not match {first_ty}"),
                ));
            }
            if ty.rank() != first_ty.rank() {
                return Err(GraphError::rank(name, first_ty.rank(), ty.rank()));
            }
            let mismatch = ty
                .dims()
                .iter()
                .zip(first_ty.dims())
                .enumerate()
                .any(|(idx, (a, b))| idx != axis && a != b);
            if mismatch {
                let mut expected = ty.dims().to_vec();
                for (idx, slot) in expected.iter_mut().enumerate() {
                    if idx != axis {
                        *slot = first_ty.dims()[idx];
                    }
                }
                return Err(GraphError::shape(name, &expected, ty.dims()));
            }
            out_dims[axis] = out_dims[axis].checked_add(ty.dims()[axis]).ok_or_else(|| {
                GraphError::attr(name, format!("concatenated extent on axis {axis} overflows"))
            })?;
        }
        let out = self.state.types.with_new_shape(first_ref, &out_dims);
        self.append(NodeKind::Concat { axis }, name, inputs, &[out])
    }

    /// Extracts `[begin, end)` on every axis.
    pub fn create_slice(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        begin: &[usize],
        end: &[usize],
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (in_ref, in_ty) = self.operand(name, input)?;
        let dims = slice_dims(in_ty.dims(), begin, end).map_err(|d| GraphError::attr(name, d))?;
        let out = self.state.types.with_new_shape(in_ref, &dims);
        self.append(
            NodeKind::Slice {
                start: begin.to_vec(),
            },
            name,
            &[input],
            &[out],
        )
    }

    // --- normalization ---

    /// Batch normalization with freshly allocated `beta` (0), `gamma` (1),
    /// `mean` and `variance` variables sized by the channel axis.
    pub fn create_batch_normalization(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        channel_idx: usize,
        epsilon: f32,
        momentum: f32,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (_, in_ty) = self.operand(name, input)?;
        let Some(&channels) = in_ty.dims().get(channel_idx) else {
            return Err(GraphError::attr(
                name,
                format!("channel index {channel_idx} out of range for {in_ty}"),
            ));
        };
        let beta = self.param(ElemKind::Float, &[channels], "beta", InitPolicy::Broadcast(0.0));
        let gamma = self.param(ElemKind::Float, &[channels], "gamma", InitPolicy::Broadcast(1.0));
        let mean = self.param(ElemKind::Float, &[channels], "mean", InitPolicy::None);
        let variance = self.param(ElemKind::Float, &[channels], "variance", InitPolicy::None);
        self.create_batch_normalization_with(
            name,
            input,
            beta,
            gamma,
            mean,
            variance,
            channel_idx,
            epsilon,
            momentum,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_batch_normalization_with(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        beta: impl Into<NodeValue>,
        gamma: impl Into<NodeValue>,
        mean: impl Into<NodeValue>,
        variance: impl Into<NodeValue>,
        channel_idx: usize,
        epsilon: f32,
        momentum: f32,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let params: [NodeValue; 4] = [gamma.into(), beta.into(), mean.into(), variance.into()];
        let (ty, in_ty) = self.operand(name, input)?;
        let Some(&channels) = in_ty.dims().get(channel_idx) else {
            return Err(GraphError::attr(
                name,
                format!("channel index {channel_idx} out of range for {in_ty}"),
            ));
        };
        for value in params {
            let (_, param_ty) = self.operand(name, value)?;
            if param_ty.size() != channels {
                return Err(GraphError::shape(name, &[channels], param_ty.dims()));
            }
        }
        let [gamma, beta, mean, variance] = params;
        self.append(
            NodeKind::BatchNormalization {
                channel_idx,
                epsilon,
                momentum,
            },
            name,
            &[input, gamma, beta, mean, variance],
            &[ty],
        )
    }

    pub fn create_local_response_normalization(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        half_window_size: usize,
        alpha: f32,
        beta: f32,
        k: f32,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (ty, _) = self.operand(name, input)?;
        self.append(
            NodeKind::LocalResponseNormalization {
                half_window_size,
                alpha,
                beta,
                k,
            },
            name,
            &[input],
            &[ty],
        )
    }

    // --- elementwise ---

    /// Elementwise binary operator over operands of identical shape. The
    /// result takes the left operand's type.
    pub fn create_arithmetic(
        &mut self,
        op: ArithmeticOp,
        name: &str,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let (ty, lhs_ty) = self.operand(name, lhs)?;
        let (_, rhs_ty) = self.operand(name, rhs)?;
        if lhs_ty.dims() != rhs_ty.dims() {
            return Err(GraphError::shape(name, lhs_ty.dims(), rhs_ty.dims()));
        }
        self.append(NodeKind::Arithmetic(op), name, &[lhs, rhs], &[ty])
    }

    pub fn create_add(
        &mut self,
        name: &str,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        self.create_arithmetic(ArithmeticOp::Add, name, lhs, rhs)
    }

    pub fn create_sub(
        &mut self,
        name: &str,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        self.create_arithmetic(ArithmeticOp::Sub, name, lhs, rhs)
    }

    pub fn create_mul(
        &mut self,
        name: &str,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        self.create_arithmetic(ArithmeticOp::Mul, name, lhs, rhs)
    }

    pub fn create_div(
        &mut self,
        name: &str,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        self.create_arithmetic(ArithmeticOp::Div, name, lhs, rhs)
    }

    pub fn create_max(
        &mut self,
        name: &str,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        self.create_arithmetic(ArithmeticOp::Max, name, lhs, rhs)
    }

    pub fn create_min(
        &mut self,
        name: &str,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        self.create_arithmetic(ArithmeticOp::Min, name, lhs, rhs)
    }

    pub fn create_cmp_lte(
        &mut self,
        name: &str,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        self.create_arithmetic(ArithmeticOp::CmpLte, name, lhs, rhs)
    }

    pub fn create_pow(
        &mut self,
        name: &str,
        base: impl Into<NodeValue>,
        exp: f32,
    ) -> GraphResult<NodeId> {
        let base = base.into();
        let (ty, _) = self.operand(name, base)?;
        self.append(NodeKind::Pow { exp }, name, &[base], &[ty])
    }

    pub fn create_select(
        &mut self,
        name: &str,
        cond: impl Into<NodeValue>,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let (cond, lhs, rhs) = (cond.into(), lhs.into(), rhs.into());
        let (_, cond_ty) = self.operand(name, cond)?;
        let (ty, lhs_ty) = self.operand(name, lhs)?;
        let (_, rhs_ty) = self.operand(name, rhs)?;
        if lhs_ty.dims() != rhs_ty.dims() {
            return Err(GraphError::shape(name, lhs_ty.dims(), rhs_ty.dims()));
        }
        if cond_ty.dims() != rhs_ty.dims() {
            return Err(GraphError::shape(name, rhs_ty.dims(), cond_ty.dims()));
        }
        self.append(NodeKind::Select, name, &[cond, lhs, rhs], &[ty])
    }

    /// Tensor of type `ty` filled with `value`.
    pub fn create_splat(&mut self, name: &str, ty: Type, value: f32) -> GraphResult<NodeId> {
        let ty = self.state.types.intern(ty);
        self.append(NodeKind::Splat { value }, name, &[], &[ty])
    }

    // --- linear algebra ---

    pub fn create_matmul(
        &mut self,
        name: &str,
        lhs: impl Into<NodeValue>,
        rhs: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let (lhs_ref, lhs_ty) = self.operand(name, lhs)?;
        let (_, rhs_ty) = self.operand(name, rhs)?;
        if lhs_ty.rank() != 2 {
            return Err(GraphError::rank(name, 2, lhs_ty.rank()));
        }
        if rhs_ty.rank() != 2 {
            return Err(GraphError::rank(name, 2, rhs_ty.rank()));
        }
        if lhs_ty.elem_kind() != rhs_ty.elem_kind() {
            return Err(GraphError::elem(
                name,
                format!("{lhs_ty} and {rhs_ty} differ in element kind"),
            ));
        }
        let (l, r) = (lhs_ty.dims(), rhs_ty.dims());
        if l[1] != r[0] {
            return Err(GraphError::shape(name, &[l[1], r[1]], r));
        }
        let out = self.state.types.with_new_shape(lhs_ref, &[l[0], r[1]]);
        self.append(NodeKind::MatMul, name, &[lhs, rhs], &[out])
    }

    /// Sums the batch along its first axis.
    pub fn create_batched_reduce_add(
        &mut self,
        name: &str,
        batch: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let batch = batch.into();
        let (_, batch_ty) = self.operand(name, batch)?;
        let Some((_, rest)) = batch_ty.dims().split_first() else {
            return Err(GraphError::rank(name, 1, 0));
        };
        let out = self.state.types.intern_dims(batch_ty.elem_kind(), rest);
        self.append(NodeKind::BatchedReduceAdd, name, &[batch], &[out])
    }

    /// Adds `slice` to every entry of `batch` along its first axis.
    pub fn create_batched_add(
        &mut self,
        name: &str,
        batch: impl Into<NodeValue>,
        slice: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let (batch, slice) = (batch.into(), slice.into());
        let (ty, batch_ty) = self.operand(name, batch)?;
        let (_, slice_ty) = self.operand(name, slice)?;
        let Some((_, rest)) = batch_ty.dims().split_first() else {
            return Err(GraphError::rank(name, 1, 0));
        };
        if slice_ty.dims() != rest {
            return Err(GraphError::shape(name, rest, slice_ty.dims()));
        }
        self.append(NodeKind::BatchedAdd, name, &[batch, slice], &[ty])
    }

    // --- outputs and profiling ---

    /// Stores `input` into a new public variable named after `name`. The node
    /// itself is named `_save_<name>`.
    pub fn create_save(&mut self, name: &str, input: impl Into<NodeValue>) -> GraphResult<NodeId> {
        let input = input.into();
        let (_, in_ty) = self.operand(name, input)?;
        let dest = self
            .state
            .create_variable(in_ty, name, Visibility::Public, InitPolicy::None);
        self.create_save_to(&format!("_save_{name}"), input, dest)
    }

    /// Stores `input` into an existing variable of the same shape.
    pub fn create_save_to(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        output: VariableId,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let output = NodeValue::from(output);
        let (_, in_ty) = self.operand(name, input)?;
        let (_, out_ty) = self.operand(name, output)?;
        if in_ty.dims() != out_ty.dims() {
            return Err(GraphError::shape(name, in_ty.dims(), out_ty.dims()));
        }
        let void = self.state.types.void_type();
        self.append(NodeKind::Save, name, &[input, output], &[void])
    }

    /// Attaches a profiling node to `input`, backed by a histogram and a
    /// two-element (min, max) variable that it updates in place.
    pub fn create_quantization_profile(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        self.operand(name, input)?;
        let profiled_node_name = self.producer_name(input);
        let histogram = self.param(
            ElemKind::Float,
            &[PROFILE_HISTOGRAM_BUCKETS],
            "histogram",
            InitPolicy::None,
        );
        let info = self.param(ElemKind::Float, &[2], "computationInfo", InitPolicy::None);
        let void = self.state.types.void_type();
        self.append(
            NodeKind::QuantizationProfile { profiled_node_name },
            name,
            &[input, histogram, info],
            &[void],
        )
    }

    // --- selection ---

    /// Largest `k` entries along the innermost axis: values, then `Index`
    /// positions.
    pub fn create_top_k(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        k: usize,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (_, in_ty) = self.operand(name, input)?;
        let dims = top_k_dims(in_ty.dims(), k).map_err(|d| GraphError::attr(name, d))?;
        let values = self.state.types.intern_dims(in_ty.elem_kind(), &dims);
        let indices = self.state.types.intern_dims(ElemKind::Index, &dims);
        self.append(NodeKind::TopK { k }, name, &[input], &[values, indices])
    }

    pub fn create_gather(
        &mut self,
        name: &str,
        data: impl Into<NodeValue>,
        indices: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let (data, indices) = (data.into(), indices.into());
        let (data_ref, data_ty) = self.operand(name, data)?;
        let (_, idx_ty) = self.operand(name, indices)?;
        let dims = gather_dims(data_ty.dims(), idx_ty.dims()).map_err(|d| GraphError::attr(name, d))?;
        let out = self.state.types.with_new_shape(data_ref, &dims);
        self.append(NodeKind::Gather, name, &[data, indices], &[out])
    }

    // --- quantization ---

    /// Converts a float tensor into the quantized type `out_ty`.
    pub fn create_quantize(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        out_ty: Type,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (_, in_ty) = self.operand(name, input)?;
        if in_ty.elem_kind() != ElemKind::Float {
            return Err(GraphError::elem(name, format!("input {in_ty} is not float")));
        }
        if out_ty.elem_kind() != ElemKind::Int8Q || !out_ty.is_quantized() {
            return Err(GraphError::elem(
                name,
                format!("output {out_ty} is not an i8q type"),
            ));
        }
        if in_ty.dims() != out_ty.dims() {
            return Err(GraphError::shape(name, in_ty.dims(), out_ty.dims()));
        }
        let out = self.state.types.intern(out_ty);
        self.append(NodeKind::Quantize, name, &[input], &[out])
    }

    pub fn create_dequantize(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (_, in_ty) = self.operand(name, input)?;
        if in_ty.elem_kind() != ElemKind::Int8Q {
            return Err(GraphError::elem(name, format!("input {in_ty} is not i8q")));
        }
        let out = self.state.types.intern_dims(ElemKind::Float, in_ty.dims());
        self.append(NodeKind::Dequantize, name, &[input], &[out])
    }

    /// Requantizes `input` into `out_ty` (both `Int8Q`, same shape).
    pub fn create_rescale_quantized(
        &mut self,
        name: &str,
        input: impl Into<NodeValue>,
        out_ty: Type,
    ) -> GraphResult<NodeId> {
        let input = input.into();
        let (_, in_ty) = self.operand(name, input)?;
        if in_ty.elem_kind() != ElemKind::Int8Q {
            return Err(GraphError::elem(name, format!("input {in_ty} is not i8q")));
        }
        if out_ty.elem_kind() != ElemKind::Int8Q || !out_ty.is_quantized() {
            return Err(GraphError::elem(
                name,
                format!("output {out_ty} is not an i8q type"),
            ));
        }
        if in_ty.dims() != out_ty.dims() {
            return Err(GraphError::shape(name, in_ty.dims(), out_ty.dims()));
        }
        let out = self.state.types.intern(out_ty);
        self.append(NodeKind::RescaleQuantized, name, &[input], &[out])
    }
}

fn nhwc(op: &str, ty: &Type) -> GraphResult<ShapeNhwc> {
    if ty.rank() != 4 {
        return Err(GraphError::rank(op, 4, ty.rank()));
    }
    ShapeNhwc::from_dims(ty.dims()).map_err(|d| GraphError::attr(op, d))
}
