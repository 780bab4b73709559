//! # 张量组装
//!
//! `Tensor` 包装一个行优先的 `ndarray::ArrayD<f32>`（批维在前，`[N, C, H, W]`）。
//! 构造时校验元素数与形状一致，推理引擎拿到的永远是自洽的值；
//! `data()` / `shape()` 只是底层数组的薄视图。

use ndarray::{Array, ArrayD, ArrayViewD, Axis, Dimension, IxDyn};

use crate::PipelineError;

/// 元素类型标签。当前所有模型输入输出都是 float32。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Float32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    element_type: ElementType,
    array: ArrayD<f32>,
}

impl Tensor {
    /// 包装平铺数据，不复制、不改变数值。
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> Result<Self, PipelineError> {
        let expected = element_count(&shape)?;
        let len = data.len();
        let array = ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|e| {
            PipelineError::ShapeMismatch(format!(
                "数据长度 {} 与形状 {:?}（{} 个元素）不一致：{}",
                len, shape, expected, e
            ))
        })?;

        Ok(Self::from_array(array))
    }

    /// 接管任意维度的数组；非行优先布局会先整理成行优先。
    pub fn from_array<D: Dimension>(array: Array<f32, D>) -> Self {
        let array = array.into_dyn();
        let array = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };

        Self {
            element_type: ElementType::Float32,
            array,
        }
    }

    pub fn zeros(shape: Vec<usize>) -> Result<Self, PipelineError> {
        Self::filled(shape, 0.0)
    }

    pub fn filled(shape: Vec<usize>, value: f32) -> Result<Self, PipelineError> {
        element_count(&shape)?;
        Ok(Self::from_array(ArrayD::from_elem(IxDyn(&shape), value)))
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn shape(&self) -> &[usize] {
        self.array.shape()
    }

    /// 行优先的平铺视图。
    pub fn data(&self) -> &[f32] {
        self.array.as_slice().unwrap_or(&[])
    }

    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.array.view()
    }

    pub fn array(&self) -> &ArrayD<f32> {
        &self.array
    }

    pub fn into_array(self) -> ArrayD<f32> {
        self.array
    }

    pub fn into_data(self) -> Vec<f32> {
        self.array.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// 在不改变数据的前提下换一个形状，元素总数必须一致。
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, PipelineError> {
        element_count(&shape)?;
        let from = self.array.shape().to_vec();
        let array = self
            .array
            .into_shape_with_order(IxDyn(&shape))
            .map_err(|e| {
                PipelineError::ShapeMismatch(format!("形状 {:?} 不能变为 {:?}：{}", from, shape, e))
            })?;
        Ok(Self::from_array(array))
    }

    /// 把多个单样本张量合成一个批。
    ///
    /// 所有输入的形状必须完全相同：
    /// - `[1, C, H, W]` 沿第 0 轴拼接，得到 `[N, C, H, W]`；
    /// - `[C, H, W]` 沿新的第 0 轴堆叠，同样得到 `[N, C, H, W]`。
    ///
    /// 其他秩或批维不为 1 的输入一律返回 `ShapeMismatch`。
    pub fn batch(tensors: &[Tensor]) -> Result<Tensor, PipelineError> {
        let first = tensors
            .first()
            .ok_or_else(|| PipelineError::ShapeMismatch("不能对空列表做批处理".to_string()))?;

        for (i, tensor) in tensors.iter().enumerate() {
            if tensor.shape() != first.shape() {
                return Err(PipelineError::ShapeMismatch(format!(
                    "第 {} 个张量形状 {:?} 与第一个 {:?} 不一致",
                    i,
                    tensor.shape(),
                    first.shape()
                )));
            }
        }

        let views: Vec<ArrayViewD<'_, f32>> = tensors.iter().map(Tensor::view).collect();
        let stacked = match first.shape() {
            [1, _, _, _] => ndarray::concatenate(Axis(0), &views),
            [_, _, _] => ndarray::stack(Axis(0), &views),
            other => {
                return Err(PipelineError::ShapeMismatch(format!(
                    "只能批处理 [1,C,H,W] 或 [C,H,W] 张量，收到 {:?}",
                    other
                )));
            }
        }
        .map_err(|e| PipelineError::ShapeMismatch(format!("批处理失败：{}", e)))?;

        log::debug!("批处理 {} 个张量 -> {:?}", tensors.len(), stacked.shape());
        Ok(Tensor::from_array(stacked))
    }
}

fn element_count(shape: &[usize]) -> Result<usize, PipelineError> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .filter(|&count| count <= isize::MAX as usize)
        .ok_or_else(|| PipelineError::ResourceLimit(format!("形状 {:?} 元素数溢出", shape)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn new_validates_element_count() {
        assert!(Tensor::new(vec![0.0; 6], vec![1, 2, 3]).is_ok());
        assert!(matches!(
            Tensor::new(vec![0.0; 5], vec![1, 2, 3]),
            Err(PipelineError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn overflowing_shape_is_a_resource_error() {
        assert!(matches!(
            Tensor::zeros(vec![usize::MAX, 2]),
            Err(PipelineError::ResourceLimit(_))
        ));
    }

    #[test]
    fn batch_concatenates_single_item_batches() {
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![1, 1, 2, 2]).expect("valid");
        let b = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], vec![1, 1, 2, 2]).expect("valid");

        let batched = Tensor::batch(&[a, b]).expect("batch should succeed");

        assert_eq!(batched.shape(), &[2, 1, 2, 2]);
        assert_eq!(batched.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn batch_stacks_chw_items_along_new_axis() {
        let a = Tensor::filled(vec![3, 2, 2], 1.0).expect("valid");
        let b = Tensor::filled(vec![3, 2, 2], 2.0).expect("valid");

        let batched = Tensor::batch(&[a, b]).expect("batch should succeed");

        assert_eq!(batched.shape(), &[2, 3, 2, 2]);
        assert!(batched.data()[..12].iter().all(|&v| v == 1.0));
        assert!(batched.data()[12..].iter().all(|&v| v == 2.0));
    }

    #[test]
    fn batch_rejects_multi_item_or_unsupported_rank() {
        let multi = Tensor::zeros(vec![2, 3, 4, 4]).expect("valid");
        assert!(matches!(
            Tensor::batch(&[multi.clone(), multi]),
            Err(PipelineError::ShapeMismatch(_))
        ));

        let flat = Tensor::zeros(vec![4]).expect("valid");
        assert!(matches!(
            Tensor::batch(&[flat.clone(), flat]),
            Err(PipelineError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn batch_rejects_mismatched_shapes() {
        let a = Tensor::zeros(vec![1, 3, 4, 4]).expect("valid");
        let b = Tensor::zeros(vec![1, 3, 4, 5]).expect("valid");
        assert!(matches!(
            Tensor::batch(&[a, b]),
            Err(PipelineError::ShapeMismatch(_))
        ));

        let c = Tensor::zeros(vec![3, 4, 4]).expect("valid");
        let d = Tensor::zeros(vec![1, 3, 4, 4]).expect("valid");
        assert!(Tensor::batch(&[c, d]).is_err());
    }

    #[test]
    fn batch_rejects_empty_input() {
        assert!(Tensor::batch(&[]).is_err());
    }

    #[test]
    fn from_array_keeps_row_major_order() {
        // 转置后的数组不是行优先布局，data() 仍应按逻辑顺序给出
        let array = Array3::from_shape_fn((1, 2, 3), |(_, y, x)| (y * 3 + x) as f32);
        let transposed = array.permuted_axes([0, 2, 1]);

        let tensor = Tensor::from_array(transposed);

        assert_eq!(tensor.shape(), &[1, 3, 2]);
        assert_eq!(tensor.data(), &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
    }

    #[test]
    fn filled_and_reshape() {
        let t = Tensor::filled(vec![1, 1, 2, 2], 1.0).expect("valid");
        assert!(t.data().iter().all(|&v| v == 1.0));

        let reshaped = t.reshape(vec![4]).expect("same element count");
        assert_eq!(reshaped.shape(), &[4]);
        assert_eq!(reshaped.element_type(), ElementType::Float32);
        assert!(reshaped.reshape(vec![3]).is_err());
    }
}
