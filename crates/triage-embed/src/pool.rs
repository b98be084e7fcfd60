use anyhow::{Result, bail};
use candle_core::{DType, Tensor};

/// How token states are reduced to one vector. BGE-M3 dense retrieval uses
/// the CLS state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pooling {
    #[default]
    Cls,
    Mean,
}

/// Pool `[B,T,H]` hidden states to `[B,H]` and L2-normalise each row.
pub fn pool_l2(hidden: &Tensor, attention_mask: &Tensor, pooling: Pooling) -> Result<Tensor> {
    let dims = hidden.dims();
    if dims.len() != 3 {
        bail!("hidden shape must be [B,T,H], got {:?}", dims);
    }
    let (batch, hidden_dim) = (dims[0], dims[2]);

    let pooled = match pooling {
        Pooling::Cls => hidden.narrow(1, 0, 1)?.squeeze(1)?,
        Pooling::Mean => {
            let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
            let mask_b = mask.unsqueeze(2)?.broadcast_as(hidden.shape())?;
            let sum = (hidden * &mask_b)?.sum(1)?;
            let lengths = mask.sum_keepdim(1)?.to_dtype(sum.dtype())?;
            sum.broadcast_div(&lengths)?
        }
    };

    let eps_val = match hidden.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(0)?;
    let norm = pooled.sqr()?.sum_keepdim(1)?.sqrt()?.broadcast_add(&eps)?;
    let out = pooled.broadcast_div(&norm)?;
    if out.dims() != [batch, hidden_dim].as_slice() {
        bail!("pooled shape {:?} != [{batch}, {hidden_dim}]", out.dims());
    }
    Ok(out)
}
