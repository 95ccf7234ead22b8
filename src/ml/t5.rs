// ============================================================
// Layer 5 — T5 Encoder-Decoder
// ============================================================
// Burn port of the T5 v1.0 architecture so pretrained t5-base
// weights can be loaded and fine-tuned.
//
//   input_ids ──shared──► encoder stack ──► encoder hidden
//                                                │
//   decoder_input_ids ──shared──► decoder stack ◄┘ (cross-attn)
//                                      │
//                                   lm_head ──► logits [B, T, V]
//
// Things that differ from a textbook transformer:
//   - RMS layer norm with a scale only (no mean, no bias)
//   - pre-norm residual blocks
//   - attention scores are NOT divided by sqrt(d_kv)
//   - no absolute positions; a learned bias per (head, bucket)
//     of the key-query distance is added to the attention scores.
//     Only the first block owns the table, the stack shares it.
//   - tied LM head rescales the decoder output by d_model^-0.5

use anyhow::{bail, Result};
use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
    tensor::{activation, TensorData},
};

use crate::data::encoder::IGNORE_INDEX;

/// Added to attention scores of masked positions
const MASK_VALUE: f64 = -1.0e9;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
/// Field names follow HuggingFace's `config.json`; defaults are t5-base.
#[derive(Config, Debug)]
pub struct T5Config {
    #[config(default = 32128)]
    pub vocab_size: usize,
    #[config(default = 768)]
    pub d_model: usize,
    #[config(default = 64)]
    pub d_kv: usize,
    #[config(default = 3072)]
    pub d_ff: usize,
    #[config(default = 12)]
    pub num_layers: usize,
    /// Defaults to `num_layers` when absent
    pub num_decoder_layers: Option<usize>,
    #[config(default = 12)]
    pub num_heads: usize,
    #[config(default = 32)]
    pub relative_attention_num_buckets: usize,
    #[config(default = 128)]
    pub relative_attention_max_distance: usize,
    #[config(default = 0.1)]
    pub dropout_rate: f64,
    #[config(default = 1e-6)]
    pub layer_norm_epsilon: f64,
    #[config(default = "String::from(\"relu\")")]
    pub feed_forward_proj: String,
    #[config(default = 0)]
    pub pad_token_id: usize,
    #[config(default = 1)]
    pub eos_token_id: usize,
    #[config(default = 0)]
    pub decoder_start_token_id: usize,
    #[config(default = true)]
    pub tie_word_embeddings: bool,
}

impl T5Config {
    pub fn decoder_layers(&self) -> usize {
        self.num_decoder_layers.unwrap_or(self.num_layers)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<T5<B>> {
        if self.feed_forward_proj != "relu" {
            bail!(
                "Unsupported feed_forward_proj '{}': only 'relu' (T5 v1.0) is implemented",
                self.feed_forward_proj
            );
        }
        if self.num_heads == 0 || self.d_kv == 0 {
            bail!("num_heads and d_kv must be positive");
        }

        let shared  = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let encoder = self.build_stack(self.num_layers, false, device);
        let decoder = self.build_stack(self.decoder_layers(), true, device);
        let lm_head = (!self.tie_word_embeddings).then(|| {
            LinearConfig::new(self.d_model, self.vocab_size)
                .with_bias(false)
                .init(device)
        });

        Ok(T5 {
            shared,
            encoder,
            decoder,
            lm_head,
            d_model:                self.d_model,
            pad_token_id:           self.pad_token_id,
            eos_token_id:           self.eos_token_id,
            decoder_start_token_id: self.decoder_start_token_id,
        })
    }

    fn build_stack<B: Backend>(&self, layers: usize, is_decoder: bool, device: &B::Device) -> T5Stack<B> {
        let blocks = (0..layers)
            .map(|_| self.build_block(is_decoder, device))
            .collect();
        T5Stack {
            blocks,
            relative_attention_bias: EmbeddingConfig::new(
                self.relative_attention_num_buckets,
                self.num_heads,
            )
            .init(device),
            final_layer_norm: self.build_norm(device),
            dropout:          DropoutConfig::new(self.dropout_rate).init(),
            is_decoder,
            num_heads:        self.num_heads,
            num_buckets:      self.relative_attention_num_buckets,
            max_distance:     self.relative_attention_max_distance,
        }
    }

    fn build_block<B: Backend>(&self, is_decoder: bool, device: &B::Device) -> T5Block<B> {
        T5Block {
            self_attn:       self.build_attention(device),
            self_attn_norm:  self.build_norm(device),
            cross_attn:      is_decoder.then(|| self.build_attention(device)),
            cross_attn_norm: is_decoder.then(|| self.build_norm(device)),
            ff: T5DenseReluDense {
                wi:      LinearConfig::new(self.d_model, self.d_ff).with_bias(false).init(device),
                wo:      LinearConfig::new(self.d_ff, self.d_model).with_bias(false).init(device),
                dropout: DropoutConfig::new(self.dropout_rate).init(),
            },
            ff_norm: self.build_norm(device),
            dropout: DropoutConfig::new(self.dropout_rate).init(),
        }
    }

    fn build_attention<B: Backend>(&self, device: &B::Device) -> T5Attention<B> {
        let inner = self.num_heads * self.d_kv;
        let proj  = |i, o| LinearConfig::new(i, o).with_bias(false).init(device);
        T5Attention {
            q:         proj(self.d_model, inner),
            k:         proj(self.d_model, inner),
            v:         proj(self.d_model, inner),
            o:         proj(inner, self.d_model),
            dropout:   DropoutConfig::new(self.dropout_rate).init(),
            num_heads: self.num_heads,
            d_kv:      self.d_kv,
        }
    }

    fn build_norm<B: Backend>(&self, device: &B::Device) -> T5LayerNorm<B> {
        T5LayerNorm {
            weight:  Param::from_tensor(Tensor::ones([self.d_model], device)),
            epsilon: self.layer_norm_epsilon,
        }
    }
}

// ─── Layer Norm ───────────────────────────────────────────────────────────────
/// Root-mean-square norm: x / sqrt(mean(x²) + eps) * weight
#[derive(Module, Debug)]
pub struct T5LayerNorm<B: Backend> {
    pub weight:  Param<Tensor<B, 1>>,
    pub epsilon: f64,
}

impl<B: Backend> T5LayerNorm<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let variance = x.clone().powf_scalar(2.0).mean_dim(2);
        let normed   = x * variance.add_scalar(self.epsilon).sqrt().recip();
        normed * self.weight.val().unsqueeze::<3>()
    }
}

// ─── Attention ────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct T5Attention<B: Backend> {
    pub q:         Linear<B>,
    pub k:         Linear<B>,
    pub v:         Linear<B>,
    pub o:         Linear<B>,
    pub dropout:   Dropout,
    pub num_heads: usize,
    pub d_kv:      usize,
}

impl<B: Backend> T5Attention<B> {
    /// query: [B, Lq, D], key_value: [B, Lk, D],
    /// bias: broadcastable to [B, H, Lq, Lk] (position bias + mask)
    pub fn forward(
        &self,
        query:     Tensor<B, 3>,
        key_value: Tensor<B, 3>,
        bias:      Tensor<B, 4>,
    ) -> Tensor<B, 3> {
        let [batch, q_len, _] = query.dims();
        let [_, k_len, _]     = key_value.dims();

        let q = self.split_heads(self.q.forward(query), batch, q_len);
        let k = self.split_heads(self.k.forward(key_value.clone()), batch, k_len);
        let v = self.split_heads(self.v.forward(key_value), batch, k_len);

        // no 1/sqrt(d_kv) scaling in T5
        let scores  = q.matmul(k.swap_dims(2, 3));
        let dims    = scores.dims();
        let scores  = scores + bias.expand(dims);
        let weights = self.dropout.forward(activation::softmax(scores, 3));

        let context = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch, q_len, self.num_heads * self.d_kv]);
        self.o.forward(context)
    }

    /// [B, L, H*dk] → [B, H, L, dk]
    fn split_heads(&self, x: Tensor<B, 3>, batch: usize, len: usize) -> Tensor<B, 4> {
        x.reshape([batch, len, self.num_heads, self.d_kv]).swap_dims(1, 2)
    }
}

// ─── Feed-Forward ─────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct T5DenseReluDense<B: Backend> {
    pub wi:      Linear<B>,
    pub wo:      Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> T5DenseReluDense<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let h = activation::relu(self.wi.forward(x));
        self.wo.forward(self.dropout.forward(h))
    }
}

// ─── Block ────────────────────────────────────────────────────────────────────
/// Encoder blocks leave `cross_attn` empty.
#[derive(Module, Debug)]
pub struct T5Block<B: Backend> {
    pub self_attn:       T5Attention<B>,
    pub self_attn_norm:  T5LayerNorm<B>,
    pub cross_attn:      Option<T5Attention<B>>,
    pub cross_attn_norm: Option<T5LayerNorm<B>>,
    pub ff:              T5DenseReluDense<B>,
    pub ff_norm:         T5LayerNorm<B>,
    pub dropout:         Dropout,
}

impl<B: Backend> T5Block<B> {
    pub fn forward(
        &self,
        x:         Tensor<B, 3>,
        self_bias: Tensor<B, 4>,
        encoder:   Option<(Tensor<B, 3>, Tensor<B, 4>)>,
    ) -> Tensor<B, 3> {
        let normed = self.self_attn_norm.forward(x.clone());
        let attn   = self.self_attn.forward(normed.clone(), normed, self_bias);
        let mut x  = x + self.dropout.forward(attn);

        if let (Some(cross), Some(norm), Some((hidden, bias))) =
            (&self.cross_attn, &self.cross_attn_norm, encoder)
        {
            let normed = norm.forward(x.clone());
            x = x + self.dropout.forward(cross.forward(normed, hidden, bias));
        }

        let normed = self.ff_norm.forward(x.clone());
        x + self.dropout.forward(self.ff.forward(normed))
    }
}

// ─── Stack ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct T5Stack<B: Backend> {
    pub blocks:                  Vec<T5Block<B>>,
    pub relative_attention_bias: Embedding<B>,
    pub final_layer_norm:        T5LayerNorm<B>,
    pub dropout:                 Dropout,
    pub is_decoder:              bool,
    pub num_heads:               usize,
    pub num_buckets:             usize,
    pub max_distance:            usize,
}

impl<B: Backend> T5Stack<B> {
    /// embeds: [B, L, D], mask_bias: [B, 1, Lq, L] additive self-attention mask,
    /// encoder: decoder-only (hidden states, cross-attention mask bias)
    pub fn forward(
        &self,
        embeds:    Tensor<B, 3>,
        mask_bias: Tensor<B, 4>,
        encoder:   Option<(Tensor<B, 3>, Tensor<B, 4>)>,
    ) -> Tensor<B, 3> {
        let [batch, len, _] = embeds.dims();
        let device          = embeds.device();

        let position_bias = self
            .position_bias(len, len, &device)
            .expand([batch, self.num_heads, len, len]);
        let self_bias = position_bias + mask_bias.expand([batch, self.num_heads, len, len]);

        let mut x = self.dropout.forward(embeds);
        for block in &self.blocks {
            x = block.forward(x, self_bias.clone(), encoder.clone());
        }
        self.dropout.forward(self.final_layer_norm.forward(x))
    }

    /// Learned bias for every (query, key) pair → [1, H, Lq, Lk]
    fn position_bias(&self, q_len: usize, k_len: usize, device: &B::Device) -> Tensor<B, 4> {
        let buckets: Vec<i64> = (0..q_len)
            .flat_map(|q| {
                (0..k_len).map(move |k| {
                    relative_position_bucket(
                        k as i64 - q as i64,
                        !self.is_decoder,
                        self.num_buckets,
                        self.max_distance,
                    ) as i64
                })
            })
            .collect();

        let ids = Tensor::<B, 2, Int>::from_data(TensorData::new(buckets, [1, q_len * k_len]), device);
        self.relative_attention_bias
            .forward(ids)                         // [1, Lq*Lk, H]
            .reshape([q_len, k_len, self.num_heads])
            .permute([2, 0, 1])
            .unsqueeze::<4>()
    }
}

/// Maps a key-minus-query distance onto one of `num_buckets` buckets.
///
/// Half the buckets hold exact small distances, the other half grow
/// logarithmically up to `max_distance`; anything farther shares the
/// last bucket. Bidirectional (encoder) attention spends half the
/// buckets on positive distances. Causal (decoder) attention only
/// distinguishes keys at or before the query.
pub fn relative_position_bucket(
    relative_position: i64,
    bidirectional:     bool,
    num_buckets:       usize,
    max_distance:      usize,
) -> usize {
    let mut num_buckets = num_buckets as i64;
    let mut bucket      = 0i64;

    let distance = if bidirectional {
        num_buckets /= 2;
        if relative_position > 0 {
            bucket += num_buckets;
        }
        relative_position.abs()
    } else {
        (-relative_position).max(0)
    };

    let max_exact = num_buckets / 2;
    if distance < max_exact {
        return (bucket + distance) as usize;
    }

    let log_ratio = (distance as f32 / max_exact as f32).ln()
        / (max_distance as f32 / max_exact as f32).ln();
    let large = max_exact + (log_ratio * (num_buckets - max_exact) as f32) as i64;
    (bucket + large.min(num_buckets - 1)) as usize
}

// ─── Masks ────────────────────────────────────────────────────────────────────
/// 1/0 attention mask [B, L] → additive bias [B, 1, 1, L]
pub fn padding_bias<B: Backend>(mask: Tensor<B, 2, Int>) -> Tensor<B, 4> {
    let [batch, len] = mask.dims();
    mask.float()
        .sub_scalar(1.0)
        .mul_scalar(-MASK_VALUE)
        .reshape([batch, 1, 1, len])
}

/// Blocks attention to later positions → [1, 1, L, L]
pub fn causal_bias<B: Backend>(len: usize, device: &B::Device) -> Tensor<B, 4> {
    let values: Vec<f32> = (0..len)
        .flat_map(|q| (0..len).map(move |k| if k > q { MASK_VALUE as f32 } else { 0.0 }))
        .collect();
    Tensor::<B, 2>::from_data(TensorData::new(values, [len, len]), device).unsqueeze::<4>()
}

// ─── Model ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct T5<B: Backend> {
    pub shared:                 Embedding<B>,
    pub encoder:                T5Stack<B>,
    pub decoder:                T5Stack<B>,
    /// Only present when embeddings are untied
    pub lm_head:                Option<Linear<B>>,
    pub d_model:                usize,
    pub pad_token_id:           usize,
    pub eos_token_id:           usize,
    pub decoder_start_token_id: usize,
}

impl<B: Backend> T5<B> {
    /// input_ids, attention_mask: [B, S] → encoder hidden states [B, S, D]
    pub fn encode(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let embeds = self.shared.forward(input_ids);
        self.encoder.forward(embeds, padding_bias(attention_mask), None)
    }

    /// Runs the decoder over `decoder_input_ids` [B, T] and projects to
    /// vocabulary logits [B, T, V].
    pub fn decode(
        &self,
        decoder_input_ids:      Tensor<B, 2, Int>,
        decoder_attention_mask: Option<Tensor<B, 2, Int>>,
        encoder_hidden:         Tensor<B, 3>,
        encoder_attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [_, len] = decoder_input_ids.dims();
        let device   = decoder_input_ids.device();

        let mut self_bias = causal_bias::<B>(len, &device);
        if let Some(mask) = decoder_attention_mask {
            let [batch, _] = mask.dims();
            self_bias = self_bias.expand([batch, 1, len, len]) + padding_bias(mask).expand([batch, 1, len, len]);
        }

        let embeds = self.shared.forward(decoder_input_ids);
        let hidden = self.decoder.forward(
            embeds,
            self_bias,
            Some((encoder_hidden, padding_bias(encoder_attention_mask))),
        );
        self.project(hidden)
    }

    /// Full teacher-forced pass → logits [B, T, V]
    pub fn forward(
        &self,
        input_ids:              Tensor<B, 2, Int>,
        attention_mask:         Tensor<B, 2, Int>,
        decoder_input_ids:      Tensor<B, 2, Int>,
        decoder_attention_mask: Option<Tensor<B, 2, Int>>,
    ) -> Tensor<B, 3> {
        let encoder_hidden = self.encode(input_ids, attention_mask.clone());
        self.decode(decoder_input_ids, decoder_attention_mask, encoder_hidden, attention_mask)
    }

    /// Decoder inputs for teacher forcing: labels moved one step right,
    /// start token in front, ignored positions replaced by padding.
    pub fn shift_right(&self, labels: Tensor<B, 2, Int>) -> Tensor<B, 2, Int> {
        let [batch, len] = labels.dims();
        if len == 0 {
            return labels;
        }
        let device  = labels.device();
        let start   = Tensor::<B, 2, Int>::full([batch, 1], self.decoder_start_token_id as i64, &device);
        let shifted = Tensor::cat(vec![start, labels.slice([0..batch, 0..len - 1])], 1);
        let ignored = shifted.clone().equal_elem(IGNORE_INDEX);
        shifted.mask_fill(ignored, self.pad_token_id as i64)
    }

    fn project(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        match &self.lm_head {
            Some(head) => head.forward(hidden),
            None => {
                let [batch, len, d_model] = hidden.dims();
                let weight = self.shared.weight.val();   // [V, D]
                let [vocab, _] = weight.dims();
                hidden
                    .mul_scalar((d_model as f64).powf(-0.5))
                    .reshape([batch * len, d_model])
                    .matmul(weight.transpose())
                    .reshape([batch, len, vocab])
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tiny_config, TestBackend};

    fn ids(rows: Vec<Vec<i64>>) -> Tensor<TestBackend, 2, Int> {
        let width = rows[0].len();
        let n     = rows.len();
        let flat: Vec<i64> = rows.into_iter().flatten().collect();
        Tensor::from_data(TensorData::new(flat, [n, width]), &Default::default())
    }

    #[test]
    fn test_bidirectional_buckets_split_by_direction() {
        // 32 buckets, 128 max distance (t5-base)
        assert_eq!(relative_position_bucket(0, true, 32, 128), 0);
        assert_eq!(relative_position_bucket(-3, true, 32, 128), 3);
        assert_eq!(relative_position_bucket(3, true, 32, 128), 19);
        // far distances saturate in the last bucket of each half
        assert_eq!(relative_position_bucket(-1000, true, 32, 128), 15);
        assert_eq!(relative_position_bucket(1000, true, 32, 128), 31);
    }

    #[test]
    fn test_causal_buckets_ignore_future_keys() {
        assert_eq!(relative_position_bucket(5, false, 32, 128), 0);
        assert_eq!(relative_position_bucket(-5, false, 32, 128), 5);
        assert_eq!(relative_position_bucket(-15, false, 32, 128), 15);
        assert_eq!(relative_position_bucket(-16, false, 32, 128), 16);
        assert_eq!(relative_position_bucket(-1000, false, 32, 128), 31);
    }

    #[test]
    fn test_buckets_are_monotonic_in_distance() {
        let mut last = 0;
        for d in 0..300 {
            let b = relative_position_bucket(-d, false, 32, 128);
            assert!(b >= last);
            last = b;
        }
    }

    #[test]
    fn test_only_relu_feed_forward_is_supported() {
        let cfg = tiny_config(20).with_feed_forward_proj("gated-gelu".to_string());
        assert!(cfg.init::<TestBackend>(&Default::default()).is_err());
    }

    #[test]
    fn test_forward_logits_shape() {
        let device = Default::default();
        let model  = tiny_config(20).init::<TestBackend>(&device).unwrap();

        let input  = ids(vec![vec![5, 6, 7, 1, 0], vec![8, 1, 0, 0, 0]]);
        let mask   = ids(vec![vec![1, 1, 1, 1, 0], vec![1, 1, 0, 0, 0]]);
        let dec    = ids(vec![vec![0, 9, 10], vec![0, 11, 1]]);

        let logits = model.forward(input, mask, dec, None);
        assert_eq!(logits.dims(), [2, 3, 20]);
    }

    #[test]
    fn test_untied_head_shape() {
        let device = Default::default();
        let model  = tiny_config(20)
            .with_tie_word_embeddings(false)
            .init::<TestBackend>(&device)
            .unwrap();
        assert!(model.lm_head.is_some());

        let logits = model.forward(ids(vec![vec![3, 1]]), ids(vec![vec![1, 1]]), ids(vec![vec![0]]), None);
        assert_eq!(logits.dims(), [1, 1, 20]);
    }

    #[test]
    fn test_decoder_is_causal() {
        let device = Default::default();
        let model  = tiny_config(20).init::<TestBackend>(&device).unwrap();
        let hidden = model.encode(ids(vec![vec![4, 5, 1]]), ids(vec![vec![1, 1, 1]]));

        let short = model.decode(ids(vec![vec![0, 7]]), None, hidden.clone(), ids(vec![vec![1, 1, 1]]));
        let long  = model.decode(ids(vec![vec![0, 7, 12]]), None, hidden, ids(vec![vec![1, 1, 1]]));

        // appending a token must not change earlier positions
        let a: Vec<f32> = short.slice([0..1, 0..2, 0..20]).into_data().to_vec().unwrap();
        let b: Vec<f32> = long.slice([0..1, 0..2, 0..20]).into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_shift_right_prepends_start_and_clears_ignored() {
        let device = Default::default();
        let model  = tiny_config(20).init::<TestBackend>(&device).unwrap();

        let shifted: Vec<i64> = model
            .shift_right(ids(vec![vec![5, 6, 1, IGNORE_INDEX]]))
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap();
        assert_eq!(shifted, vec![0, 5, 6, 1]);

        let shifted: Vec<i64> = model
            .shift_right(ids(vec![vec![5, 1, IGNORE_INDEX, IGNORE_INDEX]]))
            .into_data()
            .convert::<i64>()
            .to_vec()
            .unwrap();
        assert_eq!(shifted, vec![0, 5, 1, 0]);
    }

    #[test]
    fn test_rms_norm_unit_scale() {
        let device = Default::default();
        let norm   = T5LayerNorm::<TestBackend> {
            weight:  Param::from_tensor(Tensor::ones([2], &device)),
            epsilon: 0.0,
        };
        let x = Tensor::<TestBackend, 3>::from_data(TensorData::new(vec![3.0f32, 4.0], [1, 1, 2]), &device);
        let y: Vec<f32> = norm.forward(x).into_data().to_vec().unwrap();
        // rms = sqrt((9 + 16) / 2)
        let rms = (12.5f32).sqrt();
        assert!((y[0] - 3.0 / rms).abs() < 1e-5);
        assert!((y[1] - 4.0 / rms).abs() < 1e-5);
    }
}
