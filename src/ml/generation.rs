// ============================================================
// Layer 5 — Beam Search Generation
// ============================================================
// Autoregressive decoding for the summarizer.
//
//   encode article once
//   beams = [ [start] ]
//   loop until done or max_length:
//     log-softmax over the next token for every live beam
//     repetition penalty on tokens the beam already holds
//     add the beam's running score
//     keep the best 2 * num_beams (beam, token) candidates
//       EOS in the top num_beams → finished hypothesis
//       otherwise               → next live beam
//   leftover live beams are finalised at max_length
//
// Finished hypotheses are ranked by sum_logprobs / len^length_penalty.
// Bookkeeping runs on the host; only the decoder forward pass
// touches the device.

use anyhow::{anyhow, ensure, Result};
use burn::{
    prelude::*,
    tensor::{activation, TensorData},
};
use std::{cmp::Ordering, collections::HashSet};

use crate::ml::t5::T5;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct GenerationConfig {
    /// Decoder length cap, counting the start token
    #[config(default = 150)]
    pub max_length: usize,
    #[config(default = 2)]
    pub num_beams: usize,
    #[config(default = 2.5)]
    pub repetition_penalty: f32,
    #[config(default = 1.0)]
    pub length_penalty: f32,
    #[config(default = true)]
    pub early_stopping: bool,
}

// ─── Repetition Penalty ───────────────────────────────────────────────────────
/// Penalise every token already present in `tokens`:
///   score < 0 → score * penalty
///   score ≥ 0 → score / penalty
/// Each distinct token is penalised once.
pub fn apply_repetition_penalty(scores: &mut [f32], tokens: &[u32], penalty: f32) {
    if (penalty - 1.0).abs() < f32::EPSILON {
        return;
    }
    let seen: HashSet<u32> = tokens.iter().copied().collect();
    for token in seen {
        if let Some(score) = scores.get_mut(token as usize) {
            *score = if *score < 0.0 { *score * penalty } else { *score / penalty };
        }
    }
}

// ─── Finished Hypotheses ──────────────────────────────────────────────────────
/// Keeps the `num_beams` best finished sequences.
#[derive(Debug)]
pub struct BeamHypotheses {
    num_beams:      usize,
    length_penalty: f32,
    early_stopping: bool,
    hyps:           Vec<(f32, Vec<u32>)>,
    worst_score:    f32,
}

impl BeamHypotheses {
    pub fn new(num_beams: usize, length_penalty: f32, early_stopping: bool) -> Self {
        Self {
            num_beams,
            length_penalty,
            early_stopping,
            hyps:        Vec::with_capacity(num_beams + 1),
            worst_score: 1e9,
        }
    }

    pub fn len(&self) -> usize {
        self.hyps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hyps.is_empty()
    }

    /// `tokens` include the start token and exclude EOS
    pub fn add(&mut self, tokens: Vec<u32>, sum_logprobs: f32) {
        let score = sum_logprobs / (tokens.len() as f32).powf(self.length_penalty);
        if self.hyps.len() < self.num_beams || score > self.worst_score {
            self.hyps.push((score, tokens));
            if self.hyps.len() > self.num_beams {
                if let Some(worst) = self.worst_index() {
                    self.hyps.remove(worst);
                }
                self.worst_score = self
                    .hyps
                    .iter()
                    .map(|(s, _)| *s)
                    .fold(f32::INFINITY, f32::min);
            } else {
                self.worst_score = self.worst_score.min(score);
            }
        }
    }

    /// Whether no live beam can still improve the pool
    pub fn is_done(&self, best_sum_logprobs: f32, cur_len: usize) -> bool {
        if self.hyps.len() < self.num_beams {
            return false;
        }
        if self.early_stopping {
            return true;
        }
        let best_possible = best_sum_logprobs / (cur_len as f32).powf(self.length_penalty);
        self.worst_score >= best_possible
    }

    pub fn best(self) -> Option<Vec<u32>> {
        self.hyps
            .into_iter()
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, tokens)| tokens)
    }

    fn worst_index(&self) -> Option<usize> {
        self.hyps
            .iter()
            .enumerate()
            .min_by(|a, b| a.1 .0.total_cmp(&b.1 .0))
            .map(|(i, _)| i)
    }
}

// ─── Search ───────────────────────────────────────────────────────────────────
struct Beam {
    tokens: Vec<u32>,
    score:  f32,
}

/// Backend-independent beam search.
///
/// `step` receives every live sequence and returns next-token
/// log-probabilities for each. Returns the best sequence without
/// the start token.
pub fn search<F>(mut step: F, cfg: &GenerationConfig, start: u32, eos: u32) -> Result<Vec<u32>>
where
    F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>>,
{
    let num_beams = cfg.num_beams.max(1);
    let mut hyps  = BeamHypotheses::new(num_beams, cfg.length_penalty, cfg.early_stopping);
    let mut beams = vec![Beam { tokens: vec![start], score: 0.0 }];
    let mut cur_len = 1;
    let mut done    = false;

    while cur_len < cfg.max_length {
        let sequences: Vec<Vec<u32>> = beams.iter().map(|b| b.tokens.clone()).collect();
        let log_probs = step(&sequences)?;
        ensure!(
            log_probs.len() == beams.len(),
            "step returned {} score rows for {} beams",
            log_probs.len(),
            beams.len()
        );

        // (total score, beam index, token)
        let mut candidates: Vec<(f32, usize, u32)> = Vec::new();
        for (i, (beam, mut scores)) in beams.iter().zip(log_probs).enumerate() {
            apply_repetition_penalty(&mut scores, &beam.tokens, cfg.repetition_penalty);
            candidates.extend(
                scores
                    .iter()
                    .enumerate()
                    .map(|(token, &s)| (s + beam.score, i, token as u32)),
            );
        }
        top_k(&mut candidates, 2 * num_beams);
        let Some(&(best_sum, _, _)) = candidates.first() else {
            break;
        };

        let mut next = Vec::with_capacity(num_beams);
        for (rank, &(score, beam_idx, token)) in candidates.iter().enumerate() {
            if token == eos {
                if rank < num_beams {
                    hyps.add(beams[beam_idx].tokens.clone(), score);
                }
            } else {
                let mut tokens = beams[beam_idx].tokens.clone();
                tokens.push(token);
                next.push(Beam { tokens, score });
            }
            if next.len() == num_beams {
                break;
            }
        }

        if hyps.is_done(best_sum, cur_len) {
            done = true;
            break;
        }
        beams    = next;
        cur_len += 1;
        if beams.is_empty() {
            break;
        }
    }

    if !done {
        for beam in beams {
            hyps.add(beam.tokens, beam.score);
        }
    }

    Ok(hyps
        .best()
        .map(|tokens| tokens.into_iter().skip(1).collect())
        .unwrap_or_default())
}

/// Keep the `k` highest-scoring candidates, best first.
fn top_k(candidates: &mut Vec<(f32, usize, u32)>, k: usize) {
    let by_score = |a: &(f32, usize, u32), b: &(f32, usize, u32)| -> Ordering {
        b.0.total_cmp(&a.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.cmp(&b.2))
    };
    if candidates.len() > k && k > 0 {
        candidates.select_nth_unstable_by(k - 1, by_score);
        candidates.truncate(k);
    }
    candidates.sort_by(by_score);
}

/// Beam search over a T5 model for a single article.
///
/// input_ids, attention_mask: [1, S]
pub fn beam_search<B: Backend>(
    model:          &T5<B>,
    input_ids:      Tensor<B, 2, Int>,
    attention_mask: Tensor<B, 2, Int>,
    cfg:            &GenerationConfig,
) -> Result<Vec<u32>> {
    let [batch, src_len] = input_ids.dims();
    ensure!(batch == 1, "beam_search expects a single sequence, got batch {}", batch);

    let device = input_ids.device();
    let hidden = model.encode(input_ids, attention_mask.clone());
    let [_, _, d_model] = hidden.dims();

    let step = |sequences: &[Vec<u32>]| -> Result<Vec<Vec<f32>>> {
        let n   = sequences.len();
        let len = sequences.first().map_or(0, Vec::len);
        let flat: Vec<i64> = sequences
            .iter()
            .flat_map(|s| s.iter().map(|&t| t as i64))
            .collect();
        let decoder_ids = Tensor::<B, 2, Int>::from_data(TensorData::new(flat, [n, len]), &device);

        let logits = model.decode(
            decoder_ids,
            None,
            hidden.clone().expand([n, src_len, d_model]),
            attention_mask.clone().expand([n, src_len]),
        );
        let [_, _, vocab] = logits.dims();
        let last = logits.slice([0..n, len - 1..len, 0..vocab]).reshape([n, vocab]);

        let values: Vec<f32> = activation::log_softmax(last, 1)
            .into_data()
            .convert::<f32>()
            .to_vec()
            .map_err(|e| anyhow!("Cannot read decoder scores: {e:?}"))?;
        Ok(values.chunks(vocab).map(<[f32]>::to_vec).collect())
    };

    search(
        step,
        cfg,
        model.decoder_start_token_id as u32,
        model.eos_token_id as u32,
    )
}
