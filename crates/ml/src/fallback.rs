use cardwise_core::tokenize;

use crate::{normalize, EmbeddingModel};

#[derive(Debug, Clone)]
pub struct HashEmbeddingModel {
    dims: usize,
}

impl HashEmbeddingModel {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(32) }
    }

    fn bump(&self, vec: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let index = (hash as usize) % self.dims;
        let sign = if (hash & 1) == 0 { 1.0 } else { -1.0 };
        vec[index] += sign * weight;
    }
}

impl EmbeddingModel for HashEmbeddingModel {
    fn model_name(&self) -> &'static str {
        "hash-fallback"
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0_f32; self.dims];
        let tokens = tokenize(text);

        for token in &tokens {
            self.bump(&mut vec, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.bump(&mut vec, &format!("{} {}", pair[0], pair[1]), 0.5);
        }

        normalize(&mut vec);
        vec
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
