use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

/// Tensors fed to a relation classifier for one batch.
#[derive(Debug, Clone)]
pub struct RelationInput<B: Backend> {
    /// [batch, seq_len]
    pub input_ids:      Tensor<B, 2, Int>,
    /// [batch, seq_len], all zeros for single-sentence input
    pub token_type_ids: Tensor<B, 2, Int>,
    /// [batch, seq_len], 1.0 = real token, 0.0 = padding
    pub attention_mask: Tensor<B, 2>,
    /// [batch, 2], positions of the [E1] and [E2] markers
    pub e1_e2_start:    Tensor<B, 2, Int>,
}

impl<B: Backend> RelationInput<B> {
    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            input_ids:      self.input_ids.to_device(device),
            token_type_ids: self.token_type_ids.to_device(device),
            attention_mask: self.attention_mask.to_device(device),
            e1_e2_start:    self.e1_e2_start.to_device(device),
        }
    }
}

/// Anything that scores relation classes for a batch.
/// Output shape: [batch, num_classes].
pub trait RelationModel<B: Backend> {
    fn forward_relations(&self, input: RelationInput<B>) -> Tensor<B, 2>;
}

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct RelationClassifierConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub num_classes: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub dropout:     f64,
}

impl RelationClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> RelationClassifier<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let type_embedding     = EmbeddingConfig::new(2, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        // Head reads the [E1] and [E2] hidden states side by side
        let classifier = LinearConfig::new(2 * self.d_model, self.num_classes).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        RelationClassifier {
            token_embedding, position_embedding, type_embedding, layers,
            final_norm, classifier, dropout,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// pad_mask: [batch, seq_len], true at padding positions
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_output = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(pad_mask))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

#[derive(Module, Debug)]
pub struct RelationClassifier<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub type_embedding:     Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub classifier:         Linear<B>,
    pub dropout:            Dropout,
}

impl<B: Backend> RelationClassifier<B> {
    /// Returns relation logits: [batch, num_classes]
    pub fn forward(&self, input: RelationInput<B>) -> Tensor<B, 2> {
        let RelationInput { input_ids, token_type_ids, attention_mask, e1_e2_start } = input;
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let tok_emb  = self.token_embedding.forward(input_ids);
        let type_emb = self.type_embedding.forward(token_type_ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let pad_mask = attention_mask.equal_elem(0.0);

        let mut x = self.dropout.forward(tok_emb + type_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        let x = self.final_norm.forward(x); // [batch, seq_len, d_model]
        let [_, _, d_model] = x.dims();

        // Pick the hidden state at each entity marker: [batch, 2, d_model]
        let index = e1_e2_start
            .unsqueeze_dim::<3>(2)
            .expand([batch_size, 2, d_model]);
        let entities = x.gather(1, index).reshape([batch_size, 2 * d_model]);

        self.classifier.forward(self.dropout.forward(entities))
    }
}

impl<B: Backend> RelationModel<B> for RelationClassifier<B> {
    fn forward_relations(&self, input: RelationInput<B>) -> Tensor<B, 2> {
        self.forward(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn tiny_config() -> RelationClassifierConfig {
        RelationClassifierConfig::new(32, 16, 5, 8, 2, 1, 16, 0.0)
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model: RelationClassifier<TestBackend> = tiny_config().init(&device);

        let input_ids = Tensor::<TestBackend, 1, Int>::from_ints(
            [1, 4, 5, 6, 2, 0, 1, 7, 8, 9, 10, 2].as_slice(), &device,
        ).reshape([2, 6]);
        let attention_mask = input_ids.clone().not_equal_elem(0).float();
        let token_type_ids = Tensor::<TestBackend, 2, Int>::zeros([2, 6], &device);
        let e1_e2_start = Tensor::<TestBackend, 1, Int>::from_ints(
            [1, 3, 2, 4].as_slice(), &device,
        ).reshape([2, 2]);

        let logits = model.forward_relations(RelationInput {
            input_ids, token_type_ids, attention_mask, e1_e2_start,
        });
        assert_eq!(logits.dims(), [2, 5]);
    }
}
