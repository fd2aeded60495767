// ============================================================
// Layer 5 — State Adapters
// ============================================================
// Bridges burn's record system to the StateDict trait so the
// checkpoint store can restore burn modules and optimizers
// without knowing their concrete types.
//
//   ModuleState<B, M>       — any burn Module
//   OptimizerState<B, M, O> — any burn Optimizer over M
//
// Both encode with BinBytesRecorder at full precision. Loading
// decodes into a record first; the wrapped value is replaced
// only once decoding succeeded.
//
// burn's load_record accepts tensors of any shape, so a module
// record is first loaded into a copy and every parameter shape
// is compared, in visiting order, with the live module. A record
// saved for another architecture is rejected with the index of
// the first parameter that differs.

use anyhow::{Context, Result};
use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::Optimizer,
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::backend::AutodiffBackend,
};
use std::marker::PhantomData;
use thiserror::Error;

use crate::domain::traits::StateDict;

type BytesRecorder = BinBytesRecorder<FullPrecisionSettings>;

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("record has {found} parameters but the module has {expected}")]
    ParamCount { expected: usize, found: usize },

    #[error("parameter {index} has shape {found:?} in the record but {expected:?} in the module")]
    ShapeMismatch { index: usize, expected: Vec<usize>, found: Vec<usize> },
}

/// Collects float parameter shapes in visiting order
#[derive(Default)]
struct ParamShapes(Vec<Vec<usize>>);

impl<B: Backend> ModuleVisitor<B> for ParamShapes {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.0.push(tensor.dims().to_vec());
    }
}

fn param_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    let mut shapes = ParamShapes::default();
    module.visit(&mut shapes);
    shapes.0
}

fn check_shapes(expected: &[Vec<usize>], found: &[Vec<usize>]) -> Result<(), StateError> {
    if expected.len() != found.len() {
        return Err(StateError::ParamCount { expected: expected.len(), found: found.len() });
    }
    match expected.iter().zip(found).position(|(e, f)| e != f) {
        Some(index) => Err(StateError::ShapeMismatch {
            index,
            expected: expected[index].clone(),
            found:    found[index].clone(),
        }),
        None => Ok(()),
    }
}

/// A burn module that can be checkpointed in place.
pub struct ModuleState<B: Backend, M: Module<B>> {
    pub module: M,
    device:     B::Device,
}

impl<B: Backend, M: Module<B>> ModuleState<B, M> {
    pub fn new(module: M, device: B::Device) -> Self {
        Self { module, device }
    }
}

impl<B: Backend, M: Module<B>> StateDict for ModuleState<B, M> {
    fn state_dict(&self) -> Result<Vec<u8>> {
        let recorder = BytesRecorder::default();
        Recorder::<B>::record(&recorder, self.module.clone().into_record(), ())
            .context("Failed to encode module record")
    }

    fn load_state_dict(&mut self, state: &[u8]) -> Result<()> {
        let recorder = BytesRecorder::default();
        let record: M::Record = Recorder::<B>::load(&recorder, state.to_vec(), &self.device)
            .context("Failed to decode module record")?;
        let candidate = self.module.clone().load_record(record);
        check_shapes(&param_shapes(&self.module), &param_shapes(&candidate))
            .context("Module record was saved for a different architecture")?;

        self.module = candidate;
        Ok(())
    }
}

/// A burn optimizer that can be checkpointed in place.
pub struct OptimizerState<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    pub optim: O,
    device:    B::Device,
    _module:   PhantomData<M>,
}

impl<B, M, O> OptimizerState<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    pub fn new(optim: O, device: B::Device) -> Self {
        Self { optim, device, _module: PhantomData }
    }
}

impl<B, M, O> StateDict for OptimizerState<B, M, O>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
    O: Optimizer<M, B> + Clone,
{
    fn state_dict(&self) -> Result<Vec<u8>> {
        let recorder = BytesRecorder::default();
        Recorder::<B>::record(&recorder, self.optim.to_record(), ())
            .context("Failed to encode optimizer record")
    }

    fn load_state_dict(&mut self, state: &[u8]) -> Result<()> {
        let recorder = BytesRecorder::default();
        let record: <O as Optimizer<M, B>>::Record =
            Recorder::<B>::load(&recorder, state.to_vec(), &self.device)
                .context("Failed to decode optimizer record")?;
        self.optim = self.optim.clone().load_record(record);
        Ok(())
    }
}
