#![allow(dead_code)]

use candle_core::{Device, Tensor};
use ndarray::Array4;
use rand::prelude::SliceRandom;
use rayon::prelude::*;

pub struct MinibatchData {
    pub input: Tensor,
    pub output: Option<Tensor>,
}

/// `DataLoader` for minibatch learning
pub trait DataLoader {
    fn minibatch_data(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData>;

    fn num_minibatch(&self) -> usize;

    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()>;
}

///
/// A simple data loader for in-memory image stacks. Each image is one
/// sample; when an output stack is attached, input row i pairs with
/// output row i (noisy vs. clean), and shuffling keeps the pairing.
///
pub struct InMemoryData {
    input_data: Vec<Tensor>,
    output_data: Option<Vec<Tensor>>,

    shuffled_input_data: Option<Vec<Tensor>>,
    shuffled_output_data: Option<Vec<Tensor>>,

    minibatches: Minibatches,
}

impl InMemoryData {
    ///
    /// Create a data loader with the main data tensor `data`
    ///
    pub fn new<D>(data: &D) -> anyhow::Result<Self>
    where
        D: ImagesToTensorVec,
    {
        let data = data.images_to_tensor_vec();
        let rows = (0..data.len()).collect();

        Ok(InMemoryData {
            input_data: data,
            output_data: None,
            shuffled_input_data: None,
            shuffled_output_data: None,
            minibatches: Minibatches {
                samples: rows,
                chunks: vec![],
            },
        })
    }

    ///
    /// Create a data loader with the main `data` and target `out`
    ///
    pub fn new_with_output<D>(data: &D, out: &D) -> anyhow::Result<Self>
    where
        D: ImagesToTensorVec,
    {
        let data = data.images_to_tensor_vec();
        let out_data = out.images_to_tensor_vec();
        let rows = (0..data.len()).collect();

        debug_assert!(data.len() == out_data.len());

        Ok(InMemoryData {
            input_data: data,
            output_data: Some(out_data),
            shuffled_input_data: None,
            shuffled_output_data: None,
            minibatches: Minibatches {
                samples: rows,
                chunks: vec![],
            },
        })
    }

    pub fn num_samples(&self) -> usize {
        self.input_data.len()
    }
}

impl DataLoader for InMemoryData {
    fn minibatch_data(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<MinibatchData> {
        if let Some(input) =
            take_shuffled(batch_idx, target_device, self.shuffled_input_data.as_ref())?
        {
            let output =
                take_shuffled(batch_idx, target_device, self.shuffled_output_data.as_ref())?;

            Ok(MinibatchData { input, output })
        } else {
            Err(anyhow::anyhow!("need to shuffle data"))
        }
    }

    fn num_minibatch(&self) -> usize {
        self.minibatches.chunks.len()
    }

    fn shuffle_minibatch(&mut self, batch_size: usize) -> anyhow::Result<()> {
        /////////////////////
        // shuffle indexes //
        /////////////////////

        self.minibatches.shuffle_minibatch(batch_size);

        self.shuffled_input_data = Some(vec![]);

        if self.output_data.is_some() {
            self.shuffled_output_data = Some(vec![]);
        }

        ///////////////////////////////////
        // preload all the shuffled data //
        ///////////////////////////////////

        for batch_idx in 0..self.num_minibatch() {
            if let Some(samples) = self.minibatches.chunks.get(batch_idx) {
                {
                    let chunk: Vec<Tensor> = samples
                        .iter()
                        .map(|&i| self.input_data[i].clone())
                        .collect();

                    if let Some(shuffled_data) = &mut self.shuffled_input_data {
                        let x = Tensor::cat(&chunk, 0)?;
                        shuffled_data.push(x);
                    }
                }
                if let Some(out_data) = self.output_data.as_ref() {
                    let chunk: Vec<Tensor> =
                        samples.iter().map(|&i| out_data[i].clone()).collect();

                    if let Some(shuffled_data) = &mut self.shuffled_output_data {
                        let x = Tensor::cat(&chunk, 0)?;
                        shuffled_data.push(x);
                    }
                }
            } else {
                return Err(anyhow::anyhow!(
                    "invalid index = {} vs. total # = {}",
                    batch_idx,
                    self.num_minibatch()
                ));
            }
        }

        Ok(())
    }
}

fn take_shuffled(
    batch_idx: usize,
    target_device: &Device,
    data_vec: Option<&Vec<Tensor>>,
) -> anyhow::Result<Option<Tensor>> {
    if let Some(data_vec) = data_vec {
        if data_vec.len() <= batch_idx {
            Err(anyhow::anyhow!(
                "invalid index = {} vs. total # = {}",
                batch_idx,
                data_vec.len()
            ))
        } else {
            Ok(Some(data_vec[batch_idx].to_device(target_device)?))
        }
    } else {
        // if the data vector doesn't exist
        Ok(None)
    }
}

///
/// A helper `struct` for shuffling and creating minibatch indexes;
/// after `shuffle_minibatch` is called, `chunks` partition indexes.
///
pub struct Minibatches {
    samples: Vec<usize>,
    pub chunks: Vec<Vec<usize>>,
}

impl Minibatches {
    pub fn shuffle_minibatch(&mut self, batch_size: usize) {
        let mut rng = rand::rng();
        self.samples.shuffle(&mut rng);

        self.chunks = self
            .samples
            .chunks(batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();
    }

    pub fn size(&self) -> usize {
        self.samples.len()
    }
}

///
/// Convert an image stack to a vector of single-image `Tensor`s
///
pub trait ImagesToTensorVec {
    fn images_to_tensor_vec(&self) -> Vec<Tensor>;
}

impl ImagesToTensorVec for Array4<f32> {
    fn images_to_tensor_vec(&self) -> Vec<Tensor> {
        let (_, c, h, w) = self.dim();

        let mut idx_data = self
            .axis_iter(ndarray::Axis(0))
            .enumerate()
            .par_bridge()
            .map(|(i, img)| {
                let mut v = Tensor::from_iter(img.iter().copied(), &Device::Cpu)
                    .expect("failed to create tensor");
                v = v.reshape((1, c, h, w)).expect("failed to reshape");
                (i, v)
            })
            .collect::<Vec<_>>();

        idx_data.sort_by_key(|(i, _)| *i);
        idx_data.into_iter().map(|(_, t)| t).collect()
    }
}

impl ImagesToTensorVec for Tensor {
    fn images_to_tensor_vec(&self) -> Vec<Tensor> {
        let mut idx_data = (0..self.dims()[0])
            .map(|i| (i, self.narrow(0, i, 1).expect("").clone()))
            .collect::<Vec<_>>();

        idx_data.sort_by_key(|(i, _)| *i);
        idx_data.into_iter().map(|(_, t)| t).collect()
    }
}
