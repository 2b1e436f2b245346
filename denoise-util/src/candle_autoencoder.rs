#![allow(dead_code)]

use crate::candle_data_loader::*;
use crate::candle_inference::TrainConfig;
use crate::candle_model_traits::{DecoderModule, EncoderModule};

use candle_core::{Result, Tensor};
use candle_nn::AdamW;
use candle_nn::Optimizer;
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;

/// Per-epoch loss traces accumulated during training. The validation trace
/// stays empty when no validation loader was supplied.
pub struct TrainingTrace {
    pub train_loss: Vec<f32>,
    pub validation_loss: Vec<f32>,
}

pub struct DenoisingAutoencoder<'a, Enc, Dec>
where
    Enc: EncoderModule,
    Dec: DecoderModule,
{
    pub encoder: &'a Enc,
    pub decoder: &'a Dec,
    pub variable_map: &'a candle_nn::VarMap,
}

pub trait AutoencoderT<'a, Enc, Dec>
where
    Enc: EncoderModule,
    Dec: DecoderModule,
{
    /// Train the composed encoder-decoder end to end
    /// * `data` - data loader with (noisy input, clean target) pairs
    /// * `validation` - optional loader scored after each epoch, no updates
    /// * `loss` - per-sample reconstruction loss function
    /// * `train_config` - training configuration
    fn train_encoder_decoder<DataL, LossFn>(
        &mut self,
        data: &mut DataL,
        validation: Option<&mut DataL>,
        loss: &LossFn,
        train_config: &TrainConfig,
    ) -> anyhow::Result<TrainingTrace>
    where
        DataL: DataLoader,
        LossFn: Fn(&Tensor, &Tensor) -> Result<Tensor>;

    /// Average per-sample loss over a whole loader; weights untouched
    fn evaluate<DataL, LossFn>(
        &self,
        data: &mut DataL,
        loss: &LossFn,
        train_config: &TrainConfig,
    ) -> anyhow::Result<f32>
    where
        DataL: DataLoader,
        LossFn: Fn(&Tensor, &Tensor) -> Result<Tensor>;

    /// One forward pass `decoder(encoder(x))`; same shape out as in
    fn denoise(&self, x_nchw: &Tensor) -> Result<Tensor>;

    /// Build an autoencoder over a shared variable map
    /// * `encoder` - encoder module
    /// * `decoder` - decoder module
    fn build(encoder: &'a Enc, decoder: &'a Dec, variable_map: &'a candle_nn::VarMap) -> Self;
}

impl<'a, Enc, Dec> AutoencoderT<'a, Enc, Dec> for DenoisingAutoencoder<'a, Enc, Dec>
where
    Enc: EncoderModule,
    Dec: DecoderModule,
{
    fn train_encoder_decoder<DataL, LossFn>(
        &mut self,
        data: &mut DataL,
        validation: Option<&mut DataL>,
        loss_func: &LossFn,
        train_config: &TrainConfig,
    ) -> anyhow::Result<TrainingTrace>
    where
        DataL: DataLoader,
        LossFn: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        let device = &train_config.device;
        let mut adam = AdamW::new_lr(
            self.variable_map.all_vars(),
            train_config.learning_rate.into(),
        )?;

        let pb = ProgressBar::new(train_config.num_epochs as u64);

        if !train_config.show_progress || train_config.verbose {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        data.shuffle_minibatch(train_config.batch_size)?;

        let minibatch_vec = (0..data.num_minibatch())
            .map(|b| {
                data.minibatch_data(b, device)
                    .unwrap_or_else(|_| panic!("failed to preload minibatch #{}", b))
            })
            .collect::<Vec<_>>();

        let validation_vec = match validation {
            Some(validation) => {
                validation.shuffle_minibatch(train_config.batch_size)?;
                let chunks = (0..validation.num_minibatch())
                    .map(|b| {
                        validation
                            .minibatch_data(b, device)
                            .unwrap_or_else(|_| panic!("failed to preload minibatch #{}", b))
                    })
                    .collect::<Vec<_>>();
                Some(chunks)
            }
            None => None,
        };

        let mut trace = TrainingTrace {
            train_loss: vec![],
            validation_loss: vec![],
        };

        for _epoch in 0..train_config.num_epochs {
            let mut loss_tot = 0f32;
            let mut num_samples = 0usize;

            for minibatch_data in minibatch_vec.iter() {
                let (x_nchw, y_nchw) = (
                    &minibatch_data.input,
                    minibatch_data.output.as_ref(),
                );

                let z_nk = self.encoder.forward(x_nchw)?;

                let (_, loss_n) = match y_nchw {
                    Some(y_nchw) => self.decoder.forward_with_loss(&z_nk, y_nchw, loss_func)?,
                    None => self.decoder.forward_with_loss(&z_nk, x_nchw, loss_func)?,
                };

                let loss = loss_n.mean_all()?;
                adam.backward_step(&loss)?;

                loss_tot += loss_n.sum_all()?.to_scalar::<f32>()?;
                num_samples += loss_n.dims()[0];
            }
            trace.train_loss.push(loss_tot / num_samples.max(1) as f32);

            if let Some(validation_vec) = validation_vec.as_ref() {
                let score = average_loss(self, validation_vec, loss_func)?;
                trace.validation_loss.push(score);
            }

            pb.inc(1);

            if train_config.verbose {
                match trace.validation_loss.last() {
                    Some(validation) => info!(
                        "[{}] training loss: {} validation loss: {}",
                        _epoch + 1,
                        trace.train_loss.last().ok_or(anyhow::anyhow!("loss"))?,
                        validation
                    ),
                    None => info!(
                        "[{}] training loss: {}",
                        _epoch + 1,
                        trace.train_loss.last().ok_or(anyhow::anyhow!("loss"))?
                    ),
                }
            }
        } // each epoch

        pb.finish_and_clear();
        Ok(trace)
    }

    fn evaluate<DataL, LossFn>(
        &self,
        data: &mut DataL,
        loss_func: &LossFn,
        train_config: &TrainConfig,
    ) -> anyhow::Result<f32>
    where
        DataL: DataLoader,
        LossFn: Fn(&Tensor, &Tensor) -> Result<Tensor>,
    {
        let device = &train_config.device;

        data.shuffle_minibatch(train_config.batch_size)?;

        let minibatch_vec = (0..data.num_minibatch())
            .map(|b| {
                data.minibatch_data(b, device)
                    .unwrap_or_else(|_| panic!("failed to preload minibatch #{}", b))
            })
            .collect::<Vec<_>>();

        average_loss(self, &minibatch_vec, loss_func)
    }

    fn denoise(&self, x_nchw: &Tensor) -> Result<Tensor> {
        let z_nk = self.encoder.forward(x_nchw)?;
        self.decoder.forward(&z_nk)
    }

    fn build(encoder: &'a Enc, decoder: &'a Dec, variable_map: &'a candle_nn::VarMap) -> Self {
        assert_eq!(encoder.dim_latent(), decoder.dim_latent());

        Self {
            encoder,
            decoder,
            variable_map,
        }
    }
}

/// sample-weighted average of the per-sample loss across minibatches
fn average_loss<Enc, Dec, LossFn>(
    model: &DenoisingAutoencoder<'_, Enc, Dec>,
    minibatch_vec: &[MinibatchData],
    loss_func: &LossFn,
) -> anyhow::Result<f32>
where
    Enc: EncoderModule,
    Dec: DecoderModule,
    LossFn: Fn(&Tensor, &Tensor) -> Result<Tensor>,
{
    let mut loss_tot = 0f32;
    let mut num_samples = 0usize;

    for minibatch_data in minibatch_vec.iter() {
        let x_nchw = &minibatch_data.input;
        let y_nchw = minibatch_data.output.as_ref().unwrap_or(x_nchw);

        let z_nk = model.encoder.forward(x_nchw)?;
        let (_, loss_n) = model.decoder.forward_with_loss(&z_nk, y_nchw, loss_func)?;

        loss_tot += loss_n.sum_all()?.to_scalar::<f32>()?;
        num_samples += loss_n.dims()[0];
    }

    Ok(loss_tot / num_samples.max(1) as f32)
}
