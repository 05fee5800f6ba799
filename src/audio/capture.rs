//! Microphone input through cpal (feature `capture`).
//!
//! cpal streams are `!Send` on some hosts, so the stream is built and owned by
//! a small holder thread. `start` waits for that thread to report whether the
//! stream opened; `stop` signals it and joins, which drops the stream and
//! guarantees the sink is no longer called.

use super::{downmix_into, AudioSource, SampleSink};
use crate::error::CaptureError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

/// Live input from the default or a named device at its native rate.
pub struct CpalSource {
    device_name: Option<String>,
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
    holder: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
}

fn find_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        None => host.default_input_device().ok_or(CaptureError::NoDevice),
        Some(wanted) => host
            .input_devices()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceUnavailable(format!("no input device named '{}'", wanted))),
    }
}

impl CpalSource {
    /// Probe the default input device.
    pub fn default_device() -> Result<Self, CaptureError> {
        Self::probe(None)
    }

    /// Probe an input device by its cpal name.
    pub fn named(name: &str) -> Result<Self, CaptureError> {
        Self::probe(Some(name.to_string()))
    }

    fn probe(device_name: Option<String>) -> Result<Self, CaptureError> {
        let device = find_device(device_name.as_deref())?;
        let config = device
            .default_input_config()
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        log::info!(
            "Input device '{}': {} Hz, {} ch, {:?}",
            device.name().unwrap_or_else(|_| "<unknown>".into()),
            config.sample_rate().0,
            config.channels(),
            config.sample_format()
        );
        Ok(Self {
            device_name,
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
            format: config.sample_format(),
            holder: None,
        })
    }

    fn build_stream(&self, mut sink: SampleSink) -> Result<cpal::Stream, CaptureError> {
        let device = find_device(self.device_name.as_deref())?;
        let config = StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let channels = self.channels as usize;
        let on_error = |e: cpal::StreamError| log::warn!("Input stream error: {}", e);
        let mut mono: Vec<f32> = Vec::with_capacity(8192);

        let stream = match self.format {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    mono.clear();
                    downmix_into(data, channels, &mut mono);
                    sink(&mono);
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => {
                let mut scratch: Vec<f32> = Vec::with_capacity(8192);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        scratch.clear();
                        scratch.extend(data.iter().map(|&s| s as f32 / 32768.0));
                        mono.clear();
                        downmix_into(&scratch, channels, &mut mono);
                        sink(&mono);
                    },
                    on_error,
                    None,
                )
            }
            other => {
                return Err(CaptureError::DeviceUnavailable(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        };

        stream.map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceUnavailable("device disconnected".into())
            }
            other => CaptureError::Stream(other.to_string()),
        })
    }
}

impl AudioSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, sink: SampleSink) -> Result<(), CaptureError> {
        if self.holder.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }
        let probe = CpalSource {
            device_name: self.device_name.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: self.format,
            holder: None,
        };
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("vxavatar-capture".into())
            .spawn(move || {
                let stream = match probe.build_stream(sink) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(CaptureError::Stream(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                // Park until stop() signals or drops the sender.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| CaptureError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.holder = Some((stop_tx, handle));
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CaptureError::Stream("capture thread exited".into()))
            }
        }
    }

    fn stop(&mut self) {
        if let Some((stop_tx, handle)) = self.holder.take() {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.stop();
    }
}
