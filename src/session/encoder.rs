// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Rate-limited frame sampling.
//!
//! On each display tick the sampler decides whether a new sample is due,
//! pulls the latest camera frame and hands it to a single encode slot. A due
//! tick that finds the encoder still busy is skipped, so slow encodes delay
//! the next sample instead of building a backlog.

use crate::capture::DeviceHandle;
use crate::channel::ChannelSession;
use crate::config::EncoderConfig;
use crate::error::EncodeError;
use crate::io::media::{encode_data_uri, EncodeParams};
use crate::models::frame::Frame;
use crate::util::job::{Dispatch, JobSlot};
use std::time::{Duration, Instant};

pub struct FrameSampler {
    min_interval: Duration,
    params: EncodeParams,
    last_sample: Option<Instant>,
    job: JobSlot<Result<Frame, EncodeError>>,
    frames_sent: u64,
}

impl FrameSampler {
    pub fn new(config: &EncoderConfig, dispatch: Dispatch) -> Self {
        Self {
            min_interval: config.min_interval(),
            params: config.params(),
            last_sample: None,
            job: JobSlot::new(dispatch),
            frames_sent: 0,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Advance one display tick.
    pub fn tick(&mut self, now: Instant, device: &mut dyn DeviceHandle, channel: Option<&ChannelSession>) {
        self.flush(channel);
        if self.sample(now, device) {
            self.flush(channel);
        }
    }

    /// Start encoding a new sample if one is due. Returns whether a sample
    /// was taken.
    fn sample(&mut self, now: Instant, device: &mut dyn DeviceHandle) -> bool {
        let due = match self.last_sample {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
        };
        if !due || self.job.is_busy() {
            return false;
        }

        let Some(image) = device.grab() else {
            return false;
        };
        let params = self.params;
        self.job.submit(move || {
            encode_data_uri(&image, &params).map(|payload| Frame {
                payload,
                captured_at: now,
            })
        });
        self.last_sample = Some(now);
        true
    }

    /// Drop any in-flight sample and reset the schedule.
    pub fn cancel(&mut self) {
        self.job.cancel();
        self.last_sample = None;
    }

    fn flush(&mut self, channel: Option<&ChannelSession>) {
        match self.job.poll() {
            Some(Ok(frame)) => match channel {
                Some(channel) => {
                    channel.send(frame);
                    self.frames_sent += 1;
                }
                None => log::debug!("No channel, dropping encoded frame"),
            },
            Some(Err(e)) => log::warn!("Dropping sample: {}", e),
            None => {}
        }
    }
}
