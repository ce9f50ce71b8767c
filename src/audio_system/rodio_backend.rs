/// Rodio playback backend
///
/// One `Sink` per channel on a shared output stream. Clip files are read
/// into memory once and decoded from the cached bytes on every start.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::asset::ClipHandle;
use super::backend::ChannelBackend;
use super::channel::{ChannelId, PlaybackParams};
use super::volume::{Bus, BusGains};
use crate::error::AudioError;

/// Slowest playback speed; rodio cannot play backwards
const MIN_SPEED: f32 = 0.01;

struct Voice {
    sink: Sink,
    bus: Bus,
    volume: f32,
}

pub struct RodioBackend {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    voices: HashMap<ChannelId, Voice>,
    clips: HashMap<ClipHandle, Arc<Vec<u8>>>,
    asset_root: PathBuf,
    gains: BusGains,
}

impl RodioBackend {
    /// Open the default output device.
    ///
    /// Clip handles are resolved relative to `asset_root`. `gains` should be
    /// a clone of the table handed to the volume controller.
    pub fn try_new(asset_root: impl Into<PathBuf>, gains: BusGains) -> Result<Self, AudioError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| AudioError::StreamInit(Box::new(e)))?;

        let asset_root = asset_root.into();
        tracing::info!("Opened audio output, assets from {}", asset_root.display());

        Ok(Self {
            _stream: stream,
            stream_handle,
            voices: HashMap::new(),
            clips: HashMap::new(),
            asset_root,
            gains,
        })
    }

    /// Read a clip into the cache so its first start does not touch the disk
    pub fn preload(&mut self, clip: &ClipHandle) -> Result<(), AudioError> {
        self.clip_data(clip).map(|_| ())
    }

    fn clip_data(&mut self, clip: &ClipHandle) -> Result<Arc<Vec<u8>>, AudioError> {
        if let Some(data) = self.clips.get(clip) {
            return Ok(Arc::clone(data));
        }

        let path = resolve(&self.asset_root, clip);
        let data = std::fs::read(&path).map_err(|e| AudioError::ClipLoad {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        tracing::debug!("Cached clip {} ({} bytes)", clip, data.len());

        let data = Arc::new(data);
        self.clips.insert(clip.clone(), Arc::clone(&data));
        Ok(data)
    }

    fn effective_volume(&self, bus: Bus, volume: f32) -> f32 {
        volume.clamp(0.0, 1.0) * self.gains.channel_factor(bus)
    }
}

fn resolve(root: &Path, clip: &ClipHandle) -> PathBuf {
    let path = Path::new(clip.as_str());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

impl ChannelBackend for RodioBackend {
    fn start(
        &mut self,
        channel: ChannelId,
        clip: &ClipHandle,
        params: &PlaybackParams,
    ) -> Result<(), AudioError> {
        if let Some(previous) = self.voices.remove(&channel) {
            previous.sink.stop();
        }

        let data = self.clip_data(clip)?;

        // Decoder needs owned data with a 'static lifetime
        let cursor = std::io::Cursor::new((*data).clone());
        let decoder = Decoder::new(cursor).map_err(|e| AudioError::ClipLoad {
            path: clip.to_string(),
            source: Box::new(e),
        })?;

        let source: Box<dyn Source<Item = i16> + Send> = if params.looping {
            Box::new(decoder.repeat_infinite())
        } else {
            Box::new(decoder)
        };

        let sink = Sink::try_new(&self.stream_handle).map_err(|e| AudioError::Backend {
            channel,
            message: e.to_string(),
        })?;
        sink.set_speed(params.pitch.max(MIN_SPEED));
        sink.set_volume(self.effective_volume(params.bus, params.volume));
        sink.append(source);
        sink.play();

        tracing::trace!(%channel, clip = %clip, "Started clip");
        self.voices.insert(
            channel,
            Voice {
                sink,
                bus: params.bus,
                volume: params.volume,
            },
        );
        Ok(())
    }

    fn stop(&mut self, channel: ChannelId) {
        if let Some(voice) = self.voices.remove(&channel) {
            voice.sink.stop();
        }
    }

    fn set_volume(&mut self, channel: ChannelId, volume: f32) {
        let effective = match self.voices.get(&channel) {
            Some(voice) => self.effective_volume(voice.bus, volume),
            None => return,
        };
        if let Some(voice) = self.voices.get_mut(&channel) {
            voice.volume = volume;
            voice.sink.set_volume(effective);
        }
    }

    fn is_sounding(&self, channel: ChannelId) -> bool {
        self.voices
            .get(&channel)
            .map(|voice| !voice.sink.empty())
            .unwrap_or(false)
    }

    /// Drop finished sinks and follow bus gain changes
    fn update(&mut self, _elapsed: std::time::Duration) {
        self.voices.retain(|_, voice| !voice.sink.empty());

        let gains = &self.gains;
        for voice in self.voices.values() {
            let effective = voice.volume.clamp(0.0, 1.0) * gains.channel_factor(voice.bus);
            voice.sink.set_volume(effective);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Opening a device needs audio hardware; only path handling is tested here

    #[test]
    fn test_resolve_relative_and_absolute() {
        let root = Path::new("/srv/audio");
        assert_eq!(
            resolve(root, &ClipHandle::new("sfx/hit.wav")),
            PathBuf::from("/srv/audio/sfx/hit.wav")
        );
        assert_eq!(
            resolve(root, &ClipHandle::new("/tmp/one.ogg")),
            PathBuf::from("/tmp/one.ogg")
        );
    }
}
