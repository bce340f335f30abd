//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapter for Gemini's native text-to-speech model.
//! It implements the `TextToSpeechService` port from the `core` crate.

use async_trait::async_trait;
use hound::{WavSpec, WavWriter};
use serde_json::json;
use skill_tutor_core::{PortResult, TextToSpeechService};
use tracing::debug;

use super::gemini::{Content, GeminiClient, GenerateContentRequest, Part};

/// The sample rate of the PCM audio the speech model returns.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `TextToSpeechService` port using a prebuilt Gemini voice.
#[derive(Clone)]
pub struct GeminiTtsAdapter {
    client: GeminiClient,
    model: String,
    voice: String,
}

impl GeminiTtsAdapter {
    /// Creates a new `GeminiTtsAdapter`.
    pub fn new(client: GeminiClient, model: String, voice: String) -> Self {
        Self {
            client,
            model,
            voice,
        }
    }
}

/// Wraps raw little-endian 16-bit mono PCM in a WAV container.
pub fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = std::io::Cursor::new(Vec::new());

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for pair in pcm_data.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

//=========================================================================================
// `TextToSpeechService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextToSpeechService for GeminiTtsAdapter {
    /// Returns the raw PCM bytes. An empty vector means the reply carried no audio.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text(format!(
                "Please read this clearly: {}",
                text
            ))])],
            generation_config: Some(json!({
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.voice } }
                }
            })),
            ..Default::default()
        };

        let response = self.client.generate_content(&self.model, &request).await?;
        match response.inline_data() {
            Some(blob) => {
                let pcm = blob.decode()?;
                debug!(bytes = pcm.len(), voice = %self.voice, "Received speech audio.");
                Ok(pcm)
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_describes_mono_pcm() {
        let pcm: Vec<u8> = [0i16, 1000, -1000, i16::MAX]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();

        let wav = pcm16_to_wav(&pcm, SPEECH_SAMPLE_RATE).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 1000, -1000, i16::MAX]);
    }
}
